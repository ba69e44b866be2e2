//! Ollama local inference adapter
//!
//! Chat and completions go through Ollama's `OpenAI`-compatible `/v1`
//! surface; embeddings use the native `/api/embeddings` endpoint, whose
//! usage must be synthesized from `prompt_eval_count`/`eval_count`. The
//! default origin is the local daemon; caller-supplied hosts are validated
//! strictly since this is the provider most often pointed at arbitrary
//! machines.

use std::sync::LazyLock;

use http::{HeaderMap, StatusCode};
use plexus_core::context::ApiContext;
use plexus_core::error::{ErrorBody, GatewayError};
use plexus_core::types::{
    CanonicalResponse, EmbeddingData, EmbeddingResponse, GatewayFunction, ProviderId, StreamState, Target, Usage,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::adapter::ProviderAdapter;
use crate::api::{ProviderApi, base_url_or_default, bearer_headers, proxy_endpoint};
use crate::mapping::{FunctionTable, ParamSpec};
use crate::openai_compat;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

static CHAT: LazyLock<FunctionTable> = LazyLock::new(openai_compat::chat_table);
static COMPLETION: LazyLock<FunctionTable> = LazyLock::new(openai_compat::completion_table);

/// `/api/embeddings` takes a single prompt string
fn to_prompt(body: &Value, _target: &Target) -> Option<Value> {
    match body.get("input")? {
        Value::String(s) => Some(json!(s)),
        Value::Array(items) => items.first().cloned(),
        _ => None,
    }
}

static EMBED: LazyLock<FunctionTable> = LazyLock::new(|| {
    FunctionTable::new()
        .map("model", ParamSpec::new("model").required())
        .map("input", ParamSpec::new("prompt").required().transform(to_prompt))
});

#[derive(Debug, Deserialize)]
struct WireEmbedResponse {
    embedding: Vec<f64>,
    #[serde(default)]
    prompt_eval_count: Option<i64>,
    #[serde(default)]
    eval_count: Option<i64>,
}

struct OllamaApi;

impl ProviderApi for OllamaApi {
    fn base_url(&self, ctx: &ApiContext<'_>) -> Result<String, GatewayError> {
        base_url_or_default(ctx, DEFAULT_BASE_URL)
    }

    fn endpoint(&self, ctx: &ApiContext<'_>) -> Result<String, GatewayError> {
        let path = match ctx.function {
            GatewayFunction::ChatComplete => "/v1/chat/completions",
            GatewayFunction::Complete => "/v1/completions",
            GatewayFunction::Embed => "/api/embeddings",
            GatewayFunction::Proxy => return Ok(proxy_endpoint(ctx)),
            _ => "",
        };
        Ok(path.to_owned())
    }

    fn headers(&self, ctx: &ApiContext<'_>) -> Result<HeaderMap, GatewayError> {
        // No auth required; a bearer header rides along only when a key was
        // configured (e.g. an authenticating reverse proxy in front)
        bearer_headers(ctx)
    }

    fn api_key_required(&self) -> bool {
        false
    }
}

/// Ollama adapter
pub struct OllamaAdapter;

impl ProviderAdapter for OllamaAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Ollama
    }

    fn api(&self) -> &dyn ProviderApi {
        &OllamaApi
    }

    fn table(&self, function: GatewayFunction) -> Option<&FunctionTable> {
        match function {
            GatewayFunction::ChatComplete => Some(&CHAT),
            GatewayFunction::Complete => Some(&COMPLETION),
            GatewayFunction::Embed => Some(&EMBED),
            _ => None,
        }
    }

    fn transform_response(
        &self,
        function: GatewayFunction,
        body: &Value,
        status: StatusCode,
        ctx: &ApiContext<'_>,
    ) -> Result<CanonicalResponse, ErrorBody> {
        let provider = self.id();
        let normalize = |b: &Value, s: StatusCode| openai_compat::normalize_error(provider, b, s);
        match function {
            GatewayFunction::Embed => {
                openai_compat::check_error(provider, body, status, &normalize)?;
                let Ok(wire) = serde_json::from_value::<WireEmbedResponse>(body.clone()) else {
                    return Err(ErrorBody::invalid_provider_response(provider, body));
                };

                // No usage block upstream: synthesize it from the eval
                // counters, and keep "unknown" distinct from zero
                let usage = match (wire.prompt_eval_count, wire.eval_count) {
                    (Some(prompt), Some(eval)) => Usage::from_counts(prompt, eval),
                    (Some(prompt), None) => Usage::from_counts(prompt, 0),
                    _ => Usage::UNKNOWN,
                };

                Ok(CanonicalResponse::Embeddings(EmbeddingResponse {
                    object: "list".to_owned(),
                    data: vec![EmbeddingData {
                        object: "embedding".to_owned(),
                        embedding: json!(wire.embedding),
                        index: 0,
                    }],
                    model: ctx.model().unwrap_or("unknown").to_owned(),
                    provider,
                    usage,
                }))
            }
            GatewayFunction::Complete => {
                openai_compat::transform_completion_response(provider, body, status, ctx, &normalize)
            }
            _ => openai_compat::transform_chat_response(provider, body, status, ctx, &normalize),
        }
    }

    fn transform_chunk(
        &self,
        _function: GatewayFunction,
        raw: &str,
        fallback_id: &str,
        state: &mut StreamState,
        ctx: &ApiContext<'_>,
    ) -> Result<Option<String>, GatewayError> {
        openai_compat::transform_chunk(self.id(), raw, fallback_id, state, ctx, self.stream_parse_policy())
    }

    fn normalize_error(&self, body: &Value, status: StatusCode) -> Option<ErrorBody> {
        openai_compat::normalize_error(self.id(), body, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_local_daemon_with_openai_chat_path() {
        let target = Target::for_provider(ProviderId::Ollama);
        let body = json!({"model": "llama3.2:latest", "messages": [{"role": "user", "content": "hi"}]});
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);

        assert_eq!(OllamaApi.base_url(&ctx).unwrap(), "http://localhost:11434");
        assert_eq!(OllamaApi.endpoint(&ctx).unwrap(), "/v1/chat/completions");
    }

    #[test]
    fn unsafe_custom_host_is_rejected_before_any_call() {
        let mut target = Target::for_provider(ProviderId::Ollama);
        target.custom_host = Some("javascript:alert(1)".to_owned());
        let body = json!({"model": "llama3.2:latest", "messages": []});
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);

        let err = OllamaApi.base_url(&ctx).unwrap_err();
        assert!(matches!(err, GatewayError::InvalidHostConfiguration(_)));
    }

    #[test]
    fn valid_custom_host_overrides_default() {
        let mut target = Target::for_provider(ProviderId::Ollama);
        target.custom_host = Some("http://gpu-box:11434".to_owned());
        let body = json!({"model": "llama3.2:latest", "messages": []});
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        assert_eq!(OllamaApi.base_url(&ctx).unwrap(), "http://gpu-box:11434");
    }

    #[test]
    fn no_auth_header_without_a_key() {
        let target = Target::for_provider(ProviderId::Ollama);
        let body = json!({});
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        let headers = OllamaApi.headers(&ctx).unwrap();
        assert!(!headers.contains_key("authorization"));
        assert!(!OllamaApi.api_key_required());
    }

    #[test]
    fn embedding_usage_synthesized_from_eval_counters() {
        let target = Target::for_provider(ProviderId::Ollama);
        let body = json!({"model": "nomic-embed-text", "input": "hello"});
        let ctx = ApiContext::new(&target, GatewayFunction::Embed, &body);
        let upstream = json!({"embedding": [0.1, 0.2, 0.3], "prompt_eval_count": 5, "eval_count": 2});

        let CanonicalResponse::Embeddings(resp) = OllamaAdapter
            .transform_response(GatewayFunction::Embed, &upstream, StatusCode::OK, &ctx)
            .unwrap()
        else {
            panic!("expected embeddings");
        };
        assert_eq!(resp.usage.prompt_tokens, 5);
        assert_eq!(resp.usage.total_tokens, 7);
        assert_eq!(resp.data[0].embedding, json!([0.1, 0.2, 0.3]));
    }

    #[test]
    fn embedding_without_counters_reports_unknown_usage() {
        let target = Target::for_provider(ProviderId::Ollama);
        let body = json!({"model": "nomic-embed-text", "input": "hello"});
        let ctx = ApiContext::new(&target, GatewayFunction::Embed, &body);
        let upstream = json!({"embedding": [0.5]});

        let CanonicalResponse::Embeddings(resp) = OllamaAdapter
            .transform_response(GatewayFunction::Embed, &upstream, StatusCode::OK, &ctx)
            .unwrap()
        else {
            panic!("expected embeddings");
        };
        assert_eq!(resp.usage, Usage::UNKNOWN);
    }

    #[test]
    fn embed_table_maps_input_to_single_prompt() {
        let target = Target::for_provider(ProviderId::Ollama);
        let body = json!({"model": "nomic-embed-text", "input": ["only one"]});
        let out = crate::mapping::build_request(ProviderId::Ollama, &EMBED, &body, &target).unwrap();
        assert_eq!(out["prompt"], "only one");
    }

    #[test]
    fn string_error_normalizes_via_openai_shapes() {
        let upstream = json!({"error": "model \"nope\" not found"});
        let normalized = OllamaAdapter
            .normalize_error(&upstream, StatusCode::NOT_FOUND)
            .unwrap();
        assert_eq!(normalized.provider, "ollama");
        assert!(normalized.error.message.contains("not found"));
    }
}
