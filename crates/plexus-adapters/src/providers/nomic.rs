//! Nomic Atlas adapter (embeddings only, native wire shape)

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
use crate::api::{ProviderApi, base_url_or_default, bearer_headers, proxy_endpoint, require_api_key};
use crate::mapping::{FunctionTable, ParamSpec};
use crate::openai_compat;

const DEFAULT_BASE_URL: &str = "https://api-atlas.nomic.ai/v1";

/// Embedding input always ships as a `texts` array
fn to_texts(body: &Value, _target: &Target) -> Option<Value> {
    match body.get("input")? {
        Value::String(s) => Some(json!([s])),
        Value::Array(items) => Some(Value::Array(items.clone())),
        _ => None,
    }
}

static EMBED: LazyLock<FunctionTable> = LazyLock::new(|| {
    FunctionTable::new()
        .map("model", ParamSpec::new("model").required())
        .map("input", ParamSpec::new("texts").required().transform(to_texts))
        .map("task_type", ParamSpec::new("task_type").default_value(json!("search_document")))
        .map("dimensions", ParamSpec::new("dimensionality"))
});

#[derive(Debug, Deserialize)]
struct WireEmbedResponse {
    embeddings: Vec<Vec<f64>>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: Option<i64>,
    #[serde(default)]
    total_tokens: Option<i64>,
}

struct NomicApi;

impl ProviderApi for NomicApi {
    fn base_url(&self, ctx: &ApiContext<'_>) -> Result<String, GatewayError> {
        base_url_or_default(ctx, DEFAULT_BASE_URL)
    }

    fn endpoint(&self, ctx: &ApiContext<'_>) -> Result<String, GatewayError> {
        match ctx.function {
            GatewayFunction::Embed => Ok("/embedding/text".to_owned()),
            GatewayFunction::Proxy => Ok(proxy_endpoint(ctx)),
            _ => Ok(String::new()),
        }
    }

    fn headers(&self, ctx: &ApiContext<'_>) -> Result<HeaderMap, GatewayError> {
        require_api_key(ctx)?;
        bearer_headers(ctx)
    }
}

/// Nomic adapter
pub struct NomicAdapter;

impl ProviderAdapter for NomicAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Nomic
    }

    fn api(&self) -> &dyn ProviderApi {
        &NomicApi
    }

    fn table(&self, function: GatewayFunction) -> Option<&FunctionTable> {
        match function {
            GatewayFunction::Embed => Some(&EMBED),
            _ => None,
        }
    }

    fn transform_response(
        &self,
        _function: GatewayFunction,
        body: &Value,
        status: StatusCode,
        ctx: &ApiContext<'_>,
    ) -> Result<CanonicalResponse, ErrorBody> {
        let provider = self.id();
        let normalize = |b: &Value, s: StatusCode| openai_compat::normalize_error(provider, b, s);
        openai_compat::check_error(provider, body, status, &normalize)?;

        let Ok(wire) = serde_json::from_value::<WireEmbedResponse>(body.clone()) else {
            return Err(ErrorBody::invalid_provider_response(provider, body));
        };

        let usage = wire.usage.map_or(Usage::UNKNOWN, |u| match (u.prompt_tokens, u.total_tokens) {
            (Some(prompt), total) => Usage {
                prompt_tokens: prompt,
                completion_tokens: 0,
                total_tokens: total.unwrap_or(prompt),
            },
            (None, Some(total)) => Usage {
                prompt_tokens: total,
                completion_tokens: 0,
                total_tokens: total,
            },
            _ => Usage::UNKNOWN,
        });

        let data = wire
            .embeddings
            .into_iter()
            .enumerate()
            .map(|(index, values)| {
                #[allow(clippy::cast_possible_truncation)]
                EmbeddingData {
                    object: "embedding".to_owned(),
                    embedding: json!(values),
                    index: index as u32,
                }
            })
            .collect();

        Ok(CanonicalResponse::Embeddings(EmbeddingResponse {
            object: "list".to_owned(),
            data,
            model: ctx.model().unwrap_or("unknown").to_owned(),
            provider,
            usage,
        }))
    }

    fn transform_chunk(
        &self,
        _function: GatewayFunction,
        _raw: &str,
        _fallback_id: &str,
        _state: &mut StreamState,
        _ctx: &ApiContext<'_>,
    ) -> Result<Option<String>, GatewayError> {
        Err(GatewayError::StreamTransform {
            provider: self.id(),
            message: "nomic does not stream".to_owned(),
        })
    }

    fn normalize_error(&self, body: &Value, status: StatusCode) -> Option<ErrorBody> {
        openai_compat::normalize_error(self.id(), body, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::build_request;

    #[test]
    fn input_becomes_texts_with_task_type_default() {
        let target = Target::for_provider(ProviderId::Nomic);
        let body = json!({"model": "nomic-embed-text-v1.5", "input": ["a", "b"]});
        let out = build_request(ProviderId::Nomic, &EMBED, &body, &target).unwrap();
        assert_eq!(out["texts"], json!(["a", "b"]));
        assert_eq!(out["task_type"], "search_document");
    }

    #[test]
    fn native_embeddings_shape_maps_to_canonical_list() {
        let target = Target::for_provider(ProviderId::Nomic);
        let body = json!({"model": "nomic-embed-text-v1.5", "input": "x"});
        let ctx = ApiContext::new(&target, GatewayFunction::Embed, &body);
        let upstream = json!({
            "embeddings": [[0.25, 0.5]],
            "usage": {"prompt_tokens": 3, "total_tokens": 3}
        });
        let CanonicalResponse::Embeddings(resp) = NomicAdapter
            .transform_response(GatewayFunction::Embed, &upstream, StatusCode::OK, &ctx)
            .unwrap()
        else {
            panic!("expected embeddings");
        };
        assert_eq!(resp.object, "list");
        assert_eq!(resp.data[0].embedding, json!([0.25, 0.5]));
        assert_eq!(resp.usage.prompt_tokens, 3);
    }
}
