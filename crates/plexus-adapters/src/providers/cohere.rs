//! Cohere v1 adapter
//!
//! Cohere splits the conversation into `message` + `chat_history` +
//! `preamble`, bills usage under `meta.billed_units`, and streams
//! newline-delimited JSON events instead of SSE.

use std::sync::LazyLock;

use http::{HeaderMap, StatusCode};
use plexus_core::context::ApiContext;
use plexus_core::error::{ErrorBody, GatewayError};
use plexus_core::types::{
    CanonicalResponse, ChatCompletionResponse, Choice, ChoiceMessage, EmbeddingData, EmbeddingResponse, FinishReason,
    GatewayFunction, ProviderId, StreamFormat, StreamState, Target, Usage, DONE_CHUNK, DONE_SENTINEL, sse_data,
    strip_sse_prefix,
};
use plexus_core::{generate_id, unix_now};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::adapter::ProviderAdapter;
use crate::api::{ProviderApi, base_url_or_default, bearer_headers, proxy_endpoint, require_api_key};
use crate::mapping::{FunctionTable, ParamSpec};
use crate::openai_compat;

const DEFAULT_BASE_URL: &str = "https://api.cohere.com/v1";

// -- Request transforms --

fn text_of(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}

/// The last user turn becomes Cohere's `message`
fn to_message(body: &Value, _target: &Target) -> Option<Value> {
    let messages = body.get("messages")?.as_array()?;
    messages
        .iter()
        .rev()
        .find(|m| m.get("role").and_then(Value::as_str) == Some("user"))
        .map(|m| json!(text_of(m.get("content"))))
}

/// Everything before the last user turn becomes `chat_history`
fn to_chat_history(body: &Value, _target: &Target) -> Option<Value> {
    let messages = body.get("messages")?.as_array()?;
    let last_user = messages
        .iter()
        .rposition(|m| m.get("role").and_then(Value::as_str) == Some("user"))?;

    let history: Vec<Value> = messages[..last_user]
        .iter()
        .filter_map(|m| {
            let role = match m.get("role").and_then(Value::as_str)? {
                "user" => "USER",
                "assistant" => "CHATBOT",
                _ => return None,
            };
            Some(json!({"role": role, "message": text_of(m.get("content"))}))
        })
        .collect();
    (!history.is_empty()).then(|| Value::Array(history))
}

/// System turns join into the `preamble`
fn to_preamble(body: &Value, _target: &Target) -> Option<Value> {
    let messages = body.get("messages")?.as_array()?;
    let joined = messages
        .iter()
        .filter(|m| matches!(m.get("role").and_then(Value::as_str), Some("system" | "developer")))
        .map(|m| text_of(m.get("content")))
        .collect::<Vec<_>>()
        .join("\n");
    (!joined.is_empty()).then(|| Value::String(joined))
}

fn to_stop_sequences(body: &Value, _target: &Target) -> Option<Value> {
    match body.get("stop") {
        Some(Value::String(s)) => Some(json!([s])),
        Some(Value::Array(items)) => Some(Value::Array(items.clone())),
        _ => None,
    }
}

/// Embedding input always ships as a `texts` array
fn to_texts(body: &Value, _target: &Target) -> Option<Value> {
    match body.get("input")? {
        Value::String(s) => Some(json!([s])),
        Value::Array(items) => Some(Value::Array(items.clone())),
        _ => None,
    }
}

static CHAT: LazyLock<FunctionTable> = LazyLock::new(|| {
    FunctionTable::new()
        .map("model", ParamSpec::new("model").required())
        .map("messages", ParamSpec::new("message").required().transform(to_message))
        .map("messages", ParamSpec::new("chat_history").transform(to_chat_history))
        .map("messages", ParamSpec::new("preamble").transform(to_preamble))
        .map("temperature", ParamSpec::new("temperature").bounded(0.0, 5.0))
        .map("top_p", ParamSpec::new("p").bounded(0.01, 0.99))
        .map("top_k", ParamSpec::new("k").bounded(0.0, 500.0))
        .map("max_tokens", ParamSpec::new("max_tokens").bounded(1.0, f64::MAX))
        .map("stop", ParamSpec::new("stop_sequences").transform(to_stop_sequences))
        .map("frequency_penalty", ParamSpec::new("frequency_penalty").bounded(0.0, 1.0))
        .map("presence_penalty", ParamSpec::new("presence_penalty").bounded(0.0, 1.0))
        .map("stream", ParamSpec::new("stream"))
});

static EMBED: LazyLock<FunctionTable> = LazyLock::new(|| {
    FunctionTable::new()
        .map("model", ParamSpec::new("model").required())
        .map("input", ParamSpec::new("texts").required().transform(to_texts))
        .map("input_type", ParamSpec::new("input_type").default_value(json!("search_document")))
});

// -- Wire shapes --

#[derive(Debug, Deserialize)]
struct WireChatResponse {
    #[serde(default)]
    response_id: Option<String>,
    text: String,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    meta: Option<WireMeta>,
}

#[derive(Debug, Deserialize)]
struct WireMeta {
    #[serde(default)]
    billed_units: Option<WireBilledUnits>,
}

#[derive(Debug, Deserialize)]
struct WireBilledUnits {
    #[serde(default)]
    input_tokens: Option<i64>,
    #[serde(default)]
    output_tokens: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WireEmbedResponse {
    embeddings: Vec<Vec<f64>>,
    #[serde(default)]
    meta: Option<WireMeta>,
}

fn usage_from_meta(meta: Option<&WireMeta>) -> Usage {
    meta.and_then(|m| m.billed_units.as_ref())
        .map_or(Usage::UNKNOWN, |units| match (units.input_tokens, units.output_tokens) {
            (Some(input), Some(output)) => Usage::from_counts(input, output),
            (Some(input), None) => Usage::from_counts(input, 0),
            _ => Usage::UNKNOWN,
        })
}

// -- API descriptor --

struct CohereApi;

impl ProviderApi for CohereApi {
    fn base_url(&self, ctx: &ApiContext<'_>) -> Result<String, GatewayError> {
        base_url_or_default(ctx, DEFAULT_BASE_URL)
    }

    fn endpoint(&self, ctx: &ApiContext<'_>) -> Result<String, GatewayError> {
        let path = match ctx.function {
            GatewayFunction::ChatComplete => "/chat",
            GatewayFunction::Embed => "/embed",
            GatewayFunction::Proxy => return Ok(proxy_endpoint(ctx)),
            _ => "",
        };
        Ok(path.to_owned())
    }

    fn headers(&self, ctx: &ApiContext<'_>) -> Result<HeaderMap, GatewayError> {
        require_api_key(ctx)?;
        bearer_headers(ctx)
    }
}

/// Cohere adapter
pub struct CohereAdapter;

impl ProviderAdapter for CohereAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Cohere
    }

    fn api(&self) -> &dyn ProviderApi {
        &CohereApi
    }

    fn table(&self, function: GatewayFunction) -> Option<&FunctionTable> {
        match function {
            GatewayFunction::ChatComplete => Some(&CHAT),
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
        openai_compat::check_error(provider, body, status, &normalize)?;

        match function {
            GatewayFunction::Embed => {
                let Ok(wire) = serde_json::from_value::<WireEmbedResponse>(body.clone()) else {
                    return Err(ErrorBody::invalid_provider_response(provider, body));
                };
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
                    usage: usage_from_meta(wire.meta.as_ref()),
                }))
            }
            _ => {
                let Ok(wire) = serde_json::from_value::<WireChatResponse>(body.clone()) else {
                    return Err(ErrorBody::invalid_provider_response(provider, body));
                };
                Ok(CanonicalResponse::Chat(ChatCompletionResponse {
                    id: wire.response_id.unwrap_or_else(|| generate_id("chatcmpl")),
                    object: "chat.completion".to_owned(),
                    created: unix_now(),
                    model: ctx.model().unwrap_or("unknown").to_owned(),
                    provider,
                    choices: vec![Choice {
                        index: 0,
                        message: ChoiceMessage::text(wire.text),
                        finish_reason: wire.finish_reason.as_deref().and_then(FinishReason::parse),
                    }],
                    usage: usage_from_meta(wire.meta.as_ref()),
                    provider_extras: None,
                }))
            }
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
        let provider = self.id();
        let payload = strip_sse_prefix(raw);
        if payload.is_empty() {
            return Ok(None);
        }
        if payload == DONE_SENTINEL {
            state.finished = true;
            return Ok(Some(DONE_CHUNK.to_owned()));
        }

        let Ok(event) = serde_json::from_str::<Value>(payload) else {
            state.chunk_count += 1;
            return Ok(Some(sse_data(&openai_compat::empty_delta_chunk(provider, fallback_id, ctx))));
        };
        state.chunk_count += 1;

        let id = state.response_id.clone().unwrap_or_else(|| fallback_id.to_owned());
        let model = ctx.model().unwrap_or("unknown");
        let chunk = |delta: Value, finish: Value, usage: Value| {
            json!({
                "id": id,
                "object": "chat.completion.chunk",
                "created": unix_now(),
                "model": model,
                "provider": provider,
                "choices": [{"index": 0, "delta": delta, "finish_reason": finish}],
                "usage": usage,
            })
        };

        match event.get("event_type").and_then(Value::as_str) {
            Some("stream-start") => {
                if let Some(generation_id) = event.get("generation_id").and_then(Value::as_str) {
                    state.response_id = Some(generation_id.to_owned());
                }
                let id = state.response_id.clone().unwrap_or_else(|| fallback_id.to_owned());
                let opening = json!({
                    "id": id,
                    "object": "chat.completion.chunk",
                    "created": unix_now(),
                    "model": model,
                    "provider": provider,
                    "choices": [{"index": 0, "delta": {"role": "assistant", "content": ""}, "finish_reason": null}],
                });
                Ok(Some(sse_data(&opening)))
            }
            Some("text-generation") => {
                let text = event.get("text").and_then(Value::as_str).unwrap_or("");
                state.record_content(text);
                Ok(Some(sse_data(&chunk(json!({"content": text}), Value::Null, Value::Null))))
            }
            Some("stream-end") => {
                let finish = event
                    .get("finish_reason")
                    .and_then(Value::as_str)
                    .and_then(FinishReason::parse)
                    .map_or(Value::Null, |fr| serde_json::to_value(fr).unwrap_or(Value::Null));
                let usage = event
                    .get("response")
                    .and_then(|r| serde_json::from_value::<WireChatResponse>(r.clone()).ok())
                    .map_or(Value::Null, |r| {
                        serde_json::to_value(usage_from_meta(r.meta.as_ref())).unwrap_or(Value::Null)
                    });
                Ok(Some(sse_data(&chunk(json!({}), finish, usage))))
            }
            _ => Ok(None),
        }
    }

    fn normalize_error(&self, body: &Value, status: StatusCode) -> Option<ErrorBody> {
        openai_compat::normalize_error(self.id(), body, status)
    }

    fn stream_format(&self) -> StreamFormat {
        StreamFormat::JsonLines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::build_request;

    fn target() -> Target {
        let mut target = Target::for_provider(ProviderId::Cohere);
        target.api_key = Some("co-key".into());
        target
    }

    #[test]
    fn conversation_splits_into_message_history_preamble() {
        let body = json!({
            "model": "command-r",
            "messages": [
                {"role": "system", "content": "be formal"},
                {"role": "user", "content": "first"},
                {"role": "assistant", "content": "reply"},
                {"role": "user", "content": "second"}
            ]
        });
        let out = build_request(ProviderId::Cohere, &CHAT, &body, &target()).unwrap();
        assert_eq!(out["message"], "second");
        assert_eq!(out["preamble"], "be formal");
        let history = out["chat_history"].as_array().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0]["role"], "USER");
        assert_eq!(history[1]["role"], "CHATBOT");
    }

    #[test]
    fn top_p_outside_cohere_range_is_rejected() {
        let body = json!({
            "model": "command-r",
            "messages": [{"role": "user", "content": "x"}],
            "top_p": 1.0
        });
        let err = build_request(ProviderId::Cohere, &CHAT, &body, &target()).unwrap_err();
        assert!(matches!(err, GatewayError::ParameterOutOfRange { .. }));
    }

    #[test]
    fn embed_defaults_input_type() {
        let body = json!({"model": "embed-english-v3.0", "input": "hello"});
        let out = build_request(ProviderId::Cohere, &EMBED, &body, &target()).unwrap();
        assert_eq!(out["texts"], json!(["hello"]));
        assert_eq!(out["input_type"], "search_document");
    }

    #[test]
    fn chat_response_maps_billed_units() {
        let target = target();
        let body = json!({"model": "command-r", "messages": []});
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        let upstream = json!({
            "response_id": "resp-1",
            "text": "salut",
            "finish_reason": "COMPLETE",
            "meta": {"billed_units": {"input_tokens": 8, "output_tokens": 3}}
        });
        let CanonicalResponse::Chat(resp) = CohereAdapter
            .transform_response(GatewayFunction::ChatComplete, &upstream, StatusCode::OK, &ctx)
            .unwrap()
        else {
            panic!("expected chat response");
        };
        assert_eq!(resp.choices[0].message.content.as_deref(), Some("salut"));
        assert_eq!(resp.choices[0].finish_reason, Some(FinishReason::Stop));
        assert_eq!(resp.usage.total_tokens, 11);
    }

    #[test]
    fn ndjson_stream_events_become_chunks() {
        let target = target();
        let body = json!({"model": "command-r", "messages": []});
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        let mut state = StreamState::default();
        let adapter = CohereAdapter;

        let start = adapter
            .transform_chunk(
                GatewayFunction::ChatComplete,
                r#"{"event_type":"stream-start","generation_id":"gen-1","is_finished":false}"#,
                "chatcmpl-f",
                &mut state,
                &ctx,
            )
            .unwrap()
            .unwrap();
        assert!(start.contains("gen-1"));

        let text = adapter
            .transform_chunk(
                GatewayFunction::ChatComplete,
                r#"{"event_type":"text-generation","text":"hey","is_finished":false}"#,
                "chatcmpl-f",
                &mut state,
                &ctx,
            )
            .unwrap()
            .unwrap();
        assert!(text.contains("\"content\":\"hey\""));
        assert_eq!(state.collected_content, "hey");

        let end = adapter
            .transform_chunk(
                GatewayFunction::ChatComplete,
                r#"{"event_type":"stream-end","is_finished":true,"finish_reason":"COMPLETE","response":{"text":"hey","meta":{"billed_units":{"input_tokens":2,"output_tokens":1}}}}"#,
                "chatcmpl-f",
                &mut state,
                &ctx,
            )
            .unwrap()
            .unwrap();
        assert!(end.contains("\"finish_reason\":\"stop\""));
        assert!(end.contains("\"total_tokens\":3"));
        // The canonical [DONE] sentinel is appended by the dispatcher once
        // the upstream stream closes
        assert!(!state.finished);
    }

    #[test]
    fn streams_are_newline_delimited_json() {
        assert_eq!(CohereAdapter.stream_format(), StreamFormat::JsonLines);
    }
}
