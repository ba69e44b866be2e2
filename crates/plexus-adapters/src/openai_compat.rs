//! Shared machinery for `OpenAI`-protocol providers
//!
//! The canonical schemas are modeled on the `OpenAI` API, so providers that
//! speak that protocol (openai itself, groq, mistral, together, ...) share
//! their mapping tables, response transforms, chunk transform, and error
//! normalizer. Each provider module derives from these and layers its own
//! quirks on top.

use http::StatusCode;
use plexus_core::context::ApiContext;
use plexus_core::error::{ErrorBody, ErrorDetail, GatewayError};
use plexus_core::types::{
    CanonicalResponse, ChatCompletionResponse, Choice, ChoiceMessage, EmbeddingData, EmbeddingResponse, FinishReason,
    ImageData, ImageGenerationResponse, ProviderId, StreamParsePolicy, StreamState, TextChoice,
    TextCompletionResponse, ToolCall, Usage, DONE_CHUNK, DONE_SENTINEL, sse_data, strip_sse_prefix,
};
use plexus_core::{generate_id, unix_now};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::mapping::{FunctionTable, ParamSpec};

/// Error-normalizer view used by the shared transforms
pub type NormalizeFn<'a> = &'a dyn Fn(&Value, StatusCode) -> Option<ErrorBody>;

// -- Mapping tables --

/// Base chat-completion mapping shared by `OpenAI`-protocol providers
pub fn chat_table() -> FunctionTable {
    FunctionTable::new()
        .map("model", ParamSpec::new("model").required())
        .map("messages", ParamSpec::new("messages").required())
        .map("temperature", ParamSpec::new("temperature").bounded(0.0, 2.0))
        .map("top_p", ParamSpec::new("top_p").bounded(0.0, 1.0))
        .map("n", ParamSpec::new("n").bounded(1.0, 128.0))
        .map("max_tokens", ParamSpec::new("max_tokens").bounded(1.0, f64::MAX))
        .map("stop", ParamSpec::new("stop"))
        .map("frequency_penalty", ParamSpec::new("frequency_penalty").bounded(-2.0, 2.0))
        .map("presence_penalty", ParamSpec::new("presence_penalty").bounded(-2.0, 2.0))
        .map("logit_bias", ParamSpec::new("logit_bias"))
        .map("seed", ParamSpec::new("seed"))
        .map("user", ParamSpec::new("user"))
        .map("stream", ParamSpec::new("stream"))
        .map("tools", ParamSpec::new("tools"))
        .map("tool_choice", ParamSpec::new("tool_choice"))
        .map("response_format", ParamSpec::new("response_format"))
}

/// Base legacy-completion mapping
pub fn completion_table() -> FunctionTable {
    FunctionTable::new()
        .map("model", ParamSpec::new("model").required())
        .map("prompt", ParamSpec::new("prompt").required())
        .map("max_tokens", ParamSpec::new("max_tokens").bounded(1.0, f64::MAX))
        .map("temperature", ParamSpec::new("temperature").bounded(0.0, 2.0))
        .map("top_p", ParamSpec::new("top_p").bounded(0.0, 1.0))
        .map("n", ParamSpec::new("n").bounded(1.0, 128.0))
        .map("logprobs", ParamSpec::new("logprobs").bounded(0.0, 5.0))
        .map("echo", ParamSpec::new("echo"))
        .map("stop", ParamSpec::new("stop"))
        .map("frequency_penalty", ParamSpec::new("frequency_penalty").bounded(-2.0, 2.0))
        .map("presence_penalty", ParamSpec::new("presence_penalty").bounded(-2.0, 2.0))
        .map("user", ParamSpec::new("user"))
        .map("stream", ParamSpec::new("stream"))
}

/// Base embedding mapping
pub fn embed_table() -> FunctionTable {
    FunctionTable::new()
        .map("model", ParamSpec::new("model").required())
        .map("input", ParamSpec::new("input").required())
        .map("encoding_format", ParamSpec::new("encoding_format"))
        .map("dimensions", ParamSpec::new("dimensions").bounded(1.0, f64::MAX))
        .map("user", ParamSpec::new("user"))
}

/// Base image-generation mapping
pub fn image_table() -> FunctionTable {
    FunctionTable::new()
        .map("prompt", ParamSpec::new("prompt").required())
        .map("model", ParamSpec::new("model"))
        .map("n", ParamSpec::new("n").bounded(1.0, 10.0))
        .map("size", ParamSpec::new("size"))
        .map("quality", ParamSpec::new("quality"))
        .map("style", ParamSpec::new("style"))
        .map("response_format", ParamSpec::new("response_format"))
        .map("user", ParamSpec::new("user"))
}

/// Responses API mapping (known parameters forwarded, nothing else)
pub fn responses_table() -> FunctionTable {
    let mut table = FunctionTable::new()
        .map("model", ParamSpec::new("model").required())
        .map("input", ParamSpec::new("input").required());
    for field in [
        "instructions",
        "max_output_tokens",
        "temperature",
        "top_p",
        "stream",
        "tools",
        "tool_choice",
        "metadata",
        "previous_response_id",
        "reasoning",
        "text",
        "truncation",
        "store",
        "parallel_tool_calls",
        "user",
    ] {
        table = table.map(field, ParamSpec::new(field));
    }
    table
}

// -- Error normalization --

/// Normalize the error shapes seen across `OpenAI`-protocol providers
///
/// Handles the canonical `{"error": {...}}` object, the string form
/// `{"error": "..."}`, bare `{"message": "..."}`, and FastAPI-style
/// `{"detail": ...}` payloads.
pub fn normalize_error(provider: ProviderId, body: &Value, status: StatusCode) -> Option<ErrorBody> {
    let normalized = if let Some(err) = body.get("error").filter(|v| !v.is_null()) {
        match err {
            Value::String(message) => Some(ErrorBody::new(provider.to_string(), message.clone())),
            Value::Object(obj) => {
                let message = obj
                    .get("message")
                    .and_then(Value::as_str)
                    .map_or_else(|| Value::Object(obj.clone()).to_string(), str::to_owned);
                Some(ErrorBody {
                    error: ErrorDetail {
                        message,
                        error_type: obj.get("type").and_then(Value::as_str).map(str::to_owned),
                        param: obj.get("param").and_then(Value::as_str).map(str::to_owned),
                        code: obj.get("code").filter(|v| !v.is_null()).map(code_to_string),
                    },
                    provider: provider.to_string(),
                    status: None,
                })
            }
            _ => None,
        }
    } else if let Some(message) = body.get("message").and_then(Value::as_str) {
        Some(ErrorBody::new(provider.to_string(), message.to_owned()))
    } else if let Some(detail) = body.get("detail") {
        let message = match detail {
            Value::String(s) => s.clone(),
            Value::Array(items) => items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("; "),
            other => other.to_string(),
        };
        (!message.is_empty()).then(|| ErrorBody::new(provider.to_string(), message))
    } else {
        None
    };

    normalized.map(|body| {
        if status == StatusCode::OK {
            body
        } else {
            body.with_status(status.as_u16())
        }
    })
}

/// Error codes arrive as strings or numbers; logs want strings
fn code_to_string(code: &Value) -> String {
    match code {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Gate on upstream errors before attempting a success parse
///
/// A non-2xx status or an in-band `error` key short-circuits into the
/// normalizer; an unrecognizable error payload still yields a generic body
/// with a non-empty message.
pub fn check_error(
    provider: ProviderId,
    body: &Value,
    status: StatusCode,
    normalize: NormalizeFn<'_>,
) -> Result<(), ErrorBody> {
    let in_band_error = body.get("error").is_some_and(|v| !v.is_null());
    if status.is_success() && !in_band_error {
        return Ok(());
    }

    if let Some(normalized) = normalize(body, status) {
        return Err(normalized);
    }

    Err(ErrorBody::new(
        provider.to_string(),
        format!("provider returned status {}: {}", status.as_u16(), truncate(body)),
    )
    .with_type("upstream_error")
    .with_status(status.as_u16()))
}

fn truncate(body: &Value) -> String {
    let mut s = body.to_string();
    if s.len() > 256 {
        let cut = (0..=256).rev().find(|i| s.is_char_boundary(*i)).unwrap_or(0);
        s.truncate(cut);
        s.push('…');
    }
    s
}

// -- Wire shapes (response side) --

#[derive(Debug, Deserialize)]
struct WireChatResponse {
    id: Option<String>,
    created: Option<u64>,
    model: Option<String>,
    choices: Vec<WireChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    #[serde(default)]
    index: Option<u32>,
    message: WireMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    reasoning_content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: Option<i64>,
    #[serde(default)]
    completion_tokens: Option<i64>,
    #[serde(default)]
    total_tokens: Option<i64>,
}

impl WireUsage {
    /// Synthesize full usage from whatever counters the provider reported
    fn into_usage(self) -> Usage {
        match (self.prompt_tokens, self.completion_tokens, self.total_tokens) {
            (Some(prompt), Some(completion), total) => Usage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: total.unwrap_or(prompt + completion),
            },
            (Some(prompt), None, Some(total)) => Usage {
                prompt_tokens: prompt,
                completion_tokens: total - prompt,
                total_tokens: total,
            },
            (Some(prompt), None, None) => Usage::from_counts(prompt, 0),
            // Embedding providers often report only a total
            (None, None, Some(total)) => Usage {
                prompt_tokens: total,
                completion_tokens: 0,
                total_tokens: total,
            },
            _ => Usage::UNKNOWN,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireCompletionResponse {
    id: Option<String>,
    created: Option<u64>,
    model: Option<String>,
    choices: Vec<WireTextChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireTextChoice {
    text: String,
    #[serde(default)]
    index: Option<u32>,
    #[serde(default)]
    logprobs: Option<Value>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireEmbeddingResponse {
    data: Vec<WireEmbeddingData>,
    model: Option<String>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireEmbeddingData {
    embedding: Value,
    #[serde(default)]
    index: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireImageResponse {
    #[serde(default)]
    created: Option<u64>,
    data: Vec<WireImageData>,
}

#[derive(Debug, Deserialize)]
struct WireImageData {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    b64_json: Option<String>,
    #[serde(default)]
    revised_prompt: Option<String>,
}

// -- Response transforms --

/// Resolve the model tag: upstream value, else the requested model
fn resolve_model(upstream: Option<String>, ctx: &ApiContext<'_>) -> String {
    upstream.unwrap_or_else(|| ctx.model().unwrap_or("unknown").to_owned())
}

/// Transform an `OpenAI`-shaped chat completion response
pub fn transform_chat_response(
    provider: ProviderId,
    body: &Value,
    status: StatusCode,
    ctx: &ApiContext<'_>,
    normalize: NormalizeFn<'_>,
) -> Result<CanonicalResponse, ErrorBody> {
    check_error(provider, body, status, normalize)?;

    let Ok(wire) = serde_json::from_value::<WireChatResponse>(body.clone()) else {
        return Err(ErrorBody::invalid_provider_response(provider, body));
    };

    let strict = ctx.strict();
    let choices = wire
        .choices
        .into_iter()
        .enumerate()
        .map(|(position, choice)| {
            #[allow(clippy::cast_possible_truncation)]
            let index = choice.index.unwrap_or(position as u32);
            Choice {
                index,
                message: ChoiceMessage {
                    role: "assistant".to_owned(),
                    content: choice.message.content,
                    reasoning_content: if strict { None } else { choice.message.reasoning_content },
                    tool_calls: choice.message.tool_calls,
                },
                finish_reason: choice.finish_reason.as_deref().and_then(FinishReason::parse),
            }
        })
        .collect();

    let provider_extras = if strict { None } else { extract_extras(body) };

    Ok(CanonicalResponse::Chat(ChatCompletionResponse {
        id: wire.id.unwrap_or_else(|| generate_id("chatcmpl")),
        object: "chat.completion".to_owned(),
        created: wire.created.unwrap_or_else(unix_now),
        model: resolve_model(wire.model, ctx),
        provider,
        choices,
        usage: wire.usage.map_or(Usage::UNKNOWN, WireUsage::into_usage),
        provider_extras,
    }))
}

/// Provider-specific top-level extras worth surfacing (citations etc.)
fn extract_extras(body: &Value) -> Option<Value> {
    let mut extras = serde_json::Map::new();
    for key in ["citations", "search_results", "safety_ratings"] {
        if let Some(value) = body.get(key) {
            extras.insert(key.to_owned(), value.clone());
        }
    }
    (!extras.is_empty()).then_some(Value::Object(extras))
}

/// Transform an `OpenAI`-shaped legacy completion response
pub fn transform_completion_response(
    provider: ProviderId,
    body: &Value,
    status: StatusCode,
    ctx: &ApiContext<'_>,
    normalize: NormalizeFn<'_>,
) -> Result<CanonicalResponse, ErrorBody> {
    check_error(provider, body, status, normalize)?;

    let Ok(wire) = serde_json::from_value::<WireCompletionResponse>(body.clone()) else {
        return Err(ErrorBody::invalid_provider_response(provider, body));
    };

    let choices = wire
        .choices
        .into_iter()
        .enumerate()
        .map(|(position, choice)| {
            #[allow(clippy::cast_possible_truncation)]
            let index = choice.index.unwrap_or(position as u32);
            TextChoice {
                text: choice.text,
                index,
                logprobs: choice.logprobs,
                finish_reason: choice.finish_reason.as_deref().and_then(FinishReason::parse),
            }
        })
        .collect();

    Ok(CanonicalResponse::Text(TextCompletionResponse {
        id: wire.id.unwrap_or_else(|| generate_id("cmpl")),
        object: "text_completion".to_owned(),
        created: wire.created.unwrap_or_else(unix_now),
        model: resolve_model(wire.model, ctx),
        provider,
        choices,
        usage: wire.usage.map_or(Usage::UNKNOWN, WireUsage::into_usage),
    }))
}

/// Transform an `OpenAI`-shaped embedding response
pub fn transform_embedding_response(
    provider: ProviderId,
    body: &Value,
    status: StatusCode,
    ctx: &ApiContext<'_>,
    normalize: NormalizeFn<'_>,
) -> Result<CanonicalResponse, ErrorBody> {
    check_error(provider, body, status, normalize)?;

    let Ok(wire) = serde_json::from_value::<WireEmbeddingResponse>(body.clone()) else {
        return Err(ErrorBody::invalid_provider_response(provider, body));
    };

    let data = wire
        .data
        .into_iter()
        .enumerate()
        .map(|(position, item)| {
            #[allow(clippy::cast_possible_truncation)]
            let index = item.index.unwrap_or(position as u32);
            EmbeddingData {
                object: "embedding".to_owned(),
                embedding: item.embedding,
                index,
            }
        })
        .collect();

    Ok(CanonicalResponse::Embeddings(EmbeddingResponse {
        object: "list".to_owned(),
        data,
        model: resolve_model(wire.model, ctx),
        provider,
        usage: wire.usage.map_or(Usage::UNKNOWN, WireUsage::into_usage),
    }))
}

/// Transform an `OpenAI`-shaped image generation response
pub fn transform_image_response(
    provider: ProviderId,
    body: &Value,
    status: StatusCode,
    normalize: NormalizeFn<'_>,
) -> Result<CanonicalResponse, ErrorBody> {
    check_error(provider, body, status, normalize)?;

    let Ok(wire) = serde_json::from_value::<WireImageResponse>(body.clone()) else {
        return Err(ErrorBody::invalid_provider_response(provider, body));
    };

    Ok(CanonicalResponse::Images(ImageGenerationResponse {
        created: wire.created.unwrap_or_else(unix_now),
        data: wire
            .data
            .into_iter()
            .map(|d| ImageData {
                url: d.url,
                b64_json: d.b64_json,
                revised_prompt: d.revised_prompt,
            })
            .collect(),
        provider,
    }))
}

/// Transform a Responses API response (provider-tagged pass-through)
pub fn transform_responses_response(
    provider: ProviderId,
    body: &Value,
    status: StatusCode,
    normalize: NormalizeFn<'_>,
) -> Result<CanonicalResponse, ErrorBody> {
    check_error(provider, body, status, normalize)?;

    let looks_like_response =
        body.get("object").and_then(Value::as_str) == Some("response") || body.get("output").is_some();
    if !looks_like_response {
        return Err(ErrorBody::invalid_provider_response(provider, body));
    }

    let mut tagged = body.clone();
    if let Some(obj) = tagged.as_object_mut() {
        obj.insert("provider".to_owned(), json!(provider));
    }
    Ok(CanonicalResponse::Raw(tagged))
}

// -- Stream transform --

/// Best-effort empty-content chunk for lenient parse-failure handling
pub fn empty_delta_chunk(provider: ProviderId, fallback_id: &str, ctx: &ApiContext<'_>) -> Value {
    json!({
        "id": fallback_id,
        "object": "chat.completion.chunk",
        "created": unix_now(),
        "model": ctx.model().unwrap_or("unknown"),
        "provider": provider,
        "choices": [{"index": 0, "delta": {"content": ""}, "finish_reason": null}],
    })
}

/// Transform one `OpenAI`-shaped stream chunk into a canonical SSE line
///
/// Chunks are emitted strictly in arrival order; the only buffering is the
/// assembly of one complete output line.
pub fn transform_chunk(
    provider: ProviderId,
    raw: &str,
    fallback_id: &str,
    state: &mut StreamState,
    ctx: &ApiContext<'_>,
    policy: StreamParsePolicy,
) -> Result<Option<String>, GatewayError> {
    let payload = strip_sse_prefix(raw);
    if payload.is_empty() {
        return Ok(None);
    }
    if payload == DONE_SENTINEL {
        state.finished = true;
        return Ok(Some(DONE_CHUNK.to_owned()));
    }

    let mut chunk: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(e) => {
            return match policy {
                StreamParsePolicy::Lenient => {
                    state.chunk_count += 1;
                    Ok(Some(sse_data(&empty_delta_chunk(provider, fallback_id, ctx))))
                }
                StreamParsePolicy::Strict => Err(GatewayError::StreamTransform {
                    provider,
                    message: format!("unparseable stream chunk: {e}"),
                }),
            };
        }
    };

    if let Some(obj) = chunk.as_object_mut() {
        if obj.get("id").and_then(Value::as_str).is_none_or(str::is_empty) {
            obj.insert("id".to_owned(), json!(fallback_id));
        } else if state.response_id.is_none() {
            state.response_id = obj.get("id").and_then(Value::as_str).map(str::to_owned);
        }
        obj.entry("object").or_insert_with(|| json!("chat.completion.chunk"));
        obj.insert("provider".to_owned(), json!(provider));
    }

    scrub_deltas(&mut chunk, state, ctx.strict());

    state.chunk_count += 1;
    Ok(Some(sse_data(&chunk)))
}

/// Pass typed events through unreshaped (Responses API streams)
///
/// Events already carry their own `type` discriminants; only sentinel
/// tracking and JSON validation happen here.
pub fn passthrough_chunk(
    provider: ProviderId,
    raw: &str,
    state: &mut StreamState,
) -> Result<Option<String>, GatewayError> {
    let payload = strip_sse_prefix(raw);
    if payload.is_empty() {
        return Ok(None);
    }
    if payload == DONE_SENTINEL {
        state.finished = true;
        return Ok(Some(DONE_CHUNK.to_owned()));
    }
    match serde_json::from_str::<Value>(payload) {
        Ok(event) => {
            state.chunk_count += 1;
            Ok(Some(sse_data(&event)))
        }
        Err(e) => Err(GatewayError::StreamTransform {
            provider,
            message: format!("unparseable stream event: {e}"),
        }),
    }
}

/// Track reasoning content and strip it under strict compliance
fn scrub_deltas(chunk: &mut Value, state: &mut StreamState, strict: bool) {
    let Some(choices) = chunk.get_mut("choices").and_then(Value::as_array_mut) else {
        return;
    };
    for choice in choices {
        let Some(delta) = choice.get_mut("delta").and_then(Value::as_object_mut) else {
            continue;
        };
        for key in ["reasoning_content", "reasoning"] {
            if delta.get(key).is_some_and(|v| !v.is_null()) {
                state.contains_reasoning_message = true;
                if strict {
                    delta.remove(key);
                }
            }
        }
        if let Some(content) = delta.get("content").and_then(Value::as_str) {
            state.record_content(content);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plexus_core::types::{GatewayFunction, Target};

    fn ctx_parts(strict: bool) -> (Target, Value) {
        let mut target = Target::for_provider(ProviderId::Openai);
        target.strict_openai_compliance = strict;
        let body = json!({"model": "gpt-4o", "messages": [{"role": "user", "content": "hi"}]});
        (target, body)
    }

    fn normalize(body: &Value, status: StatusCode) -> Option<ErrorBody> {
        normalize_error(ProviderId::Openai, body, status)
    }

    #[test]
    fn string_error_form_normalizes() {
        let body = json!({"error": "rate limited"});
        let normalized = normalize_error(ProviderId::Openai, &body, StatusCode::TOO_MANY_REQUESTS).unwrap();
        assert_eq!(normalized.error.message, "rate limited");
        assert_eq!(normalized.provider, "openai");
        assert_eq!(normalized.status, Some(429));
    }

    #[test]
    fn object_error_form_keeps_type_and_code() {
        let body = json!({"error": {"message": "bad key", "type": "invalid_request_error", "code": 401}});
        let normalized = normalize_error(ProviderId::Groq, &body, StatusCode::UNAUTHORIZED).unwrap();
        assert_eq!(normalized.error.message, "bad key");
        assert_eq!(normalized.error.error_type.as_deref(), Some("invalid_request_error"));
        assert_eq!(normalized.error.code.as_deref(), Some("401"));
    }

    #[test]
    fn detail_array_form_joins_messages() {
        let body = json!({"detail": [{"msg": "field required", "loc": ["body", "model"]}]});
        let normalized = normalize_error(ProviderId::Deepinfra, &body, StatusCode::UNPROCESSABLE_ENTITY).unwrap();
        assert_eq!(normalized.error.message, "field required");
    }

    #[test]
    fn in_band_error_on_200_is_still_an_error() {
        let (target, body) = ctx_parts(false);
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        let upstream = json!({"error": {"message": "quota exceeded"}});
        let err =
            transform_chat_response(ProviderId::Openai, &upstream, StatusCode::OK, &ctx, &normalize).unwrap_err();
        assert_eq!(err.error.message, "quota exceeded");
    }

    #[test]
    fn unrecognized_success_shape_is_invalid_provider_response() {
        let (target, body) = ctx_parts(false);
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        let upstream = json!({"unexpected": true});
        let err =
            transform_chat_response(ProviderId::Openai, &upstream, StatusCode::OK, &ctx, &normalize).unwrap_err();
        assert_eq!(err.error.error_type.as_deref(), Some("invalid_provider_response"));
        assert!(err.error.message.contains("unexpected"));
    }

    #[test]
    fn unrecognized_error_shape_still_has_message() {
        let body = json!({"weird": "payload"});
        let err = check_error(ProviderId::Openai, &body, StatusCode::BAD_GATEWAY, &normalize).unwrap_err();
        assert!(!err.error.message.is_empty());
        assert_eq!(err.status, Some(502));
    }

    #[test]
    fn chat_response_maps_fields_explicitly() {
        let (target, body) = ctx_parts(false);
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        let upstream = json!({
            "id": "chatcmpl-up",
            "created": 1700000000,
            "model": "gpt-4o-2024",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "hello"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 4, "total_tokens": 7}
        });
        let CanonicalResponse::Chat(resp) =
            transform_chat_response(ProviderId::Openai, &upstream, StatusCode::OK, &ctx, &normalize).unwrap()
        else {
            panic!("expected chat response");
        };
        assert_eq!(resp.id, "chatcmpl-up");
        assert_eq!(resp.object, "chat.completion");
        assert_eq!(resp.provider, ProviderId::Openai);
        assert_eq!(resp.model, "gpt-4o-2024");
        assert_eq!(resp.choices[0].finish_reason, Some(FinishReason::Stop));
        assert_eq!(resp.usage.total_tokens, 7);
    }

    #[test]
    fn missing_usage_becomes_unknown_sentinel() {
        let (target, body) = ctx_parts(false);
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        let upstream = json!({
            "choices": [{"message": {"role": "assistant", "content": "x"}, "finish_reason": "stop"}]
        });
        let CanonicalResponse::Chat(resp) =
            transform_chat_response(ProviderId::Openai, &upstream, StatusCode::OK, &ctx, &normalize).unwrap()
        else {
            panic!("expected chat response");
        };
        assert_eq!(resp.usage, Usage::UNKNOWN);
        // Missing id/model are synthesized, never left empty
        assert!(resp.id.starts_with("chatcmpl-"));
        assert_eq!(resp.model, "gpt-4o");
    }

    #[test]
    fn strict_mode_drops_reasoning_content() {
        let (target, body) = ctx_parts(true);
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        let upstream = json!({
            "choices": [{"message": {"role": "assistant", "content": "x", "reasoning_content": "thinking..."}}]
        });
        let CanonicalResponse::Chat(resp) =
            transform_chat_response(ProviderId::Deepseek, &upstream, StatusCode::OK, &ctx, &normalize).unwrap()
        else {
            panic!("expected chat response");
        };
        assert!(resp.choices[0].message.reasoning_content.is_none());
    }

    #[test]
    fn done_sentinel_passes_through_unparsed() {
        let (target, body) = ctx_parts(false);
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        let mut state = StreamState::default();
        let out = transform_chunk(
            ProviderId::Openai,
            "data: [DONE]\n",
            "chatcmpl-f",
            &mut state,
            &ctx,
            StreamParsePolicy::Lenient,
        )
        .unwrap();
        assert_eq!(out.as_deref(), Some(DONE_CHUNK));
        assert!(state.finished);
    }

    #[test]
    fn lowercase_done_is_not_a_sentinel() {
        let (target, body) = ctx_parts(false);
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        let mut state = StreamState::default();
        // Case-sensitive sentinel match: this is just an unparseable chunk
        let out = transform_chunk(
            ProviderId::Openai,
            "data: [done]",
            "chatcmpl-f",
            &mut state,
            &ctx,
            StreamParsePolicy::Lenient,
        )
        .unwrap();
        assert!(!state.finished);
        assert!(out.unwrap().contains("\"content\":\"\""));
    }

    #[test]
    fn malformed_chunk_lenient_emits_empty_delta() {
        let (target, body) = ctx_parts(false);
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        let mut state = StreamState::default();
        let out = transform_chunk(
            ProviderId::Ollama,
            "not json",
            "chatcmpl-f",
            &mut state,
            &ctx,
            StreamParsePolicy::Lenient,
        )
        .unwrap()
        .unwrap();
        assert!(out.starts_with("data: "));
        assert!(out.contains("chatcmpl-f"));
        assert!(out.contains("\"content\":\"\""));
    }

    #[test]
    fn malformed_chunk_strict_raises_transform_error() {
        let (target, body) = ctx_parts(false);
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        let mut state = StreamState::default();
        let err = transform_chunk(
            ProviderId::Anthropic,
            "not json",
            "chatcmpl-f",
            &mut state,
            &ctx,
            StreamParsePolicy::Strict,
        )
        .unwrap_err();
        assert!(matches!(err, GatewayError::StreamTransform { .. }));
    }

    #[test]
    fn chunk_gains_fallback_id_and_provider_tag() {
        let (target, body) = ctx_parts(false);
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        let mut state = StreamState::default();
        let out = transform_chunk(
            ProviderId::Groq,
            r#"data: {"object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":"hi"}}]}"#,
            "chatcmpl-f",
            &mut state,
            &ctx,
            StreamParsePolicy::Lenient,
        )
        .unwrap()
        .unwrap();
        let parsed: Value = serde_json::from_str(out.trim_start_matches("data: ").trim()).unwrap();
        assert_eq!(parsed["id"], "chatcmpl-f");
        assert_eq!(parsed["provider"], "groq");
        assert_eq!(state.collected_content, "hi");
    }

    #[test]
    fn streaming_reasoning_is_tracked_and_stripped_when_strict() {
        let (target, body) = ctx_parts(true);
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        let mut state = StreamState::default();
        let out = transform_chunk(
            ProviderId::Deepseek,
            r#"{"id":"c1","choices":[{"index":0,"delta":{"reasoning_content":"hmm"}}]}"#,
            "chatcmpl-f",
            &mut state,
            &ctx,
            StreamParsePolicy::Lenient,
        )
        .unwrap()
        .unwrap();
        assert!(state.contains_reasoning_message);
        assert!(!out.contains("reasoning_content"));
    }
}
