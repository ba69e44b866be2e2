//! Anthropic Messages API adapter
//!
//! The widest gap from the canonical schema: system prompts move to a
//! top-level field, tool results become user content blocks, and streaming
//! arrives as typed events rather than completion chunks.

use std::sync::LazyLock;

use http::{HeaderMap, StatusCode};
use plexus_core::context::ApiContext;
use plexus_core::error::{ErrorBody, ErrorDetail, GatewayError};
use plexus_core::types::{
    CanonicalResponse, ChatCompletionResponse, Choice, ChoiceMessage, FinishReason, FunctionCall, GatewayFunction,
    ProviderId, StreamParsePolicy, StreamState, Target, ToolCall, Usage, DONE_CHUNK, DONE_SENTINEL, sse_data,
    strip_sse_prefix,
};
use plexus_core::unix_now;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::adapter::ProviderAdapter;
use crate::api::{ProviderApi, base_url_or_default, proxy_endpoint, put_header, require_api_key};
use crate::mapping::{FunctionTable, ParamSpec};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

/// Anthropic requires `max_tokens`; this default applies when the caller
/// omitted both `max_tokens` and `max_completion_tokens`
const DEFAULT_MAX_TOKENS: u32 = 4096;

// -- Request transforms --

/// Conversation messages minus system turns, in Anthropic block form
fn to_anthropic_messages(body: &Value, _target: &Target) -> Option<Value> {
    let messages = body.get("messages")?.as_array()?;
    let mut out = Vec::new();

    for message in messages {
        let role = message.get("role").and_then(Value::as_str).unwrap_or("user");
        match role {
            "system" | "developer" => {}
            "tool" => {
                // Tool results are user messages holding a tool_result block
                let block = json!({
                    "type": "tool_result",
                    "tool_use_id": message.get("tool_call_id").cloned().unwrap_or(Value::Null),
                    "content": content_as_text(message.get("content")),
                });
                out.push(json!({"role": "user", "content": [block]}));
            }
            "assistant" => {
                let mut blocks = Vec::new();
                if let Value::String(s) = content_as_text(message.get("content"))
                    && !s.is_empty()
                {
                    blocks.push(json!({"type": "text", "text": s}));
                }
                if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
                    for call in calls {
                        let arguments = call
                            .get("function")
                            .and_then(|f| f.get("arguments"))
                            .and_then(Value::as_str)
                            .unwrap_or("{}");
                        let input: Value = serde_json::from_str(arguments).unwrap_or(json!({}));
                        blocks.push(json!({
                            "type": "tool_use",
                            "id": call.get("id").cloned().unwrap_or(Value::Null),
                            "name": call.get("function").and_then(|f| f.get("name")).cloned().unwrap_or(Value::Null),
                            "input": input,
                        }));
                    }
                }
                out.push(json!({"role": "assistant", "content": blocks}));
            }
            _ => {
                out.push(json!({
                    "role": "user",
                    "content": to_anthropic_content(message.get("content")),
                }));
            }
        }
    }

    Some(Value::Array(out))
}

/// System/developer turns joined into the top-level `system` field
fn to_anthropic_system(body: &Value, _target: &Target) -> Option<Value> {
    let messages = body.get("messages")?.as_array()?;
    let joined = messages
        .iter()
        .filter(|m| matches!(m.get("role").and_then(Value::as_str), Some("system" | "developer")))
        .map(|m| match content_as_text(m.get("content")) {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n");
    (!joined.is_empty()).then(|| Value::String(joined))
}

/// Collapse canonical content (string or parts) to plain text
fn content_as_text(content: Option<&Value>) -> Value {
    match content {
        Some(Value::String(s)) => Value::String(s.clone()),
        Some(Value::Array(parts)) => {
            let text = parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect::<Vec<_>>()
                .join("");
            Value::String(text)
        }
        _ => Value::String(String::new()),
    }
}

/// Canonical content to Anthropic content blocks, carrying images through
fn to_anthropic_content(content: Option<&Value>) -> Value {
    match content {
        Some(Value::String(s)) => Value::String(s.clone()),
        Some(Value::Array(parts)) => {
            let blocks: Vec<Value> = parts
                .iter()
                .filter_map(|part| match part.get("type").and_then(Value::as_str) {
                    Some("text") => Some(json!({"type": "text", "text": part.get("text").cloned()?})),
                    Some("image_url") => {
                        let url = part.get("image_url")?.get("url")?.as_str()?;
                        Some(image_block(url))
                    }
                    _ => None,
                })
                .collect();
            Value::Array(blocks)
        }
        _ => Value::String(String::new()),
    }
}

/// Data URIs become base64 sources, anything else a URL source
fn image_block(url: &str) -> Value {
    url.strip_prefix("data:").and_then(|rest| {
        let (media_type, data) = rest.split_once(";base64,")?;
        Some(json!({
            "type": "image",
            "source": {"type": "base64", "media_type": media_type, "data": data},
        }))
    })
    .unwrap_or_else(|| json!({"type": "image", "source": {"type": "url", "url": url}}))
}

/// `max_tokens` falls back to `max_completion_tokens`, then the default
fn to_max_tokens(body: &Value, _target: &Target) -> Option<Value> {
    body.get("max_tokens")
        .or_else(|| body.get("max_completion_tokens"))
        .filter(|v| !v.is_null())
        .cloned()
        .or_else(|| Some(json!(DEFAULT_MAX_TOKENS)))
}

/// Canonical `stop` (string or array) to `stop_sequences`
fn to_stop_sequences(body: &Value, _target: &Target) -> Option<Value> {
    match body.get("stop") {
        Some(Value::String(s)) => Some(json!([s])),
        Some(Value::Array(items)) => Some(Value::Array(items.clone())),
        _ => None,
    }
}

/// Canonical tool definitions to Anthropic's flat tool shape
fn to_anthropic_tools(body: &Value, _target: &Target) -> Option<Value> {
    let tools = body.get("tools")?.as_array()?;
    let converted: Vec<Value> = tools
        .iter()
        .filter_map(|tool| {
            let function = tool.get("function")?;
            Some(json!({
                "name": function.get("name").cloned()?,
                "description": function.get("description").cloned().unwrap_or(Value::Null),
                "input_schema": function.get("parameters").cloned().unwrap_or_else(|| json!({"type": "object"})),
            }))
        })
        .collect();
    (!converted.is_empty()).then(|| Value::Array(converted))
}

/// Canonical `tool_choice` to Anthropic's `{type, name}` shape
fn to_anthropic_tool_choice(body: &Value, _target: &Target) -> Option<Value> {
    match body.get("tool_choice")? {
        Value::String(mode) => match mode.as_str() {
            "auto" => Some(json!({"type": "auto"})),
            "required" => Some(json!({"type": "any"})),
            // Anthropic has no "none"; omitting tools disables them
            _ => None,
        },
        Value::Object(obj) => {
            let name = obj.get("function")?.get("name")?.as_str()?;
            Some(json!({"type": "tool", "name": name}))
        }
        _ => None,
    }
}

static CHAT: LazyLock<FunctionTable> = LazyLock::new(|| {
    FunctionTable::new()
        .map("model", ParamSpec::new("model").required())
        .map("messages", ParamSpec::new("messages").required().transform(to_anthropic_messages))
        .map("messages", ParamSpec::new("system").transform(to_anthropic_system))
        .map("max_tokens", ParamSpec::new("max_tokens").required().transform(to_max_tokens))
        .map("temperature", ParamSpec::new("temperature").bounded(0.0, 1.0))
        .map("top_p", ParamSpec::new("top_p").bounded(0.0, 1.0))
        .map("top_k", ParamSpec::new("top_k").bounded(1.0, f64::MAX))
        .map("stop", ParamSpec::new("stop_sequences").transform(to_stop_sequences))
        .map("stream", ParamSpec::new("stream"))
        .map("user", ParamSpec::new("metadata.user_id"))
        .map("tools", ParamSpec::new("tools").transform(to_anthropic_tools))
        .map("tool_choice", ParamSpec::new("tool_choice").transform(to_anthropic_tool_choice))
});

// -- Wire shapes --

#[derive(Debug, Deserialize)]
struct WireResponse {
    id: String,
    content: Vec<WireBlock>,
    model: Option<String>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    Thinking {
        thinking: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    input_tokens: Option<i64>,
    #[serde(default)]
    output_tokens: Option<i64>,
}

// -- API descriptor --

struct AnthropicApi;

impl ProviderApi for AnthropicApi {
    fn base_url(&self, ctx: &ApiContext<'_>) -> Result<String, GatewayError> {
        base_url_or_default(ctx, DEFAULT_BASE_URL)
    }

    fn endpoint(&self, ctx: &ApiContext<'_>) -> Result<String, GatewayError> {
        match ctx.function {
            GatewayFunction::ChatComplete => Ok("/messages".to_owned()),
            GatewayFunction::Proxy => Ok(proxy_endpoint(ctx)),
            _ => Ok(String::new()),
        }
    }

    fn headers(&self, ctx: &ApiContext<'_>) -> Result<HeaderMap, GatewayError> {
        require_api_key(ctx)?;
        let mut headers = HeaderMap::new();
        put_header(&mut headers, "content-type", "application/json")?;
        put_header(&mut headers, "anthropic-version", API_VERSION)?;
        if let Some(key) = &ctx.target.api_key {
            use secrecy::ExposeSecret;
            put_header(&mut headers, "x-api-key", key.expose_secret())?;
        }
        Ok(headers)
    }
}

/// Anthropic adapter
pub struct AnthropicAdapter;

impl AnthropicAdapter {
    fn normalize(body: &Value, status: StatusCode) -> Option<ErrorBody> {
        let err = body.get("error")?.as_object()?;
        let message = err.get("message").and_then(Value::as_str)?;
        Some(ErrorBody {
            error: ErrorDetail {
                message: message.to_owned(),
                error_type: err.get("type").and_then(Value::as_str).map(str::to_owned),
                param: None,
                code: None,
            },
            provider: ProviderId::Anthropic.to_string(),
            status: (status != StatusCode::OK).then(|| status.as_u16()),
        })
    }
}

impl ProviderAdapter for AnthropicAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    fn api(&self) -> &dyn ProviderApi {
        &AnthropicApi
    }

    fn table(&self, function: GatewayFunction) -> Option<&FunctionTable> {
        match function {
            GatewayFunction::ChatComplete => Some(&CHAT),
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
        crate::openai_compat::check_error(provider, body, status, &|b, s| Self::normalize(b, s))?;

        let Ok(wire) = serde_json::from_value::<WireResponse>(body.clone()) else {
            return Err(ErrorBody::invalid_provider_response(provider, body));
        };

        let mut content = String::new();
        let mut reasoning = String::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();
        for block in wire.content {
            match block {
                WireBlock::Text { text } => content.push_str(&text),
                WireBlock::Thinking { thinking } => reasoning.push_str(&thinking),
                WireBlock::ToolUse { id, name, input } => tool_calls.push(ToolCall {
                    id,
                    tool_type: "function".to_owned(),
                    function: FunctionCall {
                        name,
                        arguments: input.to_string(),
                    },
                }),
                WireBlock::Other => {}
            }
        }

        let finish_reason = if tool_calls.is_empty() {
            wire.stop_reason.as_deref().and_then(FinishReason::parse)
        } else {
            Some(FinishReason::ToolCalls)
        };

        let usage = wire.usage.map_or(Usage::UNKNOWN, |u| match (u.input_tokens, u.output_tokens) {
            (Some(input), Some(output)) => Usage::from_counts(input, output),
            _ => Usage::UNKNOWN,
        });

        Ok(CanonicalResponse::Chat(ChatCompletionResponse {
            id: wire.id,
            object: "chat.completion".to_owned(),
            created: unix_now(),
            model: wire.model.unwrap_or_else(|| ctx.model().unwrap_or("unknown").to_owned()),
            provider,
            choices: vec![Choice {
                index: 0,
                message: ChoiceMessage {
                    role: "assistant".to_owned(),
                    content: Some(content),
                    reasoning_content: (!ctx.strict() && !reasoning.is_empty()).then_some(reasoning),
                    tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                },
                finish_reason,
            }],
            usage,
            provider_extras: None,
        }))
    }

    #[allow(clippy::too_many_lines)]
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

        let event: Value = serde_json::from_str(payload).map_err(|e| GatewayError::StreamTransform {
            provider,
            message: format!("unparseable stream event: {e}"),
        })?;

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

        match event.get("type").and_then(Value::as_str) {
            Some("message_start") => {
                if let Some(message) = event.get("message") {
                    if let Some(upstream_id) = message.get("id").and_then(Value::as_str) {
                        state.response_id = Some(upstream_id.to_owned());
                    }
                    if let Some(input) = message
                        .get("usage")
                        .and_then(|u| u.get("input_tokens"))
                        .and_then(Value::as_i64)
                    {
                        state.scratch.insert("input_tokens".to_owned(), json!(input));
                    }
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
            Some("content_block_start") => {
                let block = event.get("content_block");
                match block.and_then(|b| b.get("type")).and_then(Value::as_str) {
                    Some("tool_use") => {
                        let tool_index = state.scratch.get("tool_index").and_then(Value::as_i64).map_or(0, |i| i + 1);
                        state.scratch.insert("tool_index".to_owned(), json!(tool_index));
                        let delta = json!({
                            "tool_calls": [{
                                "index": tool_index,
                                "id": block.and_then(|b| b.get("id")).cloned().unwrap_or(Value::Null),
                                "type": "function",
                                "function": {
                                    "name": block.and_then(|b| b.get("name")).cloned().unwrap_or(Value::Null),
                                    "arguments": "",
                                },
                            }],
                        });
                        Ok(Some(sse_data(&chunk(delta, Value::Null, Value::Null))))
                    }
                    Some("thinking") => {
                        state.contains_reasoning_message = true;
                        Ok(None)
                    }
                    _ => Ok(None),
                }
            }
            Some("content_block_delta") => {
                let delta = event.get("delta");
                match delta.and_then(|d| d.get("type")).and_then(Value::as_str) {
                    Some("text_delta") => {
                        let text = delta.and_then(|d| d.get("text")).and_then(Value::as_str).unwrap_or("");
                        state.record_content(text);
                        Ok(Some(sse_data(&chunk(json!({"content": text}), Value::Null, Value::Null))))
                    }
                    Some("input_json_delta") => {
                        let partial = delta
                            .and_then(|d| d.get("partial_json"))
                            .and_then(Value::as_str)
                            .unwrap_or("");
                        let tool_index = state.scratch.get("tool_index").and_then(Value::as_i64).unwrap_or(0);
                        let delta = json!({
                            "tool_calls": [{"index": tool_index, "function": {"arguments": partial}}],
                        });
                        Ok(Some(sse_data(&chunk(delta, Value::Null, Value::Null))))
                    }
                    Some("thinking_delta") => {
                        state.contains_reasoning_message = true;
                        if ctx.strict() {
                            return Ok(None);
                        }
                        let thinking = delta
                            .and_then(|d| d.get("thinking"))
                            .and_then(Value::as_str)
                            .unwrap_or("");
                        Ok(Some(sse_data(&chunk(
                            json!({"reasoning_content": thinking}),
                            Value::Null,
                            Value::Null,
                        ))))
                    }
                    _ => Ok(None),
                }
            }
            Some("message_delta") => {
                let finish = event
                    .get("delta")
                    .and_then(|d| d.get("stop_reason"))
                    .and_then(Value::as_str)
                    .and_then(FinishReason::parse)
                    .map_or(Value::Null, |fr| serde_json::to_value(fr).unwrap_or(Value::Null));
                let usage = event
                    .get("usage")
                    .and_then(|u| u.get("output_tokens"))
                    .and_then(Value::as_i64)
                    .map_or(Value::Null, |output| {
                        let input = state.scratch.get("input_tokens").and_then(Value::as_i64).unwrap_or(-1);
                        let total = if input < 0 { -1 } else { input + output };
                        json!({"prompt_tokens": input, "completion_tokens": output, "total_tokens": total})
                    });
                Ok(Some(sse_data(&chunk(json!({}), finish, usage))))
            }
            Some("message_stop") => {
                state.finished = true;
                Ok(Some(DONE_CHUNK.to_owned()))
            }
            Some("ping") => Ok(None),
            Some("error") => Err(GatewayError::StreamTransform {
                provider,
                message: event
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
                    .unwrap_or("provider sent an error event")
                    .to_owned(),
            }),
            _ => Ok(None),
        }
    }

    fn normalize_error(&self, body: &Value, status: StatusCode) -> Option<ErrorBody> {
        Self::normalize(body, status)
    }

    fn stream_parse_policy(&self) -> StreamParsePolicy {
        StreamParsePolicy::Strict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::build_request;

    fn target() -> Target {
        let mut target = Target::for_provider(ProviderId::Anthropic);
        target.api_key = Some("sk-ant".into());
        target
    }

    #[test]
    fn system_message_moves_to_top_level() {
        let body = json!({
            "model": "claude-sonnet",
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "user", "content": "hi"}
            ]
        });
        let out = build_request(ProviderId::Anthropic, &CHAT, &body, &target()).unwrap();
        assert_eq!(out["system"], "be brief");
        let messages = out["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }

    #[test]
    fn max_tokens_is_required_and_defaulted() {
        let body = json!({"model": "claude-sonnet", "messages": [{"role": "user", "content": "hi"}]});
        let out = build_request(ProviderId::Anthropic, &CHAT, &body, &target()).unwrap();
        assert_eq!(out["max_tokens"], DEFAULT_MAX_TOKENS);

        let body = json!({
            "model": "claude-sonnet",
            "messages": [{"role": "user", "content": "hi"}],
            "max_tokens": 99
        });
        let out = build_request(ProviderId::Anthropic, &CHAT, &body, &target()).unwrap();
        assert_eq!(out["max_tokens"], 99);
    }

    #[test]
    fn string_stop_becomes_sequence_array() {
        let body = json!({
            "model": "m", "messages": [{"role": "user", "content": "x"}], "stop": "END"
        });
        let out = build_request(ProviderId::Anthropic, &CHAT, &body, &target()).unwrap();
        assert_eq!(out["stop_sequences"], json!(["END"]));
    }

    #[test]
    fn tools_convert_to_input_schema_form() {
        let body = json!({
            "model": "m",
            "messages": [{"role": "user", "content": "x"}],
            "tools": [{"type": "function", "function": {"name": "get_weather", "parameters": {"type": "object"}}}],
            "tool_choice": "required"
        });
        let out = build_request(ProviderId::Anthropic, &CHAT, &body, &target()).unwrap();
        assert_eq!(out["tools"][0]["name"], "get_weather");
        assert!(out["tools"][0].get("input_schema").is_some());
        assert_eq!(out["tool_choice"]["type"], "any");
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let body = json!({
            "model": "m", "messages": [{"role": "user", "content": "x"}], "temperature": 1.5
        });
        let err = build_request(ProviderId::Anthropic, &CHAT, &body, &target()).unwrap_err();
        assert!(matches!(err, GatewayError::ParameterOutOfRange { .. }));
    }

    #[test]
    fn response_maps_blocks_and_usage() {
        let upstream = json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "content": [
                {"type": "text", "text": "hello"},
                {"type": "tool_use", "id": "toolu_1", "name": "get_weather", "input": {"city": "Paris"}}
            ],
            "model": "claude-sonnet",
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        });
        let target = target();
        let body = json!({"model": "claude-sonnet", "messages": []});
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        let CanonicalResponse::Chat(resp) = AnthropicAdapter
            .transform_response(GatewayFunction::ChatComplete, &upstream, StatusCode::OK, &ctx)
            .unwrap()
        else {
            panic!("expected chat response");
        };
        assert_eq!(resp.id, "msg_01");
        assert_eq!(resp.choices[0].message.content.as_deref(), Some("hello"));
        let calls = resp.choices[0].message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "get_weather");
        assert_eq!(resp.choices[0].finish_reason, Some(FinishReason::ToolCalls));
        assert_eq!(resp.usage.total_tokens, 15);
    }

    #[test]
    fn error_payload_normalizes() {
        let upstream = json!({
            "type": "error",
            "error": {"type": "overloaded_error", "message": "Overloaded"}
        });
        let normalized = AnthropicAdapter
            .normalize_error(&upstream, StatusCode::from_u16(529).unwrap())
            .unwrap();
        assert_eq!(normalized.error.message, "Overloaded");
        assert_eq!(normalized.error.error_type.as_deref(), Some("overloaded_error"));
        assert_eq!(normalized.provider, "anthropic");
    }

    #[test]
    fn stream_events_produce_openai_chunks_ending_in_done() {
        let target = target();
        let body = json!({"model": "claude-sonnet", "messages": []});
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        let mut state = StreamState::default();
        let adapter = AnthropicAdapter;

        let events = [
            r#"{"type":"message_start","message":{"id":"msg_01","type":"message","role":"assistant","model":"claude-sonnet","usage":{"input_tokens":7}}}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"hi"}}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":2}}"#,
            r#"{"type":"message_stop"}"#,
        ];

        let mut lines = Vec::new();
        for event in events {
            if let Some(line) = adapter
                .transform_chunk(GatewayFunction::ChatComplete, event, "chatcmpl-f", &mut state, &ctx)
                .unwrap()
            {
                lines.push(line);
            }
        }

        assert_eq!(lines.last().map(String::as_str), Some(DONE_CHUNK));
        assert!(state.finished);
        assert_eq!(state.collected_content, "hi");
        // content delta carries the upstream message id
        assert!(lines[1].contains("msg_01"));
        // message_delta carries mapped finish reason and synthesized usage
        assert!(lines[2].contains("\"finish_reason\":\"stop\""));
        assert!(lines[2].contains("\"total_tokens\":9"));
    }

    #[test]
    fn ping_events_are_consumed_silently() {
        let target = target();
        let body = json!({"model": "m", "messages": []});
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        let mut state = StreamState::default();
        let out = AnthropicAdapter
            .transform_chunk(GatewayFunction::ChatComplete, r#"{"type":"ping"}"#, "f", &mut state, &ctx)
            .unwrap();
        assert!(out.is_none());
    }
}
