//! Google Generative Language API (Gemini) adapter
//!
//! Gemini routes the model through the URL rather than the body, nests
//! sampling parameters under `generationConfig`, and streams bare
//! `generateContent` responses over SSE with no terminal sentinel (the
//! dispatcher appends the canonical `[DONE]`).

use std::sync::LazyLock;

use http::{HeaderMap, StatusCode};
use plexus_core::context::ApiContext;
use plexus_core::error::{ErrorBody, ErrorDetail, GatewayError};
use plexus_core::types::{
    CanonicalResponse, ChatCompletionResponse, Choice, ChoiceMessage, EmbeddingData, EmbeddingResponse, FinishReason,
    FunctionCall, GatewayFunction, ProviderId, StreamState, Target, ToolCall, Usage, DONE_CHUNK, DONE_SENTINEL,
    sse_data, strip_sse_prefix,
};
use plexus_core::{generate_id, unix_now};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::adapter::ProviderAdapter;
use crate::api::{ProviderApi, base_url_or_default, proxy_endpoint, put_header, require_api_key};
use crate::mapping::{FunctionTable, ParamSpec};
use crate::openai_compat;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

// -- Request transforms --

/// Conversation messages (minus system turns) to Gemini `contents`
fn to_contents(body: &Value, _target: &Target) -> Option<Value> {
    let messages = body.get("messages")?.as_array()?;
    let mut contents = Vec::new();

    for message in messages {
        let role = message.get("role").and_then(Value::as_str).unwrap_or("user");
        match role {
            "system" | "developer" => {}
            "tool" => {
                contents.push(json!({
                    "role": "user",
                    "parts": [{
                        "functionResponse": {
                            "name": message.get("tool_call_id").cloned().unwrap_or(Value::Null),
                            "response": {"content": text_of(message.get("content"))},
                        },
                    }],
                }));
            }
            "assistant" => {
                let mut parts = Vec::new();
                let text = text_of(message.get("content"));
                if !text.is_empty() {
                    parts.push(json!({"text": text}));
                }
                if let Some(calls) = message.get("tool_calls").and_then(Value::as_array) {
                    for call in calls {
                        let args: Value = call
                            .get("function")
                            .and_then(|f| f.get("arguments"))
                            .and_then(Value::as_str)
                            .and_then(|s| serde_json::from_str(s).ok())
                            .unwrap_or(json!({}));
                        parts.push(json!({
                            "functionCall": {
                                "name": call.get("function").and_then(|f| f.get("name")).cloned().unwrap_or(Value::Null),
                                "args": args,
                            },
                        }));
                    }
                }
                contents.push(json!({"role": "model", "parts": parts}));
            }
            _ => {
                contents.push(json!({"role": "user", "parts": to_parts(message.get("content"))}));
            }
        }
    }

    Some(Value::Array(contents))
}

/// System/developer turns into `systemInstruction`
fn to_system_instruction(body: &Value, _target: &Target) -> Option<Value> {
    let messages = body.get("messages")?.as_array()?;
    let joined = messages
        .iter()
        .filter(|m| matches!(m.get("role").and_then(Value::as_str), Some("system" | "developer")))
        .map(|m| text_of(m.get("content")))
        .collect::<Vec<_>>()
        .join("\n");
    (!joined.is_empty()).then(|| json!({"parts": [{"text": joined}]}))
}

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

/// Canonical content parts to Gemini parts, inlining data URIs
fn to_parts(content: Option<&Value>) -> Value {
    match content {
        Some(Value::String(s)) => json!([{"text": s}]),
        Some(Value::Array(parts)) => {
            let converted: Vec<Value> = parts
                .iter()
                .filter_map(|part| match part.get("type").and_then(Value::as_str) {
                    Some("text") => Some(json!({"text": part.get("text").cloned()?})),
                    Some("image_url") => {
                        let url = part.get("image_url")?.get("url")?.as_str()?;
                        let (media_type, data) = url.strip_prefix("data:")?.split_once(";base64,")?;
                        Some(json!({"inlineData": {"mimeType": media_type, "data": data}}))
                    }
                    _ => None,
                })
                .collect();
            Value::Array(converted)
        }
        _ => json!([]),
    }
}

fn to_stop_sequences(body: &Value, _target: &Target) -> Option<Value> {
    match body.get("stop") {
        Some(Value::String(s)) => Some(json!([s])),
        Some(Value::Array(items)) => Some(Value::Array(items.clone())),
        _ => None,
    }
}

/// `response_format: {"type": "json_object"}` to a response MIME type
fn to_response_mime(body: &Value, _target: &Target) -> Option<Value> {
    let kind = body.get("response_format")?.get("type")?.as_str()?;
    matches!(kind, "json_object" | "json_schema").then(|| json!("application/json"))
}

fn to_function_declarations(body: &Value, _target: &Target) -> Option<Value> {
    let tools = body.get("tools")?.as_array()?;
    let declarations: Vec<Value> = tools
        .iter()
        .filter_map(|tool| {
            let function = tool.get("function")?;
            Some(json!({
                "name": function.get("name").cloned()?,
                "description": function.get("description").cloned().unwrap_or(Value::Null),
                "parameters": function.get("parameters").cloned().unwrap_or(Value::Null),
            }))
        })
        .collect();
    (!declarations.is_empty()).then(|| json!([{"functionDeclarations": declarations}]))
}

fn to_function_calling_config(body: &Value, _target: &Target) -> Option<Value> {
    match body.get("tool_choice")? {
        Value::String(mode) => match mode.as_str() {
            "auto" => Some(json!({"mode": "AUTO"})),
            "required" => Some(json!({"mode": "ANY"})),
            "none" => Some(json!({"mode": "NONE"})),
            _ => None,
        },
        Value::Object(obj) => {
            let name = obj.get("function")?.get("name")?.as_str()?;
            Some(json!({"mode": "ANY", "allowedFunctionNames": [name]}))
        }
        _ => None,
    }
}

/// Embedding input to a `batchEmbedContents` request list
fn to_embed_requests(body: &Value, _target: &Target) -> Option<Value> {
    let model = body.get("model").and_then(Value::as_str)?;
    let model_path = format!("models/{model}");
    let inputs: Vec<&str> = match body.get("input")? {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => return None,
    };
    let requests: Vec<Value> = inputs
        .iter()
        .map(|text| json!({"model": model_path, "content": {"parts": [{"text": text}]}}))
        .collect();
    Some(Value::Array(requests))
}

static CHAT: LazyLock<FunctionTable> = LazyLock::new(|| {
    FunctionTable::new()
        .map("messages", ParamSpec::new("contents").required().transform(to_contents))
        .map("messages", ParamSpec::new("systemInstruction").transform(to_system_instruction))
        .map("temperature", ParamSpec::new("generationConfig.temperature").bounded(0.0, 2.0))
        .map("top_p", ParamSpec::new("generationConfig.topP").bounded(0.0, 1.0))
        // Gemini documents top-k clamping rather than rejection
        .map("top_k", ParamSpec::new("generationConfig.topK").clamped(1.0, 40.0))
        .map("max_tokens", ParamSpec::new("generationConfig.maxOutputTokens").bounded(1.0, f64::MAX))
        .map("n", ParamSpec::new("generationConfig.candidateCount").bounded(1.0, 8.0))
        .map("stop", ParamSpec::new("generationConfig.stopSequences").transform(to_stop_sequences))
        .map("response_format", ParamSpec::new("generationConfig.responseMimeType").transform(to_response_mime))
        .map("tools", ParamSpec::new("tools").transform(to_function_declarations))
        .map("tool_choice", ParamSpec::new("toolConfig.functionCallingConfig").transform(to_function_calling_config))
});

static EMBED: LazyLock<FunctionTable> =
    LazyLock::new(|| FunctionTable::new().map("input", ParamSpec::new("requests").required().transform(to_embed_requests)));

// -- Wire shapes --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireResponse {
    #[serde(default)]
    candidates: Vec<WireCandidate>,
    #[serde(default)]
    usage_metadata: Option<WireUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireCandidate {
    content: Option<WireContent>,
    #[serde(default)]
    finish_reason: Option<String>,
    #[serde(default)]
    index: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireContent {
    #[serde(default)]
    parts: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<i64>,
    #[serde(default)]
    candidates_token_count: Option<i64>,
    #[serde(default)]
    total_token_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WireEmbedResponse {
    embeddings: Vec<WireEmbedding>,
}

#[derive(Debug, Deserialize)]
struct WireEmbedding {
    values: Vec<f64>,
}

// -- API descriptor --

struct GoogleApi;

impl ProviderApi for GoogleApi {
    fn base_url(&self, ctx: &ApiContext<'_>) -> Result<String, GatewayError> {
        base_url_or_default(ctx, DEFAULT_BASE_URL)
    }

    fn endpoint(&self, ctx: &ApiContext<'_>) -> Result<String, GatewayError> {
        match ctx.function {
            GatewayFunction::ChatComplete => {
                let model = require_model(ctx)?;
                let stream = ctx.body.get("stream").and_then(Value::as_bool).unwrap_or(false);
                if stream {
                    Ok(format!("/models/{model}:streamGenerateContent?alt=sse"))
                } else {
                    Ok(format!("/models/{model}:generateContent"))
                }
            }
            GatewayFunction::Embed => {
                let model = require_model(ctx)?;
                Ok(format!("/models/{model}:batchEmbedContents"))
            }
            GatewayFunction::Proxy => Ok(proxy_endpoint(ctx)),
            _ => Ok(String::new()),
        }
    }

    fn headers(&self, ctx: &ApiContext<'_>) -> Result<HeaderMap, GatewayError> {
        require_api_key(ctx)?;
        let mut headers = HeaderMap::new();
        put_header(&mut headers, "content-type", "application/json")?;
        if let Some(key) = &ctx.target.api_key {
            use secrecy::ExposeSecret;
            put_header(&mut headers, "x-goog-api-key", key.expose_secret())?;
        }
        Ok(headers)
    }
}

fn require_model<'a>(ctx: &'a ApiContext<'_>) -> Result<&'a str, GatewayError> {
    ctx.model().ok_or_else(|| GatewayError::MissingRequiredParameter {
        field: "model".to_owned(),
        provider: ProviderId::Google,
    })
}

/// Google (Gemini) adapter
pub struct GoogleAdapter;

impl GoogleAdapter {
    fn normalize(body: &Value, status: StatusCode) -> Option<ErrorBody> {
        let err = body.get("error")?.as_object()?;
        let message = err.get("message").and_then(Value::as_str)?;
        Some(ErrorBody {
            error: ErrorDetail {
                message: message.to_owned(),
                error_type: err.get("status").and_then(Value::as_str).map(str::to_owned),
                param: None,
                code: err.get("code").map(|c| c.to_string()),
            },
            provider: ProviderId::Google.to_string(),
            status: (status != StatusCode::OK).then(|| status.as_u16()),
        })
    }

    /// Flatten a candidate's parts into text + tool calls
    fn read_parts(parts: &[Value]) -> (String, Vec<ToolCall>) {
        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for part in parts {
            if let Some(t) = part.get("text").and_then(Value::as_str) {
                text.push_str(t);
            }
            if let Some(call) = part.get("functionCall") {
                let name = call.get("name").and_then(Value::as_str).unwrap_or_default();
                let args = call.get("args").cloned().unwrap_or(json!({}));
                tool_calls.push(ToolCall {
                    id: generate_id("call"),
                    tool_type: "function".to_owned(),
                    function: FunctionCall {
                        name: name.to_owned(),
                        arguments: args.to_string(),
                    },
                });
            }
        }
        (text, tool_calls)
    }
}

impl ProviderAdapter for GoogleAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Google
    }

    fn api(&self) -> &dyn ProviderApi {
        &GoogleApi
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
        openai_compat::check_error(provider, body, status, &|b, s| Self::normalize(b, s))?;

        match function {
            GatewayFunction::Embed => {
                let Ok(wire) = serde_json::from_value::<WireEmbedResponse>(body.clone()) else {
                    return Err(ErrorBody::invalid_provider_response(provider, body));
                };
                let data = wire
                    .embeddings
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| {
                        #[allow(clippy::cast_possible_truncation)]
                        EmbeddingData {
                            object: "embedding".to_owned(),
                            embedding: json!(item.values),
                            index: index as u32,
                        }
                    })
                    .collect();
                Ok(CanonicalResponse::Embeddings(EmbeddingResponse {
                    object: "list".to_owned(),
                    data,
                    model: ctx.model().unwrap_or("unknown").to_owned(),
                    provider,
                    // batchEmbedContents reports no token counts at all
                    usage: Usage::UNKNOWN,
                }))
            }
            _ => {
                let Ok(wire) = serde_json::from_value::<WireResponse>(body.clone()) else {
                    return Err(ErrorBody::invalid_provider_response(provider, body));
                };
                if wire.candidates.is_empty() {
                    return Err(ErrorBody::invalid_provider_response(provider, body));
                }

                let choices = wire
                    .candidates
                    .into_iter()
                    .enumerate()
                    .map(|(position, candidate)| {
                        let (text, tool_calls) =
                            candidate.content.as_ref().map_or((String::new(), Vec::new()), |c| {
                                Self::read_parts(&c.parts)
                            });
                        let finish_reason = if tool_calls.is_empty() {
                            candidate.finish_reason.as_deref().and_then(FinishReason::parse)
                        } else {
                            Some(FinishReason::ToolCalls)
                        };
                        #[allow(clippy::cast_possible_truncation)]
                        let index = candidate.index.unwrap_or(position as u32);
                        Choice {
                            index,
                            message: ChoiceMessage {
                                role: "assistant".to_owned(),
                                content: Some(text),
                                reasoning_content: None,
                                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
                            },
                            finish_reason,
                        }
                    })
                    .collect();

                let usage = wire.usage_metadata.map_or(Usage::UNKNOWN, |u| {
                    match (u.prompt_token_count, u.candidates_token_count) {
                        (Some(prompt), Some(completion)) => Usage {
                            prompt_tokens: prompt,
                            completion_tokens: completion,
                            total_tokens: u.total_token_count.unwrap_or(prompt + completion),
                        },
                        _ => Usage::UNKNOWN,
                    }
                });

                Ok(CanonicalResponse::Chat(ChatCompletionResponse {
                    id: generate_id("chatcmpl"),
                    object: "chat.completion".to_owned(),
                    created: unix_now(),
                    model: ctx.model().unwrap_or("unknown").to_owned(),
                    provider,
                    choices,
                    usage,
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

        let Ok(wire) = serde_json::from_str::<WireResponse>(payload) else {
            // Lenient: Gemini interleaves non-content frames; degrade to an
            // empty delta rather than killing the stream
            state.chunk_count += 1;
            return Ok(Some(sse_data(&openai_compat::empty_delta_chunk(provider, fallback_id, ctx))));
        };

        state.chunk_count += 1;
        let Some(candidate) = wire.candidates.first() else {
            return Ok(None);
        };

        let (text, _) = candidate
            .content
            .as_ref()
            .map_or((String::new(), Vec::new()), |c| Self::read_parts(&c.parts));
        state.record_content(&text);

        let finish = candidate
            .finish_reason
            .as_deref()
            .and_then(FinishReason::parse)
            .map_or(Value::Null, |fr| serde_json::to_value(fr).unwrap_or(Value::Null));

        let chunk = json!({
            "id": fallback_id,
            "object": "chat.completion.chunk",
            "created": unix_now(),
            "model": ctx.model().unwrap_or("unknown"),
            "provider": provider,
            "choices": [{"index": 0, "delta": {"content": text}, "finish_reason": finish}],
        });
        Ok(Some(sse_data(&chunk)))
    }

    fn normalize_error(&self, body: &Value, status: StatusCode) -> Option<ErrorBody> {
        Self::normalize(body, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::build_request;

    fn target() -> Target {
        let mut target = Target::for_provider(ProviderId::Google);
        target.api_key = Some("key".into());
        target
    }

    #[test]
    fn sampling_params_nest_under_generation_config() {
        let body = json!({
            "model": "gemini-pro",
            "messages": [{"role": "user", "content": "hi"}],
            "temperature": 0.3,
            "max_tokens": 256,
            "stop": ["END"]
        });
        let out = build_request(ProviderId::Google, &CHAT, &body, &target()).unwrap();
        assert_eq!(out["generationConfig"]["temperature"], 0.3);
        assert_eq!(out["generationConfig"]["maxOutputTokens"], 256);
        assert_eq!(out["generationConfig"]["stopSequences"], json!(["END"]));
        assert!(!out.contains_key("model"));
    }

    #[test]
    fn top_k_is_clamped_not_rejected() {
        let body = json!({
            "model": "gemini-pro",
            "messages": [{"role": "user", "content": "hi"}],
            "top_k": 999
        });
        let out = build_request(ProviderId::Google, &CHAT, &body, &target()).unwrap();
        assert_eq!(out["generationConfig"]["topK"], 40);
    }

    #[test]
    fn system_turn_becomes_system_instruction() {
        let body = json!({
            "model": "gemini-pro",
            "messages": [
                {"role": "system", "content": "short answers"},
                {"role": "user", "content": "hi"}
            ]
        });
        let out = build_request(ProviderId::Google, &CHAT, &body, &target()).unwrap();
        assert_eq!(out["systemInstruction"]["parts"][0]["text"], "short answers");
        assert_eq!(out["contents"].as_array().unwrap().len(), 1);
        assert_eq!(out["contents"][0]["role"], "user");
    }

    #[test]
    fn stream_flag_switches_endpoint() {
        let target = target();
        let body = json!({"model": "gemini-pro", "stream": true});
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        assert_eq!(
            GoogleApi.endpoint(&ctx).unwrap(),
            "/models/gemini-pro:streamGenerateContent?alt=sse"
        );

        let body = json!({"model": "gemini-pro"});
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        assert_eq!(GoogleApi.endpoint(&ctx).unwrap(), "/models/gemini-pro:generateContent");
    }

    #[test]
    fn response_maps_candidates_and_usage_metadata() {
        let target = target();
        let body = json!({"model": "gemini-pro", "messages": []});
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        let upstream = json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "bonjour"}]},
                "finishReason": "STOP",
                "index": 0
            }],
            "usageMetadata": {"promptTokenCount": 4, "candidatesTokenCount": 2, "totalTokenCount": 6}
        });
        let CanonicalResponse::Chat(resp) = GoogleAdapter
            .transform_response(GatewayFunction::ChatComplete, &upstream, StatusCode::OK, &ctx)
            .unwrap()
        else {
            panic!("expected chat response");
        };
        assert_eq!(resp.choices[0].message.content.as_deref(), Some("bonjour"));
        assert_eq!(resp.choices[0].finish_reason, Some(FinishReason::Stop));
        assert_eq!(resp.usage.total_tokens, 6);
        assert_eq!(resp.model, "gemini-pro");
    }

    #[test]
    fn embed_request_batches_inputs() {
        let body = json!({"model": "text-embedding-004", "input": ["a", "b"]});
        let out = build_request(ProviderId::Google, &EMBED, &body, &target()).unwrap();
        let requests = out["requests"].as_array().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0]["model"], "models/text-embedding-004");
    }

    #[test]
    fn google_error_shape_normalizes() {
        let upstream = json!({
            "error": {"code": 400, "message": "API key not valid", "status": "INVALID_ARGUMENT"}
        });
        let normalized = GoogleAdapter
            .normalize_error(&upstream, StatusCode::BAD_REQUEST)
            .unwrap();
        assert_eq!(normalized.error.message, "API key not valid");
        assert_eq!(normalized.error.error_type.as_deref(), Some("INVALID_ARGUMENT"));
        assert_eq!(normalized.error.code.as_deref(), Some("400"));
    }
}
