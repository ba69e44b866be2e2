use serde::{Deserialize, Serialize};

use super::function::GatewayFunction;
use super::message::{ChatMessage, ToolDefinition};

/// Canonical chat completion request (`OpenAI` Chat Completions surface)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Model identifier
    pub model: String,
    /// Conversation messages
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Top-k sampling (extension honored by several providers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    /// Number of choices to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Upper bound for completion tokens (Responses-era alias)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_completion_tokens: Option<u32>,
    /// Stop sequences (string or array)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<serde_json::Value>,
    /// Frequency penalty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    /// Presence penalty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    /// Token bias map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logit_bias: Option<serde_json::Value>,
    /// Random seed for deterministic generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// End-user identifier for abuse tracking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Whether to stream the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Tool definitions available to the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    /// How the model should select tools ("auto" | "none" | forced function)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<serde_json::Value>,
    /// Response format constraint (e.g. `json_object`, `json_schema`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<serde_json::Value>,
}

/// Canonical legacy text completion request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier
    pub model: String,
    /// Prompt text (string or array of strings)
    pub prompt: serde_json::Value,
    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Number of choices to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    /// Include log probabilities of the top tokens
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<u32>,
    /// Echo the prompt back with the completion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub echo: Option<bool>,
    /// Stop sequences (string or array)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<serde_json::Value>,
    /// Frequency penalty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    /// Presence penalty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    /// End-user identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Whether to stream the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

/// Canonical embedding request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    /// Model identifier
    pub model: String,
    /// Input text (string, array of strings, or token arrays)
    pub input: serde_json::Value,
    /// Output encoding ("float" or "base64")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding_format: Option<String>,
    /// Requested embedding dimensionality
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<u32>,
    /// End-user identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Canonical Responses API request
///
/// Kept loose: the gateway validates the discriminating fields and forwards
/// the remainder untouched, since only `OpenAI`-protocol providers accept it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesRequest {
    /// Model identifier
    pub model: String,
    /// Input (string or structured item array)
    pub input: serde_json::Value,
    /// Whether to stream the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Remaining Responses API fields, forwarded as-is
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

/// Canonical image generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationRequest {
    /// Model identifier (provider default applies when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Text prompt describing the image
    pub prompt: String,
    /// Number of images to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<u32>,
    /// Output dimensions (e.g. "1024x1024")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    /// Quality hint (e.g. "standard", "hd")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,
    /// Style hint (e.g. "vivid", "natural")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    /// Response encoding ("url" or "b64_json")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,
    /// End-user identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// One canonical request, discriminated by gateway function
///
/// The payload owns the typed body for the duration of a single dispatch.
#[derive(Debug, Clone)]
pub enum RequestPayload {
    /// Chat completion
    ChatComplete(ChatCompletionRequest),
    /// Legacy text completion
    Complete(CompletionRequest),
    /// Embedding generation
    Embed(EmbeddingRequest),
    /// Responses API
    Responses(ResponsesRequest),
    /// Image generation
    ImageGenerate(ImageGenerationRequest),
    /// Raw pass-through body for the proxy function
    Proxy(serde_json::Value),
}

impl RequestPayload {
    /// The gateway function this payload belongs to
    pub const fn function(&self) -> GatewayFunction {
        match self {
            Self::ChatComplete(_) => GatewayFunction::ChatComplete,
            Self::Complete(_) => GatewayFunction::Complete,
            Self::Embed(_) => GatewayFunction::Embed,
            Self::Responses(_) => GatewayFunction::Responses,
            Self::ImageGenerate(_) => GatewayFunction::ImageGenerate,
            Self::Proxy(_) => GatewayFunction::Proxy,
        }
    }

    /// Requested model, when the function carries one
    pub fn model(&self) -> Option<&str> {
        match self {
            Self::ChatComplete(r) => Some(&r.model),
            Self::Complete(r) => Some(&r.model),
            Self::Embed(r) => Some(&r.model),
            Self::Responses(r) => Some(&r.model),
            Self::ImageGenerate(r) => r.model.as_deref(),
            Self::Proxy(v) => v.get("model").and_then(serde_json::Value::as_str),
        }
    }

    /// Whether the caller asked for a streamed response
    pub fn stream(&self) -> bool {
        match self {
            Self::ChatComplete(r) => r.stream.unwrap_or(false),
            Self::Complete(r) => r.stream.unwrap_or(false),
            Self::Responses(r) => r.stream.unwrap_or(false),
            Self::Embed(_) | Self::ImageGenerate(_) => false,
            Self::Proxy(v) => v.get("stream").and_then(serde_json::Value::as_bool).unwrap_or(false),
        }
    }

    /// Canonical body as a JSON value for the mapping tables
    ///
    /// Serialization of the typed bodies cannot fail; the fallback covers
    /// pathological float values only.
    pub fn to_value(&self) -> serde_json::Value {
        let result = match self {
            Self::ChatComplete(r) => serde_json::to_value(r),
            Self::Complete(r) => serde_json::to_value(r),
            Self::Embed(r) => serde_json::to_value(r),
            Self::Responses(r) => serde_json::to_value(r),
            Self::ImageGenerate(r) => serde_json::to_value(r),
            Self::Proxy(v) => Ok(v.clone()),
        };
        result.unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_chat_request_parses() {
        let req: ChatCompletionRequest = serde_json::from_value(serde_json::json!({
            "model": "gpt-4o",
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .unwrap();
        assert_eq!(req.model, "gpt-4o");
        assert!(req.stream.is_none());

        let payload = RequestPayload::ChatComplete(req);
        assert_eq!(payload.function(), GatewayFunction::ChatComplete);
        assert_eq!(payload.model(), Some("gpt-4o"));
        assert!(!payload.stream());
    }

    #[test]
    fn responses_request_preserves_unknown_fields() {
        let req: ResponsesRequest = serde_json::from_value(serde_json::json!({
            "model": "gpt-4o",
            "input": "hello",
            "reasoning": {"effort": "low"}
        }))
        .unwrap();
        assert!(req.rest.contains_key("reasoning"));
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["reasoning"]["effort"], "low");
    }

    #[test]
    fn embedding_input_accepts_string_and_array() {
        for input in [serde_json::json!("one"), serde_json::json!(["one", "two"])] {
            let req: EmbeddingRequest =
                serde_json::from_value(serde_json::json!({"model": "m", "input": input})).unwrap();
            assert_eq!(req.model, "m");
        }
    }
}
