use serde::{Deserialize, Serialize};

use super::message::ToolCall;
use super::provider::ProviderId;

/// Reason the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of generation
    Stop,
    /// Hit the token limit
    Length,
    /// Model decided to call a tool
    ToolCalls,
    /// Content was filtered by safety systems
    ContentFilter,
}

impl FinishReason {
    /// Parse a provider-native finish/stop reason string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stop" | "end_turn" | "stop_sequence" | "STOP" | "COMPLETE" | "FINISH_REASON_STOP" => Some(Self::Stop),
            "length" | "max_tokens" | "MAX_TOKENS" | "MAX_LENGTH" => Some(Self::Length),
            "tool_calls" | "tool_use" | "TOOL_CALL" | "function_call" => Some(Self::ToolCalls),
            "content_filter" | "SAFETY" | "ERROR_TOXIC" => Some(Self::ContentFilter),
            _ => None,
        }
    }
}

/// Token usage statistics
///
/// `-1` is the "unknown" sentinel, distinct from an actual zero count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens consumed by the prompt
    pub prompt_tokens: i64,
    /// Tokens generated in the completion
    pub completion_tokens: i64,
    /// Total tokens (prompt + completion)
    pub total_tokens: i64,
}

impl Usage {
    /// Usage the provider did not report and nothing could be synthesized for
    pub const UNKNOWN: Self = Self {
        prompt_tokens: -1,
        completion_tokens: -1,
        total_tokens: -1,
    };

    /// Build usage from known prompt/completion counts
    pub const fn from_counts(prompt_tokens: i64, completion_tokens: i64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

impl Default for Usage {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

/// Message content within a chat response choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChoiceMessage {
    /// Role is always assistant for completions
    pub role: String,
    /// Text content
    pub content: Option<String>,
    /// Chain-of-thought content surfaced by reasoning models
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    /// Tool calls requested by the model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChoiceMessage {
    /// Create a simple text message from the assistant
    pub fn text(content: String) -> Self {
        Self {
            role: "assistant".to_owned(),
            content: Some(content),
            reasoning_content: None,
            tool_calls: None,
        }
    }
}

/// A single chat completion choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    /// Index of this choice
    pub index: u32,
    /// Generated message
    pub message: ChoiceMessage,
    /// Why generation stopped
    pub finish_reason: Option<FinishReason>,
}

/// Canonical chat completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    /// Unique response identifier
    pub id: String,
    /// Object type, always "chat.completion"
    pub object: String,
    /// Unix timestamp of creation
    pub created: u64,
    /// Model used for generation
    pub model: String,
    /// Provider that served the request
    pub provider: ProviderId,
    /// Generated choices
    pub choices: Vec<Choice>,
    /// Token usage statistics
    pub usage: Usage,
    /// Provider-specific extras (citations, safety metadata) kept when the
    /// caller did not ask for strict compliance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_extras: Option<serde_json::Value>,
}

/// A single text completion choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChoice {
    /// Generated text
    pub text: String,
    /// Index of this choice
    pub index: u32,
    /// Log probabilities, when requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<serde_json::Value>,
    /// Why generation stopped
    pub finish_reason: Option<FinishReason>,
}

/// Canonical legacy text completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextCompletionResponse {
    /// Unique response identifier
    pub id: String,
    /// Object type, always "text_completion"
    pub object: String,
    /// Unix timestamp of creation
    pub created: u64,
    /// Model used for generation
    pub model: String,
    /// Provider that served the request
    pub provider: ProviderId,
    /// Generated choices
    pub choices: Vec<TextChoice>,
    /// Token usage statistics
    pub usage: Usage,
}

/// One embedding vector within an embedding response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingData {
    /// Object type, always "embedding"
    pub object: String,
    /// Embedding vector (float array, or base64 string when requested)
    pub embedding: serde_json::Value,
    /// Position of the corresponding input
    pub index: u32,
}

/// Canonical embedding response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    /// Object type, always "list"
    pub object: String,
    /// Embedding vectors, one per input
    pub data: Vec<EmbeddingData>,
    /// Model used
    pub model: String,
    /// Provider that served the request
    pub provider: ProviderId,
    /// Token usage statistics
    pub usage: Usage,
}

/// One generated image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageData {
    /// Hosted URL of the image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Base64-encoded image bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b64_json: Option<String>,
    /// Prompt after provider-side revision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revised_prompt: Option<String>,
}

/// Canonical image generation response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationResponse {
    /// Unix timestamp of creation
    pub created: u64,
    /// Generated images
    pub data: Vec<ImageData>,
    /// Provider that served the request
    pub provider: ProviderId,
}

/// Canonical success response, one variant per gateway function
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CanonicalResponse {
    /// Chat completion
    Chat(ChatCompletionResponse),
    /// Legacy text completion
    Text(TextCompletionResponse),
    /// Embeddings
    Embeddings(EmbeddingResponse),
    /// Image generation
    Images(ImageGenerationResponse),
    /// Responses API or proxy pass-through, already provider-tagged
    Raw(serde_json::Value),
}

impl CanonicalResponse {
    /// Serialize to the wire JSON body
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_usage_is_negative_sentinel() {
        let usage = Usage::default();
        assert_eq!(usage.prompt_tokens, -1);
        assert_ne!(usage, Usage::from_counts(0, 0));
    }

    #[test]
    fn from_counts_totals() {
        let usage = Usage::from_counts(5, 2);
        assert_eq!(usage.total_tokens, 7);
    }

    #[test]
    fn finish_reason_aliases() {
        assert_eq!(FinishReason::parse("end_turn"), Some(FinishReason::Stop));
        assert_eq!(FinishReason::parse("MAX_TOKENS"), Some(FinishReason::Length));
        assert_eq!(FinishReason::parse("tool_use"), Some(FinishReason::ToolCalls));
        assert_eq!(FinishReason::parse("banana"), None);
    }

    #[test]
    fn chat_response_serializes_untagged() {
        let resp = CanonicalResponse::Chat(ChatCompletionResponse {
            id: "chatcmpl-1".to_owned(),
            object: "chat.completion".to_owned(),
            created: 1,
            model: "m".to_owned(),
            provider: ProviderId::Openai,
            choices: vec![],
            usage: Usage::UNKNOWN,
            provider_extras: None,
        });
        let json = resp.to_json();
        assert_eq!(json["object"], "chat.completion");
        assert_eq!(json["provider"], "openai");
    }
}
