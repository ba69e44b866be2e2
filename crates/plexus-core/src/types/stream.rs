use serde_json::Value;

/// Terminal sentinel line of an `OpenAI`-style SSE stream
pub const DONE_CHUNK: &str = "data: [DONE]\n\n";

/// The bare sentinel payload, after `data: ` stripping
pub const DONE_SENTINEL: &str = "[DONE]";

/// Format a JSON value as one complete SSE data line
pub fn sse_data(value: &Value) -> String {
    format!("data: {value}\n\n")
}

/// Strip a leading `data: ` prefix and surrounding whitespace from a raw
/// stream chunk, returning the payload to parse
pub fn strip_sse_prefix(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed.strip_prefix("data:").map_or(trimmed, str::trim)
}

/// How a provider frames its streaming response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    /// Server-sent events (`data: ...` lines)
    Sse,
    /// Newline-delimited JSON objects
    JsonLines,
}

/// Per-provider policy for chunks that fail to parse mid-stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamParsePolicy {
    /// Emit a best-effort empty-content chunk carrying the fallback id
    Lenient,
    /// Raise a stream transform error and terminate the stream
    Strict,
}

/// Mutable scratch owned by a single stream lifecycle
///
/// Created when the stream opens, threaded by mutable reference through the
/// chunk transformer, and discarded when the stream closes. Never shared
/// across concurrent requests.
#[derive(Debug, Default)]
pub struct StreamState {
    /// Chunks seen so far on this stream
    pub chunk_count: u64,
    /// Whether a chain-of-thought/reasoning message has been observed,
    /// so continuation chunks can be suppressed or merged consistently
    pub contains_reasoning_message: bool,
    /// Whether the terminal sentinel has been emitted
    pub finished: bool,
    /// Accumulated text content, used by the stream-end log hook
    pub collected_content: String,
    /// Upstream response id observed on the first chunk, if any
    pub response_id: Option<String>,
    /// Provider-specific scratch (current block type, tool indices, partial
    /// usage counters)
    pub scratch: serde_json::Map<String, Value>,
}

impl StreamState {
    /// Record one transformed chunk's text content for log accumulation
    pub fn record_content(&mut self, content: &str) {
        self.collected_content.push_str(content);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_prefix_and_whitespace() {
        assert_eq!(strip_sse_prefix("data: {\"a\":1}\n"), "{\"a\":1}");
        assert_eq!(strip_sse_prefix("  data:  [DONE]  "), "[DONE]");
        assert_eq!(strip_sse_prefix("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn sse_data_forms_complete_line() {
        let line = sse_data(&serde_json::json!({"x": 1}));
        assert!(line.starts_with("data: {"));
        assert!(line.ends_with("\n\n"));
    }
}
