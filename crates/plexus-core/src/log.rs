//! Request logging record and the storage collaborator seam

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::types::{GatewayFunction, ProviderId};

/// Cache disposition of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Caching not configured for this request
    Disabled,
    /// Served from cache
    Hit,
    /// Cache consulted but missed
    Miss,
}

/// Dispatch phase a request ended in, recorded for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DispatchPhase {
    /// Parsed and schema-validated
    Validated,
    /// Provider-native request constructed
    Built,
    /// Outbound call performed
    Sent,
    /// Non-streaming response transformed
    Transformed,
    /// Streaming response opened
    StreamOpened,
    /// Request completed successfully
    Completed,
    /// Request failed
    Failed,
}

/// Immutable record of one request/response cycle
///
/// Created once per attempt and handed to the [`LogSink`] collaborator.
/// For streaming responses the body/usage fields are placeholders until the
/// stream-end hook completes them.
#[derive(Debug, Clone, Serialize)]
pub struct RequestLog {
    /// Unique log identifier
    pub id: String,
    /// Provider the attempt targeted
    pub provider: ProviderId,
    /// Gateway function performed
    pub function: GatewayFunction,
    /// Outbound HTTP method
    pub method: String,
    /// Outbound URL (no credentials; query secrets stripped)
    pub url: String,
    /// Response status returned to the caller
    pub status: u16,
    /// Zero-based attempt index across targets and retries
    pub attempt: u32,
    /// Whether the response was streamed
    pub stream: bool,
    /// Provider-native request body (secrets redacted upstream)
    pub request_body: Value,
    /// Transformed response body, or accumulated stream content
    pub response_body: Option<Value>,
    /// Redacted routing configuration used for this attempt
    pub route: Value,
    /// Cache disposition
    pub cache_status: CacheStatus,
    /// Phase the dispatch ended in
    pub phase: DispatchPhase,
    /// Milliseconds to first streamed chunk, when streaming
    pub first_token_ms: Option<u64>,
    /// Total request latency in milliseconds
    pub latency_ms: u64,
    /// Unix timestamp (seconds) the request was received
    pub created_at: u64,
    /// Caller-supplied metadata labels from the route header
    pub metadata: Option<Value>,
}

/// Storage connector for finished request logs
///
/// Persistence lives outside the gateway core; implementations receive a
/// complete [`RequestLog`] and may ship it anywhere. Must not block the
/// request path — the dispatcher hands logs off on a spawned task.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Persist one finished request log
    async fn create_log(&self, log: RequestLog);
}

/// Default sink that emits logs through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

#[async_trait]
impl LogSink for TracingLogSink {
    async fn create_log(&self, log: RequestLog) {
        tracing::info!(
            log_id = %log.id,
            provider = %log.provider,
            function = %log.function,
            status = log.status,
            attempt = log.attempt,
            stream = log.stream,
            phase = %log.phase,
            first_token_ms = log.first_token_ms,
            latency_ms = log.latency_ms,
            "request completed"
        );
    }
}
