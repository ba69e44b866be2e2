//! Core types for Plexus
//!
//! Canonical request/response schemas (modeled on the `OpenAI` API surface),
//! the gateway error taxonomy, provider/function identifiers, routing
//! targets, and the request-log collaborator interface. Everything here is
//! shared read-only across concurrent requests.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod context;
pub mod error;
pub mod log;
pub mod types;

pub use context::ApiContext;
pub use error::{ErrorBody, ErrorDetail, GatewayError, HttpError};
pub use log::{CacheStatus, DispatchPhase, LogSink, RequestLog, TracingLogSink};
pub use types::{CanonicalResponse, GatewayFunction, ProviderId, RequestPayload, Target};

/// Current unix timestamp in seconds
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Generate a response identifier with the given prefix (e.g. `chatcmpl`)
pub fn generate_id(prefix: &str) -> String {
    format!("{prefix}-{}", uuid::Uuid::new_v4().simple())
}
