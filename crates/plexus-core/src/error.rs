use http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ProviderId;

/// Trait for domain errors that can be converted to HTTP responses
///
/// The server layer turns these into actual HTTP responses, keeping domain
/// errors decoupled from axum.
pub trait HttpError: std::error::Error {
    /// HTTP status code for this error
    fn status_code(&self) -> StatusCode;

    /// Machine-readable error type (e.g. `invalid_request_error`)
    fn error_type(&self) -> &str;

    /// Message safe to expose to API consumers
    fn client_message(&self) -> String;
}

/// Canonical error detail, `OpenAI`-shaped
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Human-readable error message
    pub message: String,
    /// Machine-readable error type
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Parameter that caused the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    /// Provider-native error code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Canonical error response body
///
/// The single error shape every provider failure is normalized into before
/// crossing the system boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Error details
    pub error: ErrorDetail,
    /// Provider the error originated from ("plexus" for gateway-side errors)
    pub provider: String,
    /// Upstream HTTP status, when meaningful
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ErrorBody {
    /// Build an error body from its parts
    pub fn new(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                message: message.into(),
                error_type: None,
                param: None,
                code: None,
            },
            provider: provider.into(),
            status: None,
        }
    }

    /// Set the machine-readable error type
    #[must_use]
    pub fn with_type(mut self, error_type: impl Into<String>) -> Self {
        self.error.error_type = Some(error_type.into());
        self
    }

    /// Set the provider-native error code
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.error.code = Some(code.into());
        self
    }

    /// Set the upstream status
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the offending parameter name
    #[must_use]
    pub fn with_param(mut self, param: &str) -> Self {
        self.error.param = Some(param.to_owned());
        self
    }

    /// Error body for a 2xx upstream response with an unrecognized shape
    pub fn invalid_provider_response(provider: ProviderId, body: &serde_json::Value) -> Self {
        let snippet = truncate_body(body);
        Self::new(
            provider.to_string(),
            format!("unrecognized response shape from provider: {snippet}"),
        )
        .with_type("invalid_provider_response")
    }
}

/// Trim an offending body to a loggable snippet
fn truncate_body(body: &serde_json::Value) -> String {
    let mut s = body.to_string();
    if s.len() > 512 {
        let cut = (0..=512).rev().find(|i| s.is_char_boundary(*i)).unwrap_or(0);
        s.truncate(cut);
        s.push('…');
    }
    s
}

/// Errors that can occur while routing a request through the gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Canonical request failed schema validation
    #[error("invalid request: {0}")]
    Validation(String),

    /// A required canonical-to-provider mapping could not be resolved
    #[error("missing required parameter `{field}` for provider {provider}")]
    MissingRequiredParameter {
        /// Canonical field that could not be resolved
        field: String,
        /// Provider whose mapping required it
        provider: ProviderId,
    },

    /// A numeric parameter fell outside its provider bounds
    #[error("parameter `{field}` out of range for provider {provider}: {detail}")]
    ParameterOutOfRange {
        /// Canonical field that violated its bounds
        field: String,
        /// Provider whose mapping bounded it
        provider: ProviderId,
        /// Human-readable bound description
        detail: String,
    },

    /// Malformed or unsafe caller-supplied host
    #[error("invalid host configuration: {0}")]
    InvalidHostConfiguration(String),

    /// Provider returned a non-2xx status or an in-band error payload
    #[error("provider {provider} returned an error (status {status})")]
    Upstream {
        /// Provider that failed
        provider: ProviderId,
        /// Upstream (or synthesized) HTTP status
        status: u16,
        /// Normalized error body
        body: Box<ErrorBody>,
    },

    /// Provider returned a 2xx with an unrecognized shape
    #[error("provider {provider} returned an unrecognized response shape")]
    InvalidProviderResponse {
        /// Provider that violated its contract
        provider: ProviderId,
        /// Normalized error body carrying the offending snippet
        body: Box<ErrorBody>,
    },

    /// Outbound call exceeded the configured deadline
    #[error("request to provider {provider} timed out after {timeout_secs}s")]
    Timeout {
        /// Provider that timed out
        provider: ProviderId,
        /// Configured deadline in seconds
        timeout_secs: u64,
    },

    /// A chunk could not be parsed or transformed mid-stream
    #[error("stream transform failed for provider {provider}: {message}")]
    StreamTransform {
        /// Provider whose stream broke
        provider: ProviderId,
        /// What went wrong
        message: String,
    },

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Synthesize an upstream error for a network-level failure
    ///
    /// Connect/DNS failures have no upstream status, so they are surfaced
    /// as a 502 upstream error, which keeps them retry-eligible.
    pub fn network(provider: ProviderId, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::Upstream {
            provider,
            status: 502,
            body: Box::new(
                ErrorBody::new(provider.to_string(), message)
                    .with_type("upstream_error")
                    .with_status(502),
            ),
        }
    }

    /// Whether a retry against the same target may succeed
    ///
    /// Only timeouts and transient upstream statuses qualify; validation
    /// and configuration errors never do.
    pub fn is_retryable(&self, retry_statuses: &[u16]) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Upstream { status, .. } => retry_statuses.contains(status),
            _ => false,
        }
    }

    /// Convert into the canonical error body
    pub fn to_error_body(&self) -> ErrorBody {
        match self {
            Self::Upstream { body, .. } | Self::InvalidProviderResponse { body, .. } => (**body).clone(),
            Self::MissingRequiredParameter { field, provider } => ErrorBody::new(provider.to_string(), self.to_string())
                .with_type(self.error_type().to_owned())
                .with_status(self.status_code().as_u16())
                .with_param(field),
            Self::ParameterOutOfRange { field, provider, .. } => ErrorBody::new(provider.to_string(), self.to_string())
                .with_type(self.error_type().to_owned())
                .with_status(self.status_code().as_u16())
                .with_param(field),
            Self::Timeout { provider, .. } | Self::StreamTransform { provider, .. } => {
                ErrorBody::new(provider.to_string(), self.client_message())
                    .with_type(self.error_type().to_owned())
                    .with_status(self.status_code().as_u16())
            }
            _ => ErrorBody::new("plexus", self.client_message())
                .with_type(self.error_type().to_owned())
                .with_status(self.status_code().as_u16()),
        }
    }
}

impl HttpError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::MissingRequiredParameter { .. }
            | Self::ParameterOutOfRange { .. }
            | Self::InvalidHostConfiguration(_) => StatusCode::BAD_REQUEST,
            Self::Upstream { status, .. } => StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY),
            Self::InvalidProviderResponse { .. } | Self::StreamTransform { .. } => StatusCode::BAD_GATEWAY,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &str {
        match self {
            Self::Validation(_) => "invalid_request_error",
            Self::MissingRequiredParameter { .. } => "missing_required_parameter",
            Self::ParameterOutOfRange { .. } => "parameter_out_of_range",
            Self::InvalidHostConfiguration(_) => "invalid_host_configuration",
            Self::Upstream { .. } => "upstream_error",
            Self::InvalidProviderResponse { .. } => "invalid_provider_response",
            Self::Timeout { .. } => "timeout_error",
            Self::StreamTransform { .. } => "stream_transform_error",
            Self::Internal(_) => "internal_error",
        }
    }

    fn client_message(&self) -> String {
        match self {
            Self::Internal(_) => "an internal error occurred".to_owned(),
            Self::Upstream { body, .. } | Self::InvalidProviderResponse { body, .. } => body.error.message.clone(),
            other => other.to_string(),
        }
    }
}
