//! Per-provider adapter trait
//!
//! One implementation per provider bundles its API descriptor, parameter
//! mapping tables, response/stream transformers, and error normalizer.
//! Implementations are stateless unit structs; the registry hands out
//! `&'static` references shared across all requests.

use http::StatusCode;
use plexus_core::context::ApiContext;
use plexus_core::error::{ErrorBody, GatewayError};
use plexus_core::types::{
    CanonicalResponse, GatewayFunction, ProviderId, StreamFormat, StreamParsePolicy, StreamState,
};
use serde_json::Value;

use crate::api::ProviderApi;
use crate::mapping::FunctionTable;

/// Everything the dispatcher needs to talk to one provider
pub trait ProviderAdapter: Send + Sync {
    /// Provider identifier
    fn id(&self) -> ProviderId;

    /// API descriptor (base URL, endpoint, headers)
    fn api(&self) -> &dyn ProviderApi;

    /// Parameter mapping table for a function, `None` when unsupported
    fn table(&self, function: GatewayFunction) -> Option<&FunctionTable>;

    /// Transform a provider-native response into the canonical schema
    ///
    /// Must never panic across this boundary: every failure mode maps to an
    /// [`ErrorBody`]. A 200 with an in-band error key is an error; a 200
    /// with an unrecognized shape is an invalid-provider-response error.
    fn transform_response(
        &self,
        function: GatewayFunction,
        body: &Value,
        status: StatusCode,
        ctx: &ApiContext<'_>,
    ) -> Result<CanonicalResponse, ErrorBody>;

    /// Transform one provider-native stream chunk into a canonical SSE line
    ///
    /// `Ok(Some(line))` is a complete `data: ...\n\n` line; `Ok(None)` means
    /// the chunk was consumed without output (keep-alives, event framing).
    /// The `[DONE]` sentinel passes through verbatim.
    fn transform_chunk(
        &self,
        function: GatewayFunction,
        raw: &str,
        fallback_id: &str,
        state: &mut StreamState,
        ctx: &ApiContext<'_>,
    ) -> Result<Option<String>, GatewayError>;

    /// Normalize a provider error payload into the canonical error body
    ///
    /// Returns `None` when the payload carries no recognizable error, in
    /// which case the caller falls back to a generic upstream error.
    fn normalize_error(&self, body: &Value, status: StatusCode) -> Option<ErrorBody>;

    /// How the provider frames its streaming body
    fn stream_format(&self) -> StreamFormat {
        StreamFormat::Sse
    }

    /// What to do with unparseable chunks mid-stream
    fn stream_parse_policy(&self) -> StreamParsePolicy {
        StreamParsePolicy::Lenient
    }

    /// Whether the provider supports the given function at all
    fn supports(&self, function: GatewayFunction) -> bool {
        match function {
            GatewayFunction::Proxy => true,
            other => self.table(other).is_some(),
        }
    }
}

/// Error for a function the provider has no mapping for
pub fn unsupported_function(provider: ProviderId, function: GatewayFunction) -> GatewayError {
    GatewayError::Validation(format!("provider {provider} does not support function {function}"))
}
