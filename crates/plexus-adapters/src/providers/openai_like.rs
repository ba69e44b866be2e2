//! Shared adapter for providers speaking the `OpenAI` wire protocol
//!
//! Most of the registry is `OpenAI`-compatible vendors that differ only in
//! origin, supported functions, parameter quirks, and stream leniency. Each
//! such provider module supplies an [`OpenAiLikeSpec`] plus its own tables;
//! everything else is shared.

use http::{HeaderMap, StatusCode};
use plexus_core::context::ApiContext;
use plexus_core::error::{ErrorBody, GatewayError};
use plexus_core::types::{CanonicalResponse, GatewayFunction, ProviderId, StreamParsePolicy, StreamState};
use serde_json::{Value, json};

use crate::adapter::ProviderAdapter;
use crate::api::{ProviderApi, base_url_or_default, bearer_headers, proxy_endpoint, require_api_key, sniff_function};
use crate::mapping::FunctionTable;
use crate::openai_compat;

/// Static description of one `OpenAI`-compatible provider
pub struct OpenAiLikeSpec {
    /// Provider identifier
    pub id: ProviderId,
    /// Default origin (plus any fixed path prefix)
    pub default_base_url: &'static str,
    /// Function-table lookup; `None` marks unsupported functions
    pub tables: fn(GatewayFunction) -> Option<&'static FunctionTable>,
    /// Chunk parse-failure policy for this provider
    pub parse_policy: StreamParsePolicy,
    /// Additional fixed headers (referer/title for aggregators)
    pub extra_headers: Option<fn(&ApiContext<'_>, &mut HeaderMap) -> Result<(), GatewayError>>,
}

/// Adapter for an `OpenAI`-compatible provider
pub struct OpenAiLikeAdapter(pub OpenAiLikeSpec);

impl ProviderApi for OpenAiLikeAdapter {
    fn base_url(&self, ctx: &ApiContext<'_>) -> Result<String, GatewayError> {
        base_url_or_default(ctx, self.0.default_base_url)
    }

    fn endpoint(&self, ctx: &ApiContext<'_>) -> Result<String, GatewayError> {
        if ctx.function == GatewayFunction::Proxy {
            return Ok(proxy_endpoint(ctx));
        }
        if (self.0.tables)(ctx.function).is_none() {
            return Ok(String::new());
        }
        let path = match ctx.function {
            GatewayFunction::ChatComplete => "/chat/completions",
            GatewayFunction::Complete => "/completions",
            GatewayFunction::Embed => "/embeddings",
            GatewayFunction::ImageGenerate => "/images/generations",
            GatewayFunction::Responses => "/responses",
            GatewayFunction::Proxy => unreachable!(),
        };
        Ok(path.to_owned())
    }

    fn headers(&self, ctx: &ApiContext<'_>) -> Result<HeaderMap, GatewayError> {
        require_api_key(ctx)?;
        let mut headers = bearer_headers(ctx)?;
        if let Some(extra) = self.0.extra_headers {
            extra(ctx, &mut headers)?;
        }
        Ok(headers)
    }
}

impl ProviderAdapter for OpenAiLikeAdapter {
    fn id(&self) -> ProviderId {
        self.0.id
    }

    fn api(&self) -> &dyn ProviderApi {
        self
    }

    fn table(&self, function: GatewayFunction) -> Option<&FunctionTable> {
        (self.0.tables)(function)
    }

    fn transform_response(
        &self,
        function: GatewayFunction,
        body: &Value,
        status: StatusCode,
        ctx: &ApiContext<'_>,
    ) -> Result<CanonicalResponse, ErrorBody> {
        let provider = self.id();
        let normalize = |b: &Value, s: StatusCode| openai_compat::normalize_error(provider, b, s);
        match function {
            GatewayFunction::Complete => {
                openai_compat::transform_completion_response(provider, body, status, ctx, &normalize)
            }
            GatewayFunction::Embed => {
                openai_compat::transform_embedding_response(provider, body, status, ctx, &normalize)
            }
            GatewayFunction::ImageGenerate => {
                openai_compat::transform_image_response(provider, body, status, &normalize)
            }
            GatewayFunction::Responses => {
                openai_compat::transform_responses_response(provider, body, status, &normalize)
            }
            GatewayFunction::Proxy => match ctx.forwarded_path.and_then(sniff_function) {
                Some(sniffed) if sniffed != GatewayFunction::Proxy => {
                    self.transform_response(sniffed, body, status, ctx)
                }
                _ => {
                    openai_compat::check_error(provider, body, status, &normalize)?;
                    let mut tagged = body.clone();
                    if let Some(obj) = tagged.as_object_mut() {
                        obj.insert("provider".to_owned(), json!(provider));
                    }
                    Ok(CanonicalResponse::Raw(tagged))
                }
            },
            GatewayFunction::ChatComplete => {
                openai_compat::transform_chat_response(provider, body, status, ctx, &normalize)
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
        openai_compat::transform_chunk(self.id(), raw, fallback_id, state, ctx, self.0.parse_policy)
    }

    fn normalize_error(&self, body: &Value, status: StatusCode) -> Option<ErrorBody> {
        openai_compat::normalize_error(self.id(), body, status)
    }

    fn stream_parse_policy(&self) -> StreamParsePolicy {
        self.0.parse_policy
    }
}
