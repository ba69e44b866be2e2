//! `OpenAI` provider adapter

use std::sync::LazyLock;

use http::{HeaderMap, StatusCode};
use plexus_core::context::ApiContext;
use plexus_core::error::{ErrorBody, GatewayError};
use plexus_core::types::{CanonicalResponse, GatewayFunction, ProviderId, StreamState};
use serde_json::{Value, json};

use crate::adapter::ProviderAdapter;
use crate::api::{
    ProviderApi, base_url_or_default, bearer_headers, proxy_endpoint, put_header, require_api_key, sniff_function,
};
use crate::mapping::{FunctionTable, ParamSpec};
use crate::openai_compat;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// `stream_options.include_usage` rides along whenever streaming is on, so
/// usage arrives on the final chunk
fn stream_usage_options(body: &Value, _target: &plexus_core::types::Target) -> Option<Value> {
    if body.get("stream").and_then(Value::as_bool).unwrap_or(false) {
        Some(json!({"include_usage": true}))
    } else {
        None
    }
}

static CHAT: LazyLock<FunctionTable> = LazyLock::new(|| {
    openai_compat::chat_table()
        .map("max_completion_tokens", ParamSpec::new("max_completion_tokens"))
        // fan-out: the canonical stream flag also drives stream_options
        .map("stream", ParamSpec::new("stream_options").transform(stream_usage_options))
});

static COMPLETION: LazyLock<FunctionTable> = LazyLock::new(openai_compat::completion_table);
static EMBED: LazyLock<FunctionTable> = LazyLock::new(openai_compat::embed_table);
static IMAGE: LazyLock<FunctionTable> = LazyLock::new(openai_compat::image_table);
static RESPONSES: LazyLock<FunctionTable> = LazyLock::new(openai_compat::responses_table);

struct OpenaiApi;

impl ProviderApi for OpenaiApi {
    fn base_url(&self, ctx: &ApiContext<'_>) -> Result<String, GatewayError> {
        base_url_or_default(ctx, DEFAULT_BASE_URL)
    }

    fn endpoint(&self, ctx: &ApiContext<'_>) -> Result<String, GatewayError> {
        let path = match ctx.function {
            GatewayFunction::ChatComplete => "/chat/completions",
            GatewayFunction::Complete => "/completions",
            GatewayFunction::Embed => "/embeddings",
            GatewayFunction::Responses => "/responses",
            GatewayFunction::ImageGenerate => "/images/generations",
            GatewayFunction::Proxy => return Ok(proxy_endpoint(ctx)),
        };
        Ok(path.to_owned())
    }

    fn headers(&self, ctx: &ApiContext<'_>) -> Result<HeaderMap, GatewayError> {
        require_api_key(ctx)?;
        let mut headers = bearer_headers(ctx)?;
        if let Some(org) = &ctx.target.organization {
            put_header(&mut headers, "openai-organization", org)?;
        }
        Ok(headers)
    }
}

/// `OpenAI` adapter
pub struct OpenaiAdapter;

impl ProviderAdapter for OpenaiAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::Openai
    }

    fn api(&self) -> &dyn ProviderApi {
        &OpenaiApi
    }

    fn table(&self, function: GatewayFunction) -> Option<&FunctionTable> {
        match function {
            GatewayFunction::ChatComplete => Some(&CHAT),
            GatewayFunction::Complete => Some(&COMPLETION),
            GatewayFunction::Embed => Some(&EMBED),
            GatewayFunction::Responses => Some(&RESPONSES),
            GatewayFunction::ImageGenerate => Some(&IMAGE),
            GatewayFunction::Proxy => None,
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
        let normalize = |b: &Value, s: StatusCode| openai_compat::normalize_error(provider, b, s);
        match function {
            GatewayFunction::ChatComplete => {
                openai_compat::transform_chat_response(provider, body, status, ctx, &normalize)
            }
            GatewayFunction::Complete => {
                openai_compat::transform_completion_response(provider, body, status, ctx, &normalize)
            }
            GatewayFunction::Embed => {
                openai_compat::transform_embedding_response(provider, body, status, ctx, &normalize)
            }
            GatewayFunction::Responses => {
                openai_compat::transform_responses_response(provider, body, status, &normalize)
            }
            GatewayFunction::ImageGenerate => {
                openai_compat::transform_image_response(provider, body, status, &normalize)
            }
            GatewayFunction::Proxy => match ctx.forwarded_path.and_then(sniff_function) {
                Some(sniffed) => self.transform_response(sniffed, body, status, ctx),
                None => {
                    openai_compat::check_error(provider, body, status, &normalize)?;
                    let mut tagged = body.clone();
                    if let Some(obj) = tagged.as_object_mut() {
                        obj.insert("provider".to_owned(), json!(provider));
                    }
                    Ok(CanonicalResponse::Raw(tagged))
                }
            },
        }
    }

    fn transform_chunk(
        &self,
        function: GatewayFunction,
        raw: &str,
        fallback_id: &str,
        state: &mut StreamState,
        ctx: &ApiContext<'_>,
    ) -> Result<Option<String>, GatewayError> {
        if function == GatewayFunction::Responses {
            return openai_compat::passthrough_chunk(self.id(), raw, state);
        }
        openai_compat::transform_chunk(self.id(), raw, fallback_id, state, ctx, self.stream_parse_policy())
    }

    fn normalize_error(&self, body: &Value, status: StatusCode) -> Option<ErrorBody> {
        openai_compat::normalize_error(self.id(), body, status)
    }
}
