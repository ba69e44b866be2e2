//! Azure `OpenAI` adapter
//!
//! Same wire protocol as `OpenAI`, different addressing: the resource host
//! comes from the target, the model is selected by deployment name in the
//! path, and every call carries an `api-version` query parameter with
//! `api-key` auth.

use std::sync::LazyLock;

use http::{HeaderMap, StatusCode};
use plexus_core::context::ApiContext;
use plexus_core::error::{ErrorBody, GatewayError};
use plexus_core::types::{CanonicalResponse, GatewayFunction, ProviderId, StreamState};
use serde_json::Value;

use crate::adapter::ProviderAdapter;
use crate::api::{ProviderApi, proxy_endpoint, put_header, require_api_key, validate_custom_host};
use crate::mapping::{FunctionTable, ParamSpec};
use crate::openai_compat;

const DEFAULT_API_VERSION: &str = "2024-06-01";

// Deployment picks the model on Azure; the body field is optional passthrough
static CHAT: LazyLock<FunctionTable> =
    LazyLock::new(|| openai_compat::chat_table().unmap("model").map("model", ParamSpec::new("model")));
static COMPLETION: LazyLock<FunctionTable> =
    LazyLock::new(|| openai_compat::completion_table().unmap("model").map("model", ParamSpec::new("model")));
static EMBED: LazyLock<FunctionTable> =
    LazyLock::new(|| openai_compat::embed_table().unmap("model").map("model", ParamSpec::new("model")));
static RESPONSES: LazyLock<FunctionTable> = LazyLock::new(openai_compat::responses_table);

struct AzureApi;

impl AzureApi {
    fn deployment<'a>(ctx: &'a ApiContext<'_>) -> Result<&'a str, GatewayError> {
        ctx.target.deployment.as_deref().ok_or_else(|| {
            GatewayError::Validation("azure-openai requires a deployment name on the target".to_owned())
        })
    }
}

impl ProviderApi for AzureApi {
    fn base_url(&self, ctx: &ApiContext<'_>) -> Result<String, GatewayError> {
        let host = ctx.target.custom_host.as_deref().ok_or_else(|| {
            GatewayError::InvalidHostConfiguration(
                "azure-openai requires the resource URL as custom_host".to_owned(),
            )
        })?;
        Ok(format!("{}/openai", validate_custom_host(host)?))
    }

    fn endpoint(&self, ctx: &ApiContext<'_>) -> Result<String, GatewayError> {
        let api_version = ctx.target.api_version.as_deref().unwrap_or(DEFAULT_API_VERSION);
        let path = match ctx.function {
            GatewayFunction::ChatComplete => "chat/completions",
            GatewayFunction::Complete => "completions",
            GatewayFunction::Embed => "embeddings",
            // The Responses surface is deployment-less on Azure
            GatewayFunction::Responses => return Ok(format!("/responses?api-version={api_version}")),
            GatewayFunction::Proxy => return Ok(proxy_endpoint(ctx)),
            GatewayFunction::ImageGenerate => return Ok(String::new()),
        };
        let deployment = Self::deployment(ctx)?;
        Ok(format!("/deployments/{deployment}/{path}?api-version={api_version}"))
    }

    fn headers(&self, ctx: &ApiContext<'_>) -> Result<HeaderMap, GatewayError> {
        require_api_key(ctx)?;
        let mut headers = HeaderMap::new();
        put_header(&mut headers, "content-type", "application/json")?;
        if let Some(key) = &ctx.target.api_key {
            use secrecy::ExposeSecret;
            put_header(&mut headers, "api-key", key.expose_secret())?;
        }
        Ok(headers)
    }
}

/// Azure `OpenAI` adapter
pub struct AzureAdapter;

impl ProviderAdapter for AzureAdapter {
    fn id(&self) -> ProviderId {
        ProviderId::AzureOpenai
    }

    fn api(&self) -> &dyn ProviderApi {
        &AzureApi
    }

    fn table(&self, function: GatewayFunction) -> Option<&FunctionTable> {
        match function {
            GatewayFunction::ChatComplete => Some(&CHAT),
            GatewayFunction::Complete => Some(&COMPLETION),
            GatewayFunction::Embed => Some(&EMBED),
            GatewayFunction::Responses => Some(&RESPONSES),
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
        let normalize = |b: &Value, s: StatusCode| openai_compat::normalize_error(provider, b, s);
        match function {
            GatewayFunction::Complete => {
                openai_compat::transform_completion_response(provider, body, status, ctx, &normalize)
            }
            GatewayFunction::Embed => {
                openai_compat::transform_embedding_response(provider, body, status, ctx, &normalize)
            }
            GatewayFunction::Responses => {
                openai_compat::transform_responses_response(provider, body, status, &normalize)
            }
            _ => openai_compat::transform_chat_response(provider, body, status, ctx, &normalize),
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
