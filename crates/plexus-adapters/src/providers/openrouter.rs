//! `OpenRouter` aggregator adapter (`OpenAI`-compatible)

use std::sync::LazyLock;

use http::HeaderMap;
use plexus_core::context::ApiContext;
use plexus_core::error::GatewayError;
use plexus_core::types::{GatewayFunction, ProviderId, StreamParsePolicy};

use super::openai_like::{OpenAiLikeAdapter, OpenAiLikeSpec};
use crate::api::put_header;
use crate::mapping::FunctionTable;
use crate::openai_compat;

static CHAT: LazyLock<FunctionTable> = LazyLock::new(openai_compat::chat_table);
static COMPLETION: LazyLock<FunctionTable> = LazyLock::new(openai_compat::completion_table);

fn tables(function: GatewayFunction) -> Option<&'static FunctionTable> {
    match function {
        GatewayFunction::ChatComplete => Some(&CHAT),
        GatewayFunction::Complete => Some(&COMPLETION),
        _ => None,
    }
}

/// `OpenRouter` asks callers to identify themselves for its leaderboards
fn attribution_headers(_ctx: &ApiContext<'_>, headers: &mut HeaderMap) -> Result<(), GatewayError> {
    put_header(headers, "http-referer", "https://plexus.omni.dev")?;
    put_header(headers, "x-title", "Plexus")?;
    Ok(())
}

/// `OpenRouter` adapter instance
pub static ADAPTER: OpenAiLikeAdapter = OpenAiLikeAdapter(OpenAiLikeSpec {
    id: ProviderId::Openrouter,
    default_base_url: "https://openrouter.ai/api/v1",
    tables,
    parse_policy: StreamParsePolicy::Lenient,
    extra_headers: Some(attribution_headers),
});
