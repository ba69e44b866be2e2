//! Together AI adapter (`OpenAI`-compatible, widest function coverage)

use std::sync::LazyLock;

use plexus_core::types::{GatewayFunction, ProviderId, StreamParsePolicy};

use super::openai_like::{OpenAiLikeAdapter, OpenAiLikeSpec};
use crate::mapping::{FunctionTable, ParamSpec};
use crate::openai_compat;

static CHAT: LazyLock<FunctionTable> = LazyLock::new(|| {
    // Together documents clamping for top_k rather than rejecting
    openai_compat::chat_table().map("top_k", ParamSpec::new("top_k").clamped(1.0, 100.0))
});

static COMPLETION: LazyLock<FunctionTable> = LazyLock::new(openai_compat::completion_table);
static EMBED: LazyLock<FunctionTable> = LazyLock::new(openai_compat::embed_table);
static IMAGE: LazyLock<FunctionTable> = LazyLock::new(openai_compat::image_table);

fn tables(function: GatewayFunction) -> Option<&'static FunctionTable> {
    match function {
        GatewayFunction::ChatComplete => Some(&CHAT),
        GatewayFunction::Complete => Some(&COMPLETION),
        GatewayFunction::Embed => Some(&EMBED),
        GatewayFunction::ImageGenerate => Some(&IMAGE),
        _ => None,
    }
}

/// Together adapter instance
pub static ADAPTER: OpenAiLikeAdapter = OpenAiLikeAdapter(OpenAiLikeSpec {
    id: ProviderId::Together,
    default_base_url: "https://api.together.xyz/v1",
    tables,
    parse_policy: StreamParsePolicy::Lenient,
    extra_headers: None,
});
