//! Fireworks AI adapter (`OpenAI`-compatible)

use std::sync::LazyLock;

use plexus_core::types::{GatewayFunction, ProviderId, StreamParsePolicy};

use super::openai_like::{OpenAiLikeAdapter, OpenAiLikeSpec};
use crate::mapping::{FunctionTable, ParamSpec};
use crate::openai_compat;

static CHAT: LazyLock<FunctionTable> =
    LazyLock::new(|| openai_compat::chat_table().map("top_k", ParamSpec::new("top_k").bounded(1.0, 128.0)));
static COMPLETION: LazyLock<FunctionTable> = LazyLock::new(openai_compat::completion_table);
static EMBED: LazyLock<FunctionTable> = LazyLock::new(openai_compat::embed_table);

fn tables(function: GatewayFunction) -> Option<&'static FunctionTable> {
    match function {
        GatewayFunction::ChatComplete => Some(&CHAT),
        GatewayFunction::Complete => Some(&COMPLETION),
        GatewayFunction::Embed => Some(&EMBED),
        _ => None,
    }
}

/// Fireworks adapter instance
pub static ADAPTER: OpenAiLikeAdapter = OpenAiLikeAdapter(OpenAiLikeSpec {
    id: ProviderId::Fireworks,
    default_base_url: "https://api.fireworks.ai/inference/v1",
    tables,
    parse_policy: StreamParsePolicy::Lenient,
    extra_headers: None,
});
