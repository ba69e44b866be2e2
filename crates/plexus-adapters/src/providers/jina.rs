//! Jina AI adapter (embeddings only, `OpenAI`-compatible)

use std::sync::LazyLock;

use plexus_core::types::{GatewayFunction, ProviderId, StreamParsePolicy};

use super::openai_like::{OpenAiLikeAdapter, OpenAiLikeSpec};
use crate::mapping::FunctionTable;
use crate::openai_compat;

static EMBED: LazyLock<FunctionTable> = LazyLock::new(openai_compat::embed_table);

fn tables(function: GatewayFunction) -> Option<&'static FunctionTable> {
    match function {
        GatewayFunction::Embed => Some(&EMBED),
        _ => None,
    }
}

/// Jina adapter instance
pub static ADAPTER: OpenAiLikeAdapter = OpenAiLikeAdapter(OpenAiLikeSpec {
    id: ProviderId::Jina,
    default_base_url: "https://api.jina.ai/v1",
    tables,
    parse_policy: StreamParsePolicy::Lenient,
    extra_headers: None,
});
