//! `DeepInfra` adapter (`OpenAI`-compatible under `/v1/openai`)

use std::sync::LazyLock;

use plexus_core::types::{GatewayFunction, ProviderId, StreamParsePolicy};

use super::openai_like::{OpenAiLikeAdapter, OpenAiLikeSpec};
use crate::mapping::FunctionTable;
use crate::openai_compat;

static CHAT: LazyLock<FunctionTable> = LazyLock::new(openai_compat::chat_table);
static EMBED: LazyLock<FunctionTable> = LazyLock::new(openai_compat::embed_table);

fn tables(function: GatewayFunction) -> Option<&'static FunctionTable> {
    match function {
        GatewayFunction::ChatComplete => Some(&CHAT),
        GatewayFunction::Embed => Some(&EMBED),
        _ => None,
    }
}

/// `DeepInfra` adapter instance
pub static ADAPTER: OpenAiLikeAdapter = OpenAiLikeAdapter(OpenAiLikeSpec {
    id: ProviderId::Deepinfra,
    default_base_url: "https://api.deepinfra.com/v1/openai",
    tables,
    parse_policy: StreamParsePolicy::Lenient,
    extra_headers: None,
});
