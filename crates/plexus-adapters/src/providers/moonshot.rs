//! Moonshot AI (Kimi) adapter (`OpenAI`-compatible)

use std::sync::LazyLock;

use plexus_core::types::{GatewayFunction, ProviderId, StreamParsePolicy};

use super::openai_like::{OpenAiLikeAdapter, OpenAiLikeSpec};
use crate::mapping::{FunctionTable, ParamSpec};
use crate::openai_compat;

static CHAT: LazyLock<FunctionTable> = LazyLock::new(|| {
    openai_compat::chat_table()
        .unmap("temperature")
        .map("temperature", ParamSpec::new("temperature").bounded(0.0, 1.0))
        .unmap("n")
        .map("n", ParamSpec::new("n").bounded(1.0, 5.0))
});

fn tables(function: GatewayFunction) -> Option<&'static FunctionTable> {
    match function {
        GatewayFunction::ChatComplete => Some(&CHAT),
        _ => None,
    }
}

/// Moonshot adapter instance
pub static ADAPTER: OpenAiLikeAdapter = OpenAiLikeAdapter(OpenAiLikeSpec {
    id: ProviderId::Moonshot,
    default_base_url: "https://api.moonshot.cn/v1",
    tables,
    parse_policy: StreamParsePolicy::Lenient,
    extra_headers: None,
});
