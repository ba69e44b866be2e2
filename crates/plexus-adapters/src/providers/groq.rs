//! Groq cloud adapter (`OpenAI`-compatible, chat only, single choice)

use std::sync::LazyLock;

use plexus_core::types::{GatewayFunction, ProviderId, StreamParsePolicy};

use super::openai_like::{OpenAiLikeAdapter, OpenAiLikeSpec};
use crate::mapping::{FunctionTable, ParamSpec};
use crate::openai_compat;

static CHAT: LazyLock<FunctionTable> = LazyLock::new(|| {
    openai_compat::chat_table()
        // Groq only generates one choice per request
        .unmap("n")
        .map("n", ParamSpec::new("n").bounded(1.0, 1.0))
        .unmap("logit_bias")
});

fn tables(function: GatewayFunction) -> Option<&'static FunctionTable> {
    match function {
        GatewayFunction::ChatComplete => Some(&CHAT),
        _ => None,
    }
}

/// Groq adapter instance
pub static ADAPTER: OpenAiLikeAdapter = OpenAiLikeAdapter(OpenAiLikeSpec {
    id: ProviderId::Groq,
    default_base_url: "https://api.groq.com/openai/v1",
    tables,
    parse_policy: StreamParsePolicy::Lenient,
    extra_headers: None,
});
