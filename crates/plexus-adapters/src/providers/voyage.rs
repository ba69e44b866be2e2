//! Voyage AI adapter (embeddings only)
//!
//! `OpenAI`-shaped embeddings endpoint; usage arrives as a bare
//! `total_tokens`, which the shared transform synthesizes into full usage.

use std::sync::LazyLock;

use plexus_core::types::{GatewayFunction, ProviderId, StreamParsePolicy};

use super::openai_like::{OpenAiLikeAdapter, OpenAiLikeSpec};
use crate::mapping::{FunctionTable, ParamSpec};

static EMBED: LazyLock<FunctionTable> = LazyLock::new(|| {
    FunctionTable::new()
        .map("model", ParamSpec::new("model").required())
        .map("input", ParamSpec::new("input").required())
        .map("dimensions", ParamSpec::new("output_dimension"))
        .map("encoding_format", ParamSpec::new("encoding_format"))
});

fn tables(function: GatewayFunction) -> Option<&'static FunctionTable> {
    match function {
        GatewayFunction::Embed => Some(&EMBED),
        _ => None,
    }
}

/// Voyage adapter instance
pub static ADAPTER: OpenAiLikeAdapter = OpenAiLikeAdapter(OpenAiLikeSpec {
    id: ProviderId::Voyage,
    default_base_url: "https://api.voyageai.com/v1",
    tables,
    parse_policy: StreamParsePolicy::Lenient,
    extra_headers: None,
});
