//! Mistral AI adapter (`OpenAI`-compatible, `random_seed` rename)

use std::sync::LazyLock;

use plexus_core::types::{GatewayFunction, ProviderId, StreamParsePolicy};

use super::openai_like::{OpenAiLikeAdapter, OpenAiLikeSpec};
use crate::mapping::{FunctionTable, ParamSpec};
use crate::openai_compat;

static CHAT: LazyLock<FunctionTable> = LazyLock::new(|| {
    openai_compat::chat_table()
        // Mistral's sampler tops out at 1.0 and names the seed differently
        .unmap("temperature")
        .map("temperature", ParamSpec::new("temperature").bounded(0.0, 1.0))
        .unmap("seed")
        .map("seed", ParamSpec::new("random_seed"))
        .unmap("logit_bias")
});

static EMBED: LazyLock<FunctionTable> = LazyLock::new(openai_compat::embed_table);

fn tables(function: GatewayFunction) -> Option<&'static FunctionTable> {
    match function {
        GatewayFunction::ChatComplete => Some(&CHAT),
        GatewayFunction::Embed => Some(&EMBED),
        _ => None,
    }
}

/// Mistral adapter instance
pub static ADAPTER: OpenAiLikeAdapter = OpenAiLikeAdapter(OpenAiLikeSpec {
    id: ProviderId::Mistral,
    default_base_url: "https://api.mistral.ai/v1",
    tables,
    parse_policy: StreamParsePolicy::Lenient,
    extra_headers: None,
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::build_request;
    use plexus_core::error::GatewayError;
    use plexus_core::types::Target;
    use serde_json::json;

    #[test]
    fn seed_renames_to_random_seed() {
        let target = Target::for_provider(ProviderId::Mistral);
        let body = json!({
            "model": "mistral-small-latest",
            "messages": [{"role": "user", "content": "hi"}],
            "seed": 42
        });
        let out = build_request(ProviderId::Mistral, &CHAT, &body, &target).unwrap();
        assert_eq!(out["random_seed"], 42);
        assert!(!out.contains_key("seed"));
    }

    #[test]
    fn temperature_above_one_is_rejected() {
        let target = Target::for_provider(ProviderId::Mistral);
        let body = json!({
            "model": "mistral-small-latest",
            "messages": [{"role": "user", "content": "hi"}],
            "temperature": 1.4
        });
        let err = build_request(ProviderId::Mistral, &CHAT, &body, &target).unwrap_err();
        assert!(matches!(err, GatewayError::ParameterOutOfRange { .. }));
    }
}
