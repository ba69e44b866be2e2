//! Perplexity (Sonar) adapter
//!
//! `OpenAI`-compatible chat with search grounding; citations ride along as
//! provider extras unless the caller asked for strict compliance.

use std::sync::LazyLock;

use plexus_core::types::{GatewayFunction, ProviderId, StreamParsePolicy};

use super::openai_like::{OpenAiLikeAdapter, OpenAiLikeSpec};
use crate::mapping::{FunctionTable, ParamSpec};
use crate::openai_compat;

static CHAT: LazyLock<FunctionTable> = LazyLock::new(|| {
    openai_compat::chat_table()
        // Sonar generates exactly one choice and takes no bias/seed knobs
        .unmap("n")
        .unmap("logit_bias")
        .unmap("seed")
        .map("top_k", ParamSpec::new("top_k").bounded(0.0, 2048.0))
});

fn tables(function: GatewayFunction) -> Option<&'static FunctionTable> {
    match function {
        GatewayFunction::ChatComplete => Some(&CHAT),
        _ => None,
    }
}

/// Perplexity adapter instance
pub static ADAPTER: OpenAiLikeAdapter = OpenAiLikeAdapter(OpenAiLikeSpec {
    id: ProviderId::Perplexity,
    default_base_url: "https://api.perplexity.ai",
    tables,
    parse_policy: StreamParsePolicy::Lenient,
    extra_headers: None,
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::ProviderAdapter;
    use http::StatusCode;
    use plexus_core::context::ApiContext;
    use plexus_core::types::{CanonicalResponse, Target};
    use serde_json::json;

    #[test]
    fn citations_surface_as_provider_extras() {
        let target = Target::for_provider(ProviderId::Perplexity);
        let body = json!({"model": "sonar", "messages": []});
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        let upstream = json!({
            "id": "ppx-1",
            "model": "sonar",
            "citations": ["https://example.com/a"],
            "choices": [{"message": {"role": "assistant", "content": "grounded"}, "finish_reason": "stop"}]
        });
        let CanonicalResponse::Chat(resp) = ADAPTER
            .transform_response(GatewayFunction::ChatComplete, &upstream, StatusCode::OK, &ctx)
            .unwrap()
        else {
            panic!("expected chat response");
        };
        let extras = resp.provider_extras.unwrap();
        assert_eq!(extras["citations"][0], "https://example.com/a");
    }

    #[test]
    fn strict_compliance_drops_citations() {
        let mut target = Target::for_provider(ProviderId::Perplexity);
        target.strict_openai_compliance = true;
        let body = json!({"model": "sonar", "messages": []});
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        let upstream = json!({
            "citations": ["https://example.com/a"],
            "choices": [{"message": {"role": "assistant", "content": "x"}}]
        });
        let CanonicalResponse::Chat(resp) = ADAPTER
            .transform_response(GatewayFunction::ChatComplete, &upstream, StatusCode::OK, &ctx)
            .unwrap()
        else {
            panic!("expected chat response");
        };
        assert!(resp.provider_extras.is_none());
    }
}
