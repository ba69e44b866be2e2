//! `DeepSeek` adapter
//!
//! `OpenAI`-compatible; reasoner models attach `reasoning_content` to
//! messages and deltas, which the shared transform keeps or strips based on
//! the strict-compliance flag.

use std::sync::LazyLock;

use plexus_core::types::{GatewayFunction, ProviderId, StreamParsePolicy};

use super::openai_like::{OpenAiLikeAdapter, OpenAiLikeSpec};
use crate::mapping::FunctionTable;
use crate::openai_compat;

static CHAT: LazyLock<FunctionTable> = LazyLock::new(openai_compat::chat_table);

fn tables(function: GatewayFunction) -> Option<&'static FunctionTable> {
    match function {
        GatewayFunction::ChatComplete => Some(&CHAT),
        _ => None,
    }
}

/// `DeepSeek` adapter instance
pub static ADAPTER: OpenAiLikeAdapter = OpenAiLikeAdapter(OpenAiLikeSpec {
    id: ProviderId::Deepseek,
    default_base_url: "https://api.deepseek.com/v1",
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
    fn reasoning_content_is_kept_by_default() {
        let target = Target::for_provider(ProviderId::Deepseek);
        let body = json!({"model": "deepseek-reasoner", "messages": []});
        let ctx = ApiContext::new(&target, GatewayFunction::ChatComplete, &body);
        let upstream = json!({
            "choices": [{
                "message": {"role": "assistant", "content": "42", "reasoning_content": "let me think"},
                "finish_reason": "stop"
            }]
        });
        let CanonicalResponse::Chat(resp) = ADAPTER
            .transform_response(GatewayFunction::ChatComplete, &upstream, StatusCode::OK, &ctx)
            .unwrap()
        else {
            panic!("expected chat response");
        };
        assert_eq!(resp.choices[0].message.reasoning_content.as_deref(), Some("let me think"));
    }
}
