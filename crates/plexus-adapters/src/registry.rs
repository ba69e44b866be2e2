//! Provider registry
//!
//! Exhaustive mapping from provider id to its adapter. Adapters are
//! stateless statics, so the registry is just a match: adding a provider
//! without wiring it here fails to compile.

use plexus_core::types::ProviderId;

use crate::adapter::ProviderAdapter;
use crate::providers;

/// Look up the adapter for a provider
pub fn adapter(id: ProviderId) -> &'static dyn ProviderAdapter {
    match id {
        ProviderId::Openai => &providers::openai::OpenaiAdapter,
        ProviderId::AzureOpenai => &providers::azure::AzureAdapter,
        ProviderId::Anthropic => &providers::anthropic::AnthropicAdapter,
        ProviderId::Google => &providers::google::GoogleAdapter,
        ProviderId::Cohere => &providers::cohere::CohereAdapter,
        ProviderId::Mistral => &providers::mistral::ADAPTER,
        ProviderId::Groq => &providers::groq::ADAPTER,
        ProviderId::Together => &providers::together::ADAPTER,
        ProviderId::Fireworks => &providers::fireworks::ADAPTER,
        ProviderId::Perplexity => &providers::perplexity::ADAPTER,
        ProviderId::Deepinfra => &providers::deepinfra::ADAPTER,
        ProviderId::Anyscale => &providers::anyscale::ADAPTER,
        ProviderId::Deepseek => &providers::deepseek::ADAPTER,
        ProviderId::Xai => &providers::xai::ADAPTER,
        ProviderId::Openrouter => &providers::openrouter::ADAPTER,
        ProviderId::Moonshot => &providers::moonshot::ADAPTER,
        ProviderId::Ollama => &providers::ollama::OllamaAdapter,
        ProviderId::Voyage => &providers::voyage::ADAPTER,
        ProviderId::Jina => &providers::jina::ADAPTER,
        ProviderId::Nomic => &providers::nomic::NomicAdapter,
    }
}
