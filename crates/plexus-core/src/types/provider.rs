use serde::{Deserialize, Serialize};

/// Identifier of a supported upstream provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProviderId {
    /// `OpenAI` platform API
    Openai,
    /// Azure-hosted `OpenAI` deployments
    #[serde(rename = "azure-openai")]
    #[strum(serialize = "azure-openai")]
    AzureOpenai,
    /// Anthropic Messages API
    Anthropic,
    /// Google Generative Language API (Gemini)
    Google,
    /// Cohere v1 API
    Cohere,
    /// Mistral AI platform
    Mistral,
    /// Groq cloud
    Groq,
    /// Together AI
    Together,
    /// Fireworks AI
    Fireworks,
    /// Perplexity (Sonar)
    Perplexity,
    /// `DeepInfra`
    Deepinfra,
    /// Anyscale Endpoints
    Anyscale,
    /// `DeepSeek` platform
    Deepseek,
    /// xAI (Grok)
    Xai,
    /// `OpenRouter` aggregator
    Openrouter,
    /// Moonshot AI (Kimi)
    Moonshot,
    /// Local Ollama inference server
    Ollama,
    /// Voyage AI embeddings
    Voyage,
    /// Jina AI embeddings
    Jina,
    /// Nomic Atlas embeddings
    Nomic,
}

impl ProviderId {
    /// Every provider the registry knows about
    pub const ALL: [Self; 20] = [
        Self::Openai,
        Self::AzureOpenai,
        Self::Anthropic,
        Self::Google,
        Self::Cohere,
        Self::Mistral,
        Self::Groq,
        Self::Together,
        Self::Fireworks,
        Self::Perplexity,
        Self::Deepinfra,
        Self::Anyscale,
        Self::Deepseek,
        Self::Xai,
        Self::Openrouter,
        Self::Moonshot,
        Self::Ollama,
        Self::Voyage,
        Self::Jina,
        Self::Nomic,
    ];
}
