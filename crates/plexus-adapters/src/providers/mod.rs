//! Per-provider adapter implementations

pub mod anthropic;
pub mod anyscale;
pub mod azure;
pub mod cohere;
pub mod deepinfra;
pub mod deepseek;
pub mod fireworks;
pub mod google;
pub mod groq;
pub mod jina;
pub mod mistral;
pub mod moonshot;
pub mod nomic;
pub mod ollama;
pub mod openai;
pub mod openai_like;
pub mod openrouter;
pub mod perplexity;
pub mod together;
pub mod voyage;
pub mod xai;
