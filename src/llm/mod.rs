//! Chat-completion providers behind a shared structured-output interface.
//!
//! Extraction, merging, and narration all run on top of [`ChatClient`]; the
//! concrete adapters talk to a local Ollama runtime or to the Mistral platform
//! API. Both decode to plain strings so callers own the schema validation.

pub mod mistral;
pub mod ollama;

pub use mistral::{MistralClient, MistralError, OcrPage, OcrResult};
pub use ollama::OllamaChatClient;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by chat-completion providers.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Provider was unreachable or refused the connection.
    #[error("Chat provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate completion: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Interface implemented by chat-completion providers.
///
/// Sampling is pinned provider-side to temperature 0.0 and top-p 0.9 so repeated
/// extraction runs stay stable.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Run one completion constrained to `schema`, returning the raw JSON text.
    async fn complete_structured(
        &self,
        prompt: &str,
        schema: &Value,
    ) -> Result<String, ChatError>;

    /// Run one free-form completion, returning the generated text.
    async fn complete_text(&self, prompt: &str) -> Result<String, ChatError>;
}
