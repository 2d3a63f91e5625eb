//! Advisory bridge to an external language-model service.
//!
//! The service is reached through [`LlmClient`]; [`OllamaClient`] talks to
//! an Ollama-compatible HTTP endpoint and [`MockLlmClient`] replays
//! scripted replies. [`AdvisoryBridge`] never lets a service failure
//! escape: chat falls back to a fixed message, scheme search to an empty
//! list.

pub mod bridge;
pub mod ollama;
pub mod prompt;
pub mod schemes;

pub use bridge::{AdvisoryBridge, ASK_EMPTY_REPLY, ASK_FALLBACK};
pub use ollama::{MockLlmClient, OllamaClient};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdvisoryError {
    #[error("Advisory service is not reachable at {0}")]
    Connection(String),

    #[error("Advisory service returned error (status {status}): {body}")]
    Service { status: u16, body: String },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("No JSON found in advisory reply")]
    NoJson,
}

/// One generation call.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    pub model: &'a str,
    pub prompt: &'a str,
    pub system: &'a str,
    /// Sampling temperature; the service default when `None`.
    pub temperature: Option<f32>,
    /// JSON schema the reply must follow.
    pub format: Option<&'a serde_json::Value>,
}

impl<'a> GenerateRequest<'a> {
    pub fn new(model: &'a str, prompt: &'a str, system: &'a str) -> Self {
        Self {
            model,
            prompt,
            system,
            temperature: None,
            format: None,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn format(mut self, schema: &'a serde_json::Value) -> Self {
        self.format = Some(schema);
        self
    }
}

/// Language-model client abstraction (allows mocking).
pub trait LlmClient {
    fn generate(&self, request: &GenerateRequest<'_>) -> Result<String, AdvisoryError>;

    fn list_models(&self) -> Result<Vec<String>, AdvisoryError>;

    fn is_model_available(&self, model: &str) -> Result<bool, AdvisoryError> {
        Ok(self.list_models()?.iter().any(|m| m.starts_with(model)))
    }
}
