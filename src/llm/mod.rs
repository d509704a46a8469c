//! Text-generation collaborators
//!
//! The core only needs "prompt in, text out, may fail". `TextGenerator` is that
//! seam; `GeminiClient` is the online implementation and `DisabledGenerator`
//! stands in when the service is switched off so every caller takes its
//! documented fallback.

mod gemini;

pub use gemini::GeminiClient;

use thiserror::Error;

/// Errors from text-generation calls
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("missing API key: {0}")]
    MissingApiKey(String),

    #[error("text generation is disabled")]
    Disabled,
}

/// Anything that turns a prompt into text
pub trait TextGenerator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Generator used when the LLM is disabled; every call fails
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGenerator;

impl TextGenerator for DisabledGenerator {
    fn generate(&self, _prompt: &str) -> Result<String, LlmError> {
        Err(LlmError::Disabled)
    }
}

impl<T: TextGenerator + ?Sized> TextGenerator for std::sync::Arc<T> {
    fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        (**self).generate(prompt)
    }
}
