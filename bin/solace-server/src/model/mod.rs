//! Text generation backends.

pub mod gemini;

use async_trait::async_trait;
use thiserror::Error;

pub use gemini::GeminiClient;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The model API answered with a non-success status.
    #[error("model returned {status}: {message}")]
    Api { status: u16, message: String },
}

/// A single-shot text completion service.
#[async_trait]
pub trait TextModel: Send + Sync + 'static {
    /// Generate one completion for `prompt`. An empty string means the model
    /// produced nothing usable; callers decide whether that is an error.
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}
