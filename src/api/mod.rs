//! Generation backends.
//!
//! The pipeline only talks to the two traits below, so a run can be driven by
//! the OpenAI client or by the scripted fakes used in tests.

mod fake;
pub mod openai;

pub use fake::{FakeGenerator, FakeImageGenerator};
pub use openai::OpenAiClient;

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Error type for generation calls.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("API returned error: {status} - {message}")]
    Status { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Operation not supported: {0}")]
    Unsupported(String),

    #[error("Failed to read input '{path}': {message}")]
    Input { path: String, message: String },
}

/// Text generation: one system instruction plus one user prompt in, text out.
#[async_trait]
pub trait TextGenerator: Send + Sync + fmt::Debug {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, ApiError>;

    fn model_name(&self) -> &str;
}

/// Image generation, with an optional image-conditioned variant.
#[async_trait]
pub trait ImageGenerator: Send + Sync + fmt::Debug {
    /// Text-to-image. Returns encoded image bytes.
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, ApiError>;

    /// Image-to-image from a PNG on disk. Backends without this return
    /// [`ApiError::Unsupported`].
    async fn edit_image(&self, base_png: &Path, prompt: &str) -> Result<Vec<u8>, ApiError> {
        let _ = (base_png, prompt);
        Err(ApiError::Unsupported("image edits".to_string()))
    }
}
