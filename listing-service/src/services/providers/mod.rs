//! Text generation providers.
//!
//! The analysis pipeline only needs "prompt in, text out"; the trait keeps the
//! Gemini client swappable in tests.

pub mod gemini;

pub use gemini::GeminiTextProvider;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Result of a provider call.
#[derive(Debug, Clone, Default)]
pub struct ProviderResponse {
    /// First candidate's text, if the model produced any.
    pub text: Option<String>,
    pub input_tokens: i32,
    pub output_tokens: i32,
}

#[derive(Debug, Clone, Default)]
pub struct GenerationParams {
    pub temperature: Option<f32>,
    pub max_tokens: Option<i32>,
    /// Ask for a specific output encoding, e.g. `application/json`.
    pub response_mime_type: Option<String>,
}

#[async_trait]
pub trait TextProvider: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError>;
}
