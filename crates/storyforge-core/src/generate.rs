//! Language model seam used by the generator stage.

use async_trait::async_trait;

use crate::error::Result;

/// Sampling settings applied to every completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2000,
        }
    }
}

/// A single completion call.
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub prompt: &'a str,
    pub settings: ModelSettings,
}

/// A backend that completes a prompt with one call.
///
/// Implementations must not retry: authentication, quota, and network
/// failures surface immediately as
/// [`PipelineError::Provider`](crate::PipelineError::Provider).
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Provider and model label for logs (e.g. `"openai:gpt-4o-mini"`).
    fn name(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest<'_>) -> Result<String>;
}
