//! Error taxonomy shared by every pipeline stage.

use thiserror::Error;

/// Failures that abort a pipeline request.
///
/// Retrieval is the only stage that swallows these (it degrades to an
/// empty context); every other stage propagates them unchanged to the
/// caller. Nothing is retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// An embedding, language model, or vector store call failed
    /// (network, authentication, quota, malformed response).
    #[error("provider error: {0}")]
    Provider(String),

    /// The document's file extension is not on the allow-list.
    #[error("unsupported document format: {0}")]
    UnsupportedFormat(String),

    /// Required credentials or endpoints are missing, or parameters are invalid.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl PipelineError {
    pub fn provider(msg: impl Into<String>) -> Self {
        PipelineError::Provider(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        PipelineError::Configuration(msg.into())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::Provider(format!("malformed payload: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
