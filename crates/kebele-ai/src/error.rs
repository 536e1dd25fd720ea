//! Error types for the guidance and translation layer.

use std::time::Duration;

use kebele_llm::LlmError;
use thiserror::Error;

/// Errors surfaced by [`GuideService`](crate::GuideService) and
/// [`StructuredTranslator`](crate::StructuredTranslator).
#[derive(Debug, Error)]
pub enum AiError {
    /// Unusable configuration, detected at construction.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Bad input, rejected before any provider call.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested target language is not in the supported set.
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// An embedding or completion provider failed.
    #[error("Provider error: {0}")]
    Llm(LlmError),

    /// The procedure index failed.
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// The chat history store failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// The model returned a different number of segments than were sent.
    #[error("Translation mismatch: sent {expected} segments, received {actual}")]
    TranslationMismatch { expected: usize, actual: usize },

    /// The caller cancelled the request.
    #[error("Request cancelled")]
    Cancelled,

    /// A deadline elapsed before the call completed.
    #[error("Request timed out after {:.2}s", .0.as_secs_f64())]
    Timeout(Duration),
}

impl AiError {
    /// Returns true if the request was abandoned (cancelled or timed out)
    /// rather than refused by a provider.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Timeout(_))
    }

    /// Returns true if the error was raised before any network call.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::UnsupportedLanguage(_)
                | Self::Llm(LlmError::InvalidRequest(_))
        )
    }
}

impl From<LlmError> for AiError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::Cancelled => AiError::Cancelled,
            LlmError::Timeout(after) => AiError::Timeout(after),
            other => AiError::Llm(other),
        }
    }
}

impl From<rusqlite::Error> for AiError {
    fn from(err: rusqlite::Error) -> Self {
        AiError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AiError {
    fn from(err: serde_json::Error) -> Self {
        AiError::Storage(format!("serialization failed: {}", err))
    }
}

/// Result type for guidance and translation operations.
pub type Result<T> = std::result::Result<T, AiError>;
