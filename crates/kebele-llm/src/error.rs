//! Error types for the provider layer.

use std::time::Duration;
use thiserror::Error;

/// Result type alias using the LLM error type.
pub type Result<T> = std::result::Result<T, LlmError>;

/// Error type for embedding and completion operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Configuration error (no API keys, bad endpoint template, etc.).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid request parameters, rejected before any network call.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The provider answered with a non-success HTTP status.
    #[error("Provider error: HTTP {status} - {message}")]
    Provider {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Response body or provider error message.
        message: String,
    },

    /// Network/connectivity error.
    #[error("Network error: {0}")]
    Network(String),

    /// The provider returned a body we could not decode.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The provider returned a well-formed but empty result.
    #[error("Empty response: {0}")]
    EmptyResponse(String),

    /// The provider returned a response part that carries no text.
    #[error("Provider returned a non-text response part")]
    NonTextPart,

    /// The caller cancelled the request.
    #[error("Request cancelled")]
    Cancelled,

    /// The request exceeded its deadline.
    #[error("Request timed out after {:.2}s", .0.as_secs_f64())]
    Timeout(Duration),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LlmError {
    /// Create a provider error from a status code and message.
    pub fn provider(status: u16, message: impl Into<String>) -> Self {
        Self::Provider {
            status,
            message: message.into(),
        }
    }

    /// Returns true if the request was abandoned (cancelled or timed out)
    /// rather than refused by the provider.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Timeout(_))
    }

    /// Returns true if the provider rejected the request because of a rate limit.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Provider { status: 429, .. })
    }

    /// HTTP status carried by a provider error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        // Request URLs can carry an API key in the query string
        let err = err.without_url();
        if err.is_timeout() {
            LlmError::Network(format!("Request timed out: {}", err))
        } else if err.is_connect() {
            LlmError::Network(format!("Connection failed: {}", err))
        } else if err.is_decode() {
            LlmError::Serialization(err.to_string())
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_cancellation() {
        assert!(LlmError::Cancelled.is_cancellation());
        assert!(LlmError::Timeout(Duration::from_secs(1)).is_cancellation());
        assert!(!LlmError::provider(500, "boom").is_cancellation());
        assert!(!LlmError::Network("reset".to_string()).is_cancellation());
    }

    #[test]
    fn test_provider_status() {
        let err = LlmError::provider(429, "quota exceeded");
        assert_eq!(err.status(), Some(429));
        assert!(err.is_rate_limited());
        assert!(err.to_string().contains("HTTP 429"));

        let err = LlmError::provider(503, "unavailable");
        assert!(!err.is_rate_limited());
        assert_eq!(LlmError::NonTextPart.status(), None);
    }

    #[test]
    fn test_timeout_display() {
        let err = LlmError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "Request timed out after 1.50s");
    }
}
