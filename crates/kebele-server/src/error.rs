//! Error types for the server.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use kebele_ai::AiError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Server error type.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The caller did not identify themselves.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Guidance or translation error.
    #[error(transparent)]
    Ai(#[from] AiError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

impl ServerError {
    /// HTTP status and error code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::RateLimitExceeded => {
                (StatusCode::TOO_MANY_REQUESTS, "rate_limit_exceeded")
            }
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            ServerError::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error")
            }
            ServerError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            ServerError::Ai(e) => match e {
                AiError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
                AiError::UnsupportedLanguage(_) => {
                    (StatusCode::BAD_REQUEST, "unsupported_language")
                }
                AiError::Llm(_) => (StatusCode::BAD_GATEWAY, "provider_error"),
                AiError::TranslationMismatch { .. } => {
                    (StatusCode::BAD_GATEWAY, "translation_mismatch")
                }
                AiError::Retrieval(_) => (StatusCode::SERVICE_UNAVAILABLE, "retrieval_error"),
                AiError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
                AiError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
                AiError::Cancelled => (StatusCode::REQUEST_TIMEOUT, "request_cancelled"),
                AiError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, code, error = %message, "Server error");
        } else {
            tracing::warn!(status = %status, code, error = %message, "Client error");
        }

        let body = ErrorResponse {
            code: code.to_string(),
            message,
        };

        (status, Json(body)).into_response()
    }
}
