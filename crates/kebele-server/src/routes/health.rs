//! Liveness endpoint.
//!
//! Also reports which `lang` values the translation boundary accepts, so a
//! gateway can validate the header before forwarding.

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always `ok` when the process answers.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Language responses are authored in.
    pub source_language: String,
    /// Accepted `lang` header values.
    pub languages: Vec<String>,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        source_language: state.translator.source_language().to_string(),
        languages: state.translator.supported_languages().to_vec(),
    })
}

/// Routes served outside the `/ai` middleware stack.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
