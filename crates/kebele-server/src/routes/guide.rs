//! Guided question answering.

use axum::{Json, extract::State};
use kebele_ai::{ChatSource, ProcedureRef};
use serde::{Deserialize, Serialize};

use crate::error::ServerError;
use crate::identity::UserId;
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Request/Response Types
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for `POST /ai/guide`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GuideRequest {
    /// The citizen's question.
    pub query: String,
}

/// Response body for `POST /ai/guide`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuideResponse {
    /// Generated answer.
    pub answer: String,
    /// `official` when grounded on procedures, `unofficial` otherwise.
    pub source: ChatSource,
    /// Procedures the answer was grounded on.
    pub related: Vec<ProcedureRef>,
    /// Language the answer was written in.
    pub language: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /ai/guide - Answer a question from official procedures when possible.
pub async fn guide_handler(
    State(state): State<AppState>,
    user: UserId,
    Json(request): Json<GuideRequest>,
) -> Result<Json<GuideResponse>, ServerError> {
    let ctx = state.request_context();
    // A dropped connection drops this future; cancel anything still running
    let _cancel_on_drop = ctx.cancellation().clone().drop_guard();

    let outcome = state
        .guide
        .answer_detailed(&ctx, user.as_str(), &request.query)
        .await?;

    Ok(Json(GuideResponse {
        answer: outcome.answer,
        source: outcome.source,
        related: outcome.related,
        language: outcome.language,
    }))
}
