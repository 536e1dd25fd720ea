//! The calling user's guide history.

use axum::{
    Json,
    extract::{Query, State},
};
use kebele_ai::ChatRecord;
use serde::{Deserialize, Serialize};

use crate::error::ServerError;
use crate::identity::UserId;
use crate::state::AppState;

/// Default page size.
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Query parameters for `GET /ai/history`.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryParams {
    /// 1-based page number.
    #[serde(default = "default_page")]
    pub page: usize,
    /// Records per page (clamped to 1..=100).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    DEFAULT_PAGE_SIZE
}

/// Response body for `GET /ai/history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    /// Records on this page, newest first.
    pub records: Vec<ChatRecord>,
    /// Total records across all pages.
    pub total: usize,
    /// Page served, after clamping.
    pub page: usize,
    /// Page size served, after clamping.
    pub limit: usize,
}

/// Response body for `DELETE /ai/history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearHistoryResponse {
    /// Number of records removed.
    pub deleted: usize,
}

/// GET /ai/history - Page through the caller's past questions.
pub async fn list_history_handler(
    State(state): State<AppState>,
    user: UserId,
    Query(params): Query<HistoryParams>,
) -> Result<Json<HistoryResponse>, ServerError> {
    let ctx = state.request_context();
    let page = state
        .guide
        .history(&ctx, user.as_str(), params.page, params.limit)
        .await?;

    Ok(Json(HistoryResponse {
        records: page.records,
        total: page.total,
        page: page.page,
        limit: page.limit,
    }))
}

/// DELETE /ai/history - Remove all of the caller's past questions.
pub async fn clear_history_handler(
    State(state): State<AppState>,
    user: UserId,
) -> Result<Json<ClearHistoryResponse>, ServerError> {
    let ctx = state.request_context();
    let deleted = state.guide.clear_history(&ctx, user.as_str()).await?;
    Ok(Json(ClearHistoryResponse { deleted }))
}
