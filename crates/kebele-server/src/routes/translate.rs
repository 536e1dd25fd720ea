//! On-demand document translation.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, header::CONTENT_LANGUAGE},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::boundary::{LANG_HEADER, requested_language};
use crate::error::ServerError;
use crate::state::AppState;

/// Request body for `POST /ai/translate`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranslateRequest {
    /// Any JSON document.
    pub content: Value,
}

/// Response body for `POST /ai/translate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslateResponse {
    /// The document with its prose leaves translated.
    pub content: Value,
}

/// POST /ai/translate - Translate a document into the `lang` header's language.
///
/// Unlike the response boundary, failures here are reported to the caller.
pub async fn translate_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<TranslateRequest>,
) -> Result<Response, ServerError> {
    let lang = requested_language(&headers);
    if lang.is_empty() {
        return Err(ServerError::BadRequest(format!(
            "missing {} header",
            LANG_HEADER
        )));
    }

    let ctx = state.request_context();
    let _cancel_on_drop = ctx.cancellation().clone().drop_guard();

    let content = state
        .translator
        .translate_document(&ctx, &request.content, &lang)
        .await?;

    let mut response = Json(TranslateResponse { content }).into_response();
    if let Ok(value) = HeaderValue::from_str(&lang) {
        response.headers_mut().insert(CONTENT_LANGUAGE, value);
    }
    Ok(response)
}
