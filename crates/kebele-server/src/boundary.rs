//! Response translation boundary.
//!
//! When a request carries a `lang` header naming a language other than the
//! source language, successful JSON responses are translated before they
//! leave the server. Any failure along the way sends the original body.

use axum::{
    body::{Body, Bytes, HttpBody},
    extract::{Request, State},
    http::{
        HeaderMap, HeaderValue,
        header::{CONTENT_LANGUAGE, CONTENT_LENGTH, CONTENT_TYPE},
        response::Parts,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ServerError;
use crate::state::AppState;

/// Request header naming the desired response language.
pub const LANG_HEADER: &str = "lang";

/// The requested language, trimmed and lowercased. Empty when absent.
pub fn requested_language(headers: &HeaderMap) -> String {
    headers
        .get(LANG_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_ascii_lowercase())
        .unwrap_or_default()
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| {
            let mime = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

fn already_in(headers: &HeaderMap, lang: &str) -> bool {
    headers
        .get(CONTENT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case(lang))
}

/// Translate successful JSON responses into the `lang` header's language.
pub async fn translation_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let lang = requested_language(request.headers());
    let response = next.run(request).await;

    if lang.is_empty()
        || state.translator.is_identity(&lang)
        || !response.status().is_success()
        || !is_json(response.headers())
        || already_in(response.headers(), &lang)
    {
        return response;
    }

    // Bodies that may not fit the buffer go out untouched
    let limit = state.config.max_body_size;
    match response.body().size_hint().upper() {
        Some(len) if len <= limit as u64 => {}
        len => {
            debug!(?len, limit, "Response too large to translate, sending original");
            return response;
        }
    }

    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return ServerError::Internal(format!("failed to buffer response: {}", e))
                .into_response();
        }
    };

    let doc: Value = match serde_json::from_slice(&bytes) {
        Ok(doc) => doc,
        Err(e) => {
            debug!(error = %e, "Response is not valid JSON, leaving untranslated");
            return Response::from_parts(parts, Body::from(bytes));
        }
    };

    let ctx = state.request_context();
    let _cancel_on_drop = ctx.cancellation().clone().drop_guard();

    match state.translator.translate_document(&ctx, &doc, &lang).await {
        Ok(translated) => match serde_json::to_vec(&translated) {
            Ok(body) => translated_response(parts, body, &lang),
            Err(e) => {
                warn!(error = %e, "Failed to encode translated response");
                Response::from_parts(parts, Body::from(bytes))
            }
        },
        Err(e) => {
            warn!(lang = %lang, error = %e, "Response translation failed, sending original");
            Response::from_parts(parts, Body::from(bytes))
        }
    }
}

fn translated_response(mut parts: Parts, body: Vec<u8>, lang: &str) -> Response {
    parts.headers.remove(CONTENT_LENGTH);
    if let Ok(value) = HeaderValue::from_str(lang) {
        parts.headers.insert(CONTENT_LANGUAGE, value);
    }
    Response::from_parts(parts, Body::from(Bytes::from(body)))
}
