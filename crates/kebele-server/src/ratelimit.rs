//! Request gate and request logging middleware.
//!
//! The gate is a single global quota in front of the `/ai` routes; the
//! sliding-window limiter of the surrounding platform sits upstream of it.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Request, State},
    http::header::CONTENT_LANGUAGE,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    Quota, RateLimiter,
    state::{InMemoryState, NotKeyed},
};

use crate::boundary::requested_language;
use crate::error::ServerError;
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Rate limiter type alias (uses default clock).
pub type SharedRateLimiter =
    Arc<RateLimiter<NotKeyed, InMemoryState, governor::clock::DefaultClock>>;

/// Quota used when the configured rate is zero.
const FALLBACK_RPM: NonZeroU32 = NonZeroU32::MIN.saturating_add(59);

/// Create a rate limiter with the specified requests per minute.
pub fn create_rate_limiter(requests_per_minute: u32) -> SharedRateLimiter {
    let rpm = NonZeroU32::new(requests_per_minute).unwrap_or(FALLBACK_RPM);
    Arc::new(RateLimiter::direct(Quota::per_minute(rpm)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Middleware
// ─────────────────────────────────────────────────────────────────────────────

/// Reject requests beyond the configured quota with 429.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.rate_limiting {
        return next.run(request).await;
    }

    match state.limiter.check() {
        Ok(_) => next.run(request).await,
        Err(_not_until) => {
            let retry_after = 1u64;
            tracing::warn!(
                path = %request.uri().path(),
                retry_after_seconds = retry_after,
                "Rate limit exceeded"
            );

            let mut response = ServerError::RateLimitExceeded.into_response();
            response
                .headers_mut()
                .insert("retry-after", retry_after.into());
            response
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Structured request logging middleware.
///
/// Logs method, path, status and duration, plus the requested `lang` and
/// the language the response actually went out in.
pub async fn request_logging_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.request_logging {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let lang = requested_language(request.headers());
    let start = Instant::now();

    let response = next.run(request).await;

    let duration_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();
    let served = response
        .headers()
        .get(CONTENT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(state.translator.source_language())
        .to_string();

    match status {
        500.. => tracing::error!(%method, %path, status, duration_ms, %lang, %served, "Request failed"),
        400..=499 => tracing::warn!(%method, %path, status, duration_ms, %lang, %served, "Request rejected"),
        _ => tracing::info!(%method, %path, status, duration_ms, %lang, %served, "Request completed"),
    }

    response
}
