//! Caller identity.
//!
//! Authentication happens upstream; by the time a request reaches this
//! service the gateway has put the authenticated user's id in a header.

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ServerError;

/// Header carrying the authenticated user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The calling user, taken from [`USER_ID_HEADER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ServerError::Unauthorized(format!("missing {} header", USER_ID_HEADER)))?;

        Ok(UserId(value.to_string()))
    }
}
