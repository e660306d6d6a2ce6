pub mod chat;
pub mod health;
pub mod story;

use axum::http::HeaderMap;

use lexio_learn::UserRef;

use crate::error::{ApiError, ApiResult};

/// Caller identity from gateway-verified headers. Token verification itself
/// lives in front of this service.
pub fn caller(headers: &HeaderMap) -> ApiResult<UserRef> {
    let id = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing X-User-Id header".to_string()))?;
    let username = headers
        .get("x-username")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(id);
    Ok(UserRef::new(id, username))
}
