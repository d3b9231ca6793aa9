//! JSON error responses for the `/api` routes.
//!
//! Every failure body has the shape `{"error": "<message>"}`.  Upstream
//! detail is logged, never returned to the browser.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::application::{RateLimited, SnapshotError};

/// Errors returned by the `/api` routes.  Each maps to a status code and a
/// `{"error": ...}` body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("rate limited: {0}")]
    TooManyRequests(#[from] RateLimited),

    #[error("chat log fetch failed: {0}")]
    ChatLog(SnapshotError),

    #[error("player locations fetch failed: {0}")]
    PlayerLocations(SnapshotError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::TooManyRequests(_) => (StatusCode::TOO_MANY_REQUESTS, "Too many requests"),
            ApiError::ChatLog(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Failed to fetch chat log"),
            ApiError::PlayerLocations(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to fetch player locations",
            ),
        };
        (status, Json(ErrorBody { error })).into_response()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
