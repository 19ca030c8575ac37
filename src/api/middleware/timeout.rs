//! Request deadline for everything behind admission.
//!
//! The deadline itself is `tower_http`'s [`TimeoutLayer`], which answers an
//! expired request with an empty `408`. [`render`] sits just outside it and
//! turns that into the uniform JSON error.

use std::time::Duration;

use axum::{
    extract::Request,
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::timeout::TimeoutLayer;

use crate::error::AppError;

/// Deadline layer answering with `408 Request Timeout`.
pub fn deadline(timeout: Duration) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout)
}

/// Renders the bare timeout response as `{"error", "code"}`.
///
/// Handlers never answer `408` themselves, so the status alone marks an
/// expired deadline.
pub async fn render(req: Request, next: Next) -> Response {
    let response = next.run(req).await;

    if response.status() == StatusCode::REQUEST_TIMEOUT {
        tracing::warn!("Request deadline exceeded");
        return AppError::Timeout.into_response();
    }

    response
}
