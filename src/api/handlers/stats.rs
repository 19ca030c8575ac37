//! Handlers for statistics endpoints.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::api::dto::stats::{GlobalStatsResponse, StatsResponse};
use crate::error::AppError;
use crate::state::AppState;

/// Returns statistics for one short URL.
///
/// # Endpoint
///
/// `GET /api/urls/{code}`
///
/// # Response
///
/// ```json
/// {
///   "code": "b",
///   "original_url": "https://example.com",
///   "clicks": 42,
///   "created_at": "2024-01-15T10:30:00Z"
/// }
/// ```
///
/// # Errors
///
/// Returns 404 Not Found if the short code doesn't exist.
pub async fn url_stats_handler(
    Path(code): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<StatsResponse>, AppError> {
    let url = state.url_service.stats(&code).await?;

    Ok(Json(url.into()))
}

/// Returns totals over all short URLs.
///
/// # Endpoint
///
/// `GET /api/stats`
pub async fn global_stats_handler(
    State(state): State<AppState>,
) -> Result<Json<GlobalStatsResponse>, AppError> {
    let stats = state.url_service.global_stats().await?;

    Ok(Json(stats.into()))
}
