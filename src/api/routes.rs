//! API route configuration.

use crate::api::handlers::{
    global_stats_handler, health_handler, shorten_handler, url_stats_handler,
};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

/// JSON API routes, nested under `/api`.
///
/// # Endpoints
///
/// - `POST /shorten`      - Create a short URL
/// - `GET  /health`       - Database and click queue status
/// - `GET  /stats`        - Totals over all short URLs
/// - `GET  /urls/{code}`  - Statistics for one short URL
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/shorten", post(shorten_handler))
        .route("/health", get(health_handler))
        .route("/stats", get(global_stats_handler))
        .route("/urls/{code}", get(url_stats_handler))
}
