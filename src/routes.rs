//! Top-level router and the request pipeline around it.
//!
//! # Route Structure
//!
//! - `GET  /{code}`  - Short link redirect
//! - `/api/*`        - JSON API, see [`crate::api::routes`]
//!
//! Unknown paths and methods get the uniform JSON error body.

use crate::api;
use crate::api::handlers::{method_not_allowed_handler, not_found_handler, redirect_handler};
use crate::api::middleware::{BoxedHandler, Middleware};
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use tower::Layer;
use tower_http::normalize_path::{NormalizePath, NormalizePathLayer};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1 << 20;

/// All routes with their fallbacks and body limit, without middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/{code}", get(redirect_handler))
        .nest("/api", api::routes::api_routes())
        .fallback(not_found_handler)
        .method_not_allowed_fallback(method_not_allowed_handler)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Constructs the application router with trailing slashes trimmed.
pub fn app_router(state: AppState) -> NormalizePath<Router> {
    NormalizePathLayer::trim_trailing_slash().layer(router(state))
}

/// Wraps the router in the standard middleware pipeline.
pub fn app(state: AppState, middleware: &Middleware) -> BoxedHandler {
    middleware.chain().layer(app_router(state))
}
