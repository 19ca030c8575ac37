//! HTTP middleware stages and the pipeline built from them.
//!
//! Every request passes the stages outermost first:
//!
//! ```text
//! request_id -> logging -> recovery -> cors -> rate_limit -> timeout -> router
//! ```
//!
//! The access log therefore sees the correlation id and the final status,
//! including the `500` produced by recovery. Recovery wraps CORS, admission
//! and every handler. The deadline covers only admitted requests.

pub mod chain;
pub mod cors;
pub mod logging;
pub mod rate_limit;
pub mod recovery;
pub mod request_id;
pub mod timeout;

use std::sync::Arc;
use std::time::Duration;

use axum::middleware::{from_fn, from_fn_with_state};

pub use chain::{BoxedHandler, Chain, Stage, stage};
pub use cors::CorsPolicy;
pub use rate_limit::{RateLimitState, RateLimiter};
pub use request_id::{RequestId, RequestIdGenerator};

/// Shared state of the standard stages.
#[derive(Debug, Clone)]
pub struct Middleware {
    pub request_ids: RequestIdGenerator,
    pub cors: Arc<CorsPolicy>,
    pub rate_limit: RateLimitState,
    /// Deadline for an admitted request to produce its response head.
    pub request_timeout: Duration,
}

impl Middleware {
    /// Composes the standard stages in their fixed order.
    pub fn chain(&self) -> Chain {
        Chain::compose([
            stage(from_fn_with_state(self.request_ids.clone(), request_id::layer)),
            stage(from_fn(logging::layer)),
            stage(from_fn(recovery::layer)),
            stage(from_fn_with_state(self.cors.clone(), cors::layer)),
            stage(from_fn_with_state(self.rate_limit.clone(), rate_limit::layer)),
            stage(from_fn(timeout::render)),
            stage(timeout::deadline(self.request_timeout)),
        ])
    }
}
