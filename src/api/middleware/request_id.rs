//! Request correlation ids.
//!
//! Every request gets an id that is echoed in the response header and stored
//! in the request extensions for later stages and handlers. An id sent by an
//! upstream proxy in the same header is reused verbatim; otherwise a new one
//! is generated from a process-wide counter.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use crate::utils::base62;

/// Default correlation header.
pub const DEFAULT_HEADER: &str = "x-request-id";

/// Correlation id of one request. Immutable once assigned.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(Arc<str>);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(value: &str) -> Self {
        Self(Arc::from(value))
    }
}

/// Generates unique base62 ids and knows which header carries them.
#[derive(Debug, Clone)]
pub struct RequestIdGenerator {
    counter: Arc<AtomicU64>,
    header: HeaderName,
}

impl RequestIdGenerator {
    pub fn new(header: HeaderName) -> Self {
        Self {
            counter: Arc::new(AtomicU64::new(0)),
            header,
        }
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    /// Returns the next id. Never repeats within the process lifetime.
    pub fn next_id(&self) -> RequestId {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        RequestId(Arc::from(base62::encode(n)))
    }

    fn inbound(&self, req: &Request) -> Option<RequestId> {
        req.headers()
            .get(&self.header)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .map(RequestId::from)
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new(HeaderName::from_static(DEFAULT_HEADER))
    }
}

/// Assigns the correlation id and runs the rest of the pipeline inside a
/// `request` span carrying it.
pub async fn layer(State(ids): State<RequestIdGenerator>, mut req: Request, next: Next) -> Response {
    let id = match ids.inbound(&req) {
        Some(id) => id,
        None => {
            let id = ids.next_id();
            if let Ok(value) = HeaderValue::from_str(id.as_str()) {
                req.headers_mut().insert(ids.header.clone(), value);
            }
            id
        }
    };

    req.extensions_mut().insert(id.clone());

    let span = tracing::info_span!("request", request_id = %id);
    let mut response = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(id.as_str()) {
        response.headers_mut().insert(ids.header.clone(), value);
    }

    response
}
