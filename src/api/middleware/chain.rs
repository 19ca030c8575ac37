//! Composition of middleware stages into a single request pipeline.
//!
//! A [`Chain`] is an ordered, immutable list of [`Stage`]s. Wrapping a
//! terminal service with it yields `stage_1(stage_2(...stage_n(terminal)))`:
//! the first stage sees the request first and the response last.
//!
//! Composition happens once at startup. Requests only pay for whatever the
//! individual stages do.

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use axum::{extract::Request, response::Response};
use tower::{Layer, Service, util::BoxCloneSyncService};

/// Type-erased request handler every stage wraps and returns.
pub type BoxedHandler = BoxCloneSyncService<Request, Response, Infallible>;

/// A function wrapping one handler in another.
pub type Stage = Arc<dyn Fn(BoxedHandler) -> BoxedHandler + Send + Sync>;

/// Turns any compatible tower layer into a [`Stage`].
///
/// ```rust,ignore
/// let logging = stage(axum::middleware::from_fn(logging::layer));
/// ```
pub fn stage<L>(layer: L) -> Stage
where
    L: Layer<BoxedHandler> + Send + Sync + 'static,
    L::Service: Service<Request, Response = Response, Error = Infallible>
        + Clone
        + Send
        + Sync
        + 'static,
    <L::Service as Service<Request>>::Future: Send + 'static,
{
    Arc::new(move |inner: BoxedHandler| {
        BoxCloneSyncService::new(layer.layer(inner))
    })
}

/// Ordered, immutable pipeline of stages.
#[derive(Clone)]
pub struct Chain {
    stages: Arc<[Stage]>,
}

impl Chain {
    /// Builds a chain whose first stage is outermost.
    pub fn compose(stages: impl IntoIterator<Item = Stage>) -> Self {
        Self {
            stages: stages.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Nests every stage around `terminal`.
    pub fn wrap(&self, terminal: BoxedHandler) -> BoxedHandler {
        self.stages
            .iter()
            .rev()
            .fold(terminal, |inner, stage| stage(inner))
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("stages", &self.stages.len())
            .finish()
    }
}

impl<S> Layer<S> for Chain
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    type Service = BoxedHandler;

    fn layer(&self, inner: S) -> Self::Service {
        self.wrap(BoxCloneSyncService::new(inner))
    }
}
