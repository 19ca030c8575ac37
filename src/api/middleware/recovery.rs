//! Panic recovery.
//!
//! A panic anywhere below this stage becomes a `500` JSON response instead
//! of tearing down the connection task. The panic is logged with the
//! request's correlation id, its location and a backtrace.
//!
//! A panic raised while the recovery itself runs is not caught again; it
//! only aborts that request's task.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Once;
use std::task::{Context, Poll};

use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures_util::FutureExt;

use super::request_id::RequestId;
use crate::error::AppError;

struct PanicReport {
    location: String,
    backtrace: Backtrace,
}

thread_local! {
    static GUARDED: Cell<bool> = const { Cell::new(false) };
    static LAST_PANIC: RefCell<Option<PanicReport>> = const { RefCell::new(None) };
}

/// Installs a process-wide panic hook that captures backtraces for panics
/// raised under the recovery stage.
///
/// Panics elsewhere still go to the previously installed hook. Calling this
/// more than once has no further effect.
pub fn install_panic_hook() {
    static INSTALL: Once = Once::new();

    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !GUARDED.with(Cell::get) {
                previous(info);
                return;
            }

            let report = PanicReport {
                location: info
                    .location()
                    .map(|l| l.to_string())
                    .unwrap_or_else(|| "<unknown>".to_string()),
                backtrace: Backtrace::force_capture(),
            };
            LAST_PANIC.with(|slot| *slot.borrow_mut() = Some(report));
        }));
    });
}

/// Marks the current thread as guarded while the inner future is polled.
struct Guarded<F> {
    inner: Pin<Box<F>>,
}

struct GuardFlag(bool);

impl GuardFlag {
    fn enter() -> Self {
        let nested = GUARDED.with(|flag| flag.replace(true));
        if !nested {
            // A report left by a panic caught further down belongs to no barrier.
            LAST_PANIC.with(|slot| slot.borrow_mut().take());
        }
        Self(nested)
    }
}

impl Drop for GuardFlag {
    fn drop(&mut self) {
        GUARDED.with(|flag| flag.set(self.0));
    }
}

impl<F: Future> Future for Guarded<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let _flag = GuardFlag::enter();
        self.inner.as_mut().poll(cx)
    }
}

pub async fn layer(req: Request, next: Next) -> Response {
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(RequestId::to_string)
        .unwrap_or_default();

    let guarded = Guarded {
        inner: Box::pin(next.run(req)),
    };

    match AssertUnwindSafe(guarded).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            let report = LAST_PANIC.with(|slot| slot.borrow_mut().take());
            let (location, backtrace) = match report {
                Some(report) => (report.location, report.backtrace),
                None => ("<unknown>".to_string(), Backtrace::capture()),
            };

            metrics::counter!("panics_recovered_total").increment(1);
            tracing::error!(
                request_id = %request_id,
                panic = %panic_message(payload.as_ref()),
                location = %location,
                backtrace = %backtrace,
                "Recovered from panic"
            );

            AppError::internal("internal server error").into_response()
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorBody;
    use axum::{Router, body::Body, http::StatusCode, routing::get};
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new()
            .route(
                "/panic",
                get(|| async {
                    if true {
                        panic!("handler exploded");
                    }
                    "unreachable"
                }),
            )
            .route("/ok", get(|| async { "fine" }))
            .route(
                "/swallow",
                get(|| async {
                    let caught = panic::catch_unwind(|| panic!("handled inside"));
                    assert!(caught.is_err());
                    "swallowed"
                }),
            )
            .layer(axum::middleware::from_fn(layer))
    }

    fn get_request(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        install_panic_hook();

        let response = app().oneshot(get_request("/panic")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            body,
            ErrorBody {
                error: "internal server error".to_string(),
                code: 500
            }
        );
    }

    #[tokio::test]
    async fn test_service_keeps_serving_after_panic() {
        install_panic_hook();
        let app = app();

        let first = app.clone().oneshot(get_request("/panic")).await.unwrap();
        let second = app.oneshot(get_request("/ok")).await.unwrap();

        assert_eq!(first.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(second.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_guard_flag_is_cleared_after_panic() {
        install_panic_hook();

        app().oneshot(get_request("/panic")).await.unwrap();

        assert!(!GUARDED.with(Cell::get));
        assert!(LAST_PANIC.with(|slot| slot.borrow().is_none()));
    }

    #[tokio::test]
    async fn test_report_from_caught_panic_is_discarded() {
        install_panic_hook();
        let app = app();

        let response = app.clone().oneshot(get_request("/swallow")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(LAST_PANIC.with(|slot| slot.borrow().is_some()));

        let response = app.oneshot(get_request("/ok")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(LAST_PANIC.with(|slot| slot.borrow().is_none()));
    }

    #[test]
    fn test_panic_message_variants() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(7_u32);

        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "<non-string panic payload>");
    }
}
