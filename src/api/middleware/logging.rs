//! Structured access logging.
//!
//! One log event per request, emitted when the response body is finished or
//! dropped, so the status and byte count are the ones actually sent.
//!
//! ```text
//! INFO Request completed request_id=b method=GET path=/b status=301 latency_us=412 bytes=0
//! ```

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{Method, StatusCode},
    middleware::Next,
    response::Response,
};
use http_body::{Frame, SizeHint};

use super::request_id::RequestId;

pub async fn layer(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(RequestId::to_string)
        .unwrap_or_default();
    let method = req.method().clone();
    let path = req.uri().path().to_owned();

    let response = next.run(req).await;

    let record = AccessRecord {
        request_id,
        method,
        path,
        status: response.status(),
        started,
        bytes: 0,
    };

    response.map(|inner| Body::new(CountingBody { inner, record }))
}

/// Fields of one access log line, emitted on drop.
#[derive(Debug)]
struct AccessRecord {
    request_id: String,
    method: Method,
    path: String,
    status: StatusCode,
    started: Instant,
    bytes: u64,
}

impl Drop for AccessRecord {
    fn drop(&mut self) {
        let latency_us = u64::try_from(self.started.elapsed().as_micros()).unwrap_or(u64::MAX);
        let status = self.status.as_u16();

        if self.status.is_server_error() {
            tracing::error!(
                request_id = %self.request_id,
                method = %self.method,
                path = %self.path,
                status,
                latency_us,
                bytes = self.bytes,
                "Request completed"
            );
        } else {
            tracing::info!(
                request_id = %self.request_id,
                method = %self.method,
                path = %self.path,
                status,
                latency_us,
                bytes = self.bytes,
                "Request completed"
            );
        }
    }
}

/// Response body that counts the data bytes passing through it.
struct CountingBody {
    inner: Body,
    record: AccessRecord,
}

impl http_body::Body for CountingBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = &mut *self;
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        if let Poll::Ready(Some(Ok(frame))) = &polled
            && let Some(data) = frame.data_ref()
        {
            this.record.bytes += data.len() as u64;
        }

        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}
