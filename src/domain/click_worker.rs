//! Background worker applying queued click events.

use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};

use crate::domain::click_event::ClickEvent;
use crate::domain::repositories::UrlRepository;
use crate::error::AppError;

const MAX_RETRIES: usize = 3;

/// Drains the click channel until every sender is dropped.
///
/// Each event is applied on its own task, at most `concurrency` at a time.
/// Failed increments are retried with jittered exponential backoff; unknown
/// codes are not retried. Events that still fail are logged and dropped.
pub async fn run_click_worker<R>(
    mut rx: mpsc::Receiver<ClickEvent>,
    repository: Arc<R>,
    concurrency: usize,
) where
    R: UrlRepository + 'static,
{
    let permits = Arc::new(Semaphore::new(concurrency.max(1)));

    while let Some(event) = rx.recv().await {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            break;
        };
        let repository = repository.clone();

        tokio::spawn(async move {
            let _permit = permit;
            apply_click(repository.as_ref(), &event).await;
        });
    }

    // Wait for in-flight increments before returning.
    let _ = permits.acquire_many(concurrency.max(1) as u32).await;
    tracing::info!("Click worker stopped");
}

async fn apply_click<R: UrlRepository + ?Sized>(repository: &R, event: &ClickEvent) {
    let strategy = ExponentialBackoff::from_millis(10)
        .max_delay(std::time::Duration::from_millis(500))
        .map(jitter)
        .take(MAX_RETRIES);

    let code = event.code.as_str();
    let result = RetryIf::spawn(
        strategy,
        move || repository.increment_clicks(code),
        |e: &AppError| !matches!(e, AppError::NotFound(_)),
    )
    .await;

    match result {
        Ok(()) => {
            tracing::debug!(code = %event.code, "Click recorded");
        }
        Err(AppError::NotFound(_)) => {
            tracing::warn!(code = %event.code, "Click for unknown code dropped");
        }
        Err(e) => {
            metrics::counter!("click_events_failed_total").increment(1);
            tracing::error!(code = %event.code, error = %e, "Failed to record click");
        }
    }
}
