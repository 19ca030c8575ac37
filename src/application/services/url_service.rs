//! URL shortening, resolution and statistics service.

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};

use crate::domain::click_event::ClickEvent;
use crate::domain::entities::{GlobalStats, ShortUrl};
use crate::domain::repositories::UrlRepository;
use crate::error::AppError;
use crate::utils::url_validator::validate_target_url;

const NOT_FOUND_MESSAGE: &str = "short url not found";

/// Result of a successful shorten call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortenedUrl {
    pub code: String,
    pub short_url: String,
}

/// Component health as seen by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub database: Result<(), String>,
    pub click_queue_open: bool,
    pub click_queue_capacity: usize,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.database.is_ok() && self.click_queue_open
    }
}

/// Service for creating, resolving and inspecting short URLs.
///
/// Click counting is fire-and-forget: [`UrlService::resolve`] only enqueues a
/// [`ClickEvent`] and never waits for the counter update.
pub struct UrlService<R: UrlRepository> {
    repository: Arc<R>,
    base_url: String,
    click_sender: mpsc::Sender<ClickEvent>,
}

impl<R: UrlRepository> UrlService<R> {
    /// Creates a new URL service.
    ///
    /// A trailing slash on `base_url` is ignored.
    pub fn new(
        repository: Arc<R>,
        base_url: impl Into<String>,
        click_sender: mpsc::Sender<ClickEvent>,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            repository,
            base_url,
            click_sender,
        }
    }

    /// Creates a short URL, or returns the existing one for the same URL.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if the URL is empty, too long,
    /// malformed, or not HTTP(S).
    /// Returns [`AppError::Internal`] on storage errors.
    pub async fn shorten(&self, original: &str) -> Result<ShortenedUrl, AppError> {
        validate_target_url(original)?;

        let url = match self.repository.find_by_original(original).await? {
            Some(existing) => existing,
            None => {
                let created = self.repository.create(original).await?;
                tracing::info!(code = %created.code, "Short URL created");
                created
            }
        };

        Ok(ShortenedUrl {
            short_url: self.short_url(&url.code),
            code: url.code,
        })
    }

    /// Looks up the original URL for `code` and queues a click.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the code is unknown or empty.
    /// Returns [`AppError::Internal`] on storage errors.
    pub async fn resolve(&self, code: &str) -> Result<String, AppError> {
        let url = self.find(code).await?;

        match self.click_sender.try_send(ClickEvent::new(code)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                metrics::counter!("click_events_dropped_total").increment(1);
                tracing::warn!(code = %code, "Click queue full, click dropped");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::error!(code = %code, "Click queue closed, click dropped");
            }
        }

        Ok(url.original)
    }

    /// Returns the stored record for `code`, including its click count.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if the code is unknown or empty.
    /// Returns [`AppError::Internal`] on storage errors.
    pub async fn stats(&self, code: &str) -> Result<ShortUrl, AppError> {
        self.find(code).await
    }

    /// Returns aggregate statistics over all URLs.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on storage errors.
    pub async fn global_stats(&self) -> Result<GlobalStats, AppError> {
        self.repository.global_stats().await
    }

    /// Checks the database and the click queue.
    pub async fn health(&self) -> HealthReport {
        HealthReport {
            database: self.repository.ping().await.map_err(|e| e.to_string()),
            click_queue_open: !self.click_sender.is_closed(),
            click_queue_capacity: self.click_sender.capacity(),
        }
    }

    /// Builds the public short URL for `code`.
    pub fn short_url(&self, code: &str) -> String {
        format!("{}/{}", self.base_url, code)
    }

    async fn find(&self, code: &str) -> Result<ShortUrl, AppError> {
        if code.is_empty() {
            return Err(AppError::not_found(NOT_FOUND_MESSAGE));
        }

        self.repository
            .find_by_code(code)
            .await?
            .ok_or_else(|| AppError::not_found(NOT_FOUND_MESSAGE))
    }
}
