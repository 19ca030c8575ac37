//! Repository trait for shortened URL storage.

use crate::domain::entities::{GlobalStats, ShortUrl};
use crate::error::AppError;
use async_trait::async_trait;

/// Storage interface for shortened URLs.
///
/// # Implementations
///
/// - [`crate::infrastructure::persistence::SqliteUrlRepository`] - SQLite implementation
/// - Test mocks available with `cfg(test)`
///
/// # Examples
///
/// See integration tests: `tests/repository_url.rs`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UrlRepository: Send + Sync {
    /// Stores a new URL and assigns its short code.
    ///
    /// The code is the base62 form of the generated row id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn create(&self, original: &str) -> Result<ShortUrl, AppError>;

    /// Finds a URL by its short code.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_by_code(&self, code: &str) -> Result<Option<ShortUrl>, AppError>;

    /// Finds a URL by its exact original string, used for deduplication.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn find_by_original(&self, original: &str) -> Result<Option<ShortUrl>, AppError>;

    /// Adds one click to the URL's counter.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotFound`] if no URL has this code.
    /// Returns [`AppError::Internal`] on database errors.
    async fn increment_clicks(&self, code: &str) -> Result<(), AppError>;

    /// Computes aggregate statistics over all URLs.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    async fn global_stats(&self) -> Result<GlobalStats, AppError>;

    /// Checks that the storage backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] if the backend cannot be queried.
    async fn ping(&self) -> Result<(), AppError>;
}
