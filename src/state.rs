//! Shared application state injected into handlers.

use std::sync::Arc;
use std::time::Instant;

use crate::application::services::UrlService;
use crate::infrastructure::persistence::SqliteUrlRepository;

#[derive(Clone)]
pub struct AppState {
    pub url_service: Arc<UrlService<SqliteUrlRepository>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(url_service: Arc<UrlService<SqliteUrlRepository>>) -> Self {
        Self {
            url_service,
            started_at: Instant::now(),
        }
    }
}
