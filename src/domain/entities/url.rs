//! Shortened URL entity and aggregate statistics.

use chrono::{DateTime, Utc};

/// A shortened URL with its click counter.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ShortUrl {
    pub id: i64,
    pub code: String,
    pub original: String,
    pub clicks: i64,
    pub created_at: DateTime<Utc>,
}

impl ShortUrl {
    /// Creates a new ShortUrl instance.
    pub fn new(
        id: i64,
        code: String,
        original: String,
        clicks: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            code,
            original,
            clicks,
            created_at,
        }
    }
}

/// Aggregate statistics over all shortened URLs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalStats {
    pub total_urls: i64,
    pub total_clicks: i64,
    /// URLs created since midnight UTC.
    pub urls_today: i64,
}
