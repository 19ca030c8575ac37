//! DTOs for per-URL and global statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::{GlobalStats, ShortUrl};

/// Statistics for a single short URL.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub code: String,
    pub original_url: String,
    pub clicks: i64,
    pub created_at: DateTime<Utc>,
}

impl From<ShortUrl> for StatsResponse {
    fn from(url: ShortUrl) -> Self {
        Self {
            code: url.code,
            original_url: url.original,
            clicks: url.clicks,
            created_at: url.created_at,
        }
    }
}

/// Aggregate statistics over all short URLs.
#[derive(Debug, Serialize, Deserialize)]
pub struct GlobalStatsResponse {
    pub total_urls: i64,
    pub total_clicks: i64,
    /// URLs created since midnight UTC.
    pub urls_today: i64,
}

impl From<GlobalStats> for GlobalStatsResponse {
    fn from(stats: GlobalStats) -> Self {
        Self {
            total_urls: stats.total_urls,
            total_clicks: stats.total_clicks,
            urls_today: stats.urls_today,
        }
    }
}
