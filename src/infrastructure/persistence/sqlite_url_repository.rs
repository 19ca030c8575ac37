//! SQLite implementation of the URL repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::domain::entities::{GlobalStats, ShortUrl};
use crate::domain::repositories::UrlRepository;
use crate::error::AppError;
use crate::utils::base62;

const PENDING_CODE: &str = "_pending_";

/// SQLite repository for shortened URLs.
///
/// Uses bound parameters for every query; no SQL is built from user input.
pub struct SqliteUrlRepository {
    pool: Arc<SqlitePool>,
}

impl SqliteUrlRepository {
    /// Creates a new repository with a database connection pool.
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Finds a URL by its row id.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Internal`] on database errors.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<ShortUrl>, AppError> {
        let row = sqlx::query_as::<_, ShortUrl>(
            "SELECT id, code, original, clicks, created_at FROM urls WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row)
    }
}

#[async_trait]
impl UrlRepository for SqliteUrlRepository {
    async fn create(&self, original: &str) -> Result<ShortUrl, AppError> {
        // The placeholder is replaced before commit; SQLite serializes writers,
        // so no two transactions hold it at once.
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO urls (code, original, created_at) VALUES (?1, ?2, ?3) RETURNING id",
        )
        .bind(PENDING_CODE)
        .bind(original)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        let code = base62::encode(id as u64);

        let url = sqlx::query_as::<_, ShortUrl>(
            r#"
            UPDATE urls SET code = ?1 WHERE id = ?2
            RETURNING id, code, original, clicks, created_at
            "#,
        )
        .bind(&code)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(url)
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<ShortUrl>, AppError> {
        let row = sqlx::query_as::<_, ShortUrl>(
            "SELECT id, code, original, clicks, created_at FROM urls WHERE code = ?1",
        )
        .bind(code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row)
    }

    async fn find_by_original(&self, original: &str) -> Result<Option<ShortUrl>, AppError> {
        let row = sqlx::query_as::<_, ShortUrl>(
            r#"
            SELECT id, code, original, clicks, created_at
            FROM urls
            WHERE original = ?1
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(original)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(row)
    }

    async fn increment_clicks(&self, code: &str) -> Result<(), AppError> {
        let result = sqlx::query("UPDATE urls SET clicks = clicks + 1 WHERE code = ?1")
            .bind(code)
            .execute(self.pool.as_ref())
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found("short url not found"));
        }

        Ok(())
    }

    async fn global_stats(&self) -> Result<GlobalStats, AppError> {
        let (total_urls, total_clicks): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COALESCE(SUM(clicks), 0) FROM urls")
                .fetch_one(self.pool.as_ref())
                .await?;

        let urls_today: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM urls WHERE created_at >= ?1")
            .bind(start_of_today())
            .fetch_one(self.pool.as_ref())
            .await?;

        Ok(GlobalStats {
            total_urls,
            total_clicks,
            urls_today,
        })
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }
}

fn start_of_today() -> DateTime<Utc> {
    Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or_else(Utc::now)
}
