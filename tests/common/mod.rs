#![allow(dead_code)]

use shrink::api::middleware::{CorsPolicy, Middleware, RateLimitState, RateLimiter, RequestIdGenerator};
use shrink::application::services::UrlService;
use shrink::domain::click_event::ClickEvent;
use shrink::domain::entities::ShortUrl;
use shrink::domain::repositories::UrlRepository;
use shrink::infrastructure::persistence::{MIGRATOR, SqliteUrlRepository};
use shrink::state::AppState;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const BASE_URL: &str = "http://sho.rt";

/// Fresh in-memory database with the schema applied.
///
/// A single long-lived connection keeps the in-memory database alive.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();

    MIGRATOR.run(&pool).await.unwrap();
    pool
}

pub fn repository(pool: &SqlitePool) -> SqliteUrlRepository {
    SqliteUrlRepository::new(Arc::new(pool.clone()))
}

pub async fn create_test_url(pool: &SqlitePool, original: &str) -> ShortUrl {
    repository(pool).create(original).await.unwrap()
}

pub async fn set_clicks(pool: &SqlitePool, code: &str, clicks: i64) {
    sqlx::query("UPDATE urls SET clicks = ?1 WHERE code = ?2")
        .bind(clicks)
        .bind(code)
        .execute(pool)
        .await
        .unwrap();
}

pub fn create_test_state(pool: SqlitePool) -> (AppState, mpsc::Receiver<ClickEvent>) {
    let (tx, rx) = mpsc::channel(100);

    let repository = Arc::new(repository(&pool));
    let url_service = Arc::new(UrlService::new(repository, BASE_URL, tx));

    (AppState::new(url_service), rx)
}

/// Standard stages with the given limits, trusting forwarded client IPs.
pub fn test_middleware(rate: f64, burst: u32) -> Middleware {
    let cors = CorsPolicy::new(
        ["*"],
        ["GET", "POST", "OPTIONS"],
        ["Content-Type", "X-Request-ID"],
        Duration::from_secs(86400),
    )
    .unwrap();

    Middleware {
        request_ids: RequestIdGenerator::default(),
        cors: Arc::new(cors),
        rate_limit: RateLimitState::new(Arc::new(RateLimiter::new(rate, burst).unwrap()), true),
        request_timeout: Duration::from_secs(15),
    }
}

/// In-memory sink for JSON log lines.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl LogCapture {
    /// Installs a JSON subscriber writing here for the current thread.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines(&self) -> Vec<serde_json::Value> {
        let raw = self.0.lock().unwrap().clone();
        String::from_utf8(raw)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    /// Log lines whose message matches `message`.
    pub fn with_message(&self, message: &str) -> Vec<serde_json::Value> {
        self.lines()
            .into_iter()
            .filter(|line| line["fields"]["message"] == message)
            .collect()
    }
}
