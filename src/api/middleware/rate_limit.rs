//! Per-client rate limiting using the token bucket algorithm.
//!
//! Each client key owns a bucket holding up to `burst` tokens. Tokens refill
//! continuously at `rate` per second and every admitted request spends one.
//! Token counts are real-valued; fractional refill carries over between
//! checks.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::utils::client_ip::client_key;

/// Invalid limiter settings, reported at startup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RateLimitConfigError {
    #[error("rate must be a positive finite number of tokens per second, got {0}")]
    InvalidRate(f64),

    #[error("burst must be at least 1, got {0}")]
    InvalidBurst(u32),
}

/// Outcome of a single admission check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Admission {
    Allowed,
    /// Denied; one token will be available after `retry_after`.
    Denied { retry_after: Duration },
}

impl Admission {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Admission::Allowed)
    }
}

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket limiter keyed by client identity.
///
/// A single mutex guards the bucket map. It is held only for the refill and
/// decrement arithmetic of one check, never across an await point.
///
/// # Example
///
/// ```rust,ignore
/// let limiter = RateLimiter::new(2.0, 3)?;
///
/// assert!(limiter.allow("203.0.113.7"));
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Bucket>>,
    rate: f64,
    burst: f64,
}

impl RateLimiter {
    /// Creates a limiter refilling `rate` tokens per second up to `burst`.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitConfigError`] if `rate` is not a positive finite
    /// number or `burst` is zero.
    pub fn new(rate: f64, burst: u32) -> Result<Self, RateLimitConfigError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(RateLimitConfigError::InvalidRate(rate));
        }
        if burst < 1 {
            return Err(RateLimitConfigError::InvalidBurst(burst));
        }

        Ok(Self {
            buckets: Mutex::new(HashMap::new()),
            rate,
            burst: f64::from(burst),
        })
    }

    /// Returns `true` and spends a token if `key` may proceed now.
    pub fn allow(&self, key: &str) -> bool {
        self.check(key).is_allowed()
    }

    /// Checks `key` against its bucket at the current instant.
    pub fn check(&self, key: &str) -> Admission {
        self.check_at(key, Instant::now())
    }

    /// Checks `key` as if the request arrived at `now`.
    ///
    /// The first request from a key creates its bucket with `burst - 1`
    /// tokens, charging that request.
    pub fn check_at(&self, key: &str, now: Instant) -> Admission {
        let mut buckets = self.lock();

        let Some(bucket) = buckets.get_mut(key) else {
            buckets.insert(
                key.to_owned(),
                Bucket {
                    tokens: self.burst - 1.0,
                    last_refill: now,
                },
            );
            return Admission::Allowed;
        };

        let elapsed = now.saturating_duration_since(bucket.last_refill);
        bucket.tokens = (bucket.tokens + elapsed.as_secs_f64() * self.rate).min(self.burst);
        bucket.last_refill = bucket.last_refill.max(now);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Admission::Allowed
        } else {
            let missing = 1.0 - bucket.tokens;
            Admission::Denied {
                retry_after: saturating_secs(missing / self.rate),
            }
        }
    }

    /// Tokens per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Bucket capacity.
    pub fn burst(&self) -> f64 {
        self.burst
    }

    /// Number of tracked client keys.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Time after which an untouched bucket is back at full capacity.
    pub fn full_refill_after(&self) -> Duration {
        saturating_secs(self.burst / self.rate)
    }

    /// Drops buckets idle for at least [`Self::full_refill_after`].
    ///
    /// Such a bucket holds `burst` tokens, the same state a freshly created
    /// bucket starts from, so removing it never changes a decision.
    /// Returns the number of removed buckets.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let idle_limit = self.full_refill_after();
        let mut buckets = self.lock();
        let before = buckets.len();

        buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < idle_limit);

        before - buckets.len()
    }

    /// Starts a background task calling [`Self::evict_idle`] every `interval`.
    ///
    /// The task ends once the limiter is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let limiter: Weak<Self> = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(limiter) = limiter.upgrade() else {
                    break;
                };

                let evicted = limiter.evict_idle(Instant::now());
                if evicted > 0 {
                    tracing::debug!(evicted, remaining = limiter.len(), "Evicted idle rate-limit buckets");
                }
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Bucket>> {
        // The critical section is plain arithmetic; a poisoned map is still consistent.
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Seconds as a [`Duration`], clamped to [`Duration::MAX`] for tiny rates.
fn saturating_secs(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// State shared by the admission middleware.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    pub limiter: Arc<RateLimiter>,
    /// Read client identity from `X-Forwarded-For` / `X-Real-IP`.
    pub behind_proxy: bool,
}

impl RateLimitState {
    pub fn new(limiter: Arc<RateLimiter>, behind_proxy: bool) -> Self {
        Self {
            limiter,
            behind_proxy,
        }
    }
}

/// Admission control middleware.
///
/// Requests over the limit get `429 Too Many Requests` with a `Retry-After`
/// header (whole seconds, at least 1) and never reach the inner service.
///
/// ```json
/// { "error": "rate limit exceeded", "code": 429 }
/// ```
pub async fn layer(State(state): State<RateLimitState>, req: Request, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let key = client_key(req.headers(), peer, state.behind_proxy);

    match state.limiter.check(&key) {
        Admission::Allowed => next.run(req).await,
        Admission::Denied { retry_after } => {
            metrics::counter!("http_requests_rate_limited_total").increment(1);
            tracing::warn!(client = %key, "Rate limit exceeded");

            let retry_after_secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
            AppError::RateLimited { retry_after_secs }.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENT: &str = "192.168.1.1";

    #[test]
    fn test_rejects_invalid_configuration() {
        assert_eq!(
            RateLimiter::new(0.0, 5).unwrap_err(),
            RateLimitConfigError::InvalidRate(0.0)
        );
        assert!(RateLimiter::new(-1.0, 5).is_err());
        assert!(RateLimiter::new(f64::NAN, 5).is_err());
        assert!(RateLimiter::new(f64::INFINITY, 5).is_err());
        assert_eq!(
            RateLimiter::new(1.0, 0).unwrap_err(),
            RateLimitConfigError::InvalidBurst(0)
        );
    }

    #[test]
    fn test_burst_then_deny() {
        let limiter = RateLimiter::new(10.0, 5).unwrap();
        let now = Instant::now();

        for i in 0..5 {
            assert!(
                limiter.check_at(CLIENT, now).is_allowed(),
                "request {} should be allowed within burst",
                i + 1
            );
        }

        assert!(!limiter.check_at(CLIENT, now).is_allowed());
    }

    #[test]
    fn test_one_token_per_refill_interval() {
        let limiter = RateLimiter::new(4.0, 3).unwrap();
        let t0 = Instant::now();

        for _ in 0..3 {
            assert!(limiter.check_at(CLIENT, t0).is_allowed());
        }
        assert!(!limiter.check_at(CLIENT, t0).is_allowed());

        let t1 = t0 + Duration::from_millis(250);
        assert!(limiter.check_at(CLIENT, t1).is_allowed());
        assert!(!limiter.check_at(CLIENT, t1).is_allowed());
    }

    #[test]
    fn test_rate_two_burst_three_scenario() {
        let limiter = RateLimiter::new(2.0, 3).unwrap();
        let t0 = Instant::now();

        assert!(limiter.check_at(CLIENT, t0).is_allowed());
        assert!(limiter.check_at(CLIENT, t0).is_allowed());
        assert!(limiter.check_at(CLIENT, t0).is_allowed());
        assert!(!limiter.check_at(CLIENT, t0).is_allowed());

        let t1 = t0 + Duration::from_millis(500);
        assert!(limiter.check_at(CLIENT, t1).is_allowed());
        assert!(!limiter.check_at(CLIENT, t1).is_allowed());
    }

    #[test]
    fn test_fractional_tokens_accumulate() {
        let limiter = RateLimiter::new(4.0, 1).unwrap();
        let t0 = Instant::now();

        assert!(limiter.check_at(CLIENT, t0).is_allowed());

        // Two quarter-token refills add up to half a token: still denied.
        assert!(!limiter.check_at(CLIENT, t0 + Duration::from_millis(125)).is_allowed());
        assert!(!limiter.check_at(CLIENT, t0 + Duration::from_millis(187)).is_allowed());
        assert!(limiter.check_at(CLIENT, t0 + Duration::from_millis(250)).is_allowed());
    }

    #[test]
    fn test_refill_is_capped_at_burst() {
        let limiter = RateLimiter::new(100.0, 5).unwrap();
        let t0 = Instant::now();

        for _ in 0..3 {
            limiter.check_at(CLIENT, t0);
        }

        let later = t0 + Duration::from_secs(60);
        let mut count = 0;
        while limiter.check_at(CLIENT, later).is_allowed() {
            count += 1;
            assert!(count <= 10, "rate limiter not respecting burst cap");
        }

        assert_eq!(count, 5);
    }

    #[test]
    fn test_clients_are_isolated() {
        let limiter = RateLimiter::new(10.0, 2).unwrap();
        let now = Instant::now();

        limiter.check_at("192.168.1.1", now);
        limiter.check_at("192.168.1.1", now);

        assert!(!limiter.check_at("192.168.1.1", now).is_allowed());
        assert!(limiter.check_at("192.168.1.2", now).is_allowed());
        assert_eq!(limiter.len(), 2);
    }

    #[test]
    fn test_empty_key_is_its_own_bucket() {
        let limiter = RateLimiter::new(1.0, 1).unwrap();
        let now = Instant::now();

        assert!(limiter.check_at("", now).is_allowed());
        assert!(!limiter.check_at("", now).is_allowed());
        assert!(limiter.check_at(CLIENT, now).is_allowed());
    }

    #[test]
    fn test_retry_after_reports_missing_time() {
        let limiter = RateLimiter::new(2.0, 1).unwrap();
        let now = Instant::now();

        limiter.check_at(CLIENT, now);

        match limiter.check_at(CLIENT, now) {
            Admission::Denied { retry_after } => {
                assert_eq!(retry_after, Duration::from_millis(500));
            }
            Admission::Allowed => panic!("expected denial"),
        }
    }

    #[test]
    fn test_tiny_rate_saturates_durations() {
        let limiter = RateLimiter::new(1e-20, 1).unwrap();
        let now = Instant::now();

        assert!(limiter.check_at(CLIENT, now).is_allowed());
        match limiter.check_at(CLIENT, now) {
            Admission::Denied { retry_after } => assert_eq!(retry_after, Duration::MAX),
            Admission::Allowed => panic!("expected denial"),
        }

        assert_eq!(limiter.full_refill_after(), Duration::MAX);
        assert_eq!(limiter.evict_idle(now + Duration::from_secs(3600)), 0);
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn test_clock_going_backwards_does_not_refill() {
        let limiter = RateLimiter::new(10.0, 1).unwrap();
        let t1 = Instant::now() + Duration::from_secs(1);

        assert!(limiter.check_at(CLIENT, t1).is_allowed());
        assert!(!limiter.check_at(CLIENT, t1 - Duration::from_millis(500)).is_allowed());
    }

    #[test]
    fn test_no_double_spend_under_concurrency() {
        const THREADS: usize = 32;
        const BURST: u32 = 10;

        let limiter = RateLimiter::new(1e-9, BURST).unwrap();
        let now = Instant::now();

        let approvals: usize = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| scope.spawn(|| limiter.check_at(CLIENT, now).is_allowed()))
                .collect();

            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|allowed| *allowed)
                .count()
        });

        assert_eq!(approvals, THREADS.min(BURST as usize));
        assert_eq!(limiter.len(), 1);
    }

    #[test]
    fn test_allow_uses_wall_clock() {
        let limiter = RateLimiter::new(10.0, 5).unwrap();

        for _ in 0..5 {
            assert!(limiter.allow(CLIENT));
        }
        assert!(!limiter.allow(CLIENT));

        std::thread::sleep(Duration::from_millis(150));

        assert!(limiter.allow(CLIENT));
    }

    #[test]
    fn test_evict_idle_only_removes_full_buckets() {
        let limiter = RateLimiter::new(2.0, 4).unwrap();
        let t0 = Instant::now();

        limiter.check_at("idle", t0);
        limiter.check_at("busy", t0 + Duration::from_secs(1));

        assert_eq!(limiter.full_refill_after(), Duration::from_secs(2));
        assert_eq!(limiter.evict_idle(t0 + Duration::from_millis(2500)), 1);
        assert_eq!(limiter.len(), 1);

        // A re-created bucket behaves exactly like the evicted full one.
        let t1 = t0 + Duration::from_secs(3);
        for _ in 0..4 {
            assert!(limiter.check_at("idle", t1).is_allowed());
        }
        assert!(!limiter.check_at("idle", t1).is_allowed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_when_limiter_dropped() {
        let limiter = Arc::new(RateLimiter::new(1.0, 1).unwrap());
        let handle = limiter.spawn_sweeper(Duration::from_secs(1));

        drop(limiter);
        tokio::time::advance(Duration::from_secs(3)).await;

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sweeper should exit")
            .unwrap();
    }
}
