//! HTTP server initialization and runtime setup.
//!
//! Handles the database pool, migrations, the click worker, the middleware
//! pipeline and the Axum server lifecycle.

use crate::api::middleware::{
    CorsPolicy, Middleware, RateLimitState, RateLimiter, RequestIdGenerator, recovery,
};
use crate::application::services::UrlService;
use crate::config::Config;
use crate::domain::click_worker::run_click_worker;
use crate::infrastructure::persistence::{self, MIGRATOR, SqliteUrlRepository};
use crate::routes;
use crate::state::AppState;

use anyhow::{Context, Result};
use axum::ServiceExt;
use axum::extract::Request;
use axum::http::HeaderName;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Notify, mpsc};

/// Runs the HTTP server with the given configuration.
///
/// Initializes:
/// - SQLite connection pool
/// - Apply migrations
/// - Background click worker
/// - Rate limiter and its idle bucket sweeper
/// - Axum HTTP server behind the middleware pipeline
///
/// On SIGINT or SIGTERM the listener stops accepting connections and
/// in-flight requests get `SHUTDOWN_TIMEOUT_SECS` to finish. Queued clicks
/// are then drained within the same bound.
///
/// # Errors
///
/// Returns an error if:
/// - Database connection or migration fails
/// - The middleware configuration is invalid
/// - Server bind fails
/// - Server runtime error occurs
pub async fn run(config: Config) -> Result<()> {
    recovery::install_panic_hook();

    let pool = persistence::connect(&config.database_url, config.db_max_connections)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Connected to database");

    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to run migrations")?;

    let repository = Arc::new(SqliteUrlRepository::new(Arc::new(pool)));

    let (click_tx, click_rx) = mpsc::channel(config.click_queue_capacity);
    let worker = tokio::spawn(run_click_worker(
        click_rx,
        repository.clone(),
        config.click_worker_concurrency,
    ));
    tracing::info!("Click worker started");

    let url_service = Arc::new(UrlService::new(repository, &config.base_url, click_tx));
    let state = AppState::new(url_service);

    let middleware = build_middleware(&config)?;
    if let Some(interval) = config.rate_limit_sweep_interval() {
        middleware.rate_limit.limiter.spawn_sweeper(interval);
    }

    let app = routes::app(state, &middleware);
    drop(middleware);

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");

    let draining = Arc::new(Notify::new());
    let signal_draining = draining.clone();

    let server = axum::serve(
        listener,
        ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        signal_draining.notify_one();
    });

    let timeout = config.shutdown_timeout();

    tokio::select! {
        result = server.into_future() => result?,
        _ = async {
            draining.notified().await;
            tokio::time::sleep(timeout).await;
        } => {
            tracing::warn!(?timeout, "Shutdown timed out, dropping in-flight requests");
        }
    }

    // The server owned the last click sender; the worker now drains and exits.
    match tokio::time::timeout(timeout, worker).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Click worker failed"),
        Err(_) => tracing::warn!("Click worker did not drain before timeout"),
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Builds the middleware state from configuration.
///
/// # Errors
///
/// Returns an error if the request id header, rate limit or CORS settings
/// are invalid.
pub fn build_middleware(config: &Config) -> Result<Middleware> {
    let header = HeaderName::from_str(&config.request_id_header)
        .context("Invalid REQUEST_ID_HEADER")?;

    let limiter = RateLimiter::new(config.rate_limit, config.rate_burst)
        .context("Invalid rate limit configuration")?;

    let cors = CorsPolicy::new(
        config.cors_allowed_origins.clone(),
        &config.cors_allowed_methods,
        &config.cors_allowed_headers,
        config.cors_max_age(),
    )
    .context("Invalid CORS configuration")?;

    Ok(Middleware {
        request_ids: RequestIdGenerator::new(header),
        cors: Arc::new(cors),
        rate_limit: RateLimitState::new(Arc::new(limiter), config.behind_proxy),
        request_timeout: config.request_timeout(),
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
