//! CLI administration tool for shrink.
//!
//! Inspects statistics and the database without going through the HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # View statistics
//! cargo run --bin admin -- stats
//!
//! # Look up a short code
//! cargo run --bin admin -- lookup b
//!
//! # Check database connection
//! cargo run --bin admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` (default: `sqlite://shrink.db?mode=rwc`)

use shrink::config::Config;
use shrink::domain::repositories::UrlRepository;
use shrink::infrastructure::persistence::{self, SqliteUrlRepository};
use shrink::utils::base62;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use sqlx::SqlitePool;
use std::sync::Arc;

/// CLI tool for managing shrink.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Show statistics
    Stats,

    /// Show the stored record for a short code
    Lookup {
        /// Short code, e.g. "b"
        code: String,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,

    /// Show database info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let pool = persistence::connect(&config.database_url, 1)
        .await
        .context("Failed to connect to database")?;

    match cli.command {
        Commands::Stats => handle_stats(&pool).await?,
        Commands::Lookup { code } => handle_lookup(&pool, &code).await?,
        Commands::Db { action } => handle_db_action(action, &pool).await?,
    }

    Ok(())
}

fn repository(pool: &SqlitePool) -> SqliteUrlRepository {
    SqliteUrlRepository::new(Arc::new(pool.clone()))
}

/// Displays totals over all short URLs.
async fn handle_stats(pool: &SqlitePool) -> Result<()> {
    println!("{}", "Statistics".bright_blue().bold());
    println!();

    let stats = repository(pool)
        .global_stats()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load statistics: {}", e))?;

    println!(
        "  URLs:        {}",
        stats.total_urls.to_string().bright_green().bold()
    );
    println!(
        "  Clicks:      {}",
        stats.total_clicks.to_string().bright_green().bold()
    );
    println!(
        "  Created today: {}",
        stats.urls_today.to_string().bright_green().bold()
    );
    println!();

    Ok(())
}

/// Prints the record behind a short code.
async fn handle_lookup(pool: &SqlitePool, code: &str) -> Result<()> {
    let row_id = base62::decode(code).with_context(|| format!("'{code}' is not a valid code"))?;

    let url = repository(pool)
        .find_by_code(code)
        .await
        .map_err(|e| anyhow::anyhow!("Database error: {}", e))?;

    let Some(url) = url else {
        println!("{}", format!("No short URL with code '{code}'").yellow());
        return Ok(());
    };

    println!("{}", "Short URL".bright_blue().bold());
    println!();
    println!("  Code:     {}", url.code.cyan());
    println!("  Row id:   {}", row_id.to_string().bright_black());
    println!("  Target:   {}", url.original.bright_white());
    println!("  Clicks:   {}", url.clicks.to_string().bright_green().bold());
    println!(
        "  Created:  {}",
        url.created_at
            .format("%Y-%m-%d %H:%M:%S UTC")
            .to_string()
            .bright_black()
    );
    println!();

    Ok(())
}

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, pool: &SqlitePool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "Checking database connection...".bright_blue());

            repository(pool)
                .ping()
                .await
                .map_err(|e| anyhow::anyhow!("Database check failed: {}", e))?;

            println!("{}", "Database connection OK".green().bold());
        }
        DbAction::Info => {
            println!("{}", "Database Information".bright_blue().bold());
            println!();

            let version: String = sqlx::query_scalar("SELECT sqlite_version()")
                .fetch_one(pool)
                .await?;

            let journal_mode: String = sqlx::query_scalar("PRAGMA journal_mode")
                .fetch_one(pool)
                .await?;

            let migrations: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations")
                .fetch_one(pool)
                .await
                .unwrap_or(0);

            println!("  SQLite:       {}", version.bright_white());
            println!("  Journal mode: {}", journal_mode.bright_white());
            println!("  Migrations:   {}", migrations.to_string().bright_white());
            println!();
        }
    }

    Ok(())
}
