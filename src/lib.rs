//! # Shrink
//!
//! A URL shortening service built with Axum and SQLite, with every request
//! passing a fixed middleware pipeline before it reaches a handler.
//!
//! ## Architecture
//!
//! This crate follows Clean Architecture principles with clear layer separation:
//!
//! - **Domain Layer** ([`domain`]) - Entities, repository traits and the click worker
//! - **Application Layer** ([`application`]) - URL shortening service
//! - **Infrastructure Layer** ([`infrastructure`]) - SQLite persistence
//! - **API Layer** ([`api`]) - REST handlers, DTOs, and the middleware pipeline
//!
//! ## Request Pipeline
//!
//! Request ID → access log → panic recovery → CORS → per-client rate limit →
//! request deadline → router. See [`api::middleware`].
//!
//! ## Quick Start
//!
//! ```bash
//! export DATABASE_URL="sqlite://shrink.db?mode=rwc"
//! export BASE_URL="https://sho.rt"
//!
//! # Migrations run automatically on startup
//! cargo run
//! ```
//!
//! ## Configuration
//!
//! Service configuration is loaded from environment variables via [`config::Config`].
//! See [`config`] module for available options.

pub mod api;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod state;
pub mod utils;

pub mod config;
pub mod server;
pub mod telemetry;

pub mod routes;
