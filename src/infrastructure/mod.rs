//! Infrastructure layer for external integrations.
//!
//! - [`persistence`] - SQLite connection pool and repository implementations

pub mod persistence;
