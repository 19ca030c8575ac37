//! Core domain entities.
//!
//! - [`ShortUrl`] - A shortened URL mapping with its click count
//! - [`GlobalStats`] - Aggregates over all shortened URLs

pub mod url;

pub use url::{GlobalStats, ShortUrl};
