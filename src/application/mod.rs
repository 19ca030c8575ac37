//! Application layer services implementing business logic.
//!
//! Services coordinate repository calls, validation and click dispatch, and
//! expose a small API to the HTTP handlers.
//!
//! - [`services::url_service::UrlService`] - Shortening, resolution and statistics

pub mod services;
