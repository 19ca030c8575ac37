//! Utility functions for encoding, URL validation, and request handling.
//!
//! - [`base62`] - Short code and request-id encoding
//! - [`url_validator`] - Validation of URLs submitted for shortening
//! - [`client_ip`] - Client identity extraction for rate limiting

pub mod base62;
pub mod client_ip;
pub mod url_validator;
