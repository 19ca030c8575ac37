//! Validation of URLs submitted for shortening.
//!
//! URLs are checked but stored verbatim: redirects must send clients to
//! exactly the string they submitted.

use url::Url;

/// Longest URL accepted for shortening.
pub const MAX_URL_LENGTH: usize = 4096;

/// Reasons a URL is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlValidationError {
    #[error("url is required")]
    Empty,

    #[error("url exceeds maximum length")]
    TooLong,

    #[error("invalid url")]
    InvalidFormat(String),

    #[error("url must have http or https scheme")]
    UnsupportedScheme,

    #[error("invalid url: missing host")]
    MissingHost,
}

/// Checks that `input` is an absolute HTTP(S) URL with a host.
///
/// # Errors
///
/// Returns [`UrlValidationError`] describing the first failed rule.
///
/// # Examples
///
/// ```ignore
/// assert!(validate_target_url("https://example.com/a?b=c").is_ok());
/// assert_eq!(
///     validate_target_url("ftp://example.com"),
///     Err(UrlValidationError::UnsupportedScheme)
/// );
/// ```
pub fn validate_target_url(input: &str) -> Result<(), UrlValidationError> {
    if input.is_empty() {
        return Err(UrlValidationError::Empty);
    }

    if input.len() > MAX_URL_LENGTH {
        return Err(UrlValidationError::TooLong);
    }

    let url = Url::parse(input).map_err(|e| UrlValidationError::InvalidFormat(e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        _ => return Err(UrlValidationError::UnsupportedScheme),
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(()),
        _ => Err(UrlValidationError::MissingHost),
    }
}
