//! DTOs for the shortening endpoint.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Request to shorten a single URL.
#[derive(Debug, Deserialize, Validate)]
pub struct ShortenRequest {
    /// Absolute HTTP(S) URL. Scheme and host are checked by the service.
    #[serde(default)]
    #[validate(length(max = 4096, message = "url exceeds maximum length"))]
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ShortenResponse {
    pub short_url: String,
    pub code: String,
}
