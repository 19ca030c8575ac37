//! Cross-origin request filtering.
//!
//! Requests without an `Origin` header pass through untouched. For the rest,
//! an allowed origin is echoed back along with the configured methods,
//! headers and max-age. Preflight (`OPTIONS`) requests are answered here with
//! `204 No Content` and never reach later stages.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Invalid CORS settings, reported at startup.
#[derive(Debug, thiserror::Error)]
pub enum CorsConfigError {
    #[error("at least one allowed origin is required")]
    NoOrigins,

    #[error("invalid header value in CORS configuration: {0:?}")]
    InvalidValue(String),
}

/// Allow-list based CORS policy.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    any_origin: bool,
    origins: Vec<String>,
    methods: HeaderValue,
    headers: HeaderValue,
    max_age: HeaderValue,
}

impl CorsPolicy {
    /// Builds a policy. An origin of `*` allows every origin.
    ///
    /// # Errors
    ///
    /// Returns [`CorsConfigError`] if no origin is given or a joined value is
    /// not a valid header value.
    pub fn new<O, M, H>(
        origins: O,
        methods: M,
        headers: H,
        max_age: Duration,
    ) -> Result<Self, CorsConfigError>
    where
        O: IntoIterator,
        O::Item: Into<String>,
        M: IntoIterator,
        M::Item: AsRef<str>,
        H: IntoIterator,
        H::Item: AsRef<str>,
    {
        let origins: Vec<String> = origins.into_iter().map(Into::into).collect();
        if origins.is_empty() {
            return Err(CorsConfigError::NoOrigins);
        }

        Ok(Self {
            any_origin: origins.iter().any(|o| o == "*"),
            origins,
            methods: joined(methods)?,
            headers: joined(headers)?,
            max_age: HeaderValue::from(max_age.as_secs()),
        })
    }

    /// Returns `true` if `origin` is on the allow-list.
    pub fn allows(&self, origin: &str) -> bool {
        self.any_origin || self.origins.iter().any(|o| o == origin)
    }

    fn apply(&self, origin: HeaderValue, headers: &mut HeaderMap) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.methods.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.headers.clone());
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
    }
}

fn joined<I>(values: I) -> Result<HeaderValue, CorsConfigError>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let joined = values
        .into_iter()
        .map(|v| v.as_ref().trim().to_string())
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join(", ");

    HeaderValue::from_str(&joined).map_err(|_| CorsConfigError::InvalidValue(joined))
}

/// Cross-origin filter.
///
/// Every response to a request with an `Origin` carries `Vary: Origin`,
/// allowed or not.
pub async fn layer(State(policy): State<Arc<CorsPolicy>>, req: Request, next: Next) -> Response {
    let Some(origin) = req.headers().get(header::ORIGIN).cloned() else {
        return next.run(req).await;
    };

    let allowed = origin.to_str().is_ok_and(|o| policy.allows(o));

    let mut response = if req.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };

    if allowed {
        policy.apply(origin, response.headers_mut());
    }
    response
        .headers_mut()
        .append(header::VARY, HeaderValue::from_static("Origin"));

    response
}
