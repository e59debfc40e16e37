//! Error types for the gateway.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use cubixles_types::Rejection;
use std::fmt;

/// Gateway error type.
#[derive(Debug)]
pub enum Error {
    /// Configuration error.
    Config(String),
    /// Request body or parameters could not be read.
    BadRequest(String),
    /// Rate limit exceeded.
    RateLimited { retry_after: u64 },
    /// Nonce or signature rejected.
    Unauthorized(Rejection),
    /// Chain RPC failed on a read route.
    Upstream(String),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Error::Unauthorized(r) if r.is_malformed() => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::BadRequest(_) => "bad_request",
            Error::RateLimited { .. } => "rate_limited",
            Error::Unauthorized(r) => r.code(),
            Error::Upstream(_) => "upstream_error",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Config(msg) => write!(f, "config error: {msg}"),
            Error::BadRequest(msg) => write!(f, "bad request: {msg}"),
            Error::RateLimited { .. } => write!(f, "Rate limit exceeded"),
            Error::Unauthorized(r) => write!(f, "{r}"),
            Error::Upstream(msg) => write!(f, "upstream error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<Rejection> for Error {
    fn from(rejection: Rejection) -> Self {
        Error::Unauthorized(rejection)
    }
}

impl From<cubixles_auth::Error> for Error {
    fn from(e: cubixles_auth::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "success": false,
            "error": self.to_string(),
            "code": self.code(),
        });
        let mut response = (status, Json(body)).into_response();
        if let Error::RateLimited { retry_after } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}
