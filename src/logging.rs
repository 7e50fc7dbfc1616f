//! Log filter defaults and per-request spans

use axum::{body::Body, http::Request};
use tracing::{info_span, Span};
use tracing_subscriber::EnvFilter;

/// Directive used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "gh_secret_broker=info";

/// `RUST_LOG` if set and valid, else [`DEFAULT_LOG_FILTER`]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Span wrapping one request. Records the path only; query strings carry
/// OAuth codes.
pub fn request_span(request: &Request<Body>) -> Span {
    info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
    )
}
