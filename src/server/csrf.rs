use crate::error::AppError;
use crate::session::{build_cookie, extract_cookie, random_token, CookieOptions};
use axum::{
    extract::{Request, State},
    http::{header::SET_COOKIE, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use tracing::warn;

pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";

const CSRF_MAX_AGE_SECS: u64 = 365 * 24 * 60 * 60;

/// Cookie attributes for the CSRF token
#[derive(Debug, Clone, Copy)]
pub struct CsrfSettings {
    pub secure: bool,
}

fn is_unsafe(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

/// Double-submit cookie check
///
/// Unsafe methods must echo the `csrf_token` cookie in `X-CSRF-Token`.
/// Responses to requests without the cookie issue a fresh one; it is readable
/// by scripts so the frontend can copy it into the header.
pub async fn csrf_protect(
    State(settings): State<CsrfSettings>,
    request: Request,
    next: Next,
) -> Response {
    let cookie_token = extract_cookie(request.headers(), CSRF_COOKIE);

    let mut response = if is_unsafe(request.method()) && !header_matches(&request, cookie_token.as_deref()) {
        warn!(
            method = %request.method(),
            path = %request.uri().path(),
            "Rejected request with missing or mismatched CSRF token"
        );
        AppError::validation("CSRF token missing or invalid").into_response()
    } else {
        next.run(request).await
    };

    if cookie_token.is_none() {
        let cookie = build_cookie(
            CSRF_COOKIE,
            &random_token(),
            CSRF_MAX_AGE_SECS,
            CookieOptions {
                http_only: false,
                secure: settings.secure,
            },
        );
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(SET_COOKIE, value);
        }
    }

    response
}

fn header_matches(request: &Request, cookie_token: Option<&str>) -> bool {
    let Some(expected) = cookie_token else {
        return false;
    };
    let Some(provided) = request
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };

    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}
