use axum::http::{header::COOKIE, HeaderMap};

/// Attributes applied to every cookie the broker sets
#[derive(Debug, Clone, Copy)]
pub struct CookieOptions {
    pub http_only: bool,
    pub secure: bool,
}

/// Value of the named cookie from the request's `Cookie` header
pub fn extract_cookie(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|cookie| {
            let (name, value) = cookie.trim().split_once('=')?;
            (name == cookie_name && !value.is_empty()).then(|| value.to_string())
        })
}

/// `Set-Cookie` value for a cookie living `max_age_secs`
pub fn build_cookie(name: &str, value: &str, max_age_secs: u64, options: CookieOptions) -> String {
    let mut cookie = format!("{name}={value}; Path=/; Max-Age={max_age_secs}; SameSite=Lax");
    if options.http_only {
        cookie.push_str("; HttpOnly");
    }
    if options.secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the cookie
pub fn clear_cookie(name: &str, options: CookieOptions) -> String {
    build_cookie(name, "", 0, options)
}
