// Cookie helpers for the login flow
// Short-lived, client-held values that survive the identity provider round trip

use axum::http::{HeaderMap, HeaderValue, header};
use tracing::warn;

use super::config::CookieConfig;

/// Read a cookie from the request's `Cookie` header, URL-decoding its value.
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|cookie| {
            let (cookie_name, value) = cookie.trim().split_once('=')?;
            if cookie_name == name && !value.is_empty() {
                urlencoding::decode(value).ok().map(|v| v.into_owned())
            } else {
                None
            }
        })
}

/// Build a `Set-Cookie` value storing `value` for the login flow lifetime.
pub fn set_cookie(name: &str, value: &str, config: &CookieConfig) -> Option<HeaderValue> {
    let cookie = format!(
        "{}={}; Path={}; HttpOnly; SameSite=Lax; Max-Age={}{}",
        name,
        urlencoding::encode(value),
        config.path,
        config.max_age_secs,
        if config.secure { "; Secure" } else { "" }
    );
    to_header_value(name, cookie)
}

/// Build a `Set-Cookie` value that deletes the cookie on the client.
pub fn clear_cookie(name: &str, config: &CookieConfig) -> Option<HeaderValue> {
    let cookie = format!(
        "{}=; Path={}; HttpOnly; SameSite=Lax; Max-Age=0{}",
        name,
        config.path,
        if config.secure { "; Secure" } else { "" }
    );
    to_header_value(name, cookie)
}

fn to_header_value(name: &str, cookie: String) -> Option<HeaderValue> {
    match HeaderValue::from_str(&cookie) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Could not build cookie {}: {}", name, e);
            None
        }
    }
}
