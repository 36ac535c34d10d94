use axum::http::{HeaderMap, header};

const BEARER_PREFIX: &str = "Bearer ";

/// Extract a bearer credential from the `Authorization` header.
///
/// A missing header, a different scheme, or a non-UTF-8 value all mean the
/// request carries no credential; that is an anonymous request, not an error.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
}
