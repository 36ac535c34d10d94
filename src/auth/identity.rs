/// Request Identity
///
/// The authenticated principal of a single in-flight request. The
/// authentication filter stores it in the request's extensions; handlers read
/// it back through the extractors below. It is never persisted or shared
/// between requests.
use axum::{extract::FromRequestParts, http::request::Parts};
use serde::Serialize;
use std::convert::Infallible;

use super::error::AuthError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestIdentity {
    /// Internal user identifier taken from the token subject
    pub subject: String,

    /// Granted authorities (always empty for token-authenticated users)
    pub authorities: Vec<String>,
}

impl RequestIdentity {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            authorities: Vec::new(),
        }
    }
}

/// Extractor for routes that require an identity; rejects with 403 and no body.
#[derive(Debug, Clone)]
pub struct Authenticated(pub RequestIdentity);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<RequestIdentity>()
            .cloned()
            .map(Authenticated)
            .ok_or(AuthError::AuthenticationRequired)
    }
}

/// Extractor for routes that serve both anonymous and authenticated callers.
#[derive(Debug, Clone)]
pub struct MaybeAuthenticated(pub Option<RequestIdentity>);

impl<S> FromRequestParts<S> for MaybeAuthenticated
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthenticated(
            parts.extensions.get::<RequestIdentity>().cloned(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;

    fn parts_with(identity: Option<RequestIdentity>) -> Parts {
        let mut req = Request::builder().uri("/api/me").body(Body::empty()).unwrap();
        if let Some(identity) = identity {
            req.extensions_mut().insert(identity);
        }
        req.into_parts().0
    }

    #[tokio::test]
    async fn test_authenticated_extractor() {
        let mut parts = parts_with(Some(RequestIdentity::new("42")));
        let Authenticated(identity) = Authenticated::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(identity.subject, "42");
        assert!(identity.authorities.is_empty());
    }

    #[tokio::test]
    async fn test_authenticated_extractor_rejects_anonymous() {
        let mut parts = parts_with(None);
        let rejection = Authenticated::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();
        assert_eq!(rejection.into_response().status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_maybe_authenticated_extractor() {
        let mut parts = parts_with(None);
        let MaybeAuthenticated(identity) =
            MaybeAuthenticated::from_request_parts(&mut parts, &()).await.unwrap();
        assert!(identity.is_none());
    }
}
