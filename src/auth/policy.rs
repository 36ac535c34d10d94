use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use tracing::debug;

use super::chain::{Interception, Interceptor};
use super::identity::RequestIdentity;

/// Last stage of the chain: anonymous requests may only reach permitted paths.
///
/// Everything else is answered with a bare 403, without saying whether the
/// credential was missing, malformed, forged or expired.
pub struct AccessPolicy {
    permit_paths: Vec<String>,
}

impl AccessPolicy {
    pub fn new(permit_paths: Vec<String>) -> Self {
        Self { permit_paths }
    }

    /// Entries ending in `/` permit everything below them; other entries
    /// permit the exact path and its sub-paths only.
    pub fn is_permitted(&self, path: &str) -> bool {
        path == "/"
            || self.permit_paths.iter().any(|permit| {
                if permit.ends_with('/') {
                    path.starts_with(permit.as_str())
                } else {
                    path.strip_prefix(permit.as_str())
                        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
                }
            })
    }
}

impl Interceptor for AccessPolicy {
    fn name(&self) -> &'static str {
        "access-policy"
    }

    fn intercept(&self, req: Request, _outgoing: &mut HeaderMap) -> Interception {
        if req.extensions().get::<RequestIdentity>().is_some() || self.is_permitted(req.uri().path())
        {
            return Interception::Continue(req);
        }

        debug!("Denying anonymous request to {}", req.uri().path());
        Interception::Respond(StatusCode::FORBIDDEN.into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};

    fn policy() -> AccessPolicy {
        AccessPolicy::new(vec!["/auth/".to_string(), "/oauth2/".to_string()])
    }

    fn request(path: &str, identity: Option<&str>) -> Request {
        let mut req = axum::http::Request::builder().uri(path).body(Body::empty()).unwrap();
        if let Some(subject) = identity {
            req.extensions_mut().insert(RequestIdentity::new(subject));
        }
        req
    }

    #[test]
    fn test_permitted_paths() {
        let policy = policy();
        assert!(policy.is_permitted("/"));
        assert!(policy.is_permitted("/auth/authorize/github"));
        assert!(policy.is_permitted("/oauth2/callback/github"));
        assert!(!policy.is_permitted("/api/me"));
        assert!(!policy.is_permitted("/authx"));
    }

    #[test]
    fn test_permit_entries_match_on_segment_boundary() {
        let policy = AccessPolicy::new(vec!["/auth/".to_string(), "/health".to_string()]);
        assert!(policy.is_permitted("/health"));
        assert!(policy.is_permitted("/health/live"));
        assert!(!policy.is_permitted("/healthz"));
        assert!(!policy.is_permitted("/health-admin"));
        assert!(!policy.is_permitted("/auth"));
    }

    #[test]
    fn test_identity_passes_protected_path() {
        let outcome = policy().intercept(request("/api/me", Some("42")), &mut HeaderMap::new());
        assert!(matches!(outcome, Interception::Continue(_)));
    }

    #[tokio::test]
    async fn test_anonymous_protected_path_is_forbidden_without_body() {
        let outcome = policy().intercept(request("/api/me", None), &mut HeaderMap::new());

        let Interception::Respond(response) = outcome else {
            panic!("anonymous request to a protected path must be denied");
        };
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        assert!(body.is_empty());
    }
}
