/// Authentication Filter
///
/// Runs once per request after CORS handling. Establishes the request's
/// identity from its bearer token and always hands the request on; whether an
/// anonymous request may proceed is decided further down the chain.
use axum::{extract::Request, http::HeaderMap};
use std::sync::Arc;
use tracing::{debug, warn};

use super::chain::{Interception, Interceptor};
use super::credentials::extract_bearer;
use super::identity::RequestIdentity;
use super::token::TokenCodec;

pub struct AuthenticationFilter {
    codec: Arc<TokenCodec>,
}

impl AuthenticationFilter {
    pub fn new(codec: Arc<TokenCodec>) -> Self {
        Self { codec }
    }

    /// Resolve the identity carried by `headers`, or `None` for an anonymous request.
    ///
    /// Verification failures are logged and treated exactly like a missing
    /// credential.
    pub fn authenticate(&self, headers: &HeaderMap) -> Option<RequestIdentity> {
        let token = extract_bearer(headers)?;

        // Browser clients send the literal string "null" when they hold no token.
        if token.eq_ignore_ascii_case("null") {
            return None;
        }

        match self.codec.verify(token) {
            Ok(subject) => {
                debug!("Authenticated user ID: {}", subject);
                Some(RequestIdentity::new(subject))
            }
            Err(e) => {
                warn!(
                    reason = e.kind(),
                    "Could not set user authentication for request: {}", e
                );
                None
            }
        }
    }
}

impl Interceptor for AuthenticationFilter {
    fn name(&self) -> &'static str {
        "authentication"
    }

    fn intercept(&self, mut req: Request, _outgoing: &mut HeaderMap) -> Interception {
        // Only this filter may establish an identity.
        req.extensions_mut().remove::<RequestIdentity>();

        if let Some(identity) = self.authenticate(req.headers()) {
            req.extensions_mut().insert(identity);
        }

        Interception::Continue(req)
    }
}
