/// Redirect State Preserver
///
/// Keeps the client's post-login destination across the identity provider
/// round trip. The server is stateless and the callback may land on another
/// instance, so the URL travels in a short-lived cookie instead of server
/// memory.
use axum::{
    extract::Request,
    http::{HeaderMap, header},
};
use tracing::{debug, warn};

use super::chain::{Interception, Interceptor};
use super::config::CookieConfig;
use super::cookies::{clear_cookie, read_cookie, set_cookie};
use super::{CALLBACK_PATH_PREFIX, LOGIN_PATH_PREFIX};

/// Query parameter carrying the return URL on login initiation
pub const REDIRECT_URL_PARAM: &str = "redirect_url";

/// Stand-in origin for resolving relative return URLs
const RELATIVE_BASE: &str = "http://relative.invalid/";

/// Return URL restored on the provider callback, stored in request extensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreservedRedirect(pub String);

pub struct RedirectStatePreserver {
    cookie: CookieConfig,
    allowed_origins: Vec<String>,
}

impl RedirectStatePreserver {
    pub fn new(cookie: CookieConfig, allowed_origins: Vec<String>) -> Self {
        let allowed_origins = allowed_origins
            .into_iter()
            .map(|origin| origin.trim_end_matches('/').to_string())
            .collect();
        Self {
            cookie,
            allowed_origins,
        }
    }

    /// Relative paths on this site are always allowed; absolute URLs only on
    /// configured origins.
    pub fn is_allowed(&self, target: &str) -> bool {
        // Browsers drop tabs and newlines and treat `\` as `/`, so `/\t/host`
        // would leave the site.
        if target
            .chars()
            .any(|c| c.is_control() || c.is_whitespace() || c == '\\')
        {
            return false;
        }

        if target.starts_with('/') {
            return stays_on_site(target);
        }

        match url::Url::parse(target) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                let origin = url.origin().ascii_serialization();
                self.allowed_origins.iter().any(|allowed| *allowed == origin)
            }
            _ => false,
        }
    }

    fn remember(&self, req: &Request, outgoing: &mut HeaderMap) {
        let Some(target) = req.uri().query().and_then(|query| {
            url::form_urlencoded::parse(query.as_bytes())
                .find(|(key, _)| key == REDIRECT_URL_PARAM)
                .map(|(_, value)| value.into_owned())
        }) else {
            return;
        };

        if !self.is_allowed(&target) {
            warn!("Ignoring disallowed post-login redirect target: {}", target);
            return;
        }

        if let Some(cookie) = set_cookie(&self.cookie.redirect_cookie_name, &target, &self.cookie)
        {
            debug!("Preserving post-login redirect target {}", target);
            outgoing.append(header::SET_COOKIE, cookie);
        }
    }

    fn restore(&self, req: &mut Request, outgoing: &mut HeaderMap) {
        let Some(target) = read_cookie(req.headers(), &self.cookie.redirect_cookie_name) else {
            return;
        };

        // The cookie came back from the client, so check it again.
        if self.is_allowed(&target) {
            req.extensions_mut().insert(PreservedRedirect(target));
        } else {
            warn!("Discarding disallowed redirect cookie: {}", target);
        }

        if let Some(cookie) = clear_cookie(&self.cookie.redirect_cookie_name, &self.cookie) {
            outgoing.append(header::SET_COOKIE, cookie);
        }
    }
}

/// Resolve a relative target the way a browser would and require it to keep
/// the current origin.
fn stays_on_site(target: &str) -> bool {
    let Ok(base) = url::Url::parse(RELATIVE_BASE) else {
        return false;
    };
    match base.join(target) {
        Ok(resolved) => resolved.origin() == base.origin(),
        Err(_) => false,
    }
}

impl Interceptor for RedirectStatePreserver {
    fn name(&self) -> &'static str {
        "redirect-state"
    }

    fn intercept(&self, mut req: Request, outgoing: &mut HeaderMap) -> Interception {
        let path = req.uri().path();

        if path.starts_with(LOGIN_PATH_PREFIX) {
            self.remember(&req, outgoing);
        } else if path.starts_with(CALLBACK_PATH_PREFIX) {
            self.restore(&mut req, outgoing);
        }

        Interception::Continue(req)
    }
}
