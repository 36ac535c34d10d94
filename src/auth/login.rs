/// Login Initiation
///
/// Starts the OAuth2 authorization-code handshake: picks the provider named in
/// the path, issues a CSRF state value in a cookie and sends the browser to
/// the provider's authorization page.
use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use super::LOGIN_PATH_PREFIX;
use super::chain::{Interception, Interceptor};
use super::config::CookieConfig;
use super::cookies::set_cookie;
use super::error::AuthError;
use super::providers::ProviderRegistry;

/// Steps of one login attempt. A failure at any step ends the attempt; the
/// client starts over from `LoginInitiated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStage {
    LoginInitiated,
    ProviderRedirected,
    ProviderCallbackReceived,
    UserResolved,
    TokenIssued,
    ClientRedirected,
}

impl fmt::Display for LoginStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            LoginStage::LoginInitiated => "login_initiated",
            LoginStage::ProviderRedirected => "provider_redirected",
            LoginStage::ProviderCallbackReceived => "provider_callback_received",
            LoginStage::UserResolved => "user_resolved",
            LoginStage::TokenIssued => "token_issued",
            LoginStage::ClientRedirected => "client_redirected",
        };
        f.write_str(label)
    }
}

/// `302 Found` to `location`
pub fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(e) => {
            warn!("Refusing to redirect to an invalid location: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Random, URL-safe CSRF state value
pub fn generate_state() -> String {
    let random: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(random)
}

/// Chain stage answering `/auth/authorize/{provider}` with a provider redirect
pub struct ProviderRedirect {
    providers: Arc<ProviderRegistry>,
    cookie: CookieConfig,
}

impl ProviderRedirect {
    pub fn new(providers: Arc<ProviderRegistry>, cookie: CookieConfig) -> Self {
        Self { providers, cookie }
    }

    fn start_login(&self, provider_name: &str, outgoing: &mut HeaderMap) -> Result<Response, AuthError> {
        let provider = self
            .providers
            .get(provider_name)
            .ok_or_else(|| AuthError::UnsupportedProvider(provider_name.to_string()))?;

        info!(provider = provider_name, stage = %LoginStage::LoginInitiated, "Login flow started");

        let state = generate_state();
        let auth_url = provider.authorization_url(&state)?;

        if let Some(cookie) = set_cookie(&self.cookie.state_cookie_name, &state, &self.cookie) {
            outgoing.append(header::SET_COOKIE, cookie);
        }

        info!(provider = provider_name, stage = %LoginStage::ProviderRedirected, "Redirecting to provider");
        Ok(found(&auth_url))
    }
}

impl Interceptor for ProviderRedirect {
    fn name(&self) -> &'static str {
        "provider-redirect"
    }

    fn intercept(&self, req: Request, outgoing: &mut HeaderMap) -> Interception {
        let Some(provider_name) = req.uri().path().strip_prefix(LOGIN_PATH_PREFIX) else {
            return Interception::Continue(req);
        };

        let response = match self.start_login(provider_name, outgoing) {
            Ok(response) => response,
            Err(e) => {
                warn!(provider = provider_name, "Could not start login: {}", e);
                // No login flow started, so no return URL may be left behind.
                outgoing.remove(header::SET_COOKIE);
                e.into_response()
            }
        };

        Interception::Respond(response)
    }
}
