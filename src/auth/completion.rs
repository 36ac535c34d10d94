/// OAuth2 Login Completion
///
/// The provider callback endpoint. Once the provider confirms who the user is,
/// the provider identity is mapped onto an internal user, a token is minted for
/// that user and the browser is sent back to the URL it asked for with the
/// token attached. No session is created; the browser carries the token.
use axum::{
    Extension,
    extract::{Path, Query, State},
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{info, warn};

use super::config::{AuthConfig, CookieConfig};
use super::cookies::{clear_cookie, read_cookie};
use super::error::AuthError;
use super::login::{LoginStage, found};
use super::providers::{ProviderProfile, ProviderRegistry};
use super::redirect_cookie::PreservedRedirect;
use super::token::TokenCodec;
use crate::users::UserDirectory;

/// Query parameter carrying the minted token on the final redirect
pub const TOKEN_PARAM: &str = "token";

/// OAuth2 callback parameters
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    /// Authorization code from provider
    pub code: Option<String>,

    /// CSRF state token
    pub state: Option<String>,

    /// Error from provider
    pub error: Option<String>,

    /// Error description from provider
    pub error_description: Option<String>,
}

/// Everything the callback needs, shared read-only across requests
#[derive(Clone)]
pub struct OAuthCompletionHandler {
    providers: Arc<ProviderRegistry>,
    directory: Arc<dyn UserDirectory>,
    codec: Arc<TokenCodec>,
    cookie: CookieConfig,
    default_redirect: String,
}

impl OAuthCompletionHandler {
    pub fn new(
        providers: Arc<ProviderRegistry>,
        directory: Arc<dyn UserDirectory>,
        codec: Arc<TokenCodec>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            providers,
            directory,
            codec,
            cookie: config.cookie.clone(),
            default_redirect: config.default_redirect.clone(),
        }
    }

    /// Run the callback through to the redirect target.
    ///
    /// `expected_state` is the state cookie set on login initiation;
    /// `preserved` is the return URL restored by the redirect preserver.
    pub async fn complete(
        &self,
        provider_name: &str,
        params: CallbackParams,
        expected_state: Option<&str>,
        preserved: Option<&str>,
    ) -> Result<String, AuthError> {
        if let Some(error) = params.error {
            return Err(AuthError::ProviderAssertion(format!(
                "{}: {}",
                error,
                params.error_description.unwrap_or_default()
            )));
        }

        let provider = self
            .providers
            .get(provider_name)
            .ok_or_else(|| AuthError::UnsupportedProvider(provider_name.to_string()))?;

        let code = params.code.filter(|c| !c.is_empty()).ok_or_else(|| {
            AuthError::ProviderAssertion("Authorization code missing from callback".to_string())
        })?;

        match (params.state.as_deref(), expected_state) {
            (Some(received), Some(expected))
                if bool::from(received.as_bytes().ct_eq(expected.as_bytes())) => {}
            _ => return Err(AuthError::StateMismatch),
        }

        info!(provider = provider_name, stage = %LoginStage::ProviderCallbackReceived, "Provider callback received");

        let profile = provider.authenticate(&code).await?;
        self.on_provider_success(&profile, preserved).await
    }

    /// Map a confirmed provider identity to a user, mint a token and build the redirect target.
    pub async fn on_provider_success(
        &self,
        profile: &ProviderProfile,
        preserved: Option<&str>,
    ) -> Result<String, AuthError> {
        let user_id = self.directory.resolve_or_create(profile).await?;
        info!(provider = %profile.provider, user_id = %user_id, stage = %LoginStage::UserResolved, "User resolved");

        let token = self.codec.issue(&user_id)?;
        info!(user_id = %user_id, stage = %LoginStage::TokenIssued, "Token issued");

        let target = preserved.unwrap_or(&self.default_redirect);
        Ok(append_token(target, &token))
    }
}

/// Append `token=<token>` to `target`'s query, keeping any fragment last.
pub fn append_token(target: &str, token: &str) -> String {
    let (base, fragment) = match target.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (target, None),
    };

    let separator = match base.find('?') {
        None => "?",
        Some(_) if base.ends_with('?') || base.ends_with('&') => "",
        Some(_) => "&",
    };

    let mut redirect = format!(
        "{}{}{}={}",
        base,
        separator,
        TOKEN_PARAM,
        urlencoding::encode(token)
    );
    if let Some(fragment) = fragment {
        redirect.push('#');
        redirect.push_str(fragment);
    }
    redirect
}

/// Handle OAuth2 callback from provider
pub async fn oauth_callback(
    State(handler): State<OAuthCompletionHandler>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    preserved: Option<Extension<PreservedRedirect>>,
    headers: HeaderMap,
) -> Response {
    let expected_state = read_cookie(&headers, &handler.cookie.state_cookie_name);
    let preserved = preserved.map(|Extension(PreservedRedirect(url))| url);

    let mut response = match handler
        .complete(
            &provider,
            params,
            expected_state.as_deref(),
            preserved.as_deref(),
        )
        .await
    {
        Ok(target) => {
            info!(provider = %provider, stage = %LoginStage::ClientRedirected, "Login completed");
            found(&target)
        }
        Err(e) => {
            warn!(provider = %provider, "Login failed: {}", e);
            e.into_response()
        }
    };

    // The state value is single-use whatever the outcome.
    if expected_state.is_some()
        && let Some(cookie) = clear_cookie(&handler.cookie.state_cookie_name, &handler.cookie)
    {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }

    response
}
