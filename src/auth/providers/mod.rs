/// OAuth2 Identity Providers
///
/// The external services that authenticate the end user during the redirect
/// handshake. Each provider turns an authorization code into a
/// `ProviderProfile`; everything after that is provider-independent.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::config::{ProviderConfig, ProvidersConfig};
use crate::auth::error::AuthError;

pub mod github;
pub mod google;

/// Identity asserted by a provider after a successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
    /// Provider name (e.g. "github")
    pub provider: String,

    /// Stable user identifier at the provider
    pub subject: String,

    /// Email address, when the provider shares it
    pub email: Option<String>,

    /// Display name
    pub name: Option<String>,

    /// Login handle, for providers that have one
    pub username: Option<String>,
}

/// An OAuth2 authorization-code provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider name used in login and callback paths
    fn name(&self) -> &str;

    /// URL the browser is sent to in order to log in, carrying `state`
    fn authorization_url(&self, state: &str) -> Result<String, AuthError>;

    /// Exchange the callback's authorization code and fetch the user's profile
    async fn authenticate(&self, code: &str) -> Result<ProviderProfile, AuthError>;
}

/// Endpoints and credentials shared by the authorization-code providers
#[derive(Clone)]
pub(crate) struct OAuth2Client {
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    scopes: Vec<String>,
    auth_url: String,
    token_url: String,
    userinfo_url: String,
    http_client: reqwest::Client,
}

/// Token endpoint response; providers report errors inside a 200 body too
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl OAuth2Client {
    pub(crate) fn new(
        config: &ProviderConfig,
        default_scopes: &[&str],
        defaults: (&str, &str, &str),
    ) -> Result<Self, AuthError> {
        let (auth_url, token_url, userinfo_url) = defaults;

        let scopes = if config.scopes.is_empty() {
            default_scopes.iter().map(|s| s.to_string()).collect()
        } else {
            config.scopes.clone()
        };

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AuthError::HttpError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes,
            auth_url: config.auth_url.clone().unwrap_or_else(|| auth_url.to_string()),
            token_url: config.token_url.clone().unwrap_or_else(|| token_url.to_string()),
            userinfo_url: config
                .userinfo_url
                .clone()
                .unwrap_or_else(|| userinfo_url.to_string()),
            http_client,
        })
    }

    pub(crate) fn authorization_url(&self, state: &str) -> Result<String, AuthError> {
        let mut url = url::Url::parse(&self.auth_url).map_err(|e| AuthError::InvalidConfig {
            key: "auth_url".to_string(),
            reason: e.to_string(),
        })?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", state);

        Ok(url.to_string())
    }

    /// Trade an authorization code for an access token
    pub(crate) async fn exchange_code(&self, code: &str) -> Result<String, AuthError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AuthError::ProviderAssertion(format!(
                "Token request failed with status {}: {}",
                status, error_text
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            AuthError::ProviderAssertion(format!("Failed to parse token response: {}", e))
        })?;

        match (token.access_token, token.error) {
            (Some(access_token), None) if !access_token.is_empty() => Ok(access_token),
            (_, Some(error)) => Err(AuthError::ProviderAssertion(format!(
                "{}: {}",
                error,
                token.error_description.unwrap_or_default()
            ))),
            _ => Err(AuthError::ProviderAssertion(
                "Token response carried no access token".to_string(),
            )),
        }
    }

    /// Fetch the user-info document with an access token
    pub(crate) async fn fetch_userinfo<T: serde::de::DeserializeOwned>(
        &self,
        access_token: &str,
    ) -> Result<T, AuthError> {
        let response = self
            .http_client
            .get(&self.userinfo_url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AuthError::ProviderAssertion(format!(
                "UserInfo request failed with status {}: {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::ProviderAssertion(format!("Failed to parse userinfo: {}", e)))
    }
}

/// Providers available for login, keyed by name
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn IdentityProvider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from configuration
    pub fn from_config(config: &ProvidersConfig) -> Result<Self, AuthError> {
        let mut registry = Self::new();

        if let Some(ref github) = config.github {
            registry.register(Arc::new(github::GithubProvider::new(github)?));
        }

        if let Some(ref google) = config.google {
            registry.register(Arc::new(google::GoogleProvider::new(google)?));
        }

        Ok(registry)
    }

    pub fn register(&mut self, provider: Arc<dyn IdentityProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn IdentityProvider>> {
        self.providers.get(name).cloned()
    }

    /// Registered provider names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }
}
