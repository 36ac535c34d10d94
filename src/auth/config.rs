// Authentication Configuration
// Token signing secret, redirect policy, login-flow cookies and OAuth2 providers

use serde::{Deserialize, Serialize};

use super::error::AuthError;
use super::token::{DEFAULT_ISSUER, DEFAULT_VALIDITY_SECS};

/// Minimum secret length for HS512 (64 bytes).
pub const MIN_SECRET_LEN: usize = 64;

/// Main authentication configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Symmetric secret used to sign and verify tokens (minimum 64 bytes).
    /// Must be identical on every instance that verifies tokens.
    pub jwt_secret: String,

    /// Issuer claim written into and required from every token
    #[serde(default = "default_issuer")]
    pub issuer: String,

    /// Token validity in seconds (default: 1 day)
    #[serde(default = "default_token_validity")]
    pub token_validity_secs: u64,

    /// Where to send the client after login when no return URL was preserved
    #[serde(default = "default_redirect")]
    pub default_redirect: String,

    /// Origins (scheme://host[:port]) allowed as absolute post-login redirect targets.
    /// Relative paths are always allowed.
    #[serde(default = "default_allowed_origins")]
    pub allowed_redirect_origins: Vec<String>,

    /// Path prefixes reachable without an identity ("/" is always permitted)
    #[serde(default = "default_permit_paths")]
    pub permit_paths: Vec<String>,

    /// Login-flow cookie configuration
    #[serde(default)]
    pub cookie: CookieConfig,

    /// OAuth2 provider configurations
    #[serde(default)]
    pub providers: ProvidersConfig,
}

// The secret never shows up in debug output.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("token_validity_secs", &self.token_validity_secs)
            .field("default_redirect", &self.default_redirect)
            .field("allowed_redirect_origins", &self.allowed_redirect_origins)
            .field("permit_paths", &self.permit_paths)
            .field("cookie", &self.cookie)
            .field("providers", &self.providers.enabled_providers())
            .finish()
    }
}

impl AuthConfig {
    /// Validate configuration values
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.jwt_secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::InvalidConfig {
                key: "auth.jwt_secret".to_string(),
                reason: format!("must be at least {} bytes", MIN_SECRET_LEN),
            });
        }

        if self.issuer.trim().is_empty() {
            return Err(AuthError::InvalidConfig {
                key: "auth.issuer".to_string(),
                reason: "cannot be empty".to_string(),
            });
        }

        if self.token_validity_secs < 60 {
            return Err(AuthError::InvalidConfig {
                key: "auth.token_validity_secs".to_string(),
                reason: "must be at least 60 seconds".to_string(),
            });
        }

        if self.token_validity_secs > 86400 * 7 {
            return Err(AuthError::InvalidConfig {
                key: "auth.token_validity_secs".to_string(),
                reason: "must not exceed 7 days".to_string(),
            });
        }

        if self.default_redirect.is_empty() {
            return Err(AuthError::InvalidConfig {
                key: "auth.default_redirect".to_string(),
                reason: "cannot be empty".to_string(),
            });
        }

        for origin in &self.allowed_redirect_origins {
            let parsed = url::Url::parse(origin).map_err(|e| AuthError::InvalidConfig {
                key: "auth.allowed_redirect_origins".to_string(),
                reason: format!("{}: {}", origin, e),
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(AuthError::InvalidConfig {
                    key: "auth.allowed_redirect_origins".to_string(),
                    reason: format!("{}: must be http or https", origin),
                });
            }
        }

        if self.permit_paths.iter().any(|p| !p.starts_with('/')) {
            return Err(AuthError::InvalidConfig {
                key: "auth.permit_paths".to_string(),
                reason: "every path must start with /".to_string(),
            });
        }

        self.cookie.validate()?;
        self.providers.validate()?;

        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(), // Must be set explicitly
            issuer: default_issuer(),
            token_validity_secs: default_token_validity(),
            default_redirect: default_redirect(),
            allowed_redirect_origins: default_allowed_origins(),
            permit_paths: default_permit_paths(),
            cookie: CookieConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

/// Cookies carrying the return URL and OAuth2 state across the provider round trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    /// Secure flag (HTTPS only) - should be true in production
    #[serde(default)]
    pub secure: bool,

    /// Lifetime of the login-flow cookies in seconds
    #[serde(default = "default_cookie_max_age")]
    pub max_age_secs: u64,

    /// Cookie holding the preserved post-login destination
    #[serde(default = "default_redirect_cookie_name")]
    pub redirect_cookie_name: String,

    /// Cookie holding the OAuth2 CSRF state
    #[serde(default = "default_state_cookie_name")]
    pub state_cookie_name: String,

    /// Cookie path
    #[serde(default = "default_cookie_path")]
    pub path: String,
}

impl CookieConfig {
    fn validate(&self) -> Result<(), AuthError> {
        if self.redirect_cookie_name.is_empty() || self.state_cookie_name.is_empty() {
            return Err(AuthError::InvalidConfig {
                key: "auth.cookie".to_string(),
                reason: "cookie names cannot be empty".to_string(),
            });
        }

        if self.redirect_cookie_name == self.state_cookie_name {
            return Err(AuthError::InvalidConfig {
                key: "auth.cookie".to_string(),
                reason: "redirect and state cookies need different names".to_string(),
            });
        }

        if self.max_age_secs == 0 {
            return Err(AuthError::InvalidConfig {
                key: "auth.cookie.max_age_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            secure: false, // Development default
            max_age_secs: default_cookie_max_age(),
            redirect_cookie_name: default_redirect_cookie_name(),
            state_cookie_name: default_state_cookie_name(),
            path: default_cookie_path(),
        }
    }
}

/// OAuth2 providers configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github: Option<ProviderConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub google: Option<ProviderConfig>,
}

impl ProvidersConfig {
    fn validate(&self) -> Result<(), AuthError> {
        if let Some(ref github) = self.github {
            github.validate("github")?;
        }

        if let Some(ref google) = self.google {
            google.validate("google")?;
        }

        Ok(())
    }

    /// Get list of enabled provider names
    pub fn enabled_providers(&self) -> Vec<&str> {
        let mut providers = Vec::new();
        if self.github.is_some() {
            providers.push("github");
        }
        if self.google.is_some() {
            providers.push("google");
        }
        providers
    }
}

/// OAuth2 provider configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// OAuth2 client ID
    pub client_id: String,

    /// OAuth2 client secret
    pub client_secret: String,

    /// Callback URI registered with the provider (`.../oauth2/callback/{provider}`)
    pub redirect_uri: String,

    /// OAuth2 scopes (provider defaults when empty)
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Authorization endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,

    /// Token endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,

    /// User-info endpoint override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_url: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("scopes", &self.scopes)
            .finish()
    }
}

impl ProviderConfig {
    fn validate(&self, provider_name: &str) -> Result<(), AuthError> {
        if self.client_id.is_empty() {
            return Err(AuthError::InvalidConfig {
                key: format!("auth.providers.{}.client_id", provider_name),
                reason: "cannot be empty".to_string(),
            });
        }

        if self.client_secret.is_empty() {
            return Err(AuthError::InvalidConfig {
                key: format!("auth.providers.{}.client_secret", provider_name),
                reason: "cannot be empty".to_string(),
            });
        }

        if !self.redirect_uri.starts_with("http://") && !self.redirect_uri.starts_with("https://")
        {
            return Err(AuthError::InvalidConfig {
                key: format!("auth.providers.{}.redirect_uri", provider_name),
                reason: "must start with http:// or https://".to_string(),
            });
        }

        for (key, value) in [
            ("auth_url", &self.auth_url),
            ("token_url", &self.token_url),
            ("userinfo_url", &self.userinfo_url),
        ] {
            if let Some(value) = value
                && url::Url::parse(value).is_err()
            {
                return Err(AuthError::InvalidConfig {
                    key: format!("auth.providers.{}.{}", provider_name, key),
                    reason: "must be an absolute URL".to_string(),
                });
            }
        }

        Ok(())
    }
}

// Default value functions
fn default_issuer() -> String {
    DEFAULT_ISSUER.to_string()
}

fn default_token_validity() -> u64 {
    DEFAULT_VALIDITY_SECS
}

fn default_redirect() -> String {
    "/".to_string()
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".to_string()]
}

fn default_permit_paths() -> Vec<String> {
    vec![
        "/auth/".to_string(),
        "/oauth2/".to_string(),
        "/health".to_string(),
    ]
}

fn default_cookie_max_age() -> u64 {
    180
}

fn default_redirect_cookie_name() -> String {
    "redirect_url".to_string()
}

fn default_state_cookie_name() -> String {
    "oauth2_state".to_string()
}

fn default_cookie_path() -> String {
    "/".to_string()
}
