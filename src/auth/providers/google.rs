/// Google OAuth2 Provider
///
/// Uses the OpenID Connect userinfo endpoint to read the profile after the
/// code exchange.
use super::{IdentityProvider, OAuth2Client, ProviderProfile};
use crate::auth::config::ProviderConfig;
use crate::auth::error::AuthError;
use async_trait::async_trait;
use serde::Deserialize;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

/// Google userinfo response
#[derive(Debug, Deserialize)]
struct GoogleUserInfoResponse {
    sub: String,
    email: Option<String>,
    email_verified: Option<bool>,
    name: Option<String>,
}

pub struct GoogleProvider {
    client: OAuth2Client,
}

impl GoogleProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, AuthError> {
        let client = OAuth2Client::new(
            config,
            &["openid", "email", "profile"],
            (GOOGLE_AUTH_URL, GOOGLE_TOKEN_URL, GOOGLE_USERINFO_URL),
        )?;
        Ok(Self { client })
    }

    /// Convert Google userinfo to a provider profile
    fn convert_userinfo(&self, info: GoogleUserInfoResponse) -> ProviderProfile {
        // Unverified addresses are not passed on to the user directory.
        let email = match info.email_verified {
            Some(true) => info.email,
            _ => None,
        };

        ProviderProfile {
            provider: "google".to_string(),
            subject: info.sub,
            email,
            name: info.name,
            username: None,
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn authorization_url(&self, state: &str) -> Result<String, AuthError> {
        self.client.authorization_url(state)
    }

    async fn authenticate(&self, code: &str) -> Result<ProviderProfile, AuthError> {
        let access_token = self.client.exchange_code(code).await?;
        let info: GoogleUserInfoResponse = self.client.fetch_userinfo(&access_token).await?;
        Ok(self.convert_userinfo(info))
    }
}
