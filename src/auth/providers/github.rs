/// GitHub OAuth2 Provider
///
/// Plain OAuth2 (no OpenID Connect): the profile comes from the REST user
/// endpoint. GitHub's numeric account id is the stable subject; the login
/// handle can change.
use super::{IdentityProvider, OAuth2Client, ProviderProfile};
use crate::auth::config::ProviderConfig;
use crate::auth::error::AuthError;
use async_trait::async_trait;
use serde::Deserialize;

const GITHUB_AUTH_URL: &str = "https://github.com/login/oauth/authorize";
const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
const GITHUB_USER_URL: &str = "https://api.github.com/user";

/// GitHub `/user` response (only the fields used)
#[derive(Debug, Deserialize)]
struct GithubUser {
    id: u64,
    login: String,
    name: Option<String>,
    email: Option<String>,
}

pub struct GithubProvider {
    client: OAuth2Client,
}

impl GithubProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, AuthError> {
        let client = OAuth2Client::new(
            config,
            &["read:user", "user:email"],
            (GITHUB_AUTH_URL, GITHUB_TOKEN_URL, GITHUB_USER_URL),
        )?;
        Ok(Self { client })
    }

    fn convert_user(&self, user: GithubUser) -> ProviderProfile {
        ProviderProfile {
            provider: "github".to_string(),
            subject: user.id.to_string(),
            email: user.email,
            name: user.name,
            username: Some(user.login),
        }
    }
}

#[async_trait]
impl IdentityProvider for GithubProvider {
    fn name(&self) -> &str {
        "github"
    }

    fn authorization_url(&self, state: &str) -> Result<String, AuthError> {
        self.client.authorization_url(state)
    }

    async fn authenticate(&self, code: &str) -> Result<ProviderProfile, AuthError> {
        let access_token = self.client.exchange_code(code).await?;
        let user: GithubUser = self.client.fetch_userinfo(&access_token).await?;
        Ok(self.convert_user(user))
    }
}
