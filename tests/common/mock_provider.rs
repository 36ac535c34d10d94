/// Mock OAuth2 provider for testing the login flow
/// Stands in for GitHub's authorize, token and user endpoints
use axum::{
    Form, Json, Router,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use tokio::sync::oneshot;

use todo_auth::auth::ProviderConfig;

/// Code the mock token endpoint accepts
pub const VALID_CODE: &str = "good-code";

/// Access token the mock token endpoint hands out
pub const ACCESS_TOKEN: &str = "mock-access-token";

/// GitHub account id of the mock user
pub const USER_ID: u64 = 7;

pub struct MockProvider {
    pub port: u16,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

#[derive(Debug, Deserialize)]
struct TokenRequest {
    grant_type: String,
    code: String,
    client_id: String,
    client_secret: String,
}

impl MockProvider {
    /// Start a new mock provider on a random available port
    pub async fn start() -> anyhow::Result<Self> {
        let app = Router::new()
            .route("/login/oauth/authorize", get(handle_authorize))
            .route("/login/oauth/access_token", post(handle_token))
            .route("/user", get(handle_user));

        // Bind to random port
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let port = listener.local_addr()?.port();

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Mock provider failed to start");
        });

        Ok(Self {
            port,
            shutdown_tx: Some(shutdown_tx),
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    /// GitHub provider configuration pointing at this mock
    pub fn github_config(&self) -> ProviderConfig {
        ProviderConfig {
            client_id: "mock-client-id".to_string(),
            client_secret: "mock-client-secret".to_string(),
            redirect_uri: "http://localhost:8080/oauth2/callback/github".to_string(),
            scopes: vec![],
            auth_url: Some(self.url("/login/oauth/authorize")),
            token_url: Some(self.url("/login/oauth/access_token")),
            userinfo_url: Some(self.url("/user")),
        }
    }
}

impl Drop for MockProvider {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

async fn handle_authorize() -> &'static str {
    "mock login page"
}

async fn handle_token(Form(request): Form<TokenRequest>) -> Response {
    if request.grant_type != "authorization_code"
        || request.client_id != "mock-client-id"
        || request.client_secret != "mock-client-secret"
    {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid_client" })),
        )
            .into_response();
    }

    // GitHub reports a bad code inside a 200 response.
    if request.code != VALID_CODE {
        return Json(json!({
            "error": "bad_verification_code",
            "error_description": "The code passed is incorrect or expired."
        }))
        .into_response();
    }

    Json(json!({
        "access_token": ACCESS_TOKEN,
        "token_type": "bearer",
        "scope": "read:user,user:email"
    }))
    .into_response()
}

async fn handle_user(headers: HeaderMap) -> Response {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("Bearer {}", ACCESS_TOKEN));

    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Bad credentials" })),
        )
            .into_response();
    }

    Json(json!({
        "id": USER_ID,
        "login": "octocat",
        "name": "The Octocat",
        "email": "octocat@example.com"
    }))
    .into_response()
}
