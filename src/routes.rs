use axum::{
    Json, Router,
    extract::{FromRef, State},
    routing::get,
};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::auth::{
    Authenticated, MaybeAuthenticated, OAuthCompletionHandler, ProviderRegistry, RequestIdentity,
    oauth_callback,
};

/// State shared by the route handlers
#[derive(Clone)]
pub struct RouteState {
    pub providers: Arc<ProviderRegistry>,
    pub completion: OAuthCompletionHandler,
}

impl FromRef<RouteState> for OAuthCompletionHandler {
    fn from_ref(state: &RouteState) -> Self {
        state.completion.clone()
    }
}

impl FromRef<RouteState> for Arc<ProviderRegistry> {
    fn from_ref(state: &RouteState) -> Self {
        state.providers.clone()
    }
}

#[derive(Debug, Serialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub providers: Vec<String>,
}

/// Application routes. Login initiation has no route; the filter chain answers it.
pub fn router(state: RouteState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/auth/status", get(auth_status))
        .route("/oauth2/callback/{provider}", get(oauth_callback))
        .route("/api/me", get(me))
        .with_state(state)
}

async fn index() -> Json<Value> {
    Json(json!({ "service": env!("CARGO_PKG_NAME"), "version": env!("CARGO_PKG_VERSION") }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn auth_status(
    State(providers): State<Arc<ProviderRegistry>>,
    MaybeAuthenticated(identity): MaybeAuthenticated,
) -> Json<AuthStatus> {
    Json(AuthStatus {
        authenticated: identity.is_some(),
        subject: identity.map(|identity| identity.subject),
        providers: providers.names(),
    })
}

async fn me(Authenticated(identity): Authenticated) -> Json<RequestIdentity> {
    Json(identity)
}
