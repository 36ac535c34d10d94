// Authentication Error Types
// Token verification failures and the OAuth2 login flow error taxonomy

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::users::UserDirectoryError;

/// Reasons a bearer token is rejected by the token codec.
///
/// The authentication filter downgrades every variant to "anonymous", so
/// clients never learn which one occurred.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token is malformed: {0}")]
    Malformed(String),

    #[error("token signature or algorithm is invalid")]
    Invalid,

    #[error("token has expired")]
    Expired,
}

impl TokenError {
    /// Short label used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::Malformed(_) => "malformed",
            TokenError::Invalid => "invalid",
            TokenError::Expired => "expired",
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    // Token issuing
    #[error("failed to issue token: {0}")]
    TokenIssue(String),

    // OAuth2 login flow
    #[error("identity provider assertion failed: {0}")]
    ProviderAssertion(String),

    #[error("unsupported OAuth2 provider: {0}")]
    UnsupportedProvider(String),

    #[error("OAuth2 state parameter does not match")]
    StateMismatch,

    #[error("HTTP request to provider failed: {0}")]
    HttpError(String),

    #[error("provider communication timeout")]
    Timeout,

    // User directory
    #[error("user directory error: {0}")]
    UserDirectory(#[from] UserDirectoryError),

    // Configuration errors
    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    #[error("Authentication required")]
    AuthenticationRequired,
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AuthError::Timeout
        } else {
            AuthError::HttpError(err.to_string())
        }
    }
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::ProviderAssertion(_)
            | AuthError::StateMismatch
            | AuthError::HttpError(_) => StatusCode::UNAUTHORIZED,

            AuthError::AuthenticationRequired => StatusCode::FORBIDDEN,

            AuthError::UnsupportedProvider(_) => StatusCode::NOT_FOUND,

            AuthError::Timeout => StatusCode::GATEWAY_TIMEOUT,

            AuthError::TokenIssue(_)
            | AuthError::UserDirectory(_)
            | AuthError::InvalidConfig { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable, non-sensitive error code rendered to clients.
    pub fn public_code(&self) -> &'static str {
        match self {
            AuthError::UnsupportedProvider(_) => "unsupported_provider",
            AuthError::AuthenticationRequired => "forbidden",
            AuthError::TokenIssue(_)
            | AuthError::UserDirectory(_)
            | AuthError::InvalidConfig { .. } => "internal_error",
            _ => "login_failed",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Forbidden responses carry no body at all.
        if status == StatusCode::FORBIDDEN {
            return status.into_response();
        }

        let body = serde_json::json!({
            "error": self.public_code(),
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}
