use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::auth::providers::ProviderProfile;

/// Defines the types of user directory errors that can occur
#[derive(Debug, thiserror::Error)]
pub enum UserDirectoryError {
    #[error("User not found: {0}")]
    UserNotFound(String),
    #[error("Invalid data format: {0}")]
    InvalidData(String),
    #[error("User directory unavailable: {0}")]
    Unavailable(String),
}

/// User record created on first sign-in
#[derive(Debug, Clone, Serialize)]
pub struct User {
    /// Unique internal user ID (UUID)
    pub id: String,
    /// Provider the account was created through
    pub provider: String,
    /// Provider-specific user ID
    pub provider_user_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}

/// Maps provider identities onto internal user ids.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Return the internal id for `profile`, creating the user on first sign-in.
    async fn resolve_or_create(&self, profile: &ProviderProfile) -> Result<String, UserDirectoryError>;
}

/// Process-local user directory keyed by `(provider, provider user id)`
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<(String, String), User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, UserDirectoryError> {
        self.users
            .read()
            .await
            .values()
            .find(|user| user.id == user_id)
            .cloned()
            .ok_or_else(|| UserDirectoryError::UserNotFound(user_id.to_string()))
    }

    pub async fn user_count(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn resolve_or_create(&self, profile: &ProviderProfile) -> Result<String, UserDirectoryError> {
        if profile.provider.trim().is_empty() {
            return Err(UserDirectoryError::InvalidData(
                "Provider name cannot be empty".to_string(),
            ));
        }

        if profile.subject.trim().is_empty() {
            return Err(UserDirectoryError::InvalidData(
                "Provider user ID cannot be empty".to_string(),
            ));
        }

        let key = (profile.provider.clone(), profile.subject.clone());
        let now = Utc::now();
        let mut users = self.users.write().await;

        if let Some(user) = users.get_mut(&key) {
            user.last_login_at = now;
            // Profile details may have changed at the provider.
            if profile.email.is_some() {
                user.email = profile.email.clone();
            }
            if profile.name.is_some() {
                user.name = profile.name.clone();
            }
            debug!("Resolved existing user {} via {}", user.id, profile.provider);
            return Ok(user.id.clone());
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            provider: profile.provider.clone(),
            provider_user_id: profile.subject.clone(),
            email: profile.email.clone(),
            name: profile.name.clone(),
            username: profile.username.clone(),
            created_at: now,
            last_login_at: now,
        };
        let id = user.id.clone();
        users.insert(key, user);

        info!("Created user {} on first sign-in via {}", id, profile.provider);
        Ok(id)
    }
}
