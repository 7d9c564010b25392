pub mod local;
pub mod session;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

use crate::db::models::UserId;

pub use local::LocalIdentityProvider;
pub use session::{SessionError, SessionProvider, SessionState};

/// Account record owned by the identity provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthSession {
    #[serde(skip_serializing)]
    pub access_token: String,
    pub user: AuthUser,
    pub expires_at: DateTime<Utc>,
}

impl AuthSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid login credentials")]
    InvalidCredentials,

    #[error("User already registered")]
    EmailTaken,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Password should be at least {0} characters")]
    WeakPassword(usize),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Hashing error: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Password identity service with an auth-state-changed subscription.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Creates an identity. Does not open a session.
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError>;

    /// Opens a session and publishes it to subscribers.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError>;

    /// Closes the current session and publishes `None`.
    async fn sign_out(&self) -> Result<(), AuthError>;

    fn current_session(&self) -> Option<AuthSession>;

    /// Auth-state-changed events; dropping the receiver unsubscribes.
    fn subscribe(&self) -> watch::Receiver<Option<AuthSession>>;
}

pub type DynIdentityProvider = Arc<dyn IdentityProvider>;
