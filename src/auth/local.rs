// Password identities and sessions kept next to the application tables
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rusqlite::{params, OptionalExtension};
use tokio::sync::watch;

use super::{AuthError, AuthSession, AuthUser, IdentityProvider};
use crate::backend::sqlite::timestamp;
use crate::config::AuthConfig;
use crate::db::models::UserId;
use crate::state::DbPool;

const MAX_SESSION_HOURS: u64 = 24 * 365;

pub struct LocalIdentityProvider {
    pool: DbPool,
    session_hours: u64,
    min_password_len: usize,
    hash_cost: u32,
    state: watch::Sender<Option<AuthSession>>,
}

impl LocalIdentityProvider {
    /// Builds the provider and restores the newest unexpired session, if any.
    pub fn new(pool: DbPool, config: &AuthConfig) -> Result<Self, AuthError> {
        let restored = restore_session(&pool, Utc::now())?;
        if let Some(ref session) = restored {
            tracing::info!("Restored session for {}", session.user.email);
        }
        let (state, _) = watch::channel(restored);

        Ok(Self {
            pool,
            session_hours: config.session_hours,
            min_password_len: config.min_password_len,
            hash_cost: bcrypt::DEFAULT_COST,
            state,
        })
    }

    /// Overrides the bcrypt work factor.
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    fn validate_credentials(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let (local, domain) = email.split_once('@').ok_or(AuthError::InvalidEmail)?;
        if local.is_empty() || domain.is_empty() {
            return Err(AuthError::InvalidEmail);
        }
        if password.chars().count() < self.min_password_len {
            return Err(AuthError::WeakPassword(self.min_password_len));
        }
        Ok(())
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn restore_session(pool: &DbPool, now: DateTime<Utc>) -> Result<Option<AuthSession>, AuthError> {
    let conn = pool.get()?;
    let session = conn
        .query_row(
            "SELECT s.token, s.expires_at, u.id, u.email, u.created_at
             FROM auth_sessions s
             JOIN auth_users u ON u.id = s.user_id
             WHERE s.expires_at > ?1
             ORDER BY s.created_at DESC
             LIMIT 1",
            params![timestamp(now)],
            |row| {
                Ok(AuthSession {
                    access_token: row.get(0)?,
                    expires_at: parse_timestamp(&row.get::<_, String>(1)?)?,
                    user: AuthUser {
                        id: UserId::new(row.get::<_, String>(2)?),
                        email: row.get(3)?,
                        created_at: parse_timestamp(&row.get::<_, String>(4)?)?,
                    },
                })
            },
        )
        .optional()?;
    Ok(session)
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthUser, AuthError> {
        let email = normalize_email(email);
        self.validate_credentials(&email, password)?;

        let password_hash = bcrypt::hash(password, self.hash_cost)?;
        let user = AuthUser {
            id: UserId::generate(),
            email,
            created_at: Utc::now(),
        };

        let conn = self.pool.get()?;
        let inserted = conn.execute(
            "INSERT INTO auth_users (id, email, password_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(email) DO NOTHING",
            params![
                user.id.as_str(),
                user.email,
                password_hash,
                timestamp(user.created_at)
            ],
        )?;
        if inserted == 0 {
            return Err(AuthError::EmailTaken);
        }

        tracing::info!("Registered identity {}", user.id);
        Ok(user)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let email = normalize_email(email);
        let conn = self.pool.get()?;

        let row: Option<(String, String, String)> = conn
            .query_row(
                "SELECT id, password_hash, created_at FROM auth_users WHERE email = ?1",
                params![email],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()?;

        let (id, password_hash, created_at) = row.ok_or(AuthError::InvalidCredentials)?;
        if !bcrypt::verify(password, &password_hash).unwrap_or(false) {
            return Err(AuthError::InvalidCredentials);
        }

        let now = Utc::now();
        let hours = self.session_hours.min(MAX_SESSION_HOURS) as i64;
        let session = AuthSession {
            access_token: generate_token(),
            user: AuthUser {
                id: UserId::new(id),
                email,
                created_at: parse_timestamp(&created_at)?,
            },
            expires_at: now + Duration::hours(hours),
        };

        conn.execute(
            "INSERT INTO auth_sessions (token, user_id, expires_at, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session.access_token,
                session.user.id.as_str(),
                timestamp(session.expires_at),
                timestamp(now)
            ],
        )?;

        tracing::info!("Signed in {}", session.user.email);
        self.state.send_replace(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let current = self.state.borrow().clone();
        if let Some(session) = current {
            let conn = self.pool.get()?;
            conn.execute(
                "DELETE FROM auth_sessions WHERE token = ?1",
                params![session.access_token],
            )?;
            tracing::info!("Signed out {}", session.user.email);
        }
        self.state.send_replace(None);
        Ok(())
    }

    fn current_session(&self) -> Option<AuthSession> {
        self.state
            .borrow()
            .as_ref()
            .filter(|s| !s.is_expired(Utc::now()))
            .cloned()
    }

    fn subscribe(&self) -> watch::Receiver<Option<AuthSession>> {
        self.state.subscribe()
    }
}
