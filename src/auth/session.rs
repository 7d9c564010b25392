// Current-session context: identity plus lazily provisioned profile
use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;

use super::{AuthError, AuthSession, AuthUser, DynIdentityProvider};
use crate::backend::{BackendError, DynBackend};
use crate::db::models::{NewProfile, Profile, UserId};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The identity exists but its profile row could not be written.
    #[error("Profile creation failed: {0}")]
    Profile(#[source] BackendError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionState {
    pub session: Option<AuthSession>,
    pub profile: Option<Profile>,
    /// True until the first auth-state evaluation finishes.
    pub loading: bool,
}

impl SessionState {
    pub fn user(&self) -> Option<&AuthUser> {
        self.session.as_ref().map(|s| &s.user)
    }
}

/// Looks the profile up, provisioning it once if missing.
/// Any failure leaves the user authenticated but profile-less.
pub async fn resolve_profile(backend: &DynBackend, user_id: &UserId) -> Option<Profile> {
    match backend.fetch_profile(user_id).await {
        Ok(profile) => Some(profile),
        Err(e) if e.is_no_rows() => {
            tracing::info!("Profile for {} not found, provisioning", user_id);
            if let Err(e) = backend.ensure_profile_exists(user_id).await {
                tracing::warn!("Failed to provision profile for {}: {}", user_id, e);
                return None;
            }
            match backend.fetch_profile(user_id).await {
                Ok(profile) => Some(profile),
                Err(e) => {
                    tracing::warn!("Provisioned profile for {} unreadable: {}", user_id, e);
                    None
                }
            }
        }
        Err(e) => {
            tracing::warn!("Failed to load profile for {}: {}", user_id, e);
            None
        }
    }
}

async fn evaluate(backend: &DynBackend, session: Option<AuthSession>) -> SessionState {
    let profile = match session {
        Some(ref s) => resolve_profile(backend, &s.user.id).await,
        None => None,
    };
    SessionState {
        session,
        profile,
        loading: false,
    }
}

/// Owns the current session for the lifetime of the app.
///
/// One listener task follows the identity provider's auth-state events and
/// re-resolves the profile on every change. `shutdown` (or dropping the
/// provider) stops that task and releases the subscription.
///
/// The listener and `refresh` both publish state. Each holds the publish lock
/// from reading the auth state until the result is sent, so published states
/// follow the order in which they were evaluated.
pub struct SessionProvider {
    identity: DynIdentityProvider,
    backend: DynBackend,
    state: Arc<watch::Sender<SessionState>>,
    publish: Arc<AsyncMutex<()>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SessionProvider {
    /// Must be called inside a tokio runtime.
    pub fn start(identity: DynIdentityProvider, backend: DynBackend) -> Self {
        let (tx, _) = watch::channel(SessionState {
            session: identity.current_session(),
            profile: None,
            loading: true,
        });
        let state = Arc::new(tx);
        let publish = Arc::new(AsyncMutex::new(()));

        let mut auth_events = identity.subscribe();
        let task_state = Arc::clone(&state);
        let task_publish = Arc::clone(&publish);
        let task_backend = Arc::clone(&backend);
        let listener = tokio::spawn(async move {
            loop {
                {
                    let _guard = task_publish.lock().await;
                    let session = auth_events
                        .borrow_and_update()
                        .clone()
                        .filter(|s| !s.is_expired(Utc::now()));
                    let resolved = evaluate(&task_backend, session).await;

                    // A pending auth event supersedes this result.
                    if !auth_events.has_changed().unwrap_or(false) {
                        tracing::debug!(
                            "Auth state evaluated: user={:?} profile={}",
                            resolved.user().map(|u| u.id.as_str()),
                            resolved.profile.is_some()
                        );
                        task_state.send_replace(resolved);
                    }
                }

                if auth_events.changed().await.is_err() {
                    break;
                }
            }
        });

        Self {
            identity,
            backend,
            state,
            publish,
            listener: Mutex::new(Some(listener)),
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.state.borrow().user().cloned()
    }

    pub fn profile(&self) -> Option<Profile> {
        self.state.borrow().profile.clone()
    }

    /// Re-runs the profile resolution for the current identity state.
    pub async fn refresh(&self) -> SessionState {
        let _guard = self.publish.lock().await;
        let resolved = evaluate(&self.backend, self.identity.current_session()).await;
        self.state.send_replace(resolved.clone());
        resolved
    }

    /// Signs in and resolves the profile before returning, so the next
    /// snapshot already reflects the new user.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, SessionError> {
        let session = self.identity.sign_in_with_password(email, password).await?;
        self.refresh().await;
        Ok(session)
    }

    /// Creates the identity, then its profile. A profile failure is returned
    /// even though the identity now exists; the next evaluation provisions it.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
        full_name: &str,
    ) -> Result<AuthUser, SessionError> {
        let user = self.identity.sign_up(email, password).await?;
        tracing::info!("User signed up: {}", user.id);

        let profile = NewProfile {
            id: user.id.clone(),
            username: username.trim().to_string(),
            full_name: full_name.trim().to_string(),
        };
        if let Err(e) = self.backend.insert_profile(&profile).await {
            tracing::error!("Profile creation error for {}: {}", user.id, e);
            return Err(SessionError::Profile(e));
        }

        tracing::info!("Profile created for {}", user.id);
        Ok(user)
    }

    pub async fn sign_out(&self) -> Result<(), SessionError> {
        self.identity.sign_out().await?;
        self.refresh().await;
        Ok(())
    }

    /// Stops the auth listener. Idempotent.
    pub fn shutdown(&self) {
        let handle = match self.listener.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(handle) = handle {
            handle.abort();
            tracing::debug!("Session listener stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        match self.listener.lock() {
            Ok(guard) => guard.as_ref().is_some_and(|h| !h.is_finished()),
            Err(_) => false,
        }
    }
}

impl Drop for SessionProvider {
    fn drop(&mut self) {
        self.shutdown();
    }
}
