use thiserror::Error;

use crate::backend::{BackendError, DynBackend};
use crate::db::models::{Profile, ProfileStats, ProfileUpdate};
use crate::error::ValidationError;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Counts for `profile`. A missing or unreadable stats row yields zeros.
pub async fn profile_stats(backend: &DynBackend, profile: &Profile) -> ProfileStats {
    match backend.fetch_profile_stats(&profile.id).await {
        Ok(Some(stats)) => stats,
        Ok(None) => ProfileStats::empty(profile.clone()),
        Err(e) => {
            tracing::warn!("Profile stats for {} unavailable: {}", profile.id, e);
            ProfileStats::empty(profile.clone())
        }
    }
}

impl ProfileUpdate {
    pub fn parse(username: &str, full_name: &str) -> Result<Self, ValidationError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ValidationError::UsernameRequired);
        }
        Ok(Self {
            username: username.to_string(),
            full_name: full_name.trim().to_string(),
        })
    }
}

pub async fn update_profile(
    backend: &DynBackend,
    profile: &Profile,
    username: &str,
    full_name: &str,
) -> Result<Profile, ProfileError> {
    let update = ProfileUpdate::parse(username, full_name)?;
    let updated = backend.update_profile(&profile.id, &update).await?;
    tracing::info!("Profile {} updated", updated.id);
    Ok(updated)
}
