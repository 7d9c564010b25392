// Preferred tags per user
use std::collections::HashSet;
use thiserror::Error;

use crate::backend::{BackendError, DynBackend};
use crate::db::models::{TagId, UserId, UserPreferences};
use crate::error::ValidationError;

#[derive(Debug, Error)]
pub enum PreferencesError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// The user's preferred tag ids. A user who never saved any, or whose row
/// cannot be read, has none.
pub async fn load_preferred_tags(backend: &DynBackend, user_id: &UserId) -> Vec<TagId> {
    match backend.fetch_preferences(user_id).await {
        Ok(prefs) => prefs.preferred_tags,
        Err(e) if e.is_no_rows() => Vec::new(),
        Err(e) => {
            tracing::warn!("Preferences for {} unavailable: {}", user_id, e);
            Vec::new()
        }
    }
}

/// Replaces the user's preferred tags. Every id must name an existing tag;
/// duplicates are collapsed keeping first occurrence.
pub async fn save_preferred_tags(
    backend: &DynBackend,
    user_id: &UserId,
    tag_ids: &[TagId],
) -> Result<UserPreferences, PreferencesError> {
    let known: HashSet<TagId> = backend.list_tags().await?.into_iter().map(|t| t.id).collect();

    let mut selected: Vec<TagId> = Vec::with_capacity(tag_ids.len());
    for tag in tag_ids {
        if !known.contains(tag) {
            return Err(ValidationError::UnknownTag(tag.clone()).into());
        }
        if !selected.contains(tag) {
            selected.push(tag.clone());
        }
    }

    let prefs = backend.upsert_preferences(user_id, &selected).await?;
    tracing::info!("Saved {} preferred tags for {}", prefs.preferred_tags.len(), user_id);
    Ok(prefs)
}
