use futures::future::join_all;

use crate::backend::{BackendResult, DynBackend};
use crate::db::models::{Follow, ProfileStats, UserId};

/// Adds the edge `follower -> following`. An existing edge is an error.
pub async fn follow(
    backend: &DynBackend,
    follower_id: &UserId,
    following_id: &UserId,
) -> BackendResult<Follow> {
    let edge = backend.insert_follow(follower_id, following_id).await?;
    tracing::info!("{} now follows {}", follower_id, following_id);
    Ok(edge)
}

/// Removes the edge if present; returns whether one existed.
pub async fn unfollow(
    backend: &DynBackend,
    follower_id: &UserId,
    following_id: &UserId,
) -> BackendResult<bool> {
    let removed = backend.delete_follow(follower_id, following_id).await?;
    if removed {
        tracing::info!("{} unfollowed {}", follower_id, following_id);
    }
    Ok(removed)
}

/// Ids the user follows; empty when the lookup fails.
pub async fn followed_author_ids(backend: &DynBackend, user_id: &UserId) -> Vec<UserId> {
    match backend.list_following_ids(user_id).await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!("Following list for {} unavailable: {}", user_id, e);
            Vec::new()
        }
    }
}

/// Profiles the user follows, each with its counts. Targets whose stats
/// cannot be read are left out.
pub async fn list_following(
    backend: &DynBackend,
    user_id: &UserId,
) -> BackendResult<Vec<ProfileStats>> {
    let ids = backend.list_following_ids(user_id).await?;

    let resolved = join_all(ids.iter().map(|id| async move {
        match backend.fetch_profile_stats(id).await {
            Ok(stats) => stats,
            Err(e) => {
                tracing::warn!("Stats for followed profile {} unavailable: {}", id, e);
                None
            }
        }
    }))
    .await;

    Ok(resolved.into_iter().flatten().collect())
}
