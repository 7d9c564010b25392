// Feed assembly: listing, reactions, preferences and the "For You" view
pub mod personalize;
pub mod posts;
pub mod preferences;
pub mod reactions;

use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::backend::{BackendResult, DynBackend, PostFilter};
use crate::db::models::{PostWithReactions, UserId};
use crate::social::follows::followed_author_ids;

pub use personalize::{personalize, FALLBACK_POST_COUNT, RECENCY_WINDOW_HOURS};
pub use posts::{create_post, enrich_posts, list_posts, list_tags, CreatePostError, CreatePostInput};
pub use preferences::{load_preferred_tags, save_preferred_tags, PreferencesError};
pub use reactions::{get_reaction_view, set_reaction, ReactionOutcome, ReactionView};

/// The viewer's personalized feed.
///
/// Preferences and follows that cannot be read count as empty, which makes
/// the result the full feed. Selection happens before enrichment so only the
/// kept posts cost reaction lookups.
pub async fn personalized_feed(
    backend: &DynBackend,
    viewer: &UserId,
    now: DateTime<Utc>,
) -> BackendResult<Vec<PostWithReactions>> {
    let preferred: HashSet<_> = load_preferred_tags(backend, viewer).await.into_iter().collect();
    let followed: HashSet<_> = followed_author_ids(backend, viewer).await.into_iter().collect();

    let posts = backend.list_posts(&PostFilter::all()).await?;
    let total = posts.len();
    let selected = personalize(posts, &preferred, &followed, now);
    tracing::debug!(
        "Personalized feed for {}: {} of {} posts",
        viewer,
        selected.len(),
        total
    );

    Ok(enrich_posts(backend, selected, Some(viewer)).await)
}
