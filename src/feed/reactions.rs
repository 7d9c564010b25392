// Reaction counts, the viewer's own reaction, and toggling
use serde::Serialize;
use std::collections::BTreeMap;

use crate::backend::{BackendResult, DynBackend};
use crate::db::models::{PostId, Reaction, ReactionType, UserId};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReactionView {
    pub counts: BTreeMap<ReactionType, i64>,
    pub own: Option<Reaction>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionOutcome {
    Added,
    Changed,
    Removed,
}

/// Folds `(type, count)` pairs into a map. A repeated type keeps its last count.
pub fn counts_from_pairs(
    pairs: impl IntoIterator<Item = (ReactionType, i64)>,
) -> BTreeMap<ReactionType, i64> {
    pairs.into_iter().collect()
}

/// Counts and own reaction for one post. Lookup failures degrade to an
/// empty map / no reaction instead of failing.
pub async fn get_reaction_view(
    backend: &DynBackend,
    post_id: &PostId,
    viewer: Option<&UserId>,
) -> ReactionView {
    let counts = match backend.reaction_counts_for_post(post_id).await {
        Ok(pairs) => counts_from_pairs(pairs),
        Err(e) => {
            tracing::warn!("Reaction counts for {} unavailable: {}", post_id, e);
            BTreeMap::new()
        }
    };

    let own = match viewer {
        Some(viewer) => match backend.fetch_reaction(viewer, post_id).await {
            Ok(reaction) => Some(reaction),
            Err(e) if e.is_no_rows() => None,
            Err(e) => {
                tracing::warn!("Own reaction of {} on {} unavailable: {}", viewer, post_id, e);
                None
            }
        },
        None => None,
    };

    ReactionView { counts, own }
}

/// Applies a tap on a reaction button: add, switch type in place, or remove
/// when the same type is tapped again.
///
/// The read and the write are separate calls. Two concurrent taps by the same
/// user can interleave; a colliding double insert surfaces as a unique
/// violation from the backend.
pub async fn set_reaction(
    backend: &DynBackend,
    user_id: &UserId,
    post_id: &PostId,
    reaction_type: ReactionType,
) -> BackendResult<ReactionOutcome> {
    let existing = match backend.fetch_reaction(user_id, post_id).await {
        Ok(reaction) => Some(reaction),
        Err(e) if e.is_no_rows() => None,
        Err(e) => return Err(e),
    };

    match existing {
        None => {
            backend.insert_reaction(user_id, post_id, reaction_type).await?;
            Ok(ReactionOutcome::Added)
        }
        Some(reaction) if reaction.reaction_type == reaction_type => {
            backend.delete_reaction(&reaction.id).await?;
            Ok(ReactionOutcome::Removed)
        }
        Some(reaction) => {
            backend.update_reaction_type(&reaction.id, reaction_type).await?;
            Ok(ReactionOutcome::Changed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_from_pairs_builds_map() {
        let counts = counts_from_pairs(vec![(ReactionType::Like, 2), (ReactionType::Sad, 1)]);
        assert_eq!(counts.get(&ReactionType::Like), Some(&2));
        assert_eq!(counts.get(&ReactionType::Sad), Some(&1));
        assert_eq!(counts.get(&ReactionType::Love), None);
    }

    #[test]
    fn counts_from_no_pairs_is_empty() {
        assert!(counts_from_pairs(Vec::new()).is_empty());
    }

    #[test]
    fn outcome_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ReactionOutcome::Removed).unwrap(),
            "\"removed\""
        );
    }
}
