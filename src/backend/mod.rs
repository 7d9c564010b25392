// Backend data interface - every table access and RPC the app performs
pub mod sqlite;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::db::models::*;

pub use sqlite::SqliteBackend;

/// Failure classes the callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A single-row fetch matched nothing.
    NoRows,
    UniqueViolation,
    ForeignKeyViolation,
    PermissionDenied,
    /// Malformed argument or stored row.
    Invalid,
    /// Transport, pool or driver failure.
    Unavailable,
}

impl ErrorKind {
    /// Postgres-style error code, as reported by the hosted backend.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::NoRows => "PGRST116",
            ErrorKind::UniqueViolation => "23505",
            ErrorKind::ForeignKeyViolation => "23503",
            ErrorKind::PermissionDenied => "42501",
            ErrorKind::Invalid => "22023",
            ErrorKind::Unavailable => "08006",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Error)]
#[error("{message} (code {kind})")]
pub struct BackendError {
    pub kind: ErrorKind,
    pub message: String,
}

impl BackendError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn no_rows(what: impl fmt::Display) -> Self {
        Self::new(ErrorKind::NoRows, format!("{} not found", what))
    }

    pub fn is_no_rows(&self) -> bool {
        self.kind == ErrorKind::NoRows
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Equality filters for the post listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostFilter {
    pub author_id: Option<UserId>,
}

impl PostFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_author(author_id: UserId) -> Self {
        Self {
            author_id: Some(author_id),
        }
    }
}

/// Table and RPC operations of the hosted data backend.
#[async_trait]
pub trait Backend: Send + Sync {
    // -- profiles --

    /// Single-row fetch; `NoRows` when the profile does not exist.
    async fn fetch_profile(&self, id: &UserId) -> BackendResult<Profile>;

    async fn insert_profile(&self, profile: &NewProfile) -> BackendResult<Profile>;

    async fn update_profile(&self, id: &UserId, update: &ProfileUpdate) -> BackendResult<Profile>;

    /// Idempotent provisioning RPC: creates a default profile for an identity.
    async fn ensure_profile_exists(&self, id: &UserId) -> BackendResult<()>;

    async fn fetch_profile_stats(&self, id: &UserId) -> BackendResult<Option<ProfileStats>>;

    // -- posts and tags --

    /// Posts joined with author and tags, newest first.
    async fn list_posts(&self, filter: &PostFilter) -> BackendResult<Vec<PostWithAuthor>>;

    async fn insert_post(&self, post: &NewPost) -> BackendResult<Post>;

    async fn insert_post_tags(&self, post_id: &PostId, tag_ids: &[TagId]) -> BackendResult<()>;

    async fn list_tags(&self) -> BackendResult<Vec<Tag>>;

    // -- reactions --

    /// Aggregation RPC: `(reaction_type, count)` pairs for one post.
    async fn reaction_counts_for_post(
        &self,
        post_id: &PostId,
    ) -> BackendResult<Vec<(ReactionType, i64)>>;

    /// Single-row fetch by `(user_id, post_id)`; `NoRows` when absent.
    async fn fetch_reaction(&self, user_id: &UserId, post_id: &PostId) -> BackendResult<Reaction>;

    async fn insert_reaction(
        &self,
        user_id: &UserId,
        post_id: &PostId,
        reaction_type: ReactionType,
    ) -> BackendResult<Reaction>;

    async fn update_reaction_type(
        &self,
        reaction_id: &str,
        reaction_type: ReactionType,
    ) -> BackendResult<()>;

    async fn delete_reaction(&self, reaction_id: &str) -> BackendResult<()>;

    // -- follows --

    async fn insert_follow(&self, follower_id: &UserId, following_id: &UserId)
        -> BackendResult<Follow>;

    /// Returns whether an edge was removed.
    async fn delete_follow(&self, follower_id: &UserId, following_id: &UserId)
        -> BackendResult<bool>;

    async fn list_following_ids(&self, follower_id: &UserId) -> BackendResult<Vec<UserId>>;

    // -- preferences --

    /// Single-row fetch; `NoRows` when the user never saved preferences.
    async fn fetch_preferences(&self, user_id: &UserId) -> BackendResult<UserPreferences>;

    async fn upsert_preferences(
        &self,
        user_id: &UserId,
        preferred_tags: &[TagId],
    ) -> BackendResult<UserPreferences>;
}

pub type DynBackend = Arc<dyn Backend>;
