use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn generate() -> Self {
                Self(uuid::Uuid::now_v7().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Identity of an account; shared by the identity provider and `profiles.id`.
    UserId
);
string_id!(PostId);
string_id!(TagId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionType {
    Like,
    Dislike,
    Love,
    Laugh,
    Angry,
    Sad,
}

impl ReactionType {
    pub const ALL: [ReactionType; 6] = [
        ReactionType::Like,
        ReactionType::Dislike,
        ReactionType::Love,
        ReactionType::Laugh,
        ReactionType::Angry,
        ReactionType::Sad,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionType::Like => "like",
            ReactionType::Dislike => "dislike",
            ReactionType::Love => "love",
            ReactionType::Laugh => "laugh",
            ReactionType::Angry => "angry",
            ReactionType::Sad => "sad",
        }
    }
}

impl fmt::Display for ReactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownReactionType(pub String);

impl fmt::Display for UnknownReactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown reaction type: {}", self.0)
    }
}

impl std::error::Error for UnknownReactionType {}

impl FromStr for ReactionType {
    type Err = UnknownReactionType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReactionType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownReactionType(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    pub avatar_url: String,
    pub created_at: DateTime<Utc>,
}

/// Author fields embedded in feed rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
    pub avatar_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub description: String,
    pub author_id: UserId,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub image_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostTag {
    pub id: String,
    pub post_id: PostId,
    pub tag_id: TagId,
    pub tag: Option<Tag>,
}

/// A post joined with its author and tags, as returned by the feed query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostWithAuthor {
    #[serde(flatten)]
    pub post: Post,
    pub author: Option<ProfileSummary>,
    pub tags: Vec<PostTag>,
}

impl PostWithAuthor {
    pub fn tag_ids(&self) -> impl Iterator<Item = &TagId> {
        self.tags.iter().map(|t| &t.tag_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: String,
    pub user_id: UserId,
    pub post_id: PostId,
    pub reaction_type: ReactionType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Follow {
    pub id: String,
    pub follower_id: UserId,
    pub following_id: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    pub id: String,
    pub user_id: UserId,
    pub preferred_tags: Vec<TagId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Profile plus aggregate counts, recomputed on every read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileStats {
    #[serde(flatten)]
    pub profile: Profile,
    pub followers_count: i64,
    pub following_count: i64,
    pub posts_count: i64,
}

impl ProfileStats {
    pub fn empty(profile: Profile) -> Self {
        Self {
            profile,
            followers_count: 0,
            following_count: 0,
            posts_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostWithReactions {
    #[serde(flatten)]
    pub post: PostWithAuthor,
    /// Types nobody used are absent.
    pub reaction_counts: BTreeMap<ReactionType, i64>,
    pub user_reaction: Option<Reaction>,
}

// -- Write shapes --

#[derive(Debug, Clone, PartialEq)]
pub struct NewProfile {
    pub id: UserId,
    pub username: String,
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub author_id: UserId,
    pub title: String,
    pub description: String,
    pub location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub image_urls: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileUpdate {
    pub username: String,
    pub full_name: String,
}
