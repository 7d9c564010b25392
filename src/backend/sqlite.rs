// SQLite implementation of the backend data interface
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::ffi;
use rusqlite::{params, OptionalExtension, Row};
use std::collections::HashMap;

use super::{Backend, BackendError, BackendResult, ErrorKind, PostFilter};
use crate::db::models::*;
use crate::state::DbPool;

impl From<rusqlite::Error> for BackendError {
    fn from(err: rusqlite::Error) -> Self {
        let kind = match &err {
            rusqlite::Error::QueryReturnedNoRows => ErrorKind::NoRows,
            rusqlite::Error::SqliteFailure(e, _) => match e.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    ErrorKind::UniqueViolation
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ErrorKind::ForeignKeyViolation,
                ffi::SQLITE_CONSTRAINT_CHECK | ffi::SQLITE_CONSTRAINT_NOTNULL => {
                    ErrorKind::Invalid
                }
                _ => match e.code {
                    rusqlite::ErrorCode::ReadOnly
                    | rusqlite::ErrorCode::PermissionDenied
                    | rusqlite::ErrorCode::AuthorizationForStatementDenied => {
                        ErrorKind::PermissionDenied
                    }
                    _ => ErrorKind::Unavailable,
                },
            },
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..) => ErrorKind::Invalid,
            _ => ErrorKind::Unavailable,
        };
        BackendError::new(kind, err.to_string())
    }
}

impl From<r2d2::Error> for BackendError {
    fn from(err: r2d2::Error) -> Self {
        BackendError::new(ErrorKind::Unavailable, format!("Pool error: {}", err))
    }
}

impl From<serde_json::Error> for BackendError {
    fn from(err: serde_json::Error) -> Self {
        BackendError::new(ErrorKind::Invalid, format!("JSON error: {}", err))
    }
}

pub(crate) fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn datetime_at(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn json_at<T: serde::de::DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn reaction_type_at(row: &Row, idx: usize) -> rusqlite::Result<ReactionType> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

const PROFILE_COLUMNS: &str = "id, username, full_name, avatar_url, created_at";

fn profile_from_row(row: &Row, offset: usize) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: UserId::new(row.get::<_, String>(offset)?),
        username: row.get(offset + 1)?,
        full_name: row.get(offset + 2)?,
        avatar_url: row.get(offset + 3)?,
        created_at: datetime_at(row, offset + 4)?,
    })
}

fn post_from_row(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: PostId::new(row.get::<_, String>(0)?),
        title: row.get(1)?,
        description: row.get(2)?,
        author_id: UserId::new(row.get::<_, String>(3)?),
        location: row.get(4)?,
        latitude: row.get(5)?,
        longitude: row.get(6)?,
        image_urls: json_at(row, 7)?,
        created_at: datetime_at(row, 8)?,
        updated_at: datetime_at(row, 9)?,
    })
}

const REACTION_COLUMNS: &str = "id, user_id, post_id, reaction_type, created_at";

fn reaction_from_row(row: &Row) -> rusqlite::Result<Reaction> {
    Ok(Reaction {
        id: row.get(0)?,
        user_id: UserId::new(row.get::<_, String>(1)?),
        post_id: PostId::new(row.get::<_, String>(2)?),
        reaction_type: reaction_type_at(row, 3)?,
        created_at: datetime_at(row, 4)?,
    })
}

fn preferences_from_row(row: &Row) -> rusqlite::Result<UserPreferences> {
    Ok(UserPreferences {
        id: row.get(0)?,
        user_id: UserId::new(row.get::<_, String>(1)?),
        preferred_tags: json_at(row, 2)?,
        created_at: datetime_at(row, 3)?,
        updated_at: datetime_at(row, 4)?,
    })
}

/// Backend served from the local SQLite database.
pub struct SqliteBackend {
    pool: DbPool,
}

impl SqliteBackend {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    async fn fetch_profile(&self, id: &UserId) -> BackendResult<Profile> {
        let conn = self.pool.get()?;
        conn.query_row(
            &format!("SELECT {} FROM profiles WHERE id = ?1", PROFILE_COLUMNS),
            params![id.as_str()],
            |row| profile_from_row(row, 0),
        )
        .optional()?
        .ok_or_else(|| BackendError::no_rows(format!("profile {}", id)))
    }

    async fn insert_profile(&self, profile: &NewProfile) -> BackendResult<Profile> {
        let conn = self.pool.get()?;
        let now = Utc::now();

        conn.execute(
            "INSERT INTO profiles (id, username, full_name, avatar_url, created_at)
             VALUES (?1, ?2, ?3, '', ?4)",
            params![
                profile.id.as_str(),
                profile.username,
                profile.full_name,
                timestamp(now)
            ],
        )?;

        Ok(Profile {
            id: profile.id.clone(),
            username: profile.username.clone(),
            full_name: profile.full_name.clone(),
            avatar_url: String::new(),
            created_at: now,
        })
    }

    async fn update_profile(&self, id: &UserId, update: &ProfileUpdate) -> BackendResult<Profile> {
        {
            let conn = self.pool.get()?;
            let rows = conn.execute(
                "UPDATE profiles SET username = ?1, full_name = ?2 WHERE id = ?3",
                params![update.username, update.full_name, id.as_str()],
            )?;
            if rows == 0 {
                return Err(BackendError::no_rows(format!("profile {}", id)));
            }
        }
        self.fetch_profile(id).await
    }

    async fn ensure_profile_exists(&self, id: &UserId) -> BackendResult<()> {
        let conn = self.pool.get()?;

        conn.execute(
            "INSERT INTO profiles (id, username, full_name, avatar_url, created_at)
             SELECT id, 'user_' || substr(replace(id, '-', ''), -12), '', '', ?2
             FROM auth_users WHERE id = ?1
             ON CONFLICT(id) DO NOTHING",
            params![id.as_str(), timestamp(Utc::now())],
        )?;

        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM profiles WHERE id = ?1",
            params![id.as_str()],
            |row| row.get(0),
        )?;

        if exists {
            Ok(())
        } else {
            Err(BackendError::new(
                ErrorKind::ForeignKeyViolation,
                format!("no identity for user {}", id),
            ))
        }
    }

    async fn fetch_profile_stats(&self, id: &UserId) -> BackendResult<Option<ProfileStats>> {
        let conn = self.pool.get()?;
        let stats = conn
            .query_row(
                &format!(
                    "SELECT {}, followers_count, following_count, posts_count
                     FROM profile_stats WHERE id = ?1",
                    PROFILE_COLUMNS
                ),
                params![id.as_str()],
                |row| {
                    Ok(ProfileStats {
                        profile: profile_from_row(row, 0)?,
                        followers_count: row.get(5)?,
                        following_count: row.get(6)?,
                        posts_count: row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(stats)
    }

    async fn list_posts(&self, filter: &PostFilter) -> BackendResult<Vec<PostWithAuthor>> {
        let conn = self.pool.get()?;
        let author = filter.author_id.as_ref().map(|a| a.as_str());

        let mut tags_by_post: HashMap<PostId, Vec<PostTag>> = HashMap::new();
        {
            let mut stmt = conn.prepare(
                "SELECT pt.id, pt.post_id, t.id, t.name, t.color, t.created_at
                 FROM post_tags pt
                 JOIN tags t ON t.id = pt.tag_id
                 JOIN posts p ON p.id = pt.post_id
                 WHERE (?1 IS NULL OR p.author_id = ?1)
                 ORDER BY t.name",
            )?;
            let rows = stmt.query_map(params![author], |row| {
                let tag = Tag {
                    id: TagId::new(row.get::<_, String>(2)?),
                    name: row.get(3)?,
                    color: row.get(4)?,
                    created_at: datetime_at(row, 5)?,
                };
                Ok(PostTag {
                    id: row.get(0)?,
                    post_id: PostId::new(row.get::<_, String>(1)?),
                    tag_id: tag.id.clone(),
                    tag: Some(tag),
                })
            })?;
            for row in rows {
                let post_tag = row?;
                tags_by_post
                    .entry(post_tag.post_id.clone())
                    .or_default()
                    .push(post_tag);
            }
        }

        let mut stmt = conn.prepare(
            "SELECT p.id, p.title, p.description, p.author_id, p.location, p.latitude,
                    p.longitude, p.image_urls, p.created_at, p.updated_at,
                    pr.id, pr.username, pr.full_name, pr.avatar_url
             FROM posts p
             LEFT JOIN profiles pr ON pr.id = p.author_id
             WHERE (?1 IS NULL OR p.author_id = ?1)
             ORDER BY p.created_at DESC, p.id DESC",
        )?;
        let rows = stmt.query_map(params![author], |row| {
            let post = post_from_row(row)?;
            let author = match row.get::<_, Option<String>>(10)? {
                Some(id) => Some(ProfileSummary {
                    id: UserId::new(id),
                    username: row.get(11)?,
                    full_name: row.get(12)?,
                    avatar_url: row.get(13)?,
                }),
                None => None,
            };
            Ok((post, author))
        })?;

        let mut posts = Vec::new();
        for row in rows {
            let (post, author) = row?;
            let tags = tags_by_post.remove(&post.id).unwrap_or_default();
            posts.push(PostWithAuthor { post, author, tags });
        }
        Ok(posts)
    }

    async fn insert_post(&self, post: &NewPost) -> BackendResult<Post> {
        let conn = self.pool.get()?;
        let id = PostId::generate();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO posts (id, title, description, author_id, location, latitude,
                                longitude, image_urls, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                id.as_str(),
                post.title,
                post.description,
                post.author_id.as_str(),
                post.location,
                post.latitude,
                post.longitude,
                serde_json::to_string(&post.image_urls)?,
                timestamp(now),
            ],
        )?;

        Ok(Post {
            id,
            title: post.title.clone(),
            description: post.description.clone(),
            author_id: post.author_id.clone(),
            location: post.location.clone(),
            latitude: post.latitude,
            longitude: post.longitude,
            image_urls: post.image_urls.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    async fn insert_post_tags(&self, post_id: &PostId, tag_ids: &[TagId]) -> BackendResult<()> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        for tag_id in tag_ids {
            tx.execute(
                "INSERT INTO post_tags (id, post_id, tag_id) VALUES (?1, ?2, ?3)",
                params![
                    uuid::Uuid::now_v7().to_string(),
                    post_id.as_str(),
                    tag_id.as_str()
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    async fn list_tags(&self) -> BackendResult<Vec<Tag>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare("SELECT id, name, color, created_at FROM tags ORDER BY name")?;
        let tags = stmt
            .query_map([], |row| {
                Ok(Tag {
                    id: TagId::new(row.get::<_, String>(0)?),
                    name: row.get(1)?,
                    color: row.get(2)?,
                    created_at: datetime_at(row, 3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    async fn reaction_counts_for_post(
        &self,
        post_id: &PostId,
    ) -> BackendResult<Vec<(ReactionType, i64)>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT reaction_type, COUNT(*) FROM reactions
             WHERE post_id = ?1
             GROUP BY reaction_type
             ORDER BY reaction_type",
        )?;
        let counts = stmt
            .query_map(params![post_id.as_str()], |row| {
                Ok((reaction_type_at(row, 0)?, row.get(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(counts)
    }

    async fn fetch_reaction(&self, user_id: &UserId, post_id: &PostId) -> BackendResult<Reaction> {
        let conn = self.pool.get()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM reactions WHERE user_id = ?1 AND post_id = ?2",
                REACTION_COLUMNS
            ),
            params![user_id.as_str(), post_id.as_str()],
            reaction_from_row,
        )
        .optional()?
        .ok_or_else(|| BackendError::no_rows(format!("reaction of {} on {}", user_id, post_id)))
    }

    async fn insert_reaction(
        &self,
        user_id: &UserId,
        post_id: &PostId,
        reaction_type: ReactionType,
    ) -> BackendResult<Reaction> {
        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO reactions (id, user_id, post_id, reaction_type, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id,
                user_id.as_str(),
                post_id.as_str(),
                reaction_type.as_str(),
                timestamp(now)
            ],
        )?;

        Ok(Reaction {
            id,
            user_id: user_id.clone(),
            post_id: post_id.clone(),
            reaction_type,
            created_at: now,
        })
    }

    async fn update_reaction_type(
        &self,
        reaction_id: &str,
        reaction_type: ReactionType,
    ) -> BackendResult<()> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "UPDATE reactions SET reaction_type = ?1 WHERE id = ?2",
            params![reaction_type.as_str(), reaction_id],
        )?;
        if rows == 0 {
            return Err(BackendError::no_rows(format!("reaction {}", reaction_id)));
        }
        Ok(())
    }

    async fn delete_reaction(&self, reaction_id: &str) -> BackendResult<()> {
        let conn = self.pool.get()?;
        conn.execute("DELETE FROM reactions WHERE id = ?1", params![reaction_id])?;
        Ok(())
    }

    async fn insert_follow(
        &self,
        follower_id: &UserId,
        following_id: &UserId,
    ) -> BackendResult<Follow> {
        let conn = self.pool.get()?;
        let id = uuid::Uuid::now_v7().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO follows (id, follower_id, following_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![id, follower_id.as_str(), following_id.as_str(), timestamp(now)],
        )?;

        Ok(Follow {
            id,
            follower_id: follower_id.clone(),
            following_id: following_id.clone(),
            created_at: now,
        })
    }

    async fn delete_follow(
        &self,
        follower_id: &UserId,
        following_id: &UserId,
    ) -> BackendResult<bool> {
        let conn = self.pool.get()?;
        let rows = conn.execute(
            "DELETE FROM follows WHERE follower_id = ?1 AND following_id = ?2",
            params![follower_id.as_str(), following_id.as_str()],
        )?;
        Ok(rows > 0)
    }

    async fn list_following_ids(&self, follower_id: &UserId) -> BackendResult<Vec<UserId>> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT following_id FROM follows WHERE follower_id = ?1 ORDER BY created_at DESC",
        )?;
        let ids = stmt
            .query_map(params![follower_id.as_str()], |row| {
                Ok(UserId::new(row.get::<_, String>(0)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ids)
    }

    async fn fetch_preferences(&self, user_id: &UserId) -> BackendResult<UserPreferences> {
        let conn = self.pool.get()?;
        conn.query_row(
            "SELECT id, user_id, preferred_tags, created_at, updated_at
             FROM user_preferences WHERE user_id = ?1",
            params![user_id.as_str()],
            preferences_from_row,
        )
        .optional()?
        .ok_or_else(|| BackendError::no_rows(format!("preferences of {}", user_id)))
    }

    async fn upsert_preferences(
        &self,
        user_id: &UserId,
        preferred_tags: &[TagId],
    ) -> BackendResult<UserPreferences> {
        {
            let conn = self.pool.get()?;
            let now = timestamp(Utc::now());
            conn.execute(
                "INSERT INTO user_preferences (id, user_id, preferred_tags, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(user_id) DO UPDATE SET
                   preferred_tags = excluded.preferred_tags,
                   updated_at = excluded.updated_at",
                params![
                    uuid::Uuid::now_v7().to_string(),
                    user_id.as_str(),
                    serde_json::to_string(preferred_tags)?,
                    now
                ],
            )?;
        }
        self.fetch_preferences(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use tempfile::TempDir;

    fn create_test_backend() -> (SqliteBackend, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let pool = db::create_pool(&temp_dir.path().join("test.db")).unwrap();
        db::run_migrations(&pool).unwrap();
        (SqliteBackend::new(pool), temp_dir)
    }

    fn seed_identity(backend: &SqliteBackend, id: &str) -> UserId {
        let conn = backend.pool.get().unwrap();
        conn.execute(
            "INSERT INTO auth_users (id, email, password_hash, created_at)
             VALUES (?1, ?2, 'x', ?3)",
            params![id, format!("{}@example.com", id), timestamp(Utc::now())],
        )
        .unwrap();
        UserId::new(id)
    }

    async fn seed_user(backend: &SqliteBackend, id: &str) -> UserId {
        let user = seed_identity(backend, id);
        backend
            .insert_profile(&NewProfile {
                id: user.clone(),
                username: id.to_string(),
                full_name: format!("{} Example", id),
            })
            .await
            .unwrap();
        user
    }

    fn new_post(author: &UserId, title: &str) -> NewPost {
        NewPost {
            author_id: author.clone(),
            title: title.to_string(),
            description: String::new(),
            location: "Lisbon".to_string(),
            latitude: None,
            longitude: None,
            image_urls: vec!["file:///photo.jpg".to_string()],
        }
    }

    #[tokio::test]
    async fn test_fetch_missing_profile_is_no_rows() {
        let (backend, _temp) = create_test_backend();
        let err = backend.fetch_profile(&UserId::new("ghost")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoRows);
    }

    #[tokio::test]
    async fn test_insert_and_fetch_profile() {
        let (backend, _temp) = create_test_backend();
        let alice = seed_user(&backend, "alice").await;

        let profile = backend.fetch_profile(&alice).await.unwrap();
        assert_eq!(profile.username, "alice");
        assert_eq!(profile.full_name, "alice Example");
    }

    #[tokio::test]
    async fn test_duplicate_username_is_unique_violation() {
        let (backend, _temp) = create_test_backend();
        seed_user(&backend, "alice").await;
        let bob = seed_user(&backend, "bob").await;

        let err = backend
            .update_profile(
                &bob,
                &ProfileUpdate {
                    username: "alice".into(),
                    full_name: "Bob".into(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UniqueViolation);
        assert_eq!(err.code(), "23505");
    }

    #[tokio::test]
    async fn test_ensure_profile_exists_is_idempotent() {
        let (backend, _temp) = create_test_backend();
        let user = seed_identity(&backend, "0190aaaa-bbbb-7ccc-8ddd-eeeeffff0001");

        backend.ensure_profile_exists(&user).await.unwrap();
        let first = backend.fetch_profile(&user).await.unwrap();
        assert_eq!(first.username, "user_eeeeffff0001");

        backend.ensure_profile_exists(&user).await.unwrap();
        let second = backend.fetch_profile(&user).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_ensure_profile_without_identity_fails() {
        let (backend, _temp) = create_test_backend();
        let err = backend
            .ensure_profile_exists(&UserId::new("nobody"))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ForeignKeyViolation);
    }

    #[tokio::test]
    async fn test_insert_post_without_profile_is_foreign_key_violation() {
        let (backend, _temp) = create_test_backend();
        let orphan = seed_identity(&backend, "orphan");

        let err = backend.insert_post(&new_post(&orphan, "hi")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::ForeignKeyViolation);
        assert_eq!(err.code(), "23503");
    }

    #[tokio::test]
    async fn test_list_posts_joins_author_and_tags_newest_first() {
        let (backend, _temp) = create_test_backend();
        let alice = seed_user(&backend, "alice").await;
        let bob = seed_user(&backend, "bob").await;

        let first = backend.insert_post(&new_post(&alice, "first")).await.unwrap();
        let second = backend.insert_post(&new_post(&bob, "second")).await.unwrap();
        backend
            .insert_post_tags(&first.id, &[TagId::new("sports"), TagId::new("music")])
            .await
            .unwrap();

        let posts = backend.list_posts(&PostFilter::all()).await.unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].post.id, second.id);
        assert_eq!(posts[1].post.id, first.id);

        let tagged = &posts[1];
        assert_eq!(tagged.author.as_ref().unwrap().username, "alice");
        let tag_names: Vec<&str> = tagged
            .tags
            .iter()
            .map(|t| t.tag.as_ref().unwrap().name.as_str())
            .collect();
        assert_eq!(tag_names, vec!["Music", "Sports"]);
        assert_eq!(tagged.post.image_urls, vec!["file:///photo.jpg".to_string()]);
        assert!(posts[0].tags.is_empty());
    }

    #[tokio::test]
    async fn test_list_posts_by_author() {
        let (backend, _temp) = create_test_backend();
        let alice = seed_user(&backend, "alice").await;
        let bob = seed_user(&backend, "bob").await;
        backend.insert_post(&new_post(&alice, "a")).await.unwrap();
        backend.insert_post(&new_post(&bob, "b")).await.unwrap();

        let posts = backend.list_posts(&PostFilter::by_author(bob.clone())).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].post.author_id, bob);
    }

    #[tokio::test]
    async fn test_duplicate_post_tag_rolls_back() {
        let (backend, _temp) = create_test_backend();
        let alice = seed_user(&backend, "alice").await;
        let post = backend.insert_post(&new_post(&alice, "a")).await.unwrap();

        let err = backend
            .insert_post_tags(&post.id, &[TagId::new("food"), TagId::new("food")])
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UniqueViolation);

        let posts = backend.list_posts(&PostFilter::all()).await.unwrap();
        assert!(posts[0].tags.is_empty());
    }

    #[tokio::test]
    async fn test_reaction_counts_grouped_by_type() {
        let (backend, _temp) = create_test_backend();
        let alice = seed_user(&backend, "alice").await;
        let bob = seed_user(&backend, "bob").await;
        let carol = seed_user(&backend, "carol").await;
        let post = backend.insert_post(&new_post(&alice, "a")).await.unwrap();

        backend.insert_reaction(&alice, &post.id, ReactionType::Love).await.unwrap();
        backend.insert_reaction(&bob, &post.id, ReactionType::Love).await.unwrap();
        backend.insert_reaction(&carol, &post.id, ReactionType::Sad).await.unwrap();

        let counts = backend.reaction_counts_for_post(&post.id).await.unwrap();
        assert_eq!(
            counts,
            vec![(ReactionType::Love, 2), (ReactionType::Sad, 1)]
        );
    }

    #[tokio::test]
    async fn test_second_reaction_row_for_pair_is_rejected() {
        let (backend, _temp) = create_test_backend();
        let alice = seed_user(&backend, "alice").await;
        let post = backend.insert_post(&new_post(&alice, "a")).await.unwrap();

        backend.insert_reaction(&alice, &post.id, ReactionType::Like).await.unwrap();
        let err = backend
            .insert_reaction(&alice, &post.id, ReactionType::Love)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::UniqueViolation);
    }

    #[tokio::test]
    async fn test_update_and_delete_reaction() {
        let (backend, _temp) = create_test_backend();
        let alice = seed_user(&backend, "alice").await;
        let post = backend.insert_post(&new_post(&alice, "a")).await.unwrap();

        let reaction = backend
            .insert_reaction(&alice, &post.id, ReactionType::Like)
            .await
            .unwrap();
        backend
            .update_reaction_type(&reaction.id, ReactionType::Angry)
            .await
            .unwrap();
        let fetched = backend.fetch_reaction(&alice, &post.id).await.unwrap();
        assert_eq!(fetched.id, reaction.id);
        assert_eq!(fetched.reaction_type, ReactionType::Angry);

        backend.delete_reaction(&reaction.id).await.unwrap();
        let err = backend.fetch_reaction(&alice, &post.id).await.unwrap_err();
        assert!(err.is_no_rows());
    }

    #[tokio::test]
    async fn test_follow_edges_and_stats() {
        let (backend, _temp) = create_test_backend();
        let alice = seed_user(&backend, "alice").await;
        let bob = seed_user(&backend, "bob").await;
        backend.insert_post(&new_post(&bob, "b")).await.unwrap();

        backend.insert_follow(&alice, &bob).await.unwrap();
        let err = backend.insert_follow(&alice, &bob).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::UniqueViolation);

        assert_eq!(backend.list_following_ids(&alice).await.unwrap(), vec![bob.clone()]);

        let stats = backend.fetch_profile_stats(&bob).await.unwrap().unwrap();
        assert_eq!(stats.followers_count, 1);
        assert_eq!(stats.following_count, 0);
        assert_eq!(stats.posts_count, 1);

        assert!(backend.delete_follow(&alice, &bob).await.unwrap());
        assert!(!backend.delete_follow(&alice, &bob).await.unwrap());
        assert!(backend.list_following_ids(&alice).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_profile_stats_missing_is_none() {
        let (backend, _temp) = create_test_backend();
        let stats = backend.fetch_profile_stats(&UserId::new("ghost")).await.unwrap();
        assert!(stats.is_none());
    }

    #[tokio::test]
    async fn test_preferences_upsert() {
        let (backend, _temp) = create_test_backend();
        let alice = seed_user(&backend, "alice").await;

        let err = backend.fetch_preferences(&alice).await.unwrap_err();
        assert!(err.is_no_rows());

        let saved = backend
            .upsert_preferences(&alice, &[TagId::new("sports")])
            .await
            .unwrap();
        assert_eq!(saved.preferred_tags, vec![TagId::new("sports")]);

        let updated = backend
            .upsert_preferences(&alice, &[TagId::new("music"), TagId::new("art")])
            .await
            .unwrap();
        assert_eq!(updated.id, saved.id);
        assert_eq!(
            updated.preferred_tags,
            vec![TagId::new("music"), TagId::new("art")]
        );
    }

    #[tokio::test]
    async fn test_list_tags_ordered_by_name() {
        let (backend, _temp) = create_test_backend();
        let tags = backend.list_tags().await.unwrap();
        let names: Vec<&str> = tags.iter().map(|t| t.name.as_str()).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert!(names.contains(&"Sports"));
    }
}
