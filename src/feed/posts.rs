// Post listing with reaction enrichment, and post creation
use futures::future::join_all;
use serde::Deserialize;
use thiserror::Error;

use super::reactions::get_reaction_view;
use crate::auth::SessionProvider;
use crate::backend::{BackendError, BackendResult, DynBackend, PostFilter};
use crate::db::models::{NewPost, Post, PostWithAuthor, PostWithReactions, Tag, TagId, UserId};
use crate::error::ValidationError;

pub const MAX_TITLE_CHARS: usize = 100;
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// Attaches reaction counts and the viewer's reaction to every post.
///
/// Posts are enriched concurrently; the two lookups for one post run in
/// sequence. Output order matches input order.
pub async fn enrich_posts(
    backend: &DynBackend,
    posts: Vec<PostWithAuthor>,
    viewer: Option<&UserId>,
) -> Vec<PostWithReactions> {
    join_all(posts.into_iter().map(|post| async move {
        let view = get_reaction_view(backend, &post.post.id, viewer).await;
        PostWithReactions {
            post,
            reaction_counts: view.counts,
            user_reaction: view.own,
        }
    }))
    .await
}

/// Newest-first posts with author, tags and reactions. Only the primary
/// query can fail the call.
pub async fn list_posts(
    backend: &DynBackend,
    filter: &PostFilter,
    viewer: Option<&UserId>,
) -> BackendResult<Vec<PostWithReactions>> {
    let posts = backend.list_posts(filter).await?;
    tracing::debug!("Fetched {} posts", posts.len());
    Ok(enrich_posts(backend, posts, viewer).await)
}

pub async fn list_tags(backend: &DynBackend) -> BackendResult<Vec<Tag>> {
    backend.list_tags().await
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePostInput {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub tag_ids: Vec<TagId>,
}

/// Label used when a post has coordinates but no place name.
pub fn coordinates_label(latitude: f64, longitude: f64) -> String {
    format!("{:.4}, {:.4}", latitude, longitude)
}

impl CreatePostInput {
    /// Trims and checks the form, returning the row to insert and the
    /// deduplicated tag ids.
    pub fn validate(&self, author_id: &UserId) -> Result<(NewPost, Vec<TagId>), ValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::TitleRequired);
        }
        if title.chars().count() > MAX_TITLE_CHARS {
            return Err(ValidationError::TitleTooLong(MAX_TITLE_CHARS));
        }

        let description = self.description.as_deref().unwrap_or("").trim();
        if description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(ValidationError::DescriptionTooLong(MAX_DESCRIPTION_CHARS));
        }

        let coordinates = match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => {
                if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                    return Err(ValidationError::CoordinatesOutOfRange);
                }
                Some((lat, lon))
            }
            (None, None) => None,
            _ => return Err(ValidationError::CoordinatesIncomplete),
        };

        let mut location = self.location.as_deref().unwrap_or("").trim().to_string();
        if location.is_empty() {
            if let Some((lat, lon)) = coordinates {
                location = coordinates_label(lat, lon);
            }
        }

        let image_urls = self
            .image_urls
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .collect();

        let mut tag_ids: Vec<TagId> = Vec::with_capacity(self.tag_ids.len());
        for tag in &self.tag_ids {
            if !tag_ids.contains(tag) {
                tag_ids.push(tag.clone());
            }
        }

        let post = NewPost {
            author_id: author_id.clone(),
            title: title.to_string(),
            description: description.to_string(),
            location,
            latitude: coordinates.map(|(lat, _)| lat),
            longitude: coordinates.map(|(_, lon)| lon),
            image_urls,
        };
        Ok((post, tag_ids))
    }
}

#[derive(Debug, Error)]
pub enum CreatePostError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("You must be logged in to create a post")]
    NotSignedIn,

    #[error("Failed to create profile: {0}")]
    ProfileUnavailable(#[source] BackendError),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Creates a post for the signed-in user.
///
/// Provisions the profile first when the session has none. Tags are attached
/// after the post exists; a tag failure is logged and the post is kept.
pub async fn create_post(
    backend: &DynBackend,
    session: &SessionProvider,
    input: &CreatePostInput,
) -> Result<Post, CreatePostError> {
    let user = session.current_user().ok_or(CreatePostError::NotSignedIn)?;
    let (new_post, tag_ids) = input.validate(&user.id)?;

    if session.profile().is_none() {
        tracing::info!("Profile missing for {}, provisioning before post", user.id);
        backend
            .ensure_profile_exists(&user.id)
            .await
            .map_err(CreatePostError::ProfileUnavailable)?;
        session.refresh().await;
    }

    let post = backend.insert_post(&new_post).await?;
    tracing::info!("Post {} created by {}", post.id, user.id);

    if !tag_ids.is_empty() {
        if let Err(e) = backend.insert_post_tags(&post.id, &tag_ids).await {
            tracing::warn!("Error adding tags to post {}: {}", post.id, e);
        }
    }

    Ok(post)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(title: &str) -> CreatePostInput {
        CreatePostInput {
            title: title.to_string(),
            ..Default::default()
        }
    }

    fn author() -> UserId {
        UserId::new("author")
    }

    #[test]
    fn validate_trims_fields() {
        let form = CreatePostInput {
            title: "  Sunset  ".into(),
            description: Some(" over the bay ".into()),
            location: Some(" Porto ".into()),
            image_urls: vec![" a.jpg ".into(), "  ".into()],
            ..Default::default()
        };
        let (post, tags) = form.validate(&author()).unwrap();
        assert_eq!(post.title, "Sunset");
        assert_eq!(post.description, "over the bay");
        assert_eq!(post.location, "Porto");
        assert_eq!(post.image_urls, vec!["a.jpg".to_string()]);
        assert!(tags.is_empty());
    }

    #[test]
    fn validate_requires_title() {
        assert!(matches!(
            input("   ").validate(&author()),
            Err(ValidationError::TitleRequired)
        ));
    }

    #[test]
    fn validate_enforces_length_limits() {
        let long_title = "x".repeat(MAX_TITLE_CHARS + 1);
        assert!(matches!(
            input(&long_title).validate(&author()),
            Err(ValidationError::TitleTooLong(100))
        ));
        assert!(input(&"é".repeat(MAX_TITLE_CHARS)).validate(&author()).is_ok());

        let form = CreatePostInput {
            title: "ok".into(),
            description: Some("y".repeat(MAX_DESCRIPTION_CHARS + 1)),
            ..Default::default()
        };
        assert!(matches!(
            form.validate(&author()),
            Err(ValidationError::DescriptionTooLong(500))
        ));
    }

    #[test]
    fn validate_requires_both_coordinates() {
        let form = CreatePostInput {
            title: "ok".into(),
            latitude: Some(1.0),
            ..Default::default()
        };
        assert!(matches!(
            form.validate(&author()),
            Err(ValidationError::CoordinatesIncomplete)
        ));

        let form = CreatePostInput {
            title: "ok".into(),
            latitude: Some(91.0),
            longitude: Some(0.0),
            ..Default::default()
        };
        assert!(matches!(
            form.validate(&author()),
            Err(ValidationError::CoordinatesOutOfRange)
        ));
    }

    #[test]
    fn coordinates_fill_empty_location() {
        let form = CreatePostInput {
            title: "ok".into(),
            latitude: Some(38.722252),
            longitude: Some(-9.139337),
            ..Default::default()
        };
        let (post, _) = form.validate(&author()).unwrap();
        assert_eq!(post.location, "38.7223, -9.1393");
        assert_eq!(post.latitude, Some(38.722252));
    }

    #[test]
    fn duplicate_tags_are_dropped() {
        let form = CreatePostInput {
            title: "ok".into(),
            tag_ids: vec![TagId::new("food"), TagId::new("art"), TagId::new("food")],
            ..Default::default()
        };
        let (_, tags) = form.validate(&author()).unwrap();
        assert_eq!(tags, vec![TagId::new("food"), TagId::new("art")]);
    }
}
