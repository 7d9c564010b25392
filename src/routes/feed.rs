use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;

use crate::backend::PostFilter;
use crate::db::models::{PostWithReactions, Tag, TagId, UserPreferences};
use crate::error::AppResult;
use crate::extractors::{CurrentUser, MaybeUser};
use crate::feed;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/feed", get(global_feed))
        .route("/feed/personalized", get(personalized_feed))
        .route("/me/posts", get(my_posts))
        .route("/tags", get(list_tags))
        .route("/preferences", get(get_preferences).put(save_preferences))
}

#[derive(Deserialize)]
struct PreferencesForm {
    tag_ids: Vec<TagId>,
}

// Read screens show an empty list rather than an error.

async fn global_feed(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
) -> Json<Vec<PostWithReactions>> {
    let viewer = user.as_ref().map(|u| &u.id);
    match feed::list_posts(&state.backend, &PostFilter::all(), viewer).await {
        Ok(posts) => Json(posts),
        Err(e) => {
            tracing::warn!("Error fetching posts: {}", e);
            Json(Vec::new())
        }
    }
}

async fn personalized_feed(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Json<Vec<PostWithReactions>> {
    match feed::personalized_feed(&state.backend, &user.id, Utc::now()).await {
        Ok(posts) => Json(posts),
        Err(e) => {
            tracing::warn!("Error fetching personalized posts: {}", e);
            Json(Vec::new())
        }
    }
}

async fn my_posts(State(state): State<AppState>, user: CurrentUser) -> Json<Vec<PostWithReactions>> {
    let filter = PostFilter::by_author(user.id.clone());
    match feed::list_posts(&state.backend, &filter, Some(&user.id)).await {
        Ok(posts) => Json(posts),
        Err(e) => {
            tracing::warn!("Error fetching posts of {}: {}", user.id, e);
            Json(Vec::new())
        }
    }
}

async fn list_tags(State(state): State<AppState>) -> Json<Vec<Tag>> {
    match feed::list_tags(&state.backend).await {
        Ok(tags) => Json(tags),
        Err(e) => {
            tracing::warn!("Error fetching tags: {}", e);
            Json(Vec::new())
        }
    }
}

async fn get_preferences(State(state): State<AppState>, user: CurrentUser) -> Json<Vec<TagId>> {
    Json(feed::load_preferred_tags(&state.backend, &user.id).await)
}

async fn save_preferences(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(form): Json<PreferencesForm>,
) -> AppResult<Json<UserPreferences>> {
    let prefs = feed::save_preferred_tags(&state.backend, &user.id, &form.tag_ids).await?;
    Ok(Json(prefs))
}
