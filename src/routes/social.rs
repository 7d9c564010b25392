use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::require_profile;
use crate::db::models::{Follow, Profile, ProfileStats, UserId};
use crate::error::{AppError, AppResult, ValidationError, WriteOp};
use crate::extractors::CurrentUser;
use crate::social;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).patch(edit_profile))
        .route("/following", get(following))
        .route("/follows/{user_id}", post(follow).delete(unfollow))
}

#[derive(Deserialize)]
struct ProfileForm {
    username: String,
    #[serde(default)]
    full_name: String,
}

#[derive(Serialize)]
struct UnfollowResponse {
    removed: bool,
}

async fn get_profile(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<ProfileStats>> {
    let profile = require_profile(&state, &user).await?;
    Ok(Json(social::profile_stats(&state.backend, &profile).await))
}

async fn edit_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(form): Json<ProfileForm>,
) -> AppResult<Json<Profile>> {
    let profile = require_profile(&state, &user).await?;
    let updated =
        social::update_profile(&state.backend, &profile, &form.username, &form.full_name).await?;
    state.session.refresh().await;
    Ok(Json(updated))
}

async fn following(State(state): State<AppState>, user: CurrentUser) -> Json<Vec<ProfileStats>> {
    match social::list_following(&state.backend, &user.id).await {
        Ok(list) => Json(list),
        Err(e) => {
            tracing::warn!("Error fetching following list of {}: {}", user.id, e);
            Json(Vec::new())
        }
    }
}

async fn follow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(target): Path<String>,
) -> AppResult<(StatusCode, Json<Follow>)> {
    let target = UserId::new(target);
    if target == user.id {
        return Err(ValidationError::SelfFollow.into());
    }
    let edge = social::follow(&state.backend, &user.id, &target)
        .await
        .map_err(|e| AppError::from_write(WriteOp::Follow, e))?;
    Ok((StatusCode::CREATED, Json(edge)))
}

async fn unfollow(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(target): Path<String>,
) -> AppResult<Json<UnfollowResponse>> {
    let target = UserId::new(target);
    if target == user.id {
        return Err(ValidationError::SelfFollow.into());
    }
    let removed = social::unfollow(&state.backend, &user.id, &target)
        .await
        .map_err(|e| AppError::from_write(WriteOp::Unfollow, e))?;
    Ok(Json(UnfollowResponse { removed }))
}
