use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::models::{Post, PostId, ReactionType};
use crate::error::{AppError, AppResult, WriteOp};
use crate::extractors::CurrentUser;
use crate::feed::{self, CreatePostInput, ReactionOutcome, ReactionView};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post))
        .route("/posts/{id}/reactions", post(set_reaction))
}

#[derive(Deserialize)]
struct ReactionForm {
    reaction_type: ReactionType,
}

#[derive(Serialize)]
struct ReactionResponse {
    outcome: ReactionOutcome,
    #[serde(flatten)]
    view: ReactionView,
}

async fn create_post(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(input): Json<CreatePostInput>,
) -> AppResult<(StatusCode, Json<Post>)> {
    let post = feed::create_post(&state.backend, &state.session, &input).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn set_reaction(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(form): Json<ReactionForm>,
) -> AppResult<Json<ReactionResponse>> {
    let post_id = PostId::new(id);
    let outcome = feed::set_reaction(&state.backend, &user.id, &post_id, form.reaction_type)
        .await
        .map_err(|e| AppError::from_write(WriteOp::React, e))?;
    tracing::debug!("Reaction on {} by {}: {:?}", post_id, user.id, outcome);

    let view = feed::get_reaction_view(&state.backend, &post_id, Some(&user.id)).await;
    Ok(Json(ReactionResponse { outcome, view }))
}
