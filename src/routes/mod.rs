pub mod auth;
pub mod feed;
pub mod posts;
pub mod social;

use axum::Router;

use crate::db::models::Profile;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::AppState;

/// All JSON routes, without state or layers.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(auth::router())
        .merge(feed::router())
        .merge(posts::router())
        .merge(social::router())
}

/// The user's profile, re-resolving the session once if it is missing.
pub(crate) async fn require_profile(state: &AppState, user: &CurrentUser) -> AppResult<Profile> {
    if let Some(profile) = &user.profile {
        return Ok(profile.clone());
    }
    state.session.refresh().await.profile.ok_or_else(|| {
        AppError::NotFound("Profile not found. Please sign out and sign in again.".into())
    })
}
