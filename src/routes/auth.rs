use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use crate::auth::{AuthUser, SessionState};
use crate::error::AppResult;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/sign-out", post(sign_out))
        .route("/auth/session", get(current_session))
}

#[derive(Deserialize)]
struct SignUpForm {
    email: String,
    password: String,
    username: String,
    #[serde(default)]
    full_name: String,
}

#[derive(Deserialize)]
struct SignInForm {
    email: String,
    password: String,
}

async fn sign_up(
    State(state): State<AppState>,
    Json(form): Json<SignUpForm>,
) -> AppResult<(StatusCode, Json<AuthUser>)> {
    let user = state
        .session
        .sign_up(&form.email, &form.password, &form.username, &form.full_name)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn sign_in(
    State(state): State<AppState>,
    Json(form): Json<SignInForm>,
) -> AppResult<Json<SessionState>> {
    state.session.sign_in(&form.email, &form.password).await?;
    Ok(Json(state.session.snapshot()))
}

async fn sign_out(State(state): State<AppState>) -> AppResult<StatusCode> {
    state.session.sign_out().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn current_session(State(state): State<AppState>) -> Json<SessionState> {
    Json(state.session.snapshot())
}
