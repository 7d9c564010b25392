use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::db::models::{Profile, UserId};
use crate::error::AppError;
use crate::state::AppState;

/// The signed-in user of the running session.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: String,
    /// Absent while the profile is missing or could not be provisioned.
    pub profile: Option<Profile>,
}

/// Extractor that requires a signed-in session.
/// Returns 401 when nobody is signed in.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        _parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let snapshot = state.session.snapshot();
        let user = snapshot.user().ok_or(AppError::Unauthorized)?;
        Ok(CurrentUser {
            id: user.id.clone(),
            email: user.email.clone(),
            profile: snapshot.profile.clone(),
        })
    }
}

/// Optional user extractor - returns None instead of 401 when signed out.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(_) => Ok(MaybeUser(None)),
        }
    }
}
