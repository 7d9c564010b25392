use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::auth::{AuthError, SessionError};
use crate::backend::{BackendError, ErrorKind};
use crate::db::models::TagId;
use crate::feed::{CreatePostError, PreferencesError};
use crate::social::ProfileError;

/// Rejected user input, reported back verbatim.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Title is required")]
    TitleRequired,

    #[error("Title must be at most {0} characters")]
    TitleTooLong(usize),

    #[error("Description must be at most {0} characters")]
    DescriptionTooLong(usize),

    #[error("Latitude and longitude must be given together")]
    CoordinatesIncomplete,

    #[error("Coordinates are out of range")]
    CoordinatesOutOfRange,

    #[error("Username is required")]
    UsernameRequired,

    #[error("Unknown tag: {0}")]
    UnknownTag(TagId),

    #[error("You cannot follow yourself")]
    SelfFollow,
}

/// The write a backend error came from; selects the user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    SignUp,
    UpdateProfile,
    CreatePost,
    React,
    Follow,
    Unfollow,
    SavePreferences,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Maps a failed write to the message shown to the user.
    pub fn from_write(op: WriteOp, err: BackendError) -> Self {
        match err.kind {
            ErrorKind::UniqueViolation => AppError::Conflict(
                match op {
                    WriteOp::SignUp | WriteOp::UpdateProfile => "Username already taken",
                    WriteOp::Follow => "Already following this user",
                    _ => "Record already exists",
                }
                .to_string(),
            ),
            ErrorKind::ForeignKeyViolation => AppError::NotFound(
                match op {
                    WriteOp::CreatePost => "Profile not found. Please sign out and sign in again.",
                    WriteOp::Follow => "User not found",
                    WriteOp::React => "Post not found",
                    _ => "Referenced record not found",
                }
                .to_string(),
            ),
            ErrorKind::PermissionDenied => AppError::Forbidden(
                "Permission denied. Please check your authentication.".to_string(),
            ),
            ErrorKind::NoRows => AppError::NotFound(err.message),
            ErrorKind::Invalid => AppError::BadRequest(err.message),
            ErrorKind::Unavailable => AppError::Backend(err),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => AppError::Unauthorized,
            AuthError::EmailTaken => AppError::Conflict(err.to_string()),
            AuthError::InvalidEmail | AuthError::WeakPassword(_) => {
                AppError::BadRequest(err.to_string())
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Auth(e) => e.into(),
            SessionError::Profile(e) => AppError::from_write(WriteOp::SignUp, e),
        }
    }
}

impl From<CreatePostError> for AppError {
    fn from(err: CreatePostError) -> Self {
        match err {
            CreatePostError::Validation(e) => e.into(),
            CreatePostError::NotSignedIn => AppError::Unauthorized,
            CreatePostError::ProfileUnavailable(e) | CreatePostError::Backend(e) => {
                AppError::from_write(WriteOp::CreatePost, e)
            }
        }
    }
}

impl From<PreferencesError> for AppError {
    fn from(err: PreferencesError) -> Self {
        match err {
            PreferencesError::Validation(e) => e.into(),
            PreferencesError::Backend(e) => AppError::from_write(WriteOp::SavePreferences, e),
        }
    }
}

impl From<ProfileError> for AppError {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::Validation(e) => e.into(),
            ProfileError::Backend(e) => AppError::from_write(WriteOp::UpdateProfile, e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::Backend(e) => {
                tracing::error!("Backend error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
