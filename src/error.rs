use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::repositories::RepositoryError;
use crate::services::{
    AuthServiceError, BookingServiceError, HandoffError, SessionServiceError, UserServiceError,
};

// Type alias for Result with our AppError
pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal server error")]
    InternalError,

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Database(e) => AppError::Database(e),
            RepositoryError::NotFound => AppError::NotFound("Not found".to_string()),
            RepositoryError::AlreadyExists => AppError::Conflict("Already exists".to_string()),
        }
    }
}

impl From<UserServiceError> for AppError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::InvalidUsername
            | UserServiceError::InvalidEmail
            | UserServiceError::WeakPassword
            | UserServiceError::PasswordMismatch => AppError::Validation(err.to_string()),
            UserServiceError::UsernameTaken | UserServiceError::EmailTaken => {
                AppError::Conflict(err.to_string())
            }
            UserServiceError::UserNotFound => AppError::UserNotFound,
            UserServiceError::HashingError(msg) => {
                tracing::error!("Password hashing failed: {}", msg);
                AppError::InternalError
            }
            UserServiceError::RepositoryError(e) => e.into(),
        }
    }
}

impl From<AuthServiceError> for AppError {
    fn from(err: AuthServiceError) -> Self {
        match err {
            AuthServiceError::InvalidCredentials => AppError::InvalidCredentials,
            AuthServiceError::UserNotFound => AppError::UserNotFound,
            AuthServiceError::RepositoryError(e) => e.into(),
        }
    }
}

impl From<SessionServiceError> for AppError {
    fn from(err: SessionServiceError) -> Self {
        match err {
            SessionServiceError::NotFound => AppError::NotFound(err.to_string()),
            SessionServiceError::Forbidden(msg) => AppError::Forbidden(msg.to_string()),
            SessionServiceError::Validation(msg) => AppError::Validation(msg),
            SessionServiceError::RepositoryError(e) => e.into(),
        }
    }
}

impl From<BookingServiceError> for AppError {
    fn from(err: BookingServiceError) -> Self {
        match err {
            BookingServiceError::SessionNotFound | BookingServiceError::BookingNotFound => {
                AppError::NotFound(err.to_string())
            }
            BookingServiceError::AlreadyEnrolled => AppError::Conflict(err.to_string()),
            BookingServiceError::NotOwner => AppError::Forbidden(err.to_string()),
            BookingServiceError::RepositoryError(e) => e.into(),
        }
    }
}

impl From<HandoffError> for AppError {
    fn from(err: HandoffError) -> Self {
        match err {
            HandoffError::Database(e) => AppError::Database(e),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Unexpected service error: {:#}", err);
        AppError::InternalError
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationFailed | AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Authentication failed".to_string(),
            ),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::UserNotFound => (StatusCode::NOT_FOUND, "User not found".to_string()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Database(ref e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::InternalError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        (status, Json(json!({ "error": error_message }))).into_response()
    }
}
