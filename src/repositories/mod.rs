pub mod booking_repository;
pub mod session_repository;
pub mod social_account_repository;
pub mod user_repository;

pub use booking_repository::{BookingRepository, SqliteBookingRepository};
pub use session_repository::{SessionRepository, SqliteSessionRepository};
pub use social_account_repository::{SocialAccountRepository, SqliteSocialAccountRepository};
pub use user_repository::{
    NewUser, RepositoryError, RepositoryResult, SqliteUserRepository, UserRepository,
};

/// True when the error is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db_err| db_err.is_unique_violation())
        .unwrap_or(false)
}
