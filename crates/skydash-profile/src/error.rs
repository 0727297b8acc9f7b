//! Profile store errors.

use skydash_core::{AppError, DatabaseError, RusqliteErrorExt};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    /// No user with this id or email.
    #[error("User not found: {0}")]
    NotFound(String),

    /// Favorite names are unique per user (exact match).
    #[error("Location already exists: {0}")]
    DuplicateLocation(String),

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    /// Input rejected before touching storage.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// The blocking task running the query panicked or was cancelled.
    #[error("Profile task failed: {0}")]
    Task(String),
}

impl ProfileError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<rusqlite::Error> for ProfileError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.into_database_error())
    }
}

impl From<ProfileError> for AppError {
    fn from(e: ProfileError) -> Self {
        match e {
            ProfileError::NotFound(who) => AppError::UserNotFound(who),
            ProfileError::DuplicateLocation(name) => AppError::DuplicateLocation(name),
            ProfileError::DuplicateEmail(msg) | ProfileError::Validation(msg) => {
                AppError::InvalidRequest(msg)
            }
            ProfileError::Database(db) => AppError::Database(db),
            ProfileError::Task(msg) => AppError::Other(anyhow::anyhow!(msg)),
        }
    }
}

/// Result type for profile operations.
pub type ProfileResult<T> = Result<T, ProfileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_maps_to_app_error() {
        let app: AppError = ProfileError::DuplicateLocation("Home".into()).into();
        assert!(matches!(app, AppError::DuplicateLocation(_)));

        let app: AppError = ProfileError::not_found("7").into();
        assert_eq!(app.user_message(), "User not found");

        let app: AppError = ProfileError::validation("empty name").into();
        assert!(matches!(app, AppError::InvalidRequest(_)));
    }

    #[test]
    fn test_sqlite_errors_become_database_errors() {
        let err: ProfileError = rusqlite::Error::InvalidQuery.into();
        assert!(matches!(err, ProfileError::Database(_)));
    }
}
