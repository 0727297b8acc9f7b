//! Centralized error types for SkyDash.
//!
//! This module provides a typed error hierarchy that:
//! - Enables precise error handling throughout the codebase
//! - Provides generic messages that are safe to return to API callers
//! - Preserves full error context for debugging/logging

use thiserror::Error;

/// Top-level application error type.
///
/// Every service error is mapped into this type at the HTTP edge.
/// Use `user_message()` to get a caller-safe message; the `Display`
/// output carries internal detail and is only meant for logs.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Weather service error: {0}")]
    Weather(#[from] WeatherError),

    /// The caller's user record does not exist.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// A favorite location with the same name is already stored.
    #[error("Duplicate location: {0}")]
    DuplicateLocation(String),

    /// The request was understood but rejected (duplicate, bad parameter).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a message suitable for returning to an API caller.
    ///
    /// These messages never include provider bodies, SQL or paths.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Database(e) => e.user_message(),
            AppError::Auth(e) => e.user_message(),
            AppError::Weather(e) => e.user_message(),
            AppError::UserNotFound(_) => "User not found",
            AppError::DuplicateLocation(_) => "Location already exists",
            AppError::InvalidRequest(_) => "Invalid request",
            AppError::Other(_) => "Server error",
        }
    }
}

/// Database/storage errors (SQLite, local state).
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Data corruption detected: {0}")]
    Corruption(String),
}

impl DatabaseError {
    pub fn user_message(&self) -> &'static str {
        match self {
            DatabaseError::ConnectionFailed(_)
            | DatabaseError::QueryFailed(_)
            | DatabaseError::Corruption(_) => "Server error",
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

/// Caller identification errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,
}

impl AuthError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "No token, authorization denied",
            AuthError::InvalidToken => "Token is not valid",
        }
    }
}

/// Weather service errors as seen by the HTTP edge.
#[derive(Debug, Error)]
pub enum WeatherError {
    /// Network failure, timeout, non-success status or malformed payload.
    #[error("Weather provider unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Cache error: {0}")]
    CacheError(String),
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::UpstreamUnavailable(_) => "Error fetching weather data",
            WeatherError::CacheError(_) => "Server error",
        }
    }
}

/// Extension trait for converting rusqlite errors to our error types.
pub trait RusqliteErrorExt {
    fn into_database_error(self) -> DatabaseError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_database_error(self) -> DatabaseError {
        match &self {
            rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("corrupt") => {
                DatabaseError::Corruption(self.to_string())
            }
            rusqlite::Error::FromSqlConversionFailure(..) => {
                DatabaseError::Corruption(self.to_string())
            }
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == rusqlite::ErrorCode::CannotOpen =>
            {
                DatabaseError::ConnectionFailed(self.to_string())
            }
            _ => DatabaseError::QueryFailed(self.to_string()),
        }
    }
}
