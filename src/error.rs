//! Error types for the outreach-tracker library.
//!
//! This module provides custom error types using `thiserror` for better error handling
//! and more specific error messages throughout the service.

use thiserror::Error;

/// Errors that can occur while recording events, storing submissions or notifying.
#[derive(Error, Debug)]
pub enum TrackerError {
    /// Embedded SQLite store errors
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// PostgreSQL store errors
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Outbound notification failed
    #[error("Notification error: {0}")]
    Notification(String),

    /// A blocking storage task panicked or was cancelled
    #[error("Background task error: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Convenience type alias for Result with TrackerError
pub type Result<T> = std::result::Result<T, TrackerError>;

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TrackerError::Notification(format!("request timed out: {err}"))
        } else {
            TrackerError::Notification(err.to_string())
        }
    }
}
