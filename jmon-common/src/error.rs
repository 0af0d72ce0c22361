//! Common error types for the judicial monitor

use thiserror::Error;

/// Common result type for store and configuration operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the judicial monitor crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error for stored JSON columns
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or stored value
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for SQLITE_BUSY, including a deferred transaction that lost the
    /// race to upgrade to a writer
    pub fn is_database_locked(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => {
                matches!(db_err.code().as_deref(), Some("5") | Some("517"))
                    || db_err.message().contains("database is locked")
            }
            _ => false,
        }
    }
}
