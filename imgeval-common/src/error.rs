//! Common error types for imgeval

use thiserror::Error;

/// Common result type for imgeval operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the persistence layer and the domain services
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed or out-of-range user input, reported against one field
    #[error("Invalid input for '{field}': {message}")]
    Validation { field: String, message: String },

    /// Caller may not act on the requested resource
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The clinician already has an evaluation for this image
    #[error("Image has already been evaluated")]
    AlreadyEvaluated,

    /// Uniqueness conflict other than a duplicate evaluation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a field-level validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// True when the underlying database error is a UNIQUE constraint violation
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(e) => e
                .as_database_error()
                .map(|db_err| db_err.is_unique_violation())
                .unwrap_or(false),
            _ => false,
        }
    }

    /// True for transient SQLite lock contention (SQLITE_BUSY / SQLITE_LOCKED)
    ///
    /// Matches extended codes too, e.g. SQLITE_BUSY_SNAPSHOT (517) when a
    /// deferred transaction cannot upgrade to a write.
    pub fn is_lock_contention(&self) -> bool {
        let Error::Database(e) = self else {
            return false;
        };
        let Some(db_err) = e.as_database_error() else {
            return false;
        };

        let primary = db_err
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .map(|code| code & 0xff);
        matches!(primary, Some(5) | Some(6)) || db_err.message().contains("database is locked")
    }
}
