//! Error types for hourlog.
//!
//! Errors fall into two families: validation errors, which the user fixes by
//! editing the form and resubmitting, and backend errors, raised by the session
//! stores. [`Error::is_validation_error`] and [`Error::is_backend_error`]
//! classify them for the front end.

use std::path::PathBuf;

use chrono::NaiveTime;
use thiserror::Error;

/// The main error type for hourlog operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Validation Errors ===
    /// A required form field was left empty.
    #[error("missing required field: {field}")]
    MissingField {
        /// Name of the empty field.
        field: &'static str,
    },

    /// A date could not be parsed as `YYYY-MM-DD`.
    #[error("invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDate {
        /// The rejected input.
        value: String,
    },

    /// A clock time could not be parsed as `HH:MM`.
    #[error("invalid time '{value}': expected HH:MM")]
    InvalidTime {
        /// The rejected input.
        value: String,
    },

    /// The session type is not one of the recognized values.
    #[error("invalid session type '{value}': expected instructional or non-instructional")]
    InvalidSessionType {
        /// The rejected input.
        value: String,
    },

    /// The end time is not strictly after the start time.
    #[error("end time {end} must be after start time {start}")]
    InvalidInterval {
        /// Session start.
        start: NaiveTime,
        /// Session end.
        end: NaiveTime,
    },

    /// The instructor is not on the roster and the roster is enforced.
    #[error("unknown instructor '{name}'")]
    UnknownInstructor {
        /// The rejected name.
        name: String,
    },

    // === Controller Errors ===
    /// Another submission is still in flight.
    #[error("a submission is already in progress")]
    SubmitInProgress,

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// The store stopped delivering snapshots.
    #[error("subscription closed")]
    SubscriptionClosed,

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An operation timed out.
    #[error("operation timed out: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
    },

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for hourlog operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("background task failed: {err}"))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a timeout error for the named operation.
    #[must_use]
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Check if this error came from validating user input.
    ///
    /// Validation errors block persistence and are fully recoverable.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::MissingField { .. }
                | Self::InvalidDate { .. }
                | Self::InvalidTime { .. }
                | Self::InvalidSessionType { .. }
                | Self::InvalidInterval { .. }
                | Self::UnknownInstructor { .. }
        )
    }

    /// Check if this error came from a session store.
    #[must_use]
    pub fn is_backend_error(&self) -> bool {
        matches!(
            self,
            Self::DatabaseOpen { .. }
                | Self::DatabaseQuery(_)
                | Self::DatabaseMigration { .. }
                | Self::SubscriptionClosed
                | Self::Io(_)
                | Self::DirectoryCreate { .. }
                | Self::Json(_)
                | Self::Timeout { .. }
        )
    }
}
