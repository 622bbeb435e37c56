//! Core error types for lapse-core.
//!
//! Lower layers (store, wake scheduler, configuration) return these errors.
//! The timer engine absorbs them and logs instead of propagating, so a
//! surface never sees a failed command.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for lapse-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Durable state store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Wake scheduler errors
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Durable state store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked by another writer
    #[error("Database is locked")]
    Locked,

    /// A thread panicked while holding the store lock
    #[error("Store lock poisoned")]
    Poisoned,

    /// The store refused the operation (used by in-memory doubles)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Wake scheduler errors.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// No async runtime to host the wake timer
    #[error("No runtime available to arm wake: {0}")]
    RuntimeUnavailable(String),

    /// The receiving side of the wake channel is gone
    #[error("Wake channel closed")]
    ChannelClosed,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Could not resolve the data directory
    #[error("Data directory unavailable: {0}")]
    DataDir(String),

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Numeric setting outside its allowed range
    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        min: u32,
        max: u32,
        value: u32,
    },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseLocked
                    || inner.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Store(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_sqlite_error_maps_to_locked() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(matches!(StoreError::from(err), StoreError::Locked));
    }

    #[test]
    fn other_sqlite_errors_map_to_query_failed() {
        let err = rusqlite::Error::QueryReturnedNoRows;
        assert!(matches!(StoreError::from(err), StoreError::QueryFailed(_)));
    }

    #[test]
    fn out_of_range_message_names_field() {
        let err = ValidationError::OutOfRange {
            field: "focusMinutes",
            min: 1,
            max: 60,
            value: 90,
        };
        assert_eq!(err.to_string(), "focusMinutes must be between 1 and 60 (got 90)");
    }
}
