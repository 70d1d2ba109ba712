//! Core error types for mattertime-core.
//!
//! Timer transitions surface [`TimerError`]; storage backends surface
//! [`StoreError`]. [`CoreError`] wraps everything for callers (the CLI)
//! that only need to report a failure.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::task::TimerState;

/// Core error type for mattertime-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Timer state machine errors
    #[error(transparent)]
    Timer(#[from] TimerError),

    /// Storage-related errors
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors returned by timer operations.
#[derive(Error, Debug)]
pub enum TimerError {
    /// The task does not exist or belongs to another user.
    #[error("Task {task_id} not found")]
    NotFound { task_id: i64 },

    /// The requested transition is not permitted from the task's state.
    #[error("Cannot {action} task {task_id} while it is {state}")]
    InvalidState {
        task_id: i64,
        state: TimerState,
        action: &'static str,
    },

    /// The stop instant precedes the start instant.
    #[error("Invalid interval: stop ({stop}) is before start ({start})")]
    InvalidInterval {
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Storage-specific errors.
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

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// A compare-and-swap write found the row in an unexpected state,
    /// or a constraint guarding the single running timer fired.
    #[error("Conflicting write: {0}")]
    Conflict(String),

    /// A row that must exist was not found.
    #[error("Task {task_id} not found")]
    Missing { task_id: i64 },
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

    /// Key does not exist in the configuration schema
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable at {path}: {source}")]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Validation errors.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    /// Title is empty after trimming
    #[error("Task title must not be empty")]
    EmptyTitle,

    /// Category id does not exist
    #[error("Unknown category: {0}")]
    UnknownCategory(i64),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(failure, _msg) => match failure.code {
                rusqlite::ErrorCode::DatabaseLocked | rusqlite::ErrorCode::DatabaseBusy => {
                    StoreError::Locked
                }
                rusqlite::ErrorCode::ConstraintViolation => StoreError::Conflict(err.to_string()),
                _ => StoreError::QueryFailed(err.to_string()),
            },
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for TimerError {
    fn from(err: rusqlite::Error) -> Self {
        TimerError::Store(err.into())
    }
}
