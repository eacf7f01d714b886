//! Error types for intake operations

use std::path::PathBuf;
use thiserror::Error;

/// Record store errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found in table {table} with id {id}")]
    NotFound { table: String, id: String },

    #[error("Invalid table name: {table:?}")]
    InvalidTableName { table: String },

    #[error("I/O error on table {table} at {}: {source}", path.display())]
    Io {
        table: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Write to table {table} failed after {attempts} attempt(s): {source}")]
    WriteFailed {
        table: String,
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize table {table}: {source}")]
    Serialization {
        table: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// True when the error reports a missing record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Ingestion queue errors.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Queue payload {file} is not valid JSON: {source}")]
    Payload {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Queue is already running")]
    AlreadyRunning,

    #[error("Report creator panicked while processing {file}: {reason}")]
    CreatorPanicked { file: String, reason: String },

    #[error("Queue watcher error: {reason}")]
    Watch { reason: String },
}

/// Report validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Invalid state transition for report {id}: {from} -> {to}")]
    InvalidTransition { id: String, from: String, to: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all intake errors.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for record store operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Result type alias for intake operations.
pub type IntakeResult<T> = Result<T, IntakeError>;

// =============================================================================
// TESTS
// =============================================================================
