//! Error types for infodb
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using InfoDbError
pub type Result<T> = std::result::Result<T, InfoDbError>;

/// Unified error type for infodb operations
#[derive(Debug, Error)]
pub enum InfoDbError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying engine failed a get/put/delete/sync
    #[error("Engine error: {0}")]
    Engine(String),

    // -------------------------------------------------------------------------
    // Data Errors
    // -------------------------------------------------------------------------
    #[error("Malformed record: {0}")]
    MalformedRecord(#[from] MalformedRecord),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No live record found after {draws} random draws")]
    RandomSampleExhausted { draws: u64 },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Reasons a stored record blob failed to deserialize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MalformedRecord {
    #[error("key is not NUL-terminated")]
    MissingKeyTerminator,

    #[error("entry is truncated")]
    TruncatedEntry,

    #[error("{remaining} trailing bytes after the last entry")]
    TrailingBytes { remaining: usize },

    #[error("text field is not valid UTF-8")]
    InvalidUtf8,

    #[error("timestamp carries past the largest storable year")]
    TimestampOutOfRange,
}

impl From<rusqlite::Error> for InfoDbError {
    fn from(err: rusqlite::Error) -> Self {
        InfoDbError::Engine(err.to_string())
    }
}
