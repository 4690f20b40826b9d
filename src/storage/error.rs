//! Storage engine error types
//!
//! Defines all errors that can occur in the storage layer.

use thiserror::Error;

/// Errors that can occur in the storage engine
#[derive(Error, Debug)]
pub enum StorageError {
    /// Invalid time interval (end <= start, or a non-positive width)
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// Record timestamp falls outside the target chunk's window
    #[error("timestamp {timestamp} outside chunk window [{start}, {end})")]
    OutOfTimeRange {
        timestamp: i64,
        start: i64,
        end: i64,
    },

    /// Chunk codec could not represent the data
    #[error("compression failed: {0}")]
    CompressionFailed(String),

    /// Chunk contents violate an ordering or window invariant
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    /// Stored bytes no longer match their checksum
    #[error("corrupt data: {0}")]
    DataCorrupted(String),

    /// Requested series does not exist
    #[error("series not found: {0}")]
    IndexError(String),

    /// Write addressed to a compressed, read-only chunk
    #[error("chunk [{start}, {end}) is cold; rehydrate before writing")]
    ColdWriteRejected { start: i64, end: i64 },

    /// Serialization/deserialization failed
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<bincode::Error> for StorageError {
    fn from(err: bincode::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
