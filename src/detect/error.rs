//! Pattern detection error types
//!
//! Analyzer failures are scoped to a single analyzer run; they never
//! abort other analyzers or storage operations.

use crate::storage::StorageError;
use thiserror::Error;

/// Errors that can occur in the detection pipeline
#[derive(Error, Debug)]
pub enum DetectError {
    /// Series is too short for the requested analysis
    #[error("insufficient data: need at least {needed} points, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Metric group cannot be analyzed together
    #[error("mismatched metric group: {0}")]
    MismatchedGroup(String),

    /// Input contains NaN or infinity
    #[error("non-finite value in series {key} at {timestamp}")]
    NonFinite { key: String, timestamp: i64 },

    /// Analyzer is switched off in the configuration
    #[error("analyzer disabled: {0}")]
    Disabled(&'static str),

    /// Underlying storage read failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type alias for detection operations
pub type DetectResult<T> = Result<T, DetectError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DetectError::InsufficientData { needed: 24, got: 3 };
        assert_eq!(
            err.to_string(),
            "insufficient data: need at least 24 points, got 3"
        );

        let err = DetectError::Disabled("seasonal");
        assert_eq!(err.to_string(), "analyzer disabled: seasonal");
    }
}
