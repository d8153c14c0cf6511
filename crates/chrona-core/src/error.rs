//! Error types for chrona-core

use thiserror::Error;

/// Core error types
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),

    #[error("Empty tag key")]
    EmptyTagKey,

    #[error("Invalid time range: start {start} >= end {end}")]
    InvalidTimeRange { start: i64, end: i64 },
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
