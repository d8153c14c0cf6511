//! Query engine error types

use thiserror::Error;

/// Query engine errors
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Unsupported function call: {call}")]
    UnsupportedCall { call: String },

    #[error("Unsupported {call} iterator type: {input}")]
    UnsupportedFunction {
        call: String,
        input: &'static str,
    },

    #[error("Invalid argument for {call}: {reason}")]
    InvalidArgument { call: String, reason: String },

    #[error("Iterator close failed: {0}")]
    Close(String),
}

/// Result type for query operations
pub type Result<T> = std::result::Result<T, QueryError>;
