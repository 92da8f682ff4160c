//! Error types for kinship engine operations

use thiserror::Error;

/// Errors that can occur during traversal and merge operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KinshipError {
    /// A required record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller supplied an out-of-range argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation conflicts with the current state of a record
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    Store(String),

    /// Traversal ran past its deadline
    #[error("Traversal timed out after {0} ms")]
    Timeout(u64),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for kinship engine operations
pub type Result<T> = std::result::Result<T, KinshipError>;
