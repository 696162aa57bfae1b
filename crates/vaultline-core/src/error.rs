//! Error types for the Vaultline Core.

use thiserror::Error;

/// Errors raised while constructing or parsing core records.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("unknown capability: {0}")]
    InvalidCapability(String),

    #[error("invalid path pattern: {0}")]
    InvalidPathPattern(String),

    #[error("invalid name: {0}")]
    InvalidName(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
