//! Error types for policy operations.

use thiserror::Error;
use vaultline_core::CoreError;
use vaultline_store::StoreError;

/// Errors that can occur while parsing, loading or managing policies.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Policy not found.
    #[error("policy not found: {0}")]
    NotFound(String),

    /// Policy already exists.
    #[error("policy already exists: {0}")]
    AlreadyExists(String),

    /// Malformed policy document.
    #[error("invalid policy document: {0}")]
    InvalidDocument(String),

    /// Operation not permitted on a reserved policy.
    #[error("reserved policy: {0}")]
    Reserved(String),

    /// Invalid name, pattern or capability.
    #[error("invalid policy: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for policy operations.
pub type Result<T> = std::result::Result<T, PolicyError>;
