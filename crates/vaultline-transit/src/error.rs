//! Error types for transit operations.
//!
//! Cryptographic failures are deliberately coarse: neither variant carries
//! key bytes, plaintext, or whether a given version exists.

use thiserror::Error;
use vaultline_core::CoreError;
use vaultline_store::StoreError;

/// Errors that can occur during key management or encryption.
#[derive(Debug, Error)]
pub enum TransitError {
    /// Key not found.
    #[error("transit key not found: {0}")]
    NotFound(String),

    /// Key already exists.
    #[error("transit key already exists: {0}")]
    AlreadyExists(String),

    /// The requested version is retired or unknown.
    #[error("key version unavailable")]
    KeyVersionUnavailable,

    /// Authentication failed or the blob was malformed.
    #[error("decryption failed")]
    DecryptionFailed,

    /// The cipher could not be initialised.
    #[error("encryption failed")]
    EncryptionFailed,

    /// A request parameter was out of range.
    #[error("validation error: {0}")]
    Validation(String),

    /// Another writer appended a version first.
    #[error("concurrent rotation of key {name}: latest is now {latest}")]
    Conflict { name: String, latest: u32 },

    /// Invalid key name.
    #[error("invalid key: {0}")]
    Core(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// Result type for transit operations.
pub type Result<T> = std::result::Result<T, TransitError>;
