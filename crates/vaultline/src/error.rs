//! Error types for the Vault.
//!
//! Every failure maps to one [`ErrorKind`], which carries the status code a
//! transport should answer with. Storage failures keep their detail in the
//! `source()` chain for logging; their `Display` is generic.

use thiserror::Error;
use vaultline_core::CoreError;
use vaultline_policy::PolicyError;
use vaultline_store::StoreError;
use vaultline_transit::TransitError;

use crate::auth::Operation;

/// Errors that can occur during Vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Credential missing, unknown, revoked or expired.
    #[error("unauthorized")]
    Unauthorized,

    /// The credential lacks the capability for this path.
    #[error("permission denied: {operation} on {path}")]
    Forbidden { path: String, operation: Operation },

    /// Token not found.
    #[error("token not found")]
    TokenNotFound,

    /// Malformed request.
    #[error("validation error: {0}")]
    Validation(String),

    /// Policy error.
    #[error("{0}")]
    Policy(PolicyError),

    /// Transit error.
    #[error("{0}")]
    Transit(TransitError),

    /// Storage error.
    #[error("internal storage error")]
    Store(#[source] StoreError),
}

/// Result type for Vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Transport-facing error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthorized,
    Forbidden,
    NotFound,
    ValidationError,
    AlreadyExists,
    KeyVersionUnavailable,
    DecryptionFailed,
    InternalStorageError,
}

impl ErrorKind {
    pub const fn status_code(self) -> u16 {
        match self {
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::ValidationError
            | ErrorKind::KeyVersionUnavailable
            | ErrorKind::DecryptionFailed => 400,
            ErrorKind::AlreadyExists => 409,
            ErrorKind::InternalStorageError => 500,
        }
    }
}

impl VaultError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::Unauthorized => ErrorKind::Unauthorized,
            VaultError::Forbidden { .. } => ErrorKind::Forbidden,
            VaultError::TokenNotFound => ErrorKind::NotFound,
            VaultError::Validation(_) => ErrorKind::ValidationError,
            VaultError::Store(_) => ErrorKind::InternalStorageError,
            VaultError::Policy(e) => match e {
                PolicyError::NotFound(_) => ErrorKind::NotFound,
                PolicyError::AlreadyExists(_) => ErrorKind::AlreadyExists,
                PolicyError::InvalidDocument(_)
                | PolicyError::Reserved(_)
                | PolicyError::Core(_) => ErrorKind::ValidationError,
                PolicyError::Store(_) => ErrorKind::InternalStorageError,
            },
            VaultError::Transit(e) => match e {
                TransitError::NotFound(_) => ErrorKind::NotFound,
                TransitError::AlreadyExists(_) => ErrorKind::AlreadyExists,
                TransitError::KeyVersionUnavailable => ErrorKind::KeyVersionUnavailable,
                TransitError::DecryptionFailed => ErrorKind::DecryptionFailed,
                TransitError::Validation(_) | TransitError::Core(_) => ErrorKind::ValidationError,
                TransitError::EncryptionFailed
                | TransitError::Conflict { .. }
                | TransitError::Store(_) => ErrorKind::InternalStorageError,
            },
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }
}

impl From<StoreError> for VaultError {
    fn from(e: StoreError) -> Self {
        VaultError::Store(e)
    }
}

// Storage failures are lifted out of component errors so their detail never
// reaches `Display`.
impl From<PolicyError> for VaultError {
    fn from(e: PolicyError) -> Self {
        match e {
            PolicyError::Store(e) => VaultError::Store(e),
            other => VaultError::Policy(other),
        }
    }
}

impl From<TransitError> for VaultError {
    fn from(e: TransitError) -> Self {
        match e {
            TransitError::Store(e) => VaultError::Store(e),
            other => VaultError::Transit(other),
        }
    }
}

impl From<CoreError> for VaultError {
    fn from(e: CoreError) -> Self {
        VaultError::Validation(e.to_string())
    }
}
