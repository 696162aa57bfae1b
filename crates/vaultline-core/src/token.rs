//! Token records and credentials.
//!
//! A [`Credential`] is the opaque secret a caller presents. It is never
//! stored; the store only ever sees its [`TokenHash`], a keyed BLAKE3 digest.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::policy::DEFAULT_POLICY;

/// Prefix carried by every issued credential.
const CREDENTIAL_PREFIX: &str = "vl.";

/// Domain-separation context for credential hashing.
const TOKEN_HASH_CONTEXT: &str = "vaultline-v1 token credential";

/// An opaque bearer credential.
///
/// `Debug` is redacted so credentials never end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Generate a fresh random credential.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 24];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(format!("{CREDENTIAL_PREFIX}{}", hex::encode(bytes)))
    }

    /// Wrap a credential received from a caller.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// The storage key for this credential.
    pub fn hash(&self) -> TokenHash {
        TokenHash::of(&self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Keyed BLAKE3 digest of a credential; the primary key of token records.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenHash(pub [u8; 32]);

impl TokenHash {
    /// Hash a raw credential string.
    pub fn of(credential: &str) -> Self {
        let mut hasher = blake3::Hasher::new_derive_key(TOKEN_HASH_CONTEXT);
        hasher.update(credential.as_bytes());
        Self(*hasher.finalize().as_bytes())
    }

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short, non-secret handle for logs and lookups.
    pub fn accessor(&self) -> String {
        self.to_hex()[..16].to_string()
    }
}

impl fmt::Debug for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenHash({})", self.accessor())
    }
}

impl fmt::Display for TokenHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.accessor())
    }
}

/// A stored token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Hash of the credential.
    pub hash: TokenHash,

    /// Explicitly attached policy names.
    pub policies: Vec<String>,

    /// Root tokens bypass policy evaluation entirely.
    pub root: bool,

    /// Suppress the implicit `default` policy.
    pub no_default_policy: bool,

    pub display_name: Option<String>,

    /// Creation time (Unix ms).
    pub created_at: i64,

    /// Expiry (Unix ms). `None` never expires.
    pub expires_at: Option<i64>,

    pub revoked: bool,
}

impl Token {
    /// A non-root token with the given policies.
    pub fn new(hash: TokenHash, policies: Vec<String>, created_at: i64) -> Self {
        Self {
            hash,
            policies,
            root: false,
            no_default_policy: false,
            display_name: None,
            created_at,
            expires_at: None,
            revoked: false,
        }
    }

    /// A root token.
    pub fn root(hash: TokenHash, created_at: i64) -> Self {
        Self {
            root: true,
            display_name: Some("root".into()),
            ..Self::new(hash, Vec::new(), created_at)
        }
    }

    pub fn with_expiry(mut self, expires_at: i64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(exp) if now >= exp)
    }

    /// Not revoked and not expired.
    pub fn is_usable(&self, now: i64) -> bool {
        !self.revoked && !self.is_expired(now)
    }

    /// Policy names to load for this token, `default` included unless suppressed.
    pub fn effective_policy_names(&self) -> Vec<String> {
        let mut names = self.policies.clone();
        if !self.no_default_policy && !names.iter().any(|n| n == DEFAULT_POLICY) {
            names.push(DEFAULT_POLICY.to_string());
        }
        names.sort();
        names.dedup();
        names
    }
}
