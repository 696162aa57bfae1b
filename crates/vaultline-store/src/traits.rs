//! Store trait: the abstract interface for record persistence.
//!
//! This trait allows the engines to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use vaultline_core::{KeyVersion, Policy, Token, TokenHash, TransitKey};

use crate::error::Result;

/// Result of inserting a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// Record was inserted.
    Inserted,
    /// A record with the same key already exists. Nothing was written.
    AlreadyExists,
}

/// Result of appending a key version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendResult {
    /// The version was appended.
    Appended,
    /// The version was not `latest + 1`. Nothing was written.
    Conflict {
        /// The latest version currently stored.
        latest: u32,
    },
}

/// The Store trait: async interface for policy, token and key persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Policies
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a policy by name.
    async fn get_policy(&self, name: &str) -> Result<Option<Policy>>;

    /// List all policy names, sorted.
    async fn list_policies(&self) -> Result<Vec<String>>;

    /// Insert a new policy.
    async fn insert_policy(&self, policy: &Policy) -> Result<InsertResult>;

    /// Replace an existing policy. Returns `false` if it does not exist.
    async fn update_policy(&self, policy: &Policy) -> Result<bool>;

    /// Delete a policy. Returns `false` if it does not exist.
    async fn delete_policy(&self, name: &str) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Tokens
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a token by credential hash.
    async fn get_token(&self, hash: &TokenHash) -> Result<Option<Token>>;

    /// Insert a new token.
    async fn insert_token(&self, token: &Token) -> Result<InsertResult>;

    /// Replace an existing token. Returns `false` if it does not exist.
    async fn update_token(&self, token: &Token) -> Result<bool>;

    /// Delete a token. Returns `false` if it does not exist.
    async fn delete_token(&self, hash: &TokenHash) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Transit keys
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a key with its full version history.
    async fn get_transit_key(&self, name: &str) -> Result<Option<TransitKey>>;

    /// List all key names, sorted.
    async fn list_transit_keys(&self) -> Result<Vec<String>>;

    /// Insert a new key together with its initial versions.
    async fn insert_transit_key(&self, key: &TransitKey) -> Result<InsertResult>;

    /// Append a version to an existing key.
    ///
    /// Atomic: the version is written only if it equals the stored latest
    /// version plus one. Fails with `NotFound` if the key does not exist.
    async fn append_key_version(&self, name: &str, version: &KeyVersion) -> Result<AppendResult>;

    /// Set the minimum encryption/decryption versions. Returns `false` if the
    /// key does not exist.
    async fn update_key_bounds(
        &self,
        name: &str,
        min_encryption_version: u32,
        min_decryption_version: u32,
    ) -> Result<bool>;
}

/// Extension trait for common store patterns.
pub trait StoreExt: Store {
    /// Fetch several policies by name, pairing each name with its record.
    fn get_policies(
        &self,
        names: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<(String, Option<Policy>)>>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn get_policies(&self, names: &[String]) -> Result<Vec<(String, Option<Policy>)>> {
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let policy = self.get_policy(name).await?;
            out.push((name.clone(), policy));
        }
        Ok(out)
    }
}
