//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use vaultline_core::{KeyVersion, Policy, Token, TokenHash, TransitKey};

use crate::error::{Result, StoreError};
use crate::traits::{AppendResult, InsertResult, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock; every
/// mutation happens under the write lock, which makes the compare-and-append
/// atomic.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    policies: BTreeMap<String, Policy>,
    tokens: HashMap<TokenHash, Token>,
    keys: BTreeMap<String, TransitKey>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_policy(&self, name: &str) -> Result<Option<Policy>> {
        Ok(self.read()?.policies.get(name).cloned())
    }

    async fn list_policies(&self) -> Result<Vec<String>> {
        Ok(self.read()?.policies.keys().cloned().collect())
    }

    async fn insert_policy(&self, policy: &Policy) -> Result<InsertResult> {
        let mut inner = self.write()?;
        if inner.policies.contains_key(&policy.name) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.policies.insert(policy.name.clone(), policy.clone());
        Ok(InsertResult::Inserted)
    }

    async fn update_policy(&self, policy: &Policy) -> Result<bool> {
        let mut inner = self.write()?;
        match inner.policies.get_mut(&policy.name) {
            Some(existing) => {
                *existing = policy.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_policy(&self, name: &str) -> Result<bool> {
        Ok(self.write()?.policies.remove(name).is_some())
    }

    async fn get_token(&self, hash: &TokenHash) -> Result<Option<Token>> {
        Ok(self.read()?.tokens.get(hash).cloned())
    }

    async fn insert_token(&self, token: &Token) -> Result<InsertResult> {
        let mut inner = self.write()?;
        if inner.tokens.contains_key(&token.hash) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.tokens.insert(token.hash, token.clone());
        Ok(InsertResult::Inserted)
    }

    async fn update_token(&self, token: &Token) -> Result<bool> {
        let mut inner = self.write()?;
        match inner.tokens.get_mut(&token.hash) {
            Some(existing) => {
                *existing = token.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_token(&self, hash: &TokenHash) -> Result<bool> {
        Ok(self.write()?.tokens.remove(hash).is_some())
    }

    async fn get_transit_key(&self, name: &str) -> Result<Option<TransitKey>> {
        Ok(self.read()?.keys.get(name).cloned())
    }

    async fn list_transit_keys(&self) -> Result<Vec<String>> {
        Ok(self.read()?.keys.keys().cloned().collect())
    }

    async fn insert_transit_key(&self, key: &TransitKey) -> Result<InsertResult> {
        let mut inner = self.write()?;
        if inner.keys.contains_key(&key.name) {
            return Ok(InsertResult::AlreadyExists);
        }
        inner.keys.insert(key.name.clone(), key.clone());
        Ok(InsertResult::Inserted)
    }

    async fn append_key_version(&self, name: &str, version: &KeyVersion) -> Result<AppendResult> {
        let mut inner = self.write()?;
        let key = inner
            .keys
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(format!("transit key {name}")))?;

        let latest = key.latest_version();
        if version.version != latest + 1 {
            return Ok(AppendResult::Conflict { latest });
        }

        key.versions.push(version.clone());
        Ok(AppendResult::Appended)
    }

    async fn update_key_bounds(
        &self,
        name: &str,
        min_encryption_version: u32,
        min_decryption_version: u32,
    ) -> Result<bool> {
        let mut inner = self.write()?;
        match inner.keys.get_mut(name) {
            Some(key) => {
                key.min_encryption_version = min_encryption_version;
                key.min_decryption_version = min_decryption_version;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
