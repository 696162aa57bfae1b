//! Transit key lifecycle: creation, rotation and version bounds.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Mutex as AsyncMutex;
use vaultline_core::{
    now_millis, validate_name, KeyMaterial, KeyVersion, TransitKey, TransitKeyInfo,
};
use vaultline_store::{AppendResult, InsertResult, Store};

use crate::error::{Result, TransitError};

/// Owns every transit key and serializes writes per key name.
///
/// Writes to one key (create, rotate, bound changes) hold that key's async
/// mutex. The store's compare-and-append backs this up across processes
/// sharing a database.
pub struct TransitKeyManager<S: Store> {
    store: Arc<S>,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl<S: Store> TransitKeyManager<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, name: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    /// Load a key with its full history.
    pub async fn load(&self, name: &str) -> Result<TransitKey> {
        self.store
            .get_transit_key(name)
            .await?
            .ok_or_else(|| TransitError::NotFound(name.to_string()))
    }

    /// Create a key with a fresh version 1.
    pub async fn create_key(&self, name: &str) -> Result<TransitKeyInfo> {
        validate_name(name)?;
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;

        let key = TransitKey::new(name, KeyVersion::generate(1, now_millis()));
        match self.store.insert_transit_key(&key).await? {
            InsertResult::Inserted => {
                tracing::info!(key = %name, "created transit key");
                Ok(key.info())
            }
            InsertResult::AlreadyExists => Err(TransitError::AlreadyExists(name.to_string())),
        }
    }

    /// Append version `latest + 1`. Bounds are left unchanged.
    pub async fn rotate(&self, name: &str) -> Result<u32> {
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;

        let key = self.load(name).await?;
        let next = key.latest_version() + 1;

        match self
            .store
            .append_key_version(name, &KeyVersion::generate(next, now_millis()))
            .await?
        {
            AppendResult::Appended => {
                tracing::info!(key = %name, version = next, "rotated transit key");
                Ok(next)
            }
            AppendResult::Conflict { latest } => Err(TransitError::Conflict {
                name: name.to_string(),
                latest,
            }),
        }
    }

    /// The key and version to encrypt with: the latest version.
    pub async fn encryption_key(&self, name: &str) -> Result<(KeyMaterial, u32)> {
        let key = self.load(name).await?;
        let (material, version) = select_encryption(&key)?;
        Ok((material.clone(), version))
    }

    /// The key for `version`, if that version may still decrypt.
    pub async fn decryption_key(&self, name: &str, version: u32) -> Result<KeyMaterial> {
        let key = self.load(name).await?;
        select_decryption(&key, version).cloned()
    }

    /// Retire every version below `version` for decryption.
    pub async fn set_min_decryption_version(&self, name: &str, version: u32) -> Result<TransitKeyInfo> {
        self.configure(name, None, Some(version)).await
    }

    pub async fn set_min_encryption_version(&self, name: &str, version: u32) -> Result<TransitKeyInfo> {
        self.configure(name, Some(version), None).await
    }

    /// Update either bound. Each must satisfy `1 <= v <= latest`.
    pub async fn configure(
        &self,
        name: &str,
        min_encryption_version: Option<u32>,
        min_decryption_version: Option<u32>,
    ) -> Result<TransitKeyInfo> {
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;

        let mut key = self.load(name).await?;
        let latest = key.latest_version();

        for (label, bound) in [
            ("min_encryption_version", min_encryption_version),
            ("min_decryption_version", min_decryption_version),
        ] {
            if let Some(v) = bound {
                if v == 0 || v > latest {
                    return Err(TransitError::Validation(format!(
                        "{label} must be between 1 and {latest}, got {v}"
                    )));
                }
            }
        }

        key.min_encryption_version = min_encryption_version.unwrap_or(key.min_encryption_version);
        key.min_decryption_version = min_decryption_version.unwrap_or(key.min_decryption_version);

        if !self
            .store
            .update_key_bounds(name, key.min_encryption_version, key.min_decryption_version)
            .await?
        {
            return Err(TransitError::NotFound(name.to_string()));
        }

        tracing::info!(
            key = %name,
            min_encryption_version = key.min_encryption_version,
            min_decryption_version = key.min_decryption_version,
            "updated transit key bounds"
        );
        Ok(key.info())
    }

    /// Key metadata, without key bytes.
    pub async fn read_key(&self, name: &str) -> Result<TransitKeyInfo> {
        Ok(self.load(name).await?.info())
    }

    pub async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.store.list_transit_keys().await?)
    }
}

/// The latest version's key, provided it is not below the encryption bound.
pub(crate) fn select_encryption(key: &TransitKey) -> Result<(&KeyMaterial, u32)> {
    let latest = key.latest_version();
    if latest < key.min_encryption_version {
        return Err(TransitError::KeyVersionUnavailable);
    }
    key.version(latest)
        .map(|v| (&v.key, latest))
        .ok_or(TransitError::KeyVersionUnavailable)
}

pub(crate) fn select_decryption(key: &TransitKey, version: u32) -> Result<&KeyMaterial> {
    if version < key.min_decryption_version {
        return Err(TransitError::KeyVersionUnavailable);
    }
    key.version(version)
        .map(|v| &v.key)
        .ok_or(TransitError::KeyVersionUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultline_store::MemoryStore;

    fn manager() -> TransitKeyManager<MemoryStore> {
        TransitKeyManager::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn test_create_key() {
        let keys = manager();
        let info = keys.create_key("payments").await.unwrap();

        assert_eq!(info.latest_version, 1);
        assert_eq!(info.min_encryption_version, 1);
        assert_eq!(info.min_decryption_version, 1);

        assert!(matches!(
            keys.create_key("payments").await,
            Err(TransitError::AlreadyExists(_))
        ));
        assert!(matches!(keys.create_key("bad name").await, Err(TransitError::Core(_))));
    }

    #[tokio::test]
    async fn test_rotate_appends_and_keeps_bounds() {
        let keys = manager();
        keys.create_key("k").await.unwrap();

        assert_eq!(keys.rotate("k").await.unwrap(), 2);
        assert_eq!(keys.rotate("k").await.unwrap(), 3);

        let info = keys.read_key("k").await.unwrap();
        assert_eq!(info.latest_version, 3);
        assert_eq!(info.min_decryption_version, 1);
        assert_eq!(info.versions.iter().map(|v| v.0).collect::<Vec<_>>(), vec![1, 2, 3]);

        let (_, version) = keys.encryption_key("k").await.unwrap();
        assert_eq!(version, 3);
    }

    #[tokio::test]
    async fn test_rotate_missing_key() {
        assert!(matches!(manager().rotate("nope").await, Err(TransitError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_decryption_bounds() {
        let keys = manager();
        keys.create_key("k").await.unwrap();
        keys.rotate("k").await.unwrap();

        let v1 = keys.decryption_key("k", 1).await.unwrap();
        keys.set_min_decryption_version("k", 2).await.unwrap();

        assert!(matches!(
            keys.decryption_key("k", 1).await,
            Err(TransitError::KeyVersionUnavailable)
        ));
        assert!(matches!(
            keys.decryption_key("k", 9).await,
            Err(TransitError::KeyVersionUnavailable)
        ));
        assert_ne!(keys.decryption_key("k", 2).await.unwrap(), v1);
    }

    #[tokio::test]
    async fn test_bounds_validated() {
        let keys = manager();
        keys.create_key("k").await.unwrap();
        keys.rotate("k").await.unwrap();

        for v in [0, 3] {
            assert!(matches!(
                keys.set_min_decryption_version("k", v).await,
                Err(TransitError::Validation(_))
            ));
            assert!(matches!(
                keys.set_min_encryption_version("k", v).await,
                Err(TransitError::Validation(_))
            ));
        }

        let info = keys.set_min_encryption_version("k", 2).await.unwrap();
        assert_eq!(info.min_encryption_version, 2);
        assert_eq!(info.min_decryption_version, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_rotation_assigns_distinct_versions() {
        let keys = Arc::new(manager());
        keys.create_key("k").await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let keys = Arc::clone(&keys);
                tokio::spawn(async move { keys.rotate("k").await.unwrap() })
            })
            .collect();

        let mut versions = Vec::new();
        for handle in handles {
            versions.push(handle.await.unwrap());
        }
        versions.sort_unstable();

        assert_eq!(versions, (2..=17).collect::<Vec<u32>>());
        assert_eq!(keys.read_key("k").await.unwrap().latest_version, 17);
    }
}
