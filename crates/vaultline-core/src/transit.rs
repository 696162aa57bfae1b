//! Transit key records.
//!
//! A [`TransitKey`] owns an append-only history of [`KeyVersion`]s. Versions
//! start at 1 and increase by one on every rotation. The two minimum bounds
//! gate which versions remain usable for encryption and decryption.

use std::fmt;

use rand::RngCore;

/// Raw 256-bit symmetric key bytes. `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyMaterial([u8; 32]);

impl KeyMaterial {
    /// Generate fresh key material from the OS-seeded CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyMaterial(<redacted>)")
    }
}

/// One version of a transit key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVersion {
    pub version: u32,
    pub key: KeyMaterial,
    /// Unix ms.
    pub created_at: i64,
}

impl KeyVersion {
    pub fn generate(version: u32, created_at: i64) -> Self {
        Self {
            version,
            key: KeyMaterial::generate(),
            created_at,
        }
    }
}

/// A named key and its version history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitKey {
    pub name: String,
    /// Ordered by `version`, strictly increasing from 1.
    pub versions: Vec<KeyVersion>,
    pub min_encryption_version: u32,
    pub min_decryption_version: u32,
    pub created_at: i64,
}

impl TransitKey {
    /// A new key holding only `first` (which must be version 1).
    pub fn new(name: impl Into<String>, first: KeyVersion) -> Self {
        let created_at = first.created_at;
        Self {
            name: name.into(),
            versions: vec![first],
            min_encryption_version: 1,
            min_decryption_version: 1,
            created_at,
        }
    }

    /// Highest version number, 0 if the history is empty.
    pub fn latest_version(&self) -> u32 {
        self.versions.last().map(|v| v.version).unwrap_or(0)
    }

    pub fn version(&self, version: u32) -> Option<&KeyVersion> {
        self.versions
            .binary_search_by_key(&version, |v| v.version)
            .ok()
            .map(|idx| &self.versions[idx])
    }

    /// Metadata view without key bytes.
    pub fn info(&self) -> TransitKeyInfo {
        TransitKeyInfo {
            name: self.name.clone(),
            latest_version: self.latest_version(),
            min_encryption_version: self.min_encryption_version,
            min_decryption_version: self.min_decryption_version,
            created_at: self.created_at,
            versions: self
                .versions
                .iter()
                .map(|v| (v.version, v.created_at))
                .collect(),
        }
    }
}

/// Key metadata safe to hand to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitKeyInfo {
    pub name: String,
    pub latest_version: u32,
    pub min_encryption_version: u32,
    pub min_decryption_version: u32,
    pub created_at: i64,
    /// `(version, created_at)` pairs.
    pub versions: Vec<(u32, i64)>,
}
