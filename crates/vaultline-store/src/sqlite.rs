//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for Vaultline. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::de::DeserializeOwned;
use serde::Serialize;

use vaultline_core::{
    now_millis, KeyMaterial, KeyVersion, PathRule, Policy, Token, TokenHash, TransitKey,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{AppendResult, InsertResult, Store};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn encode_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn to_array32(bytes: Vec<u8>, what: &str) -> Result<[u8; 32]> {
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| StoreError::InvalidData(format!("{what}: expected 32 bytes, got {}", b.len())))
}

/// Raw token row before CBOR decoding.
type TokenRow = (Vec<u8>, bool, bool, Option<String>, i64, Option<i64>, bool);

#[async_trait]
impl Store for SqliteStore {
    async fn get_policy(&self, name: &str) -> Result<Option<Policy>> {
        let name = name.to_string();
        self.run(move |conn| {
            let rules: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT rules FROM policies WHERE name = ?1",
                    params![name],
                    |row| row.get(0),
                )
                .optional()?;

            rules
                .map(|bytes| -> Result<Policy> {
                    let rules: Vec<PathRule> = decode_cbor(&bytes)?;
                    Ok(Policy { name, rules })
                })
                .transpose()
        })
        .await
    }

    async fn list_policies(&self) -> Result<Vec<String>> {
        self.run(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM policies ORDER BY name")?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(names)
        })
        .await
    }

    async fn insert_policy(&self, policy: &Policy) -> Result<InsertResult> {
        let name = policy.name.clone();
        let rules = encode_cbor(&policy.rules)?;
        self.run(move |conn| {
            let now = now_millis();
            let changed = conn.execute(
                "INSERT OR IGNORE INTO policies (name, rules, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?3)",
                params![name, rules, now],
            )?;
            Ok(if changed == 0 {
                InsertResult::AlreadyExists
            } else {
                InsertResult::Inserted
            })
        })
        .await
    }

    async fn update_policy(&self, policy: &Policy) -> Result<bool> {
        let name = policy.name.clone();
        let rules = encode_cbor(&policy.rules)?;
        self.run(move |conn| {
            let changed = conn.execute(
                "UPDATE policies SET rules = ?2, updated_at = ?3 WHERE name = ?1",
                params![name, rules, now_millis()],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn delete_policy(&self, name: &str) -> Result<bool> {
        let name = name.to_string();
        self.run(move |conn| {
            let changed = conn.execute("DELETE FROM policies WHERE name = ?1", params![name])?;
            Ok(changed > 0)
        })
        .await
    }

    async fn get_token(&self, hash: &TokenHash) -> Result<Option<Token>> {
        let hash = *hash;
        self.run(move |conn| {
            let row: Option<TokenRow> = conn
                .query_row(
                    "SELECT policies, root, no_default_policy, display_name,
                            created_at, expires_at, revoked
                     FROM tokens WHERE token_hash = ?1",
                    params![hash.as_bytes().as_slice()],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                            row.get(6)?,
                        ))
                    },
                )
                .optional()?;

            row.map(
                |(policies, root, no_default_policy, display_name, created_at, expires_at, revoked)|
                 -> Result<Token> {
                    Ok(Token {
                        hash,
                        policies: decode_cbor(&policies)?,
                        root,
                        no_default_policy,
                        display_name,
                        created_at,
                        expires_at,
                        revoked,
                    })
                },
            )
            .transpose()
        })
        .await
    }

    async fn insert_token(&self, token: &Token) -> Result<InsertResult> {
        let token = token.clone();
        let policies = encode_cbor(&token.policies)?;
        self.run(move |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO tokens (
                    token_hash, policies, root, no_default_policy, display_name,
                    created_at, expires_at, revoked
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    token.hash.as_bytes().as_slice(),
                    policies,
                    token.root,
                    token.no_default_policy,
                    token.display_name,
                    token.created_at,
                    token.expires_at,
                    token.revoked,
                ],
            )?;
            Ok(if changed == 0 {
                InsertResult::AlreadyExists
            } else {
                InsertResult::Inserted
            })
        })
        .await
    }

    async fn update_token(&self, token: &Token) -> Result<bool> {
        let token = token.clone();
        let policies = encode_cbor(&token.policies)?;
        self.run(move |conn| {
            let changed = conn.execute(
                "UPDATE tokens SET policies = ?2, root = ?3, no_default_policy = ?4,
                        display_name = ?5, expires_at = ?6, revoked = ?7
                 WHERE token_hash = ?1",
                params![
                    token.hash.as_bytes().as_slice(),
                    policies,
                    token.root,
                    token.no_default_policy,
                    token.display_name,
                    token.expires_at,
                    token.revoked,
                ],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn delete_token(&self, hash: &TokenHash) -> Result<bool> {
        let hash = *hash;
        self.run(move |conn| {
            let changed = conn.execute(
                "DELETE FROM tokens WHERE token_hash = ?1",
                params![hash.as_bytes().as_slice()],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn get_transit_key(&self, name: &str) -> Result<Option<TransitKey>> {
        let name = name.to_string();
        self.run(move |conn| {
            let header: Option<(u32, u32, i64)> = conn
                .query_row(
                    "SELECT min_encryption_version, min_decryption_version, created_at
                     FROM transit_keys WHERE name = ?1",
                    params![name],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;

            let Some((min_encryption_version, min_decryption_version, created_at)) = header else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(
                "SELECT version, key_bytes, created_at FROM transit_key_versions
                 WHERE key_name = ?1 ORDER BY version",
            )?;
            let rows = stmt
                .query_map(params![name], |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        row.get::<_, Vec<u8>>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let versions = rows
                .into_iter()
                .map(|(version, bytes, created_at)| -> Result<KeyVersion> {
                    Ok(KeyVersion {
                        version,
                        key: KeyMaterial::from_bytes(to_array32(bytes, "key_bytes")?),
                        created_at,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            Ok(Some(TransitKey {
                name,
                versions,
                min_encryption_version,
                min_decryption_version,
                created_at,
            }))
        })
        .await
    }

    async fn list_transit_keys(&self) -> Result<Vec<String>> {
        self.run(|conn| {
            let mut stmt = conn.prepare("SELECT name FROM transit_keys ORDER BY name")?;
            let names = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(names)
        })
        .await
    }

    async fn insert_transit_key(&self, key: &TransitKey) -> Result<InsertResult> {
        let key = key.clone();
        self.run(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let changed = tx.execute(
                "INSERT OR IGNORE INTO transit_keys (
                    name, min_encryption_version, min_decryption_version, created_at
                ) VALUES (?1, ?2, ?3, ?4)",
                params![
                    key.name,
                    key.min_encryption_version,
                    key.min_decryption_version,
                    key.created_at,
                ],
            )?;
            if changed == 0 {
                return Ok(InsertResult::AlreadyExists);
            }

            for v in &key.versions {
                tx.execute(
                    "INSERT INTO transit_key_versions (key_name, version, key_bytes, created_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![key.name, v.version, v.key.as_bytes().as_slice(), v.created_at],
                )?;
            }

            tx.commit()?;
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn append_key_version(&self, name: &str, version: &KeyVersion) -> Result<AppendResult> {
        let name = name.to_string();
        let version = version.clone();
        self.run(move |conn| {
            // Immediate: take the write lock before reading the latest version.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM transit_keys WHERE name = ?1)",
                params![name],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(StoreError::NotFound(format!("transit key {name}")));
            }

            let latest: u32 = tx.query_row(
                "SELECT COALESCE(MAX(version), 0) FROM transit_key_versions WHERE key_name = ?1",
                params![name],
                |row| row.get(0),
            )?;
            if version.version != latest + 1 {
                return Ok(AppendResult::Conflict { latest });
            }

            tx.execute(
                "INSERT INTO transit_key_versions (key_name, version, key_bytes, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    name,
                    version.version,
                    version.key.as_bytes().as_slice(),
                    version.created_at,
                ],
            )?;

            tx.commit()?;
            Ok(AppendResult::Appended)
        })
        .await
    }

    async fn update_key_bounds(
        &self,
        name: &str,
        min_encryption_version: u32,
        min_decryption_version: u32,
    ) -> Result<bool> {
        let name = name.to_string();
        self.run(move |conn| {
            let changed = conn.execute(
                "UPDATE transit_keys
                 SET min_encryption_version = ?2, min_decryption_version = ?3
                 WHERE name = ?1",
                params![name, min_encryption_version, min_decryption_version],
            )?;
            Ok(changed > 0)
        })
        .await
    }
}
