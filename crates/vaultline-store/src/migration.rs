//! SQLite schema versions.
//!
//! `MIGRATIONS` is an ordered list of `(version, sql)` steps. Opening a
//! database applies every step above the recorded version inside one
//! transaction and records each step in `schema_migrations`.

use rusqlite::Connection;

use vaultline_core::now_millis;

use crate::error::{Result, StoreError};

/// Schema steps, strictly ascending by version.
const MIGRATIONS: &[(u32, &str)] = &[(1, SCHEMA_V1)];

/// Schema version this build writes.
pub const CURRENT_VERSION: u32 = 1;

/// Bring the schema up to [`CURRENT_VERSION`]. Safe to call on every open.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
         CREATE TABLE IF NOT EXISTS schema_migrations (
             version INTEGER PRIMARY KEY,
             applied_at INTEGER NOT NULL
         );",
    )?;

    let recorded: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if recorded > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema v{recorded} is newer than supported v{CURRENT_VERSION}"
        )));
    }

    let pending: Vec<_> = MIGRATIONS.iter().filter(|(v, _)| *v > recorded).collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (version, sql) in pending {
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![version, now_millis()],
        )?;
        tracing::debug!(version, "applied schema migration");
    }
    tx.commit()?;

    Ok(())
}

const SCHEMA_V1: &str = r#"
        -- Policies: rules are a CBOR array of {pattern, capabilities}
        CREATE TABLE policies (
            name TEXT PRIMARY KEY,
            rules BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        -- Tokens, keyed by the credential hash (never the credential)
        CREATE TABLE tokens (
            token_hash BLOB PRIMARY KEY,          -- 32 bytes, keyed Blake3
            policies BLOB NOT NULL,               -- CBOR array of policy names
            root INTEGER NOT NULL DEFAULT 0,
            no_default_policy INTEGER NOT NULL DEFAULT 0,
            display_name TEXT,
            created_at INTEGER NOT NULL,
            expires_at INTEGER,                   -- nullable: never expires
            revoked INTEGER NOT NULL DEFAULT 0
        );

        -- Transit keys and their bounds
        CREATE TABLE transit_keys (
            name TEXT PRIMARY KEY,
            min_encryption_version INTEGER NOT NULL DEFAULT 1,
            min_decryption_version INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        );

        -- Append-only version history
        CREATE TABLE transit_key_versions (
            key_name TEXT NOT NULL REFERENCES transit_keys(name) ON DELETE CASCADE,
            version INTEGER NOT NULL,
            key_bytes BLOB NOT NULL,              -- 32 bytes
            created_at INTEGER NOT NULL,
            PRIMARY KEY (key_name, version)
        );

        CREATE INDEX idx_tokens_expires ON tokens(expires_at);
        "#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "policies",
            "tokens",
            "transit_keys",
            "transit_key_versions",
            "schema_migrations",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_rejects_newer_schema() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, 0)",
            [CURRENT_VERSION + 1],
        )
        .unwrap();

        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}
