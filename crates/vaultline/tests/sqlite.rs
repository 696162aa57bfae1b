//! The Vault over on-disk SQLite.

use anyhow::Result;
use tempfile::TempDir;
use vaultline::store::SqliteStore;
use vaultline::{ErrorKind, TokenRequest, Vault, VaultConfig};

fn open(dir: &TempDir) -> Result<Vault<SqliteStore>> {
    let store = SqliteStore::open(dir.path().join("vaultline.db"))?;
    Ok(Vault::new(store, VaultConfig::default()))
}

#[tokio::test]
async fn state_survives_reopen() -> Result<()> {
    let dir = TempDir::new()?;

    let (root, blob, child) = {
        let vault = open(&dir)?;
        let root = vault.bootstrap().await?.expect("first bootstrap");
        vault
            .create_policy(&root, "reader", r#"{"path": {"secret/*": {"capabilities": ["read"]}}}"#)
            .await?;
        vault.create_key(&root, "k").await?;
        vault.rotate_key(&root, "k").await?;
        let blob = vault.encrypt(&root, "k", b"persisted").await?;
        let child = vault
            .create_token(
                &root,
                TokenRequest {
                    policies: vec!["reader".into()],
                    ..TokenRequest::default()
                },
            )
            .await?
            .credential;
        (root, blob, child)
    };

    let vault = open(&dir)?;
    assert!(vault.bootstrap().await?.is_none());

    assert!(blob.starts_with("v2:"));
    assert_eq!(vault.decrypt(&root, "k", &blob).await?, b"persisted");
    assert_eq!(vault.read_key(&root, "k").await?.latest_version, 2);
    assert_eq!(vault.lookup_self(&child).await?.policies, vec!["default", "reader"]);

    vault.revoke_token(&root, &child).await?;
    let err = vault.lookup_self(&child).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_rotation_on_sqlite() -> Result<()> {
    let dir = TempDir::new()?;
    let vault = std::sync::Arc::new(open(&dir)?);
    let root = vault.bootstrap().await?.expect("first bootstrap");
    vault.create_key(&root, "k").await?;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let vault = std::sync::Arc::clone(&vault);
        let root = root.clone();
        handles.push(tokio::spawn(async move { vault.rotate_key(&root, "k").await }));
    }

    let mut versions = Vec::new();
    for handle in handles {
        versions.push(handle.await??);
    }
    versions.sort_unstable();
    assert_eq!(versions, (2..=9).collect::<Vec<u32>>());
    Ok(())
}
