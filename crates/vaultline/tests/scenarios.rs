//! End-to-end scenarios through the Vault API.

use anyhow::Result;
use vaultline::{Capability, CapabilitySet, ErrorKind, KeyConfig, VaultError};
use vaultline_testkit::fixtures::{reader_policy, transit_user_policy, PolicyBuilder, TestVault};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn kind<T: std::fmt::Debug>(result: vaultline::Result<T>) -> ErrorKind {
    result.expect_err("expected an error").kind()
}

#[tokio::test]
async fn reader_scenario() -> Result<()> {
    init_tracing();
    let t = TestVault::new().await;
    t.policy(&reader_policy()).await;
    let reader = t.token(&["reader"]).await;

    let caps = t.vault.capabilities_self(&reader, "secret/foo").await?;
    assert_eq!(caps, CapabilitySet::from([Capability::Read, Capability::List]));

    assert_eq!(
        kind(t.vault.create_policy(&reader, "mine", "{}").await),
        ErrorKind::Forbidden
    );
    assert_eq!(kind(t.vault.list_policies(&reader).await), ErrorKind::Forbidden);
    assert_eq!(kind(t.vault.create_key(&reader, "k").await), ErrorKind::Forbidden);
    assert!(t
        .vault
        .capabilities_self(&reader, "transit/keys/k")
        .await?
        .is_empty());
    Ok(())
}

#[tokio::test]
async fn root_is_never_forbidden() -> Result<()> {
    let t = TestVault::new().await;
    // A deny-everything policy exists, but root never evaluates policies.
    t.policy(&PolicyBuilder::new("lockdown").deny("*")).await;

    t.vault.create_key(&t.root, "k").await?;
    t.vault.rotate_key(&t.root, "k").await?;
    let blob = t.vault.encrypt(&t.root, "k", b"x").await?;
    assert_eq!(t.vault.decrypt(&t.root, "k", &blob).await?, b"x");
    assert_eq!(
        t.vault.capabilities_self(&t.root, "anything").await?,
        CapabilitySet::all_grants()
    );
    Ok(())
}

#[tokio::test]
async fn deny_in_one_policy_overrides_grant_in_another() -> Result<()> {
    let t = TestVault::new().await;
    t.policy(&reader_policy()).await;
    t.policy(&PolicyBuilder::new("no-foo").deny("secret/foo")).await;
    let token = t.token(&["reader", "no-foo"]).await;

    assert!(t.vault.capabilities_self(&token, "secret/foo").await?.is_empty());
    assert_eq!(
        t.vault.capabilities_self(&token, "secret/bar").await?,
        CapabilitySet::from([Capability::Read, Capability::List])
    );
    Ok(())
}

#[tokio::test]
async fn unauthenticated_requests() -> Result<()> {
    let t = TestVault::new().await;
    let stranger = vaultline::Credential::generate();

    assert_eq!(kind(t.vault.list_policies(&stranger).await), ErrorKind::Unauthorized);
    assert_eq!(
        kind(t.vault.list_policies(&vaultline::Credential::new("")).await),
        ErrorKind::Unauthorized
    );

    let child = t.token(&[]).await;
    t.vault.revoke_self(&child).await?;
    assert_eq!(kind(t.vault.lookup_self(&child).await), ErrorKind::Unauthorized);
    Ok(())
}

#[tokio::test]
async fn transit_through_policies() -> Result<()> {
    init_tracing();
    let t = TestVault::new().await;
    t.key("payments").await;
    t.policy(&transit_user_policy("payments")).await;
    let app = t.token(&["transit-payments"]).await;

    let blob = t.vault.encrypt(&app, "payments", b"").await?;
    assert!(blob.starts_with("v1:"));
    assert_eq!(t.vault.decrypt(&app, "payments", &blob).await?, b"");

    // Read access to key metadata, but no rotation or rewrap.
    assert_eq!(t.vault.read_key(&app, "payments").await?.latest_version, 1);
    assert_eq!(kind(t.vault.rotate_key(&app, "payments").await), ErrorKind::Forbidden);
    assert_eq!(
        kind(t.vault.rewrap(&app, "payments", &blob).await),
        ErrorKind::Forbidden
    );
    // Other keys are out of scope even if they do not exist.
    assert_eq!(
        kind(t.vault.encrypt(&app, "other", b"x").await),
        ErrorKind::Forbidden
    );
    Ok(())
}

#[tokio::test]
async fn rotation_and_retirement() -> Result<()> {
    let t = TestVault::new().await;
    t.key("k").await;

    let v1 = t.vault.encrypt(&t.root, "k", b"first").await?;
    assert_eq!(t.vault.rotate_key(&t.root, "k").await?, 2);
    let v2 = t.vault.encrypt(&t.root, "k", b"second").await?;

    assert!(v1.starts_with("v1:"));
    assert!(v2.starts_with("v2:"));
    assert_eq!(t.vault.decrypt(&t.root, "k", &v1).await?, b"first");

    let rewrapped = t.vault.rewrap(&t.root, "k", &v1).await?;
    assert!(rewrapped.starts_with("v2:"));

    let info = t
        .vault
        .configure_key(
            &t.root,
            "k",
            KeyConfig {
                min_decryption_version: Some(2),
                ..KeyConfig::default()
            },
        )
        .await?;
    assert_eq!(info.min_decryption_version, 2);

    assert_eq!(
        kind(t.vault.decrypt(&t.root, "k", &v1).await),
        ErrorKind::KeyVersionUnavailable
    );
    assert_eq!(t.vault.decrypt(&t.root, "k", &v2).await?, b"second");
    assert_eq!(t.vault.decrypt(&t.root, "k", &rewrapped).await?, b"first");

    let bad = KeyConfig {
        min_decryption_version: Some(3),
        ..KeyConfig::default()
    };
    assert_eq!(
        kind(t.vault.configure_key(&t.root, "k", bad).await),
        ErrorKind::ValidationError
    );
    Ok(())
}

#[tokio::test]
async fn decryption_failures_are_uniform() -> Result<()> {
    let t = TestVault::new().await;
    t.key("k").await;
    let blob = t.vault.encrypt(&t.root, "k", b"secret").await?;

    for forged in [
        blob.replacen("v1:", "v2:", 1),
        blob.replacen("v1:", "v01:", 1),
        blob.replacen("v1:", "v0:", 1),
        format!("{blob}AAAA"),
        "garbage".to_string(),
    ] {
        let err = t.vault.decrypt(&t.root, "k", &forged).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DecryptionFailed, "{forged}");
        assert_eq!(err.to_string(), "decryption failed");
    }
    Ok(())
}

#[tokio::test]
async fn policy_lifecycle() -> Result<()> {
    let t = TestVault::new().await;
    let doc = reader_policy().document();

    t.vault.create_policy(&t.root, "reader", &doc).await?;
    assert_eq!(
        kind(t.vault.create_policy(&t.root, "reader", &doc).await),
        ErrorKind::AlreadyExists
    );
    assert_eq!(
        t.vault.list_policies(&t.root).await?,
        vec!["default", "reader"]
    );

    let updated = t
        .vault
        .update_policy(
            &t.root,
            "reader",
            r#"{"path": {"secret/*": {"capabilities": ["read"]}}}"#,
        )
        .await?;
    assert_eq!(t.vault.read_policy(&t.root, "reader").await?, updated);

    assert_eq!(
        kind(t.vault.create_policy(&t.root, "bad", r#"{"path": {"a*b": {"capabilities": ["read"]}}}"#).await),
        ErrorKind::ValidationError
    );
    assert_eq!(
        kind(t.vault.create_policy(&t.root, "root", "{}").await),
        ErrorKind::ValidationError
    );
    assert_eq!(
        kind(t.vault.delete_policy(&t.root, "default").await),
        ErrorKind::ValidationError
    );

    t.vault.delete_policy(&t.root, "reader").await?;
    assert_eq!(
        kind(t.vault.read_policy(&t.root, "reader").await),
        ErrorKind::NotFound
    );
    Ok(())
}

#[tokio::test]
async fn policy_changes_apply_to_existing_tokens() -> Result<()> {
    let t = TestVault::new().await;
    t.policy(&reader_policy()).await;
    let reader = t.token(&["reader"]).await;
    assert!(!t.vault.capabilities_self(&reader, "secret/x").await?.is_empty());

    t.vault.delete_policy(&t.root, "reader").await?;
    assert!(t.vault.capabilities_self(&reader, "secret/x").await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn forbidden_error_names_path() {
    let t = TestVault::new().await;
    let child = t.token(&[]).await;

    match t.vault.list_keys(&child).await {
        Err(VaultError::Forbidden { path, operation }) => {
            assert_eq!(path, "transit/keys");
            assert_eq!(operation.to_string(), "list");
        }
        other => panic!("expected Forbidden, got {other:?}"),
    }
}
