//! The Vault: unified API over tokens, policies and transit keys.
//!
//! Every operation authenticates its credential, authorizes a fixed path
//! and operation class, and only then touches state.

use std::sync::Arc;

use vaultline_core::{
    now_millis, validate_name, CapabilitySet, Credential, Policy, Token, TransitKeyInfo,
    ROOT_POLICY,
};
use vaultline_policy::PolicyEngine;
use vaultline_store::{InsertResult, Store, StoreError};
use vaultline_transit::{CipherEngine, TransitKeyManager};

use crate::auth::{AuthContext, Operation, RequestContext, TokenAuthenticator};
use crate::config::VaultConfig;
use crate::error::{Result, VaultError};

/// Parameters for issuing a token.
#[derive(Debug, Clone, Default)]
pub struct TokenRequest {
    /// Policies to attach. Empty inherits the caller's policies. Including
    /// `root` requests a root token.
    pub policies: Vec<String>,
    /// Lifetime in milliseconds. Falls back to the configured default.
    pub ttl_ms: Option<i64>,
    pub no_default_policy: bool,
    pub display_name: Option<String>,
}

/// A freshly issued token. The credential is shown only here.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub credential: Credential,
    pub info: TokenInfo,
}

/// Token metadata, never including the credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInfo {
    pub accessor: String,
    /// Effective policy names, `default` included when attached.
    pub policies: Vec<String>,
    pub root: bool,
    pub display_name: Option<String>,
    pub created_at: i64,
    pub expires_at: Option<i64>,
}

impl From<&Token> for TokenInfo {
    fn from(token: &Token) -> Self {
        Self {
            accessor: token.hash.accessor(),
            policies: if token.root {
                vec![ROOT_POLICY.to_string()]
            } else {
                token.effective_policy_names()
            },
            root: token.root,
            display_name: token.display_name.clone(),
            created_at: token.created_at,
            expires_at: token.expires_at,
        }
    }
}

/// New bounds for a transit key. `None` leaves a bound unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyConfig {
    pub min_encryption_version: Option<u32>,
    pub min_decryption_version: Option<u32>,
}

/// The main Vault struct.
pub struct Vault<S: Store> {
    store: Arc<S>,
    config: VaultConfig,
    auth: TokenAuthenticator<S>,
    policies: PolicyEngine<S>,
    keys: Arc<TransitKeyManager<S>>,
    cipher: CipherEngine<S>,
}

impl<S: Store> Vault<S> {
    /// Create a new vault over a store.
    pub fn new(store: S, config: VaultConfig) -> Self {
        let store = Arc::new(store);
        let keys = Arc::new(TransitKeyManager::new(Arc::clone(&store)));
        Self {
            auth: TokenAuthenticator::new(Arc::clone(&store)),
            policies: PolicyEngine::new(Arc::clone(&store)),
            cipher: CipherEngine::new(Arc::clone(&keys)),
            keys,
            store,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Install the `default` policy and, on first initialisation, issue a
    /// root token. The root credential is returned exactly once.
    pub async fn bootstrap(&self) -> Result<Option<Credential>> {
        let first_run = self.policies.install_default().await?;
        if !first_run || !self.config.issue_root_token_on_bootstrap {
            return Ok(None);
        }

        let credential = Credential::generate();
        let token = Token::root(credential.hash(), now_millis());
        self.store_token(&token).await?;
        tracing::info!(accessor = %token.hash, "bootstrapped vault with root token");
        Ok(Some(credential))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Authentication
    // ─────────────────────────────────────────────────────────────────────────

    /// Authenticate a credential against the current time.
    pub async fn authenticate(&self, credential: Option<&Credential>) -> Result<AuthContext> {
        self.auth.authenticate(credential, now_millis()).await
    }

    /// Authenticate and authorize a transport request.
    pub async fn authorize(&self, request: &RequestContext) -> Result<AuthContext> {
        let ctx = self.authenticate(request.credential.as_ref()).await?;
        ctx.authorize(&request.path, request.operation)?;
        Ok(ctx)
    }

    async fn gate(&self, credential: &Credential, path: &str, operation: Operation) -> Result<AuthContext> {
        let ctx = self.authenticate(Some(credential)).await?;
        ctx.authorize(path, operation)?;
        Ok(ctx)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Policies
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn create_policy(&self, credential: &Credential, name: &str, document: &str) -> Result<Policy> {
        self.gate(credential, &format!("sys/policy/{name}"), Operation::Create)
            .await?;
        Ok(self.policies.create(name, document).await?)
    }

    pub async fn update_policy(&self, credential: &Credential, name: &str, document: &str) -> Result<Policy> {
        self.gate(credential, &format!("sys/policy/{name}"), Operation::Update)
            .await?;
        Ok(self.policies.update(name, document).await?)
    }

    pub async fn read_policy(&self, credential: &Credential, name: &str) -> Result<Policy> {
        self.gate(credential, &format!("sys/policy/{name}"), Operation::Read)
            .await?;
        Ok(self.policies.load(name).await?)
    }

    pub async fn delete_policy(&self, credential: &Credential, name: &str) -> Result<()> {
        self.gate(credential, &format!("sys/policy/{name}"), Operation::Delete)
            .await?;
        Ok(self.policies.delete(name).await?)
    }

    pub async fn list_policies(&self, credential: &Credential) -> Result<Vec<String>> {
        self.gate(credential, "sys/policy", Operation::List).await?;
        Ok(self.policies.list().await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transit keys
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn create_key(&self, credential: &Credential, name: &str) -> Result<TransitKeyInfo> {
        self.gate(credential, &format!("transit/keys/{name}"), Operation::Create)
            .await?;
        Ok(self.keys.create_key(name).await?)
    }

    pub async fn read_key(&self, credential: &Credential, name: &str) -> Result<TransitKeyInfo> {
        self.gate(credential, &format!("transit/keys/{name}"), Operation::Read)
            .await?;
        Ok(self.keys.read_key(name).await?)
    }

    pub async fn list_keys(&self, credential: &Credential) -> Result<Vec<String>> {
        self.gate(credential, "transit/keys", Operation::List).await?;
        Ok(self.keys.list_keys().await?)
    }

    /// Rotate a key, returning the new latest version.
    pub async fn rotate_key(&self, credential: &Credential, name: &str) -> Result<u32> {
        self.gate(credential, &format!("transit/keys/{name}/rotate"), Operation::Update)
            .await?;
        Ok(self.keys.rotate(name).await?)
    }

    pub async fn configure_key(
        &self,
        credential: &Credential,
        name: &str,
        config: KeyConfig,
    ) -> Result<TransitKeyInfo> {
        self.gate(credential, &format!("transit/keys/{name}/config"), Operation::Update)
            .await?;
        Ok(self
            .keys
            .configure(name, config.min_encryption_version, config.min_decryption_version)
            .await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Encryption
    // ─────────────────────────────────────────────────────────────────────────

    /// Encrypt, returning a `v<version>:<base64>` blob.
    pub async fn encrypt(&self, credential: &Credential, name: &str, plaintext: &[u8]) -> Result<String> {
        self.gate(credential, &format!("transit/encrypt/{name}"), Operation::Update)
            .await?;
        Ok(self.cipher.encrypt(name, plaintext).await?.to_string())
    }

    pub async fn decrypt(&self, credential: &Credential, name: &str, ciphertext: &str) -> Result<Vec<u8>> {
        self.gate(credential, &format!("transit/decrypt/{name}"), Operation::Update)
            .await?;
        Ok(self.cipher.decrypt(name, ciphertext).await?)
    }

    /// Re-encrypt under the latest key version.
    pub async fn rewrap(&self, credential: &Credential, name: &str, ciphertext: &str) -> Result<String> {
        self.gate(credential, &format!("transit/rewrap/{name}"), Operation::Update)
            .await?;
        Ok(self.cipher.rewrap(name, ciphertext).await?.to_string())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tokens
    // ─────────────────────────────────────────────────────────────────────────

    /// Issue a child token.
    ///
    /// Non-root callers may only attach policies they hold themselves, cannot
    /// request a root token, and cannot outlive their own token.
    pub async fn create_token(&self, credential: &Credential, request: TokenRequest) -> Result<IssuedToken> {
        let parent = self
            .gate(credential, "auth/token/create", Operation::Create)
            .await?;
        let now = now_millis();

        if matches!(request.ttl_ms, Some(ttl) if ttl <= 0) {
            return Err(VaultError::Validation("ttl must be positive".into()));
        }
        for name in &request.policies {
            validate_name(name)?;
        }

        let wants_root = request.policies.iter().any(|p| p == ROOT_POLICY);
        let mut policies: Vec<String> = request
            .policies
            .iter()
            .filter(|p| p.as_str() != ROOT_POLICY)
            .cloned()
            .collect();

        if !parent.is_root() {
            if wants_root {
                return Err(forbidden("auth/token/create", Operation::Sudo));
            }
            let held = parent.token().effective_policy_names();
            if policies.is_empty() {
                policies = parent.token().policies.clone();
            } else if let Some(extra) = policies.iter().find(|p| !held.contains(p)) {
                tracing::debug!(policy = %extra, "child token would exceed parent policies");
                return Err(forbidden("auth/token/create", Operation::Create));
            }
        }
        policies.sort();
        policies.dedup();

        let credential = Credential::generate();
        let mut token = if wants_root {
            Token::root(credential.hash(), now)
        } else {
            Token::new(credential.hash(), policies, now)
        };
        token.no_default_policy = !token.root
            && (request.no_default_policy
                || !self.config.attach_default_policy
                || (!parent.is_root() && parent.token().no_default_policy));
        if let Some(name) = request.display_name {
            token.display_name = Some(name);
        }
        token.expires_at = match (self.config.token_expiry(now, request.ttl_ms), parent.token().expires_at) {
            (Some(own), Some(cap)) => Some(own.min(cap)),
            (own, cap) => own.or(cap),
        };

        self.store_token(&token).await?;
        tracing::info!(
            accessor = %token.hash,
            parent = %parent.token().hash,
            root = token.root,
            "issued token"
        );

        Ok(IssuedToken {
            info: TokenInfo::from(&token),
            credential,
        })
    }

    pub async fn lookup_self(&self, credential: &Credential) -> Result<TokenInfo> {
        let ctx = self
            .gate(credential, "auth/token/lookup-self", Operation::Read)
            .await?;
        Ok(TokenInfo::from(ctx.token()))
    }

    /// Revoke the calling token. It is unusable from the next request on.
    pub async fn revoke_self(&self, credential: &Credential) -> Result<()> {
        let ctx = self
            .gate(credential, "auth/token/revoke-self", Operation::Update)
            .await?;
        self.mark_revoked(ctx.token().clone()).await
    }

    /// Revoke another token by its credential.
    pub async fn revoke_token(&self, credential: &Credential, target: &Credential) -> Result<()> {
        self.gate(credential, "auth/token/revoke", Operation::Update)
            .await?;
        let token = self
            .store
            .get_token(&target.hash())
            .await?
            .ok_or(VaultError::TokenNotFound)?;
        self.mark_revoked(token).await
    }

    /// The caller's effective capabilities on `path`.
    pub async fn capabilities_self(&self, credential: &Credential, path: &str) -> Result<CapabilitySet> {
        let ctx = self
            .gate(credential, "sys/capabilities-self", Operation::Update)
            .await?;
        Ok(ctx.capabilities(path))
    }

    async fn mark_revoked(&self, mut token: Token) -> Result<()> {
        if token.revoked {
            return Ok(());
        }
        token.revoked = true;
        if !self.store.update_token(&token).await? {
            return Err(VaultError::TokenNotFound);
        }
        tracing::info!(accessor = %token.hash, "revoked token");
        Ok(())
    }

    async fn store_token(&self, token: &Token) -> Result<()> {
        match self.store.insert_token(token).await? {
            InsertResult::Inserted => Ok(()),
            InsertResult::AlreadyExists => Err(VaultError::Store(StoreError::InvalidData(
                "credential hash collision".into(),
            ))),
        }
    }
}

fn forbidden(path: &str, operation: Operation) -> VaultError {
    VaultError::Forbidden {
        path: path.to_string(),
        operation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultline_core::DEFAULT_POLICY;
    use vaultline_store::MemoryStore;

    async fn bootstrapped(config: VaultConfig) -> (Vault<MemoryStore>, Credential) {
        let vault = Vault::new(MemoryStore::new(), config);
        let root = vault.bootstrap().await.unwrap().unwrap();
        (vault, root)
    }

    #[tokio::test]
    async fn test_bootstrap_issues_root_once() {
        let (vault, root) = bootstrapped(VaultConfig::default()).await;
        assert!(vault.bootstrap().await.unwrap().is_none());

        let info = vault.lookup_self(&root).await.unwrap();
        assert!(info.root);
        assert_eq!(info.expires_at, None);
        assert_eq!(vault.list_policies(&root).await.unwrap(), vec![DEFAULT_POLICY]);
    }

    #[tokio::test]
    async fn test_bootstrap_without_root_token() {
        let vault = Vault::new(
            MemoryStore::new(),
            VaultConfig {
                issue_root_token_on_bootstrap: false,
                ..VaultConfig::default()
            },
        );
        assert!(vault.bootstrap().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_child_token_cannot_escalate() {
        let (vault, root) = bootstrapped(VaultConfig::default()).await;
        vault
            .create_policy(&root, "issuer", r#"{"path": {"auth/token/create": {"capabilities": ["create"]}}}"#)
            .await
            .unwrap();
        vault.create_policy(&root, "admin", r#"{"path": {"*": {"capabilities": ["sudo"]}}}"#).await.unwrap();

        let issuer = vault
            .create_token(&root, TokenRequest { policies: vec!["issuer".into()], ..Default::default() })
            .await
            .unwrap()
            .credential;

        let err = vault
            .create_token(&issuer, TokenRequest { policies: vec!["admin".into()], ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Forbidden { .. }));

        let err = vault
            .create_token(&issuer, TokenRequest { policies: vec!["root".into()], ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Forbidden { .. }));

        // Empty request inherits the caller's policies.
        let child = vault.create_token(&issuer, TokenRequest::default()).await.unwrap();
        assert_eq!(child.info.policies, vec!["default", "issuer"]);
        assert!(!child.info.root);
    }

    #[tokio::test]
    async fn test_token_ttl_capped() {
        let config = VaultConfig {
            max_token_ttl_ms: Some(60_000),
            ..VaultConfig::default()
        };
        let (vault, root) = bootstrapped(config).await;

        let issued = vault
            .create_token(&root, TokenRequest { ttl_ms: Some(10 * 60_000), ..Default::default() })
            .await
            .unwrap();
        let info = issued.info;
        assert!(info.expires_at.unwrap() - info.created_at <= 60_000);

        let err = vault
            .create_token(&root, TokenRequest { ttl_ms: Some(0), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Validation(_)));
    }

    #[tokio::test]
    async fn test_no_default_policy_config() {
        let config = VaultConfig {
            attach_default_policy: false,
            ..VaultConfig::default()
        };
        let (vault, root) = bootstrapped(config).await;

        let child = vault.create_token(&root, TokenRequest::default()).await.unwrap();
        assert!(child.info.policies.is_empty());
        // Without `default` the token cannot even look itself up.
        assert!(matches!(
            vault.lookup_self(&child.credential).await,
            Err(VaultError::Forbidden { .. })
        ));
    }

    #[tokio::test]
    async fn test_revoke_token() {
        let (vault, root) = bootstrapped(VaultConfig::default()).await;
        let child = vault.create_token(&root, TokenRequest::default()).await.unwrap();

        vault.lookup_self(&child.credential).await.unwrap();
        vault.revoke_token(&root, &child.credential).await.unwrap();
        assert!(matches!(
            vault.lookup_self(&child.credential).await,
            Err(VaultError::Unauthorized)
        ));

        assert!(matches!(
            vault.revoke_token(&root, &Credential::generate()).await,
            Err(VaultError::TokenNotFound)
        ));
    }

    #[tokio::test]
    async fn test_authorize_request_context() {
        let (vault, root) = bootstrapped(VaultConfig::default()).await;
        let child = vault.create_token(&root, TokenRequest::default()).await.unwrap();

        let ok = RequestContext::new(Some(child.credential.clone()), "auth/token/lookup-self", Operation::Read);
        assert!(vault.authorize(&ok).await.is_ok());

        let denied = RequestContext::new(Some(child.credential), "sys/policy", Operation::List);
        assert_eq!(
            vault.authorize(&denied).await.unwrap_err().status_code(),
            403
        );

        let anonymous = RequestContext::new(None, "sys/policy", Operation::List);
        assert_eq!(
            vault.authorize(&anonymous).await.unwrap_err().status_code(),
            401
        );
    }
}
