//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use vaultline::{Credential, TokenRequest, Vault, VaultConfig};
use vaultline_core::{Capability, CapabilitySet, PathPattern, PathRule, Policy};
use vaultline_policy::render_policy;
use vaultline_store::MemoryStore;

/// A bootstrapped in-memory vault and its root credential.
pub struct TestVault {
    pub vault: Vault<MemoryStore>,
    pub root: Credential,
}

impl TestVault {
    /// A fresh vault with the default configuration.
    pub async fn new() -> Self {
        Self::with_config(VaultConfig::default()).await
    }

    pub async fn with_config(config: VaultConfig) -> Self {
        let vault = Vault::new(MemoryStore::new(), config);
        let root = vault
            .bootstrap()
            .await
            .expect("bootstrap")
            .expect("fresh store issues a root token");
        Self { vault, root }
    }

    /// Create a policy as root.
    pub async fn policy(&self, policy: &PolicyBuilder) -> Policy {
        self.vault
            .create_policy(&self.root, &policy.name, &policy.document())
            .await
            .expect("create policy")
    }

    /// Issue a token carrying `policies` (plus `default`).
    pub async fn token(&self, policies: &[&str]) -> Credential {
        self.vault
            .create_token(
                &self.root,
                TokenRequest {
                    policies: policies.iter().map(|p| p.to_string()).collect(),
                    ..TokenRequest::default()
                },
            )
            .await
            .expect("create token")
            .credential
    }

    /// Create a transit key as root.
    pub async fn key(&self, name: &str) {
        self.vault
            .create_key(&self.root, name)
            .await
            .expect("create key");
    }
}

/// Builds policies rule by rule.
///
/// ```rust
/// use vaultline_core::Capability;
/// use vaultline_testkit::fixtures::PolicyBuilder;
///
/// let policy = PolicyBuilder::new("reader")
///     .allow("secret/*", [Capability::Read, Capability::List])
///     .deny("secret/admin")
///     .build();
/// assert_eq!(policy.rules.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct PolicyBuilder {
    name: String,
    rules: Vec<PathRule>,
}

impl PolicyBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rules: Vec::new(),
        }
    }

    pub fn allow<const N: usize>(mut self, pattern: &str, caps: [Capability; N]) -> Self {
        self.rules.push(rule(pattern, CapabilitySet::from(caps)));
        self
    }

    pub fn deny(mut self, pattern: &str) -> Self {
        self.rules
            .push(rule(pattern, CapabilitySet::from([Capability::Deny])));
        self
    }

    pub fn build(&self) -> Policy {
        Policy::new(self.name.clone(), self.rules.clone()).expect("valid policy name")
    }

    /// The JSON document form.
    pub fn document(&self) -> String {
        render_policy(&self.build())
    }
}

fn rule(pattern: &str, capabilities: CapabilitySet) -> PathRule {
    PathRule::new(
        PathPattern::parse(pattern).expect("valid pattern"),
        capabilities,
    )
}

/// The `reader` policy: read and list everything under `secret/`.
pub fn reader_policy() -> PolicyBuilder {
    PolicyBuilder::new("reader").allow("secret/*", [Capability::Read, Capability::List])
}

/// Full use of one transit key, nothing else.
pub fn transit_user_policy(key: &str) -> PolicyBuilder {
    PolicyBuilder::new(&format!("transit-{key}"))
        .allow(&format!("transit/encrypt/{key}"), [Capability::Update])
        .allow(&format!("transit/decrypt/{key}"), [Capability::Update])
        .allow(&format!("transit/keys/{key}"), [Capability::Read])
}
