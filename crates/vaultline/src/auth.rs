//! Token authentication and request authorization.
//!
//! Authentication is a chain of typestates:
//!
//! ```text
//! credential ──resolve──▶ Resolved ──validate(now)──▶ AuthContext ──authorize──▶ Ok / Forbidden
//!      │                     │
//!      └── Unauthorized ◀────┘  (missing, unknown, revoked, expired)
//! ```
//!
//! The token's root flag and its attached policies are loaded once, at
//! validation, and carried by value in the [`AuthContext`]. Nothing in this
//! module writes to the store.

use std::fmt;
use std::sync::Arc;

use vaultline_core::{Capability, CapabilitySet, Credential, Policy, Token};
use vaultline_policy::{CapabilityResolver, PolicyEngine};
use vaultline_store::Store;

use crate::error::{Result, VaultError};

/// The operation class a request performs on its path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    List,
    Sudo,
}

impl Operation {
    /// The capability a policy must grant for this operation.
    pub const fn capability(self) -> Capability {
        match self {
            Operation::Create => Capability::Create,
            Operation::Read => Capability::Read,
            Operation::Update => Capability::Update,
            Operation::Delete => Capability::Delete,
            Operation::List => Capability::List,
            Operation::Sudo => Capability::Sudo,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.capability().as_str())
    }
}

/// What a transport hands the vault for each request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub credential: Option<Credential>,
    pub path: String,
    pub operation: Operation,
}

impl RequestContext {
    pub fn new(credential: Option<Credential>, path: impl Into<String>, operation: Operation) -> Self {
        Self {
            credential,
            path: path.into(),
            operation,
        }
    }
}

/// Resolves credentials to tokens and tokens to an [`AuthContext`].
pub struct TokenAuthenticator<S: Store> {
    store: Arc<S>,
    policies: PolicyEngine<S>,
}

impl<S: Store> TokenAuthenticator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            policies: PolicyEngine::new(Arc::clone(&store)),
            store,
        }
    }

    /// Look up the token behind a credential.
    pub async fn resolve(&self, credential: Option<&Credential>) -> Result<Resolved<'_, S>> {
        let Some(credential) = credential.filter(|c| !c.expose().is_empty()) else {
            tracing::warn!("request without credential");
            return Err(VaultError::Unauthorized);
        };

        let hash = credential.hash();
        match self.store.get_token(&hash).await? {
            Some(token) => Ok(Resolved { auth: self, token }),
            None => {
                tracing::warn!(accessor = %hash, "unknown credential");
                Err(VaultError::Unauthorized)
            }
        }
    }

    /// Resolve and validate in one step.
    pub async fn authenticate(&self, credential: Option<&Credential>, now: i64) -> Result<AuthContext> {
        self.resolve(credential).await?.validate(now).await
    }
}

/// A credential that maps to a stored token, not yet checked for liveness.
pub struct Resolved<'a, S: Store> {
    auth: &'a TokenAuthenticator<S>,
    token: Token,
}

impl<'a, S: Store> Resolved<'a, S> {
    pub fn token(&self) -> &Token {
        &self.token
    }

    /// Reject revoked or expired tokens and load the attached policies.
    pub async fn validate(self, now: i64) -> Result<AuthContext> {
        let token = self.token;

        if token.revoked {
            tracing::warn!(accessor = %token.hash, "revoked token presented");
            return Err(VaultError::Unauthorized);
        }
        if token.is_expired(now) {
            tracing::warn!(accessor = %token.hash, "expired token presented");
            return Err(VaultError::Unauthorized);
        }

        let policies = if token.root {
            Vec::new()
        } else {
            self.auth
                .policies
                .load_attached(&token.effective_policy_names())
                .await?
        };

        tracing::debug!(
            accessor = %token.hash,
            root = token.root,
            policies = policies.len(),
            "token validated"
        );
        Ok(AuthContext { token, policies })
    }
}

/// An authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthContext {
    token: Token,
    policies: Vec<Policy>,
}

impl AuthContext {
    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn is_root(&self) -> bool {
        self.token.root
    }

    /// Policies loaded at validation. Empty for root tokens.
    pub fn policies(&self) -> &[Policy] {
        &self.policies
    }

    /// Effective capabilities on `path`. Root holds every grant.
    pub fn capabilities(&self, path: &str) -> CapabilitySet {
        if self.is_root() {
            return CapabilitySet::all_grants();
        }
        CapabilityResolver::resolve(&self.policies, path)
    }

    /// Require the capability for `operation` on `path`.
    pub fn authorize(&self, path: &str, operation: Operation) -> Result<()> {
        if self.is_root() {
            return Ok(());
        }

        let granted = CapabilityResolver::resolve(&self.policies, path);
        if CapabilityResolver::authorize(granted, operation.capability()) {
            return Ok(());
        }

        tracing::debug!(accessor = %self.token.hash, path, %operation, ?granted, "forbidden");
        Err(VaultError::Forbidden {
            path: path.to_string(),
            operation,
        })
    }
}
