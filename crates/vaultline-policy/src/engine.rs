//! The policy engine: rule matching and store-backed policy management.

use std::sync::Arc;

use vaultline_core::{CapabilitySet, Policy, DEFAULT_POLICY, ROOT_POLICY};
use vaultline_store::{InsertResult, Store, StoreExt};

use crate::document::{default_policy, parse_policy};
use crate::error::{PolicyError, Result};

/// Match a path against one policy.
///
/// Returns the capabilities of the single most specific matching rule, or
/// `None` when no rule matches. Specificity ranks exact patterns above
/// prefixes, then longer prefixes above shorter ones. Equally specific rules
/// (only possible in hand-built policies) are unioned so the result does not
/// depend on rule order.
pub fn match_path(policy: &Policy, path: &str) -> Option<CapabilitySet> {
    let mut best: Option<((bool, usize), CapabilitySet)> = None;

    for rule in policy.rules.iter().filter(|r| r.pattern.matches(path)) {
        let rank = (rule.pattern.is_exact(), rule.pattern.literal_len());
        best = match best {
            Some((current, caps)) if current > rank => Some((current, caps)),
            Some((current, caps)) if current == rank => {
                Some((current, caps.union(rule.capabilities)))
            }
            _ => Some((rank, rule.capabilities)),
        };
    }

    best.map(|(_, caps)| caps)
}

/// Store-backed policy operations.
///
/// Enforces the reserved names: `root` can never be stored, and `default`
/// can be edited but not deleted.
pub struct PolicyEngine<S: Store> {
    store: Arc<S>,
}

impl<S: Store> Clone for PolicyEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: Store> PolicyEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Load a policy by name.
    pub async fn load(&self, name: &str) -> Result<Policy> {
        self.store
            .get_policy(name)
            .await?
            .ok_or_else(|| PolicyError::NotFound(name.to_string()))
    }

    /// Load every attached policy that exists.
    ///
    /// A missing policy grants nothing; it is skipped rather than failing
    /// the request.
    pub async fn load_attached(&self, names: &[String]) -> Result<Vec<Policy>> {
        let found = self.store.get_policies(names).await?;
        Ok(found
            .into_iter()
            .filter_map(|(name, policy)| {
                if policy.is_none() {
                    tracing::warn!(policy = %name, "attached policy does not exist");
                }
                policy
            })
            .collect())
    }

    /// Create a policy from a document.
    pub async fn create(&self, name: &str, document: &str) -> Result<Policy> {
        reject_root(name)?;
        let policy = parse_policy(name, document)?;

        match self.store.insert_policy(&policy).await? {
            InsertResult::Inserted => {
                tracing::info!(policy = %name, rules = policy.rules.len(), "created policy");
                Ok(policy)
            }
            InsertResult::AlreadyExists => Err(PolicyError::AlreadyExists(name.to_string())),
        }
    }

    /// Replace an existing policy's rules.
    pub async fn update(&self, name: &str, document: &str) -> Result<Policy> {
        reject_root(name)?;
        let policy = parse_policy(name, document)?;

        if !self.store.update_policy(&policy).await? {
            return Err(PolicyError::NotFound(name.to_string()));
        }
        tracing::info!(policy = %name, rules = policy.rules.len(), "updated policy");
        Ok(policy)
    }

    /// Delete a policy.
    pub async fn delete(&self, name: &str) -> Result<()> {
        if name == ROOT_POLICY || name == DEFAULT_POLICY {
            return Err(PolicyError::Reserved(format!("{name} cannot be deleted")));
        }
        if !self.store.delete_policy(name).await? {
            return Err(PolicyError::NotFound(name.to_string()));
        }
        tracing::info!(policy = %name, "deleted policy");
        Ok(())
    }

    /// List policy names.
    pub async fn list(&self) -> Result<Vec<String>> {
        Ok(self.store.list_policies().await?)
    }

    /// Install the `default` policy if it is absent. Returns whether it was installed.
    pub async fn install_default(&self) -> Result<bool> {
        let installed = self.store.insert_policy(&default_policy()).await? == InsertResult::Inserted;
        if installed {
            tracing::info!("installed default policy");
        }
        Ok(installed)
    }
}

fn reject_root(name: &str) -> Result<()> {
    if name == ROOT_POLICY {
        return Err(PolicyError::Reserved("root policy cannot be modified".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultline_core::{Capability, PathPattern, PathRule};
    use vaultline_store::MemoryStore;

    fn policy(rules: &[(&str, &[Capability])]) -> Policy {
        Policy {
            name: "p".into(),
            rules: rules
                .iter()
                .map(|(pat, caps)| {
                    PathRule::new(
                        PathPattern::parse(pat).unwrap(),
                        caps.iter().copied().collect(),
                    )
                })
                .collect(),
        }
    }

    #[test]
    fn test_no_match_is_none() {
        let p = policy(&[("secret/*", &[Capability::Read])]);
        assert_eq!(match_path(&p, "transit/keys/a"), None);
    }

    #[test]
    fn test_exact_beats_prefix() {
        let p = policy(&[
            ("secret/*", &[Capability::Read, Capability::List]),
            ("secret/foo", &[Capability::Update]),
        ]);
        assert_eq!(
            match_path(&p, "secret/foo"),
            Some(CapabilitySet::from([Capability::Update]))
        );
        assert_eq!(
            match_path(&p, "secret/bar"),
            Some(CapabilitySet::from([Capability::Read, Capability::List]))
        );
    }

    #[test]
    fn test_longest_prefix_wins() {
        let p = policy(&[
            ("*", &[Capability::List]),
            ("secret/*", &[Capability::Read]),
            ("secret/team/*", &[Capability::Create]),
        ]);
        assert_eq!(
            match_path(&p, "secret/team/db"),
            Some(CapabilitySet::from([Capability::Create]))
        );
        assert_eq!(
            match_path(&p, "secret/other"),
            Some(CapabilitySet::from([Capability::Read]))
        );
        assert_eq!(
            match_path(&p, "sys/policy"),
            Some(CapabilitySet::from([Capability::List]))
        );
    }

    #[test]
    fn test_more_specific_rule_can_narrow() {
        // A deny on a narrower prefix shadows the broad grant within the policy.
        let p = policy(&[
            ("secret/*", &[Capability::Read]),
            ("secret/admin/*", &[Capability::Deny]),
        ]);
        assert!(match_path(&p, "secret/admin/x").unwrap().is_deny());
        assert!(!match_path(&p, "secret/x").unwrap().is_deny());
    }

    #[tokio::test]
    async fn test_reserved_names() {
        let engine = PolicyEngine::new(Arc::new(MemoryStore::new()));
        engine.install_default().await.unwrap();

        assert!(matches!(
            engine.create("root", "{}").await,
            Err(PolicyError::Reserved(_))
        ));
        assert!(matches!(
            engine.delete("default").await,
            Err(PolicyError::Reserved(_))
        ));
        assert!(matches!(
            engine.delete("root").await,
            Err(PolicyError::Reserved(_))
        ));
    }

    #[tokio::test]
    async fn test_create_update_delete() {
        let engine = PolicyEngine::new(Arc::new(MemoryStore::new()));
        let doc = r#"{"path": {"secret/*": {"capabilities": ["read"]}}}"#;

        engine.create("reader", doc).await.unwrap();
        assert!(matches!(
            engine.create("reader", doc).await,
            Err(PolicyError::AlreadyExists(_))
        ));

        let updated = engine
            .update("reader", r#"{"path": {"secret/*": {"capabilities": ["read", "list"]}}}"#)
            .await
            .unwrap();
        assert_eq!(engine.load("reader").await.unwrap(), updated);

        engine.delete("reader").await.unwrap();
        assert!(matches!(engine.load("reader").await, Err(PolicyError::NotFound(_))));
        assert!(matches!(
            engine.update("reader", doc).await,
            Err(PolicyError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_load_attached_skips_missing() {
        let engine = PolicyEngine::new(Arc::new(MemoryStore::new()));
        engine.install_default().await.unwrap();
        assert!(!engine.install_default().await.unwrap());

        let loaded = engine
            .load_attached(&["default".to_string(), "ghost".to_string()])
            .await
            .unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "default");
    }
}
