//! Policy documents.
//!
//! Documents use the JSON form of path policies:
//!
//! ```json
//! {
//!   "path": {
//!     "secret/*":   { "capabilities": ["read", "list"] },
//!     "secret/admin": { "capabilities": ["deny"] }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use vaultline_core::{
    Capability, CapabilitySet, PathPattern, PathRule, Policy, DEFAULT_POLICY,
};

use crate::error::{PolicyError, Result};

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyDocument {
    #[serde(default)]
    path: BTreeMap<String, PathStanza>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct PathStanza {
    capabilities: Vec<String>,
}

/// Parse and validate a policy document.
pub fn parse_policy(name: &str, document: &str) -> Result<Policy> {
    let doc: PolicyDocument = serde_json::from_str(document)
        .map_err(|e| PolicyError::InvalidDocument(e.to_string()))?;

    let mut seen = HashSet::new();
    let mut rules = Vec::with_capacity(doc.path.len());

    for (raw, stanza) in doc.path {
        let pattern = PathPattern::parse(&raw)?;
        if !seen.insert(pattern.clone()) {
            return Err(PolicyError::InvalidDocument(format!(
                "duplicate path pattern: {pattern}"
            )));
        }
        if stanza.capabilities.is_empty() {
            return Err(PolicyError::InvalidDocument(format!(
                "no capabilities for path: {pattern}"
            )));
        }
        let capabilities = CapabilitySet::parse(&stanza.capabilities)?;
        rules.push(PathRule::new(pattern, capabilities));
    }

    Ok(Policy::new(name, rules)?)
}

/// Render a policy back into its document form.
pub fn render_policy(policy: &Policy) -> String {
    let doc = PolicyDocument {
        path: policy
            .rules
            .iter()
            .map(|rule| {
                (
                    rule.pattern.to_string(),
                    PathStanza {
                        capabilities: rule
                            .capabilities
                            .iter()
                            .map(|c| c.as_str().to_string())
                            .collect(),
                    },
                )
            })
            .collect(),
    };
    // A map of strings to string lists always serializes.
    serde_json::to_string_pretty(&doc).unwrap_or_default()
}

/// The baseline policy every non-root token carries: manage itself, nothing else.
pub fn default_policy() -> Policy {
    let rule = |path: &str, caps: CapabilitySet| {
        PathRule::new(PathPattern::Exact(path.to_string()), caps)
    };
    Policy {
        name: DEFAULT_POLICY.to_string(),
        rules: vec![
            rule("auth/token/lookup-self", CapabilitySet::from([Capability::Read])),
            rule("auth/token/revoke-self", CapabilitySet::from([Capability::Update])),
            rule("sys/capabilities-self", CapabilitySet::from([Capability::Update])),
        ],
    }
}
