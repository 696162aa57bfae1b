//! Capability resolution across every policy attached to a credential.

use vaultline_core::{Capability, CapabilitySet, Policy};

use crate::engine::match_path;

/// Merges the capabilities granted by a set of policies for one path.
pub struct CapabilityResolver;

impl CapabilityResolver {
    /// Effective capabilities for `path`.
    ///
    /// Unions the matched rule of every policy. If any matched rule carries
    /// `deny`, the result is empty regardless of grants from other policies.
    pub fn resolve<'a, I>(policies: I, path: &str) -> CapabilitySet
    where
        I: IntoIterator<Item = &'a Policy>,
    {
        let mut granted = CapabilitySet::EMPTY;

        for policy in policies {
            let Some(caps) = match_path(policy, path) else {
                continue;
            };
            if caps.is_deny() {
                tracing::debug!(policy = %policy.name, path, "explicit deny");
                return CapabilitySet::EMPTY;
            }
            granted = granted.union(caps);
        }

        granted
    }

    /// Whether `set` grants `required`. Asking for `deny` is never authorized.
    pub fn authorize(set: CapabilitySet, required: Capability) -> bool {
        required != Capability::Deny && !set.is_deny() && set.contains(required)
    }
}
