//! Proptest generators for property-based testing.

use proptest::prelude::*;

use vaultline_core::{Capability, CapabilitySet, PathPattern, PathRule, Policy};

/// Path segments drawn from a small alphabet so generated patterns and paths
/// overlap often.
const SEGMENTS: [&str; 5] = ["secret", "transit", "team", "db", "a"];

/// Generate a capability, `deny` included.
pub fn capability() -> impl Strategy<Value = Capability> {
    prop::sample::select(Capability::ALL.to_vec())
}

/// Generate a capability set of up to four capabilities.
pub fn capability_set() -> impl Strategy<Value = CapabilitySet> {
    prop::collection::vec(capability(), 0..4).prop_map(|caps| caps.into_iter().collect())
}

/// Generate a capability set with no `deny`.
pub fn grant_set() -> impl Strategy<Value = CapabilitySet> {
    capability_set().prop_map(|set| set.iter().filter(|c| *c != Capability::Deny).collect())
}

/// Generate a slash-separated path of one to four segments.
pub fn path() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(SEGMENTS.to_vec()), 1..=4)
        .prop_map(|segments| segments.join("/"))
}

/// Generate an exact or prefix pattern over the same alphabet.
pub fn path_pattern() -> impl Strategy<Value = PathPattern> {
    (path(), any::<bool>()).prop_map(|(path, prefix)| {
        if prefix {
            PathPattern::Prefix(format!("{path}/"))
        } else {
            PathPattern::Exact(path)
        }
    })
}

/// Generate a policy with distinct patterns.
pub fn policy(name: &'static str) -> impl Strategy<Value = Policy> {
    prop::collection::hash_map(path_pattern(), capability_set(), 0..6).prop_map(move |rules| Policy {
        name: name.to_string(),
        rules: rules
            .into_iter()
            .map(|(pattern, caps)| PathRule::new(pattern, caps))
            .collect(),
    })
}

/// Generate plaintext bytes of up to `max_len` bytes.
pub fn plaintext(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}
