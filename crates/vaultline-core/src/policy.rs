//! Policy records.
//!
//! A policy is a named, ordered list of rules. Each rule binds a
//! [`PathPattern`] to a [`CapabilitySet`]. Matching lives in
//! `vaultline-policy`; this module only defines the shapes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::capability::CapabilitySet;
use crate::error::{CoreError, Result};

/// Name of the implicit baseline policy attached to every non-root token.
pub const DEFAULT_POLICY: &str = "default";

/// Reserved name. Root access is a token flag, never a stored policy.
pub const ROOT_POLICY: &str = "root";

/// A path pattern: an exact path, or a prefix written with a trailing `*`.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PathPattern {
    /// Matches only this exact path.
    Exact(String),
    /// Matches any path starting with this prefix (the `*` is stripped).
    Prefix(String),
}

impl PathPattern {
    /// Parse a pattern. A `*` may only appear as the final character.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CoreError::InvalidPathPattern("empty pattern".into()));
        }

        match raw.strip_suffix('*') {
            Some(prefix) if prefix.contains('*') => Err(CoreError::InvalidPathPattern(format!(
                "wildcard only allowed at the end: {raw}"
            ))),
            Some(prefix) => Ok(PathPattern::Prefix(prefix.to_string())),
            None if raw.contains('*') => Err(CoreError::InvalidPathPattern(format!(
                "wildcard only allowed at the end: {raw}"
            ))),
            None => Ok(PathPattern::Exact(raw.to_string())),
        }
    }

    /// Whether this pattern matches the given path.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Exact(p) => p == path,
            PathPattern::Prefix(p) => path.starts_with(p.as_str()),
        }
    }

    pub fn is_exact(&self) -> bool {
        matches!(self, PathPattern::Exact(_))
    }

    /// Length of the literal part, used for longest-prefix precedence.
    pub fn literal_len(&self) -> usize {
        match self {
            PathPattern::Exact(p) | PathPattern::Prefix(p) => p.len(),
        }
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathPattern::Exact(p) => f.write_str(p),
            PathPattern::Prefix(p) => write!(f, "{p}*"),
        }
    }
}

impl fmt::Debug for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathPattern({self})")
    }
}

impl From<PathPattern> for String {
    fn from(p: PathPattern) -> Self {
        p.to_string()
    }
}

impl TryFrom<String> for PathPattern {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self> {
        PathPattern::parse(&s)
    }
}

/// A single rule: pattern to capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRule {
    pub pattern: PathPattern,
    pub capabilities: CapabilitySet,
}

impl PathRule {
    pub fn new(pattern: PathPattern, capabilities: CapabilitySet) -> Self {
        Self {
            pattern,
            capabilities,
        }
    }
}

/// A named collection of rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub name: String,
    pub rules: Vec<PathRule>,
}

impl Policy {
    /// Create a policy after validating its name.
    pub fn new(name: impl Into<String>, rules: Vec<PathRule>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self { name, rules })
    }
}

/// Validate a policy or key name: non-empty, ASCII alphanumerics plus `-`, `_`, `.`.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CoreError::InvalidName("name must not be empty".into()));
    }
    if name.len() > 128 {
        return Err(CoreError::InvalidName(format!("name too long: {}", name.len())));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(CoreError::InvalidName(format!(
            "name contains invalid characters: {name}"
        )));
    }
    Ok(())
}
