//! # Vaultline Policy
//!
//! Path-scoped access policies: document parsing, rule matching, and
//! capability resolution across every policy attached to a credential.
//!
//! ## Precedence
//!
//! Within one policy, exactly one rule applies to a path:
//!
//! 1. An exact pattern (`secret/foo`) beats any prefix pattern.
//! 2. Among prefix patterns (`secret/*`, `*`), the longest prefix wins.
//! 3. No matching rule means the empty set (default deny).
//!
//! Across policies the matched sets are unioned, except that a `deny` in any
//! matched rule empties the result for that path.
//!
//! ## Usage
//!
//! ```rust
//! use vaultline_core::Capability;
//! use vaultline_policy::{parse_policy, CapabilityResolver};
//!
//! let reader = parse_policy(
//!     "reader",
//!     r#"{"path": {"secret/*": {"capabilities": ["read", "list"]}}}"#,
//! )
//! .unwrap();
//!
//! let caps = CapabilityResolver::resolve([&reader], "secret/foo");
//! assert!(CapabilityResolver::authorize(caps, Capability::Read));
//! assert!(!CapabilityResolver::authorize(caps, Capability::Delete));
//! ```

pub mod document;
pub mod engine;
pub mod error;
pub mod resolver;

pub use document::{default_policy, parse_policy, render_policy};
pub use engine::{match_path, PolicyEngine};
pub use error::{PolicyError, Result};
pub use resolver::CapabilityResolver;
