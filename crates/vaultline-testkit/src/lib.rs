//! # Vaultline Testkit
//!
//! Testing utilities for Vaultline.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: A bootstrapped in-memory [`TestVault`] and a [`PolicyBuilder`]
//! - **Generators**: Proptest strategies for paths, policies and plaintexts
//!
//! ## Test Fixtures
//!
//! ```rust
//! use vaultline_testkit::fixtures::{reader_policy, TestVault};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let t = TestVault::new().await;
//! t.policy(&reader_policy()).await;
//! let reader = t.token(&["reader"]).await;
//!
//! let caps = t.vault.capabilities_self(&reader, "secret/foo").await.unwrap();
//! assert_eq!(caps.len(), 2);
//! # });
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use vaultline_policy::CapabilityResolver;
//! use vaultline_testkit::generators::{path, policy};
//!
//! proptest! {
//!     #[test]
//!     fn never_grants_deny(a in policy("a"), b in policy("b"), p in path()) {
//!         prop_assert!(!CapabilityResolver::resolve([&a, &b], &p).is_deny());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{reader_policy, transit_user_policy, PolicyBuilder, TestVault};
pub use generators::{capability_set, path, path_pattern, plaintext, policy};
