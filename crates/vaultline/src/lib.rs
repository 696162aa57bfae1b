//! # Vaultline
//!
//! A secrets-management core: token authentication, path-based policies and
//! transit encryption behind one API.
//!
//! ## Overview
//!
//! - **Tokens**: Opaque bearer credentials, stored only as a keyed hash
//! - **Policies**: Named path rules granting capabilities; `deny` wins
//! - **Transit**: Named, versioned keys that encrypt without ever leaving the vault
//!
//! Every [`Vault`] operation authenticates its credential, then requires one
//! capability on one path, for example `update` on `transit/encrypt/<key>`.
//! Root tokens bypass policy evaluation.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vaultline::{Vault, VaultConfig};
//! use vaultline::store::SqliteStore;
//!
//! async fn example() {
//!     let store = SqliteStore::open("vaultline.db").unwrap();
//!     let vault = Vault::new(store, VaultConfig::from_env());
//!
//!     // Only the first bootstrap returns a root credential.
//!     let root = vault.bootstrap().await.unwrap().expect("fresh vault");
//!
//!     vault.create_key(&root, "payments").await.unwrap();
//!     let blob = vault.encrypt(&root, "payments", b"4111-1111").await.unwrap();
//!     let plaintext = vault.decrypt(&root, "payments", &blob).await.unwrap();
//!     assert_eq!(plaintext, b"4111-1111");
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `vaultline::core` - Records (capabilities, policies, tokens, keys)
//! - `vaultline::store` - Storage abstraction, SQLite and in-memory stores
//! - `vaultline::policy` - Policy documents, matching and resolution
//! - `vaultline::transit` - Key management and encryption

pub mod auth;
pub mod config;
pub mod error;
pub mod vault;

pub use vaultline_core as core;
pub use vaultline_policy as policy;
pub use vaultline_store as store;
pub use vaultline_transit as transit;

pub use auth::{AuthContext, Operation, RequestContext, Resolved, TokenAuthenticator};
pub use config::VaultConfig;
pub use error::{ErrorKind, Result, VaultError};
pub use vault::{IssuedToken, KeyConfig, TokenInfo, TokenRequest, Vault};

pub use vaultline_core::{Capability, CapabilitySet, Credential};
