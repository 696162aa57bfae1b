//! # Vaultline Store
//!
//! Storage abstraction for Vaultline. Provides a trait-based interface for
//! policy, token and transit-key persistence with SQLite and in-memory
//! implementations.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`InsertResult`] - Result of inserting a record
//! - [`AppendResult`] - Result of the compare-and-append on key versions
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vaultline_store::{SqliteStore, Store};
//!
//! async fn example() {
//!     let store = SqliteStore::open("vaultline.db").unwrap();
//!     let names = store.list_policies().await.unwrap();
//!     println!("{names:?}");
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Absence is not an error**: lookups return `Ok(None)`; callers decide
//!   whether that means NotFound.
//! - **Compare-and-append**: [`Store::append_key_version`] only accepts the
//!   version directly after the current latest, so two writers racing on the
//!   same key can never both claim a version number.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{AppendResult, InsertResult, Store, StoreExt};
