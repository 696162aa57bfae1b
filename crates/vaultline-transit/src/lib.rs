//! # Vaultline Transit
//!
//! Versioned named keys and authenticated encryption as a service.
//!
//! ## Key Types
//!
//! - [`TransitKeyManager`] - Key creation, rotation and version bounds
//! - [`CipherEngine`] - Encrypt, decrypt and rewrap under a named key
//! - [`CiphertextBlob`] - The `v<version>:<base64>` wire format
//!
//! ## Cipher
//!
//! ChaCha20-Poly1305: 256-bit keys, a fresh 96-bit random nonce per
//! encryption and a 128-bit tag. The tag is verified before any plaintext is
//! released.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use vaultline_store::MemoryStore;
//! use vaultline_transit::{CipherEngine, TransitKeyManager};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let keys = Arc::new(TransitKeyManager::new(Arc::new(MemoryStore::new())));
//! keys.create_key("payments").await.unwrap();
//!
//! let engine = CipherEngine::new(keys);
//! let blob = engine.encrypt("payments", b"4111-1111").await.unwrap().to_string();
//! assert!(blob.starts_with("v1:"));
//! assert_eq!(engine.decrypt("payments", &blob).await.unwrap(), b"4111-1111");
//! # });
//! ```

pub mod blob;
pub mod cipher;
pub mod crypto;
pub mod error;
pub mod manager;

pub use blob::CiphertextBlob;
pub use cipher::CipherEngine;
pub use crypto::{EncryptionKey, EncryptionNonce};
pub use error::{Result, TransitError};
pub use manager::TransitKeyManager;
