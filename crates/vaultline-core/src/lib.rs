//! # Vaultline Core
//!
//! Pure records for Vaultline: capabilities, policies, tokens, and transit
//! keys.
//!
//! This crate contains no I/O, no storage, no cryptographic transforms. It
//! defines the shapes the storage collaborator persists and the rest of the
//! workspace reasons about.
//!
//! ## Key Types
//!
//! - [`Capability`] / [`CapabilitySet`] - Closed set of operation classes on a path
//! - [`Policy`] / [`PathRule`] / [`PathPattern`] - Named path-to-capability rules
//! - [`Token`] / [`TokenHash`] / [`Credential`] - Credentials, stored hashed
//! - [`TransitKey`] / [`KeyVersion`] / [`KeyMaterial`] - Versioned symmetric keys

pub mod capability;
pub mod clock;
pub mod error;
pub mod policy;
pub mod token;
pub mod transit;

pub use capability::{Capability, CapabilitySet};
pub use clock::now_millis;
pub use error::{CoreError, Result};
pub use policy::{validate_name, PathPattern, PathRule, Policy, DEFAULT_POLICY, ROOT_POLICY};
pub use token::{Credential, Token, TokenHash};
pub use transit::{KeyMaterial, KeyVersion, TransitKey, TransitKeyInfo};
