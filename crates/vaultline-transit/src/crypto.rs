//! ChaCha20-Poly1305 authenticated encryption.
//!
//! 256-bit keys, 96-bit nonces and a 128-bit tag appended to the ciphertext.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use vaultline_core::KeyMaterial;

use crate::error::{Result, TransitError};

/// Nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// A symmetric key bound to one transit key version.
pub struct EncryptionKey<'a>(&'a KeyMaterial);

impl<'a> EncryptionKey<'a> {
    pub fn new(material: &'a KeyMaterial) -> Self {
        Self(material)
    }

    /// Encrypt, returning `ciphertext || tag`.
    pub fn encrypt(&self, plaintext: &[u8], nonce: &EncryptionNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(self.0.as_bytes())
            .map_err(|_| TransitError::EncryptionFailed)?;

        cipher
            .encrypt(Nonce::from_slice(&nonce.0), plaintext)
            .map_err(|_| TransitError::EncryptionFailed)
    }

    /// Verify the tag and decrypt. No plaintext is returned on failure.
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &EncryptionNonce) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(self.0.as_bytes())
            .map_err(|_| TransitError::DecryptionFailed)?;

        cipher
            .decrypt(Nonce::from_slice(&nonce.0), ciphertext)
            .map_err(|_| TransitError::DecryptionFailed)
    }
}

/// A 96-bit nonce for ChaCha20-Poly1305.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncryptionNonce(pub [u8; NONCE_LEN]);

impl EncryptionNonce {
    /// Generate a fresh random nonce. Called once per encryption.
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub const fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}
