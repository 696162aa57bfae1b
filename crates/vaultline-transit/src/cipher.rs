//! Encrypt, decrypt and rewrap under named transit keys.

use std::sync::Arc;

use vaultline_core::TransitKey;
use vaultline_store::Store;

use crate::blob::CiphertextBlob;
use crate::crypto::{EncryptionKey, EncryptionNonce};
use crate::error::{Result, TransitError};
use crate::manager::{select_decryption, select_encryption, TransitKeyManager};

/// Stateless encryption front-end over a [`TransitKeyManager`].
pub struct CipherEngine<S: Store> {
    keys: Arc<TransitKeyManager<S>>,
}

impl<S: Store> Clone for CipherEngine<S> {
    fn clone(&self) -> Self {
        Self {
            keys: Arc::clone(&self.keys),
        }
    }
}

impl<S: Store> CipherEngine<S> {
    pub fn new(keys: Arc<TransitKeyManager<S>>) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &Arc<TransitKeyManager<S>> {
        &self.keys
    }

    /// Encrypt under the key's latest version with a fresh nonce.
    pub async fn encrypt(&self, name: &str, plaintext: &[u8]) -> Result<CiphertextBlob> {
        let key = self.keys.load(name).await?;
        seal(&key, plaintext)
    }

    /// Decrypt a blob produced by [`encrypt`](Self::encrypt).
    pub async fn decrypt(&self, name: &str, blob: &str) -> Result<Vec<u8>> {
        let key = self.keys.load(name).await?;
        open(&key, blob).map_err(|e| log_failure(name, e))
    }

    /// Re-encrypt a blob under the latest version. The plaintext never
    /// leaves this call.
    pub async fn rewrap(&self, name: &str, blob: &str) -> Result<CiphertextBlob> {
        let key = self.keys.load(name).await?;
        let plaintext = open(&key, blob).map_err(|e| log_failure(name, e))?;
        let rewrapped = seal(&key, &plaintext)?;
        tracing::debug!(key = %name, version = rewrapped.version, "rewrapped ciphertext");
        Ok(rewrapped)
    }
}

fn seal(key: &TransitKey, plaintext: &[u8]) -> Result<CiphertextBlob> {
    let (material, version) = select_encryption(key)?;
    let nonce = EncryptionNonce::generate();
    let ciphertext = EncryptionKey::new(material).encrypt(plaintext, &nonce)?;
    Ok(CiphertextBlob::new(version, nonce, ciphertext))
}

fn open(key: &TransitKey, blob: &str) -> Result<Vec<u8>> {
    let blob: CiphertextBlob = blob.parse()?;

    // Versions past the latest look like tampering, not a missing version.
    if blob.version > key.latest_version() {
        return Err(TransitError::DecryptionFailed);
    }
    let material = select_decryption(key, blob.version)?;
    EncryptionKey::new(material).decrypt(&blob.ciphertext, &blob.nonce)
}

fn log_failure(name: &str, err: TransitError) -> TransitError {
    tracing::warn!(key = %name, error = %err, "decryption rejected");
    err
}
