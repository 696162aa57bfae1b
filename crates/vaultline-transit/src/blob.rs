//! The ciphertext wire format: `v<version>:<base64(nonce || ciphertext || tag)>`.
//!
//! The version is decimal, at least 1, with no leading zeros. The payload
//! uses the standard padded base64 alphabet.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::crypto::{EncryptionNonce, NONCE_LEN, TAG_LEN};
use crate::error::TransitError;

/// A parsed ciphertext blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiphertextBlob {
    /// Key version used to encrypt.
    pub version: u32,
    pub nonce: EncryptionNonce,
    /// Ciphertext with the tag appended.
    pub ciphertext: Vec<u8>,
}

impl CiphertextBlob {
    pub fn new(version: u32, nonce: EncryptionNonce, ciphertext: Vec<u8>) -> Self {
        Self {
            version,
            nonce,
            ciphertext,
        }
    }

    /// The base64-decoded payload: `nonce || ciphertext || tag`.
    pub fn payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(NONCE_LEN + self.ciphertext.len());
        out.extend_from_slice(self.nonce.as_bytes());
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Build from a version and a raw payload.
    pub fn from_payload(version: u32, payload: &[u8]) -> Result<Self, TransitError> {
        if payload.len() < NONCE_LEN + TAG_LEN {
            return Err(TransitError::DecryptionFailed);
        }
        let (nonce, ciphertext) = payload.split_at(NONCE_LEN);
        let mut bytes = [0u8; NONCE_LEN];
        bytes.copy_from_slice(nonce);

        Ok(Self::new(
            version,
            EncryptionNonce::from_bytes(bytes),
            ciphertext.to_vec(),
        ))
    }
}

impl fmt::Display for CiphertextBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}:{}", self.version, STANDARD.encode(self.payload()))
    }
}

impl FromStr for CiphertextBlob {
    type Err = TransitError;

    /// Every malformation maps to `DecryptionFailed`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (version, payload) = s
            .strip_prefix('v')
            .and_then(|rest| rest.split_once(':'))
            .ok_or(TransitError::DecryptionFailed)?;

        let version = parse_version(version).ok_or(TransitError::DecryptionFailed)?;
        let payload = STANDARD
            .decode(payload)
            .map_err(|_| TransitError::DecryptionFailed)?;

        Self::from_payload(version, &payload)
    }
}

fn parse_version(raw: &str) -> Option<u32> {
    if raw.is_empty() || raw.starts_with('0') || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(version: u32) -> CiphertextBlob {
        CiphertextBlob::new(version, EncryptionNonce::from_bytes([7; NONCE_LEN]), vec![9; 20])
    }

    #[test]
    fn test_display_format() {
        let text = blob(12).to_string();
        assert!(text.starts_with("v12:"));
        assert_eq!(text.parse::<CiphertextBlob>().unwrap(), blob(12));
    }

    #[test]
    fn test_rejects_malformed() {
        let good = blob(1).to_string();
        let payload = good.trim_start_matches("v1:");

        let cases = vec![
            String::new(),
            "v1".to_string(),
            format!("1:{payload}"),
            format!("v:{payload}"),
            format!("v0:{payload}"),
            format!("v01:{payload}"),
            format!("v+1:{payload}"),
            format!("v-1:{payload}"),
            format!("v4294967296:{payload}"),
            format!("V1:{payload}"),
            "v1:!!!!".to_string(),
            "v1:".to_string(),
            // Shorter than nonce + tag.
            format!("v1:{}", STANDARD.encode([0u8; NONCE_LEN + TAG_LEN - 1])),
            // Unpadded base64.
            format!("v1:{}", payload.trim_end_matches('=')),
        ];

        for case in cases {
            assert!(
                matches!(case.parse::<CiphertextBlob>(), Err(TransitError::DecryptionFailed)),
                "{case:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_minimum_payload_accepted() {
        let text = format!("v1:{}", STANDARD.encode([0u8; NONCE_LEN + TAG_LEN]));
        let parsed: CiphertextBlob = text.parse().unwrap();
        assert_eq!(parsed.ciphertext.len(), TAG_LEN);
    }
}
