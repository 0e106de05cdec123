//! Secret value encryption gateway.
//!
//! Implements envelope encryption for secret material:
//! - Data key: random per encrypted value
//! - Master key: operator-managed, loaded from env or file at startup
//!
//! Cipher: AES-256-GCM for both payload and key wrapping. The stored form is
//! a single dot-separated string so it fits one column:
//! `v1.<key_id>.<nonce>.<wrapped_key>.<wrap_nonce>.<ciphertext>`
//! with base64url (no padding) segments.
//!
//! Plaintext values must never be logged at any level; errors carry no
//! plaintext or key material.

use std::fs;

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

const KEY_BYTES: usize = 32;
const NONCE_BYTES: usize = 12;
const WRAP_AAD: &[u8] = b"lockbox-secrets-wrap-v1";
const FORMAT_VERSION: &str = "v1";

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("missing secrets master key (set LOCKBOX_MASTER_KEY or LOCKBOX_MASTER_KEY_FILE)")]
    MissingMasterKey,
    #[error("invalid secrets master key encoding")]
    InvalidMasterKey,
    #[error("secret encryption failed")]
    Encrypt,
    #[error("secret decryption failed")]
    Decrypt,
    #[error("unknown master key id: {0}")]
    UnknownMasterKey(String),
}

/// Operator-managed key wrapping key.
///
/// Deliberately does not implement `Debug` so key bytes cannot leak through
/// formatting.
#[derive(Clone)]
pub struct MasterKey {
    id: String,
    key_bytes: [u8; KEY_BYTES],
}

impl MasterKey {
    /// Loads the master key from the environment.
    ///
    /// `LOCKBOX_MASTER_KEY` holds the base64 key directly;
    /// `LOCKBOX_MASTER_KEY_FILE` points at a file containing it. The key id
    /// comes from `LOCKBOX_MASTER_KEY_ID` or is derived from the key bytes.
    pub fn from_env() -> Result<Self, CryptoError> {
        let key_bytes = load_master_key_bytes()?;
        let id = std::env::var("LOCKBOX_MASTER_KEY_ID")
            .ok()
            .unwrap_or_else(|| key_id_for_bytes(&key_bytes));
        Ok(Self { id, key_bytes })
    }

    /// Builds a master key from raw bytes, mainly for tests.
    pub fn from_bytes(id: impl Into<String>, key_bytes: [u8; KEY_BYTES]) -> Self {
        Self {
            id: id.into(),
            key_bytes,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

fn load_master_key_bytes() -> Result<[u8; KEY_BYTES], CryptoError> {
    if let Ok(raw) = std::env::var("LOCKBOX_MASTER_KEY") {
        let bytes = STANDARD
            .decode(raw.trim())
            .map_err(|_| CryptoError::InvalidMasterKey)?;
        return bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidMasterKey);
    }

    if let Ok(path) = std::env::var("LOCKBOX_MASTER_KEY_FILE") {
        let contents = fs::read_to_string(path).map_err(|_| CryptoError::InvalidMasterKey)?;
        let bytes = STANDARD
            .decode(contents.trim())
            .map_err(|_| CryptoError::InvalidMasterKey)?;
        return bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidMasterKey);
    }

    Err(CryptoError::MissingMasterKey)
}

fn key_id_for_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)[..8].to_string()
}

/// Decrypt/encrypt boundary for secret values.
///
/// Built once at startup and shared; holds the master key for the life of
/// the process.
#[derive(Clone)]
pub struct EncryptionGateway {
    master: MasterKey,
}

impl EncryptionGateway {
    pub fn new(master: MasterKey) -> Self {
        Self { master }
    }

    pub fn from_env() -> Result<Self, CryptoError> {
        Ok(Self::new(MasterKey::from_env()?))
    }

    /// Encrypts a plaintext value under a fresh data key.
    ///
    /// `aad` binds the ciphertext to its context (the owning secret id), so a
    /// value copied onto another secret row fails to decrypt.
    pub fn encrypt(&self, plaintext: &str, aad: &[u8]) -> Result<String, CryptoError> {
        let mut data_key = [0u8; KEY_BYTES];
        rand::rng().fill_bytes(&mut data_key);

        let mut nonce_bytes = [0u8; NONCE_BYTES];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(&data_key).map_err(|_| CryptoError::Encrypt)?;
        let ciphertext = cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext.as_bytes(),
                    aad,
                },
            )
            .map_err(|_| CryptoError::Encrypt)?;

        let mut wrap_nonce_bytes = [0u8; NONCE_BYTES];
        rand::rng().fill_bytes(&mut wrap_nonce_bytes);
        let wrap_nonce = Nonce::from_slice(&wrap_nonce_bytes);
        let wrap_cipher =
            Aes256Gcm::new_from_slice(&self.master.key_bytes).map_err(|_| CryptoError::Encrypt)?;
        let wrapped_data_key = wrap_cipher
            .encrypt(
                wrap_nonce,
                Payload {
                    msg: &data_key,
                    aad: WRAP_AAD,
                },
            )
            .map_err(|_| CryptoError::Encrypt)?;

        Ok([
            FORMAT_VERSION,
            &self.master.id,
            &URL_SAFE_NO_PAD.encode(nonce_bytes),
            &URL_SAFE_NO_PAD.encode(&wrapped_data_key),
            &URL_SAFE_NO_PAD.encode(wrap_nonce_bytes),
            &URL_SAFE_NO_PAD.encode(&ciphertext),
        ]
        .join("."))
    }

    /// Decrypts a stored value.
    ///
    /// Malformed input or an AEAD failure is fatal for the calling operation:
    /// it signals corruption or a master key mismatch and is never retried.
    pub fn decrypt(&self, stored: &str, aad: &[u8]) -> Result<String, CryptoError> {
        let parts: Vec<&str> = stored.split('.').collect();
        let [version, key_id, nonce, wrapped_key, wrap_nonce, ciphertext] = parts[..] else {
            return Err(CryptoError::Decrypt);
        };
        if version != FORMAT_VERSION {
            return Err(CryptoError::Decrypt);
        }
        if key_id != self.master.id {
            return Err(CryptoError::UnknownMasterKey(key_id.to_string()));
        }

        let nonce_bytes = decode_segment(nonce)?;
        let wrapped_key_bytes = decode_segment(wrapped_key)?;
        let wrap_nonce_bytes = decode_segment(wrap_nonce)?;
        let ciphertext_bytes = decode_segment(ciphertext)?;
        if nonce_bytes.len() != NONCE_BYTES || wrap_nonce_bytes.len() != NONCE_BYTES {
            return Err(CryptoError::Decrypt);
        }

        let wrap_cipher =
            Aes256Gcm::new_from_slice(&self.master.key_bytes).map_err(|_| CryptoError::Decrypt)?;
        let data_key = wrap_cipher
            .decrypt(
                Nonce::from_slice(&wrap_nonce_bytes),
                Payload {
                    msg: &wrapped_key_bytes,
                    aad: WRAP_AAD,
                },
            )
            .map_err(|_| CryptoError::Decrypt)?;

        let cipher = Aes256Gcm::new_from_slice(&data_key).map_err(|_| CryptoError::Decrypt)?;
        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(&nonce_bytes),
                Payload {
                    msg: &ciphertext_bytes,
                    aad,
                },
            )
            .map_err(|_| CryptoError::Decrypt)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::Decrypt)
    }
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, CryptoError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| CryptoError::Decrypt)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> EncryptionGateway {
        EncryptionGateway::new(MasterKey::from_bytes("test-key", [7u8; KEY_BYTES]))
    }

    #[test]
    fn test_roundtrip() {
        let gw = gateway();
        let stored = gw.encrypt("hunter2", b"sec_1").unwrap();
        assert_ne!(stored, "hunter2");
        assert!(!stored.contains("hunter2"));
        assert_eq!(gw.decrypt(&stored, b"sec_1").unwrap(), "hunter2");
    }

    #[test]
    fn test_fresh_data_key_per_value() {
        let gw = gateway();
        let a = gw.encrypt("same", b"sec_1").unwrap();
        let b = gw.encrypt("same", b"sec_1").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_aad_mismatch_fails() {
        let gw = gateway();
        let stored = gw.encrypt("hunter2", b"sec_1").unwrap();
        assert!(matches!(
            gw.decrypt(&stored, b"sec_2").unwrap_err(),
            CryptoError::Decrypt
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let gw = gateway();
        let stored = gw.encrypt("hunter2", b"sec_1").unwrap();
        let mut parts: Vec<String> = stored.split('.').map(String::from).collect();
        let ct = parts.last().unwrap().clone();
        *parts.last_mut().unwrap() = ct.chars().rev().collect();
        assert!(matches!(
            gw.decrypt(&parts.join("."), b"sec_1").unwrap_err(),
            CryptoError::Decrypt
        ));
    }

    #[test]
    fn test_malformed_input_fails() {
        let gw = gateway();
        for bad in ["", "garbage", "v1.too.few", "v2.a.b.c.d.e"] {
            assert!(matches!(
                gw.decrypt(bad, b"sec_1").unwrap_err(),
                CryptoError::Decrypt
            ));
        }
    }

    #[test]
    fn test_unknown_master_key_id() {
        let gw = gateway();
        let stored = gw.encrypt("hunter2", b"sec_1").unwrap();
        let other = EncryptionGateway::new(MasterKey::from_bytes("other-key", [9u8; KEY_BYTES]));
        assert!(matches!(
            other.decrypt(&stored, b"sec_1").unwrap_err(),
            CryptoError::UnknownMasterKey(id) if id == "test-key"
        ));
    }
}
