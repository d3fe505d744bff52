//! AEAD key wrapping using AES-256-GCM.
//!
//! This module provides:
//! - `LockingKey`: a 256-bit key wrapper that zeroizes on drop
//! - `WrappedKey`: a self-contained sealed box (nonce + ciphertext + tag)
//! - `seal`/`open` for wrapping the recovery phrase under a locking key
//!
//! The locking key itself is never part of the box; it lives in the
//! platform secret store under an access-control policy.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Nonce size for AES-GCM (96 bits = 12 bytes)
const NONCE_SIZE: usize = 12;

/// Locking key size (256 bits)
pub const LOCKING_KEY_SIZE: usize = 32;

/// Entropy size for seeding a new wallet (128 bits)
pub const ENTROPY_SIZE: usize = 16;

/// Errors from sealing or opening a box.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    /// The cipher refused to seal. Not reachable with a fresh nonce and
    /// a well-formed key.
    #[error("encryption failed")]
    SealFailed,

    /// Wrong locking key, or the box was corrupted.
    #[error("authentication failed: wrong key or corrupted box")]
    AuthenticationFailed,
}

/// A 256-bit locking key with automatic zeroization on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct LockingKey {
    key: [u8; LOCKING_KEY_SIZE],
}

impl LockingKey {
    /// Generate a fresh key from the CSPRNG.
    pub fn generate() -> Self {
        let mut key = [0u8; LOCKING_KEY_SIZE];
        rand::rng().fill_bytes(&mut key);
        Self { key }
    }

    /// Rebuild a key from raw bytes read back from the secret store.
    ///
    /// Returns `None` if the slice is not exactly 32 bytes.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() != LOCKING_KEY_SIZE {
            return None;
        }
        let mut key = [0u8; LOCKING_KEY_SIZE];
        key.copy_from_slice(slice);
        Some(Self { key })
    }

    /// Get the key as a byte slice for cryptographic operations.
    pub fn as_bytes(&self) -> &[u8; LOCKING_KEY_SIZE] {
        &self.key
    }

    /// Copy the key bytes out for handoff to the secret store.
    pub fn to_vec(&self) -> Vec<u8> {
        self.key.to_vec()
    }
}

impl std::fmt::Debug for LockingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log the actual key material
        f.debug_struct("LockingKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// An AEAD sealed box: nonce plus ciphertext with the auth tag appended.
///
/// Opaque and self-contained; serialized with hex-encoded fields inside
/// the security descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    #[serde(with = "hex")]
    nonce: Vec<u8>,
    #[serde(with = "hex")]
    ciphertext: Vec<u8>,
}

/// Seal plaintext under a locking key with a fresh random nonce.
pub fn seal(plaintext: &[u8], key: &LockingKey) -> Result<WrappedKey, CipherError> {
    let cipher = Aes256Gcm::new_from_slice(key.as_bytes()).map_err(|_| CipherError::SealFailed)?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CipherError::SealFailed)?;

    Ok(WrappedKey {
        nonce: nonce_bytes.to_vec(),
        ciphertext,
    })
}

/// Open a sealed box.
///
/// Fails with `AuthenticationFailed` if the key is wrong or the box was
/// tampered with.
pub fn open(wrapped: &WrappedKey, key: &LockingKey) -> Result<Vec<u8>, CipherError> {
    if wrapped.nonce.len() != NONCE_SIZE {
        return Err(CipherError::AuthenticationFailed);
    }

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|_| CipherError::AuthenticationFailed)?;
    let nonce = Nonce::from_slice(&wrapped.nonce);

    cipher
        .decrypt(nonce, wrapped.ciphertext.as_ref())
        .map_err(|_| CipherError::AuthenticationFailed)
}

/// Generate 128 bits of entropy for seeding a new wallet.
pub fn generate_entropy() -> [u8; ENTROPY_SIZE] {
    let mut entropy = [0u8; ENTROPY_SIZE];
    rand::rng().fill_bytes(&mut entropy);
    entropy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_open_round_trip() {
        let key = LockingKey::generate();
        let plaintext = b"abandon ability able about above absent";

        let wrapped = seal(plaintext, &key).unwrap();
        let opened = open(&wrapped, &key).unwrap();

        assert_eq!(opened, plaintext, "round trip should recover plaintext");
    }

    #[test]
    fn test_open_with_wrong_key_fails() {
        let key1 = LockingKey::generate();
        let key2 = LockingKey::generate();

        let wrapped = seal(b"secret", &key1).unwrap();
        let result = open(&wrapped, &key2);

        assert_eq!(result, Err(CipherError::AuthenticationFailed));
    }

    #[test]
    fn test_open_tampered_box_fails() {
        let key = LockingKey::generate();
        let mut wrapped = seal(b"secret", &key).unwrap();

        // Flip one ciphertext bit
        wrapped.ciphertext[0] ^= 0x01;

        assert_eq!(open(&wrapped, &key), Err(CipherError::AuthenticationFailed));
    }

    #[test]
    fn test_open_truncated_nonce_fails() {
        let key = LockingKey::generate();
        let mut wrapped = seal(b"secret", &key).unwrap();
        wrapped.nonce.truncate(4);

        assert_eq!(open(&wrapped, &key), Err(CipherError::AuthenticationFailed));
    }

    #[test]
    fn test_each_seal_uses_fresh_nonce() {
        let key = LockingKey::generate();
        let a = seal(b"same plaintext", &key).unwrap();
        let b = seal(b"same plaintext", &key).unwrap();

        assert_ne!(a.nonce, b.nonce, "nonce must be fresh per seal");
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_wrapped_key_serializes_as_hex() {
        let key = LockingKey::generate();
        let wrapped = seal(b"secret", &key).unwrap();

        let json = serde_json::to_string(&wrapped).unwrap();
        assert!(json.contains("\"nonce\""));
        assert!(json.contains("\"ciphertext\""));

        let back: WrappedKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, wrapped);
    }

    #[test]
    fn test_locking_key_from_slice_rejects_bad_length() {
        assert!(LockingKey::from_slice(&[0u8; 16]).is_none());
        assert!(LockingKey::from_slice(&[0u8; 32]).is_some());
    }

    #[test]
    fn test_locking_key_debug_is_redacted() {
        let key = LockingKey::generate();
        let debug = format!("{:?}", key);
        assert!(debug.contains("REDACTED"));
    }

    #[test]
    fn test_generate_entropy_size() {
        assert_eq!(generate_entropy().len(), ENTROPY_SIZE);
        assert_ne!(generate_entropy(), generate_entropy());
    }
}
