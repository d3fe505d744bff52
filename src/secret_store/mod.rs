//! Abstract capability for the platform secure key store.
//!
//! Concrete implementations wrap an OS keychain, keystore or keyring;
//! the vault core only sees named entries gated by an access-control
//! policy. [`memory::MemorySecretStore`] implements the same interface
//! with an in-memory map and a scriptable authenticator.

use async_trait::async_trait;
use thiserror::Error;

pub mod memory;

/// Entry holding the ungated device-bound locking key.
pub const KEY_PRIMARY: &str = "primary";

/// Entry holding the biometric-gated locking key.
pub const KEY_BIOMETRIC: &str = "biometric";

/// Ungated boolean marker: presence means soft biometrics are enabled.
pub const KEY_SOFT_BIOMETRIC: &str = "soft-biometric";

/// Access-control policy attached to a stored key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Readable whenever the device is unlocked; no live prompt.
    UnlockedDeviceOnly,
    /// Every read forces a live biometric or device-passcode presence
    /// check.
    BiometricOrPasscodePresence,
}

/// Errors that can occur during secret storage operations.
#[derive(Debug, Error)]
pub enum SecretStoreError {
    /// Secure storage is not available on this platform/device.
    #[error("secure storage not available: {0}")]
    NotAvailable(String),

    /// The live authentication required by the entry's policy failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// User dismissed the authentication prompt.
    #[error("user cancelled authentication")]
    UserCancelled,

    #[error("read failed: {0}")]
    ReadFailed(String),

    #[error("write failed: {0}")]
    WriteFailed(String),

    #[error("delete failed: {0}")]
    DeleteFailed(String),
}

/// Named-entry get/put/delete over the platform secure store.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Idempotent upsert of a named key under the given policy.
    async fn store(
        &self,
        name: &str,
        value: Vec<u8>,
        policy: AccessPolicy,
    ) -> Result<(), SecretStoreError>;

    /// Read a named entry. Returns `Ok(None)` when absent.
    ///
    /// If the entry was stored with a presence policy, the call itself
    /// triggers a live prompt and blocks until the platform
    /// authenticator responds.
    async fn read(&self, name: &str, prompt: Option<&str>)
        -> Result<Option<Vec<u8>>, SecretStoreError>;

    /// Idempotent delete; absence is not an error.
    async fn delete(&self, name: &str) -> Result<(), SecretStoreError>;

    /// Metadata presence check. Never prompts, even for gated entries.
    async fn contains(&self, name: &str) -> Result<bool, SecretStoreError>;
}
