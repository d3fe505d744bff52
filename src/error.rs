//! Vault error taxonomy.
//!
//! Errors are split into two tiers. `VaultError` is what callers see:
//! it distinguishes "factor simply not configured" and "user declined a
//! prompt" (both harmless) from environment failures and from the
//! `SeedAtRisk` aggregate. `SeedRisk` wraps exactly one underlying
//! integrity or store-read cause and signals that the seed may be
//! unrecoverable without the user's separately-memorized recovery phrase.

use thiserror::Error;

/// Result type alias for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Errors that can occur during vault operations.
#[derive(Error, Debug)]
pub enum VaultError {
    /// The requested unlock factor is not configured.
    /// Informational: nothing was lost, the caller should try another
    /// factor or prompt for enrollment.
    #[error("unlock factor not configured")]
    FactorNotConfigured,

    /// The user failed or cancelled a live authentication prompt.
    /// Recoverable: the caller may retry.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The secret store rejected a write. Retryable platform issue.
    #[error("secret store write failed: {0}")]
    StoreWriteFailed(String),

    /// The secret store rejected a read outside the unlock paths.
    /// Retryable platform issue.
    #[error("secret store read failed: {0}")]
    StoreReadFailed(String),

    /// An error occurred in the encryption layer.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// The recovery phrase may be unrecoverable without re-entry.
    /// Surfaced prominently; carries the specific underlying cause.
    #[error("recovery phrase at risk: {0}")]
    SeedAtRisk(#[from] SeedRisk),

    /// An I/O error occurred (descriptor file access, permissions, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialization/deserialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VaultError {
    /// True for conditions that may indicate loss of the only on-disk
    /// copy of the seed.
    pub fn is_danger(&self) -> bool {
        matches!(self, VaultError::SeedAtRisk(_))
    }
}

/// The specific cause behind a [`VaultError::SeedAtRisk`].
///
/// A corrupted descriptor and a missing secret-store key both block
/// unlock; the distinction is preserved here for the consuming
/// application's recovery flow.
#[derive(Error, Debug)]
pub enum SeedRisk {
    /// The descriptor file exists but could not be read.
    #[error("security descriptor unreadable: {0}")]
    DescriptorUnreadable(String),

    /// The descriptor file was read but could not be decoded.
    #[error("security descriptor corrupted: {0}")]
    DescriptorCorrupted(String),

    /// The secret store failed while reading a configured locking key.
    #[error("secret store read failed: {0}")]
    StoreReadFailed(String),

    /// The descriptor references a locking key the secret store no
    /// longer holds.
    #[error("locking key missing from secret store")]
    LockingKeyMissing,

    /// The stored locking key has the wrong length.
    #[error("locking key has invalid length: {0} bytes")]
    LockingKeyInvalid(usize),

    /// The sealed box is malformed or failed AEAD authentication.
    #[error("sealed box corrupted or failed authentication")]
    BoxCorrupted,

    /// The box opened but its plaintext is not a valid phrase payload.
    #[error("recovery phrase payload corrupted: {0}")]
    PhraseCorrupted(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_risk_marks_danger() {
        let err = VaultError::from(SeedRisk::LockingKeyMissing);
        assert!(err.is_danger());
        assert!(!VaultError::FactorNotConfigured.is_danger());
        assert!(!VaultError::AuthenticationFailed("cancelled".into()).is_danger());
    }
}
