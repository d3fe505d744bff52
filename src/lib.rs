//! Encrypted-at-rest vault for a wallet's recovery phrase.
//!
//! The phrase is sealed with AES-256-GCM under a locking key held in a
//! platform secret store, gated by zero or more independently
//! toggleable unlock factors:
//! - an always-available device-bound key (the primary factor)
//! - a separately-keyed biometric slot behind a presence check
//! - a "soft" biometric flag layering a live prompt over the primary key
//!
//! Platform keychain and biometric APIs are abstracted behind the
//! [`SecretStore`] and [`BiometricAuthenticator`] traits; construct one
//! [`VaultManager`] per installation and inject it where needed.

pub mod biometric;
pub mod cipher;
pub mod descriptor;
pub mod error;
pub mod manager;
pub mod phrase;
pub mod secret_store;
pub mod security;

pub use biometric::{BiometricAuthenticator, BiometricError, BiometricSupport, ScriptedAuthenticator};
pub use cipher::{generate_entropy, CipherError, LockingKey, WrappedKey};
pub use descriptor::{DescriptorReadError, SecurityDescriptor};
pub use error::{Result, SeedRisk, VaultError};
pub use manager::VaultManager;
pub use phrase::{PhraseDecodeError, RecoveryPhrase};
pub use secret_store::{
    memory::MemorySecretStore, AccessPolicy, SecretStore, SecretStoreError, KEY_BIOMETRIC,
    KEY_PRIMARY, KEY_SOFT_BIOMETRIC,
};
pub use security::EnabledSecurity;
