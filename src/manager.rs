//! VaultManager - orchestrates the security descriptor, the secret
//! store, biometric prompts and the AEAD wrapper.
//!
//! Every operation that reads or mutates the descriptor and the secret
//! store runs under a single operation lock, so at most one
//! read-modify-write sequence is in flight per vault instance. Write
//! ordering on the re-key operations is load-bearing: the new locking
//! key must be durable in the secret store before the descriptor makes
//! its slot authoritative, and superseded keys are only deleted after
//! the descriptor write lands.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};
use zeroize::Zeroize;

use crate::biometric::{BiometricAuthenticator, BiometricSupport};
use crate::cipher::{self, LockingKey, WrappedKey};
use crate::descriptor::{self, DescriptorReadError, SecurityDescriptor, DESCRIPTOR_FILE_NAME};
use crate::error::{Result, SeedRisk, VaultError};
use crate::phrase::RecoveryPhrase;
use crate::secret_store::{
    AccessPolicy, SecretStore, SecretStoreError, KEY_BIOMETRIC, KEY_PRIMARY, KEY_SOFT_BIOMETRIC,
};
use crate::security::EnabledSecurity;

/// First release in which the soft-biometric marker exists. Upgrades
/// across this boundary with a gated biometric key get the marker
/// recreated under the current access policy.
const SOFT_BIOMETRICS_VERSION: u32 = 5;

/// VaultManager handles unlock, enrollment and migration of the
/// encrypted recovery phrase.
///
/// Constructed explicitly and injected where needed; there is no
/// process-wide instance.
pub struct VaultManager {
    descriptor_path: PathBuf,
    store: Arc<dyn SecretStore>,
    authenticator: Arc<dyn BiometricAuthenticator>,
    /// Serializes every read-modify-write against the descriptor and
    /// the secret store.
    op_lock: Mutex<()>,
    /// Last published enabled-security value; late subscribers see it
    /// immediately.
    enabled_tx: watch::Sender<EnabledSecurity>,
}

impl VaultManager {
    /// Create a vault rooted at `data_dir`, backed by the given secret
    /// store and authenticator.
    pub fn new(
        data_dir: impl AsRef<Path>,
        store: Arc<dyn SecretStore>,
        authenticator: Arc<dyn BiometricAuthenticator>,
    ) -> Self {
        let (enabled_tx, _) = watch::channel(EnabledSecurity::default());
        Self {
            descriptor_path: data_dir.as_ref().join(DESCRIPTOR_FILE_NAME),
            store,
            authenticator,
            op_lock: Mutex::new(()),
            enabled_tx,
        }
    }

    /// Subscribe to enabled-security changes. The receiver immediately
    /// holds the last published value.
    pub fn subscribe(&self) -> watch::Receiver<EnabledSecurity> {
        self.enabled_tx.subscribe()
    }

    /// Last published enabled-security value.
    pub fn enabled_security(&self) -> EnabledSecurity {
        *self.enabled_tx.borrow()
    }

    /// Device support status for the biometric factor.
    pub fn biometric_support(&self) -> BiometricSupport {
        self.authenticator.support()
    }

    // =========================================================================
    // Unlock
    // =========================================================================

    /// Attempt to recover the phrase via the always-available
    /// device-bound key.
    ///
    /// Returns [`VaultError::FactorNotConfigured`] when no keychain slot
    /// exists (including when there is no descriptor file at all): a
    /// gated factor is required instead, nothing is wrong. Any failure
    /// past that point wraps into [`VaultError::SeedAtRisk`] because it
    /// may indicate loss of the only on-disk copy of the seed.
    ///
    /// Publishes the recomputed enabled-security state in every branch.
    pub async fn unlock_with_primary(&self) -> Result<(RecoveryPhrase, EnabledSecurity)> {
        let _guard = self.op_lock.lock().await;

        let descriptor = match descriptor::read(&self.descriptor_path) {
            Ok(descriptor) => descriptor,
            Err(DescriptorReadError::Missing) => {
                let security = self.derive_security(&SecurityDescriptor::default()).await;
                self.publish(security);
                return Err(VaultError::FactorNotConfigured);
            }
            Err(DescriptorReadError::Unreadable(e)) => {
                error!("security descriptor unreadable: {e}");
                self.publish(EnabledSecurity::default());
                return Err(SeedRisk::DescriptorUnreadable(e.to_string()).into());
            }
            Err(DescriptorReadError::Corrupted(e)) => {
                error!("security descriptor corrupted: {e}");
                self.publish(EnabledSecurity::default());
                return Err(SeedRisk::DescriptorCorrupted(e.to_string()).into());
            }
        };

        let security = self.derive_security(&descriptor).await;
        self.publish(security);

        let phrase = self.open_keychain_slot(&descriptor).await?;
        info!("vault unlocked via primary factor");
        Ok((phrase, security))
    }

    /// Attempt to recover the phrase via the biometric factor.
    ///
    /// Prefers the separately-keyed biometric slot; falls back to the
    /// primary slot gated by an independent live prompt when only the
    /// soft-biometric marker is set. A declined or failed prompt is
    /// [`VaultError::AuthenticationFailed`] - recoverable, nothing was
    /// lost.
    pub async fn unlock_with_biometrics(&self, prompt: &str) -> Result<RecoveryPhrase> {
        let _guard = self.op_lock.lock().await;

        let descriptor = match descriptor::read(&self.descriptor_path) {
            Ok(descriptor) => descriptor,
            Err(DescriptorReadError::Missing) => SecurityDescriptor::default(),
            Err(DescriptorReadError::Unreadable(e)) => {
                error!("security descriptor unreadable: {e}");
                return Err(SeedRisk::DescriptorUnreadable(e.to_string()).into());
            }
            Err(DescriptorReadError::Corrupted(e)) => {
                error!("security descriptor corrupted: {e}");
                return Err(SeedRisk::DescriptorCorrupted(e.to_string()).into());
            }
        };

        if let Some(wrapped) = &descriptor.biometrics_slot {
            let key_bytes = match self.store.read(KEY_BIOMETRIC, Some(prompt)).await {
                Ok(bytes) => bytes,
                Err(SecretStoreError::UserCancelled) => {
                    debug!("biometric prompt cancelled");
                    return Err(VaultError::AuthenticationFailed("user cancelled".into()));
                }
                Err(SecretStoreError::AuthenticationFailed(msg)) => {
                    debug!("biometric prompt failed: {msg}");
                    return Err(VaultError::AuthenticationFailed(msg));
                }
                Err(e) => {
                    error!("reading biometric locking key failed: {e}");
                    return Err(SeedRisk::StoreReadFailed(e.to_string()).into());
                }
            };
            let key_bytes = key_bytes.ok_or_else(|| {
                error!("biometric locking key missing from secret store");
                VaultError::from(SeedRisk::LockingKeyMissing)
            })?;

            let phrase = self.open_wrapped(wrapped, key_bytes)?;
            info!("vault unlocked via biometric factor");
            return Ok(phrase);
        }

        // Soft biometrics: the phrase sits behind the ungated primary
        // key, with a live prompt layered on top.
        if self.soft_marker_set().await && descriptor.keychain_slot.is_some() {
            let phrase = self.open_keychain_slot(&descriptor).await?;
            return match self.authenticator.evaluate(prompt).await {
                Ok(()) => {
                    info!("vault unlocked via soft biometric factor");
                    Ok(phrase)
                }
                Err(e) => {
                    debug!("soft biometric prompt failed: {e}");
                    Err(VaultError::AuthenticationFailed(e.to_string()))
                }
            };
        }

        Err(VaultError::FactorNotConfigured)
    }

    // =========================================================================
    // Enrollment
    // =========================================================================

    /// Re-key the vault onto the ungated device-bound factor.
    ///
    /// Destructive: the resulting descriptor has only the keychain slot
    /// populated. Called on first launch, or when the user disables the
    /// biometric factor.
    pub async fn enroll_primary(&self, phrase: &RecoveryPhrase) -> Result<EnabledSecurity> {
        let _guard = self.op_lock.lock().await;

        let mut payload = phrase.to_payload()?;
        let locking_key = LockingKey::generate();
        let sealed = cipher::seal(&payload, &locking_key)
            .map_err(|e| VaultError::Encryption(e.to_string()))?;
        payload.zeroize();

        let new_descriptor = SecurityDescriptor {
            keychain_slot: Some(sealed),
            biometrics_slot: None,
            passphrase_flag: false,
        };

        // Order matters - the previous state must stay unlockable until
        // the new descriptor is durable:
        //   1. store the new primary key in the secret store
        //   2. atomically replace the descriptor file
        //   3. only then delete the superseded biometric entry
        // Abort before step 3 on any failure; a failed step 3 leaves a
        // harmless orphaned key. Step 1 upserts over any existing primary
        // entry: if the primary factor is already authoritative, its key
        // must remain readable until the replacement lands.

        self.store
            .store(
                KEY_PRIMARY,
                locking_key.to_vec(),
                AccessPolicy::UnlockedDeviceOnly,
            )
            .await
            .map_err(|e| {
                error!("storing primary locking key failed: {e}");
                VaultError::StoreWriteFailed(e.to_string())
            })?;

        descriptor::write(&self.descriptor_path, &new_descriptor).map_err(|e| {
            error!("writing security descriptor failed: {e}");
            VaultError::Io(e)
        })?;

        if let Err(e) = self.store.delete(KEY_BIOMETRIC).await {
            warn!("failed to delete superseded biometric key: {e}");
        }

        let security = self.derive_security(&new_descriptor).await;
        self.publish(security);
        info!("primary factor enrolled");
        Ok(security)
    }

    /// Re-key the vault onto the biometric-gated factor, preserving an
    /// existing passphrase flag.
    pub async fn enroll_biometrics(&self, phrase: &RecoveryPhrase) -> Result<EnabledSecurity> {
        let _guard = self.op_lock.lock().await;

        let mut payload = phrase.to_payload()?;
        let locking_key = LockingKey::generate();
        let sealed = cipher::seal(&payload, &locking_key)
            .map_err(|e| VaultError::Encryption(e.to_string()))?;
        payload.zeroize();

        let previous = descriptor::read_or_default(&self.descriptor_path);
        let new_descriptor = SecurityDescriptor {
            keychain_slot: None,
            biometrics_slot: Some(sealed),
            passphrase_flag: previous.passphrase_flag,
        };

        // Same ordering discipline as enroll_primary, with one extra
        // step up front: a stale gated entry is about to be overwritten,
        // so deleting it loses nothing.

        if let Err(e) = self.store.delete(KEY_BIOMETRIC).await {
            debug!("ignoring stale biometric key delete failure: {e}");
        }

        self.store
            .store(
                KEY_BIOMETRIC,
                locking_key.to_vec(),
                AccessPolicy::BiometricOrPasscodePresence,
            )
            .await
            .map_err(|e| {
                error!("storing biometric locking key failed: {e}");
                VaultError::StoreWriteFailed(e.to_string())
            })?;

        descriptor::write(&self.descriptor_path, &new_descriptor).map_err(|e| {
            error!("writing security descriptor failed: {e}");
            VaultError::Io(e)
        })?;

        if let Err(e) = self.store.delete(KEY_PRIMARY).await {
            warn!("failed to delete superseded primary key: {e}");
        }

        let security = self.derive_security(&new_descriptor).await;
        self.publish(security);
        info!("biometric factor enrolled");
        Ok(security)
    }

    // =========================================================================
    // Soft biometrics & migration
    // =========================================================================

    /// Toggle the soft-biometric marker. Pure secret-store operation;
    /// the descriptor file is not touched.
    pub async fn set_soft_biometrics(&self, enabled: bool) -> Result<EnabledSecurity> {
        let _guard = self.op_lock.lock().await;

        if enabled {
            self.store
                .store(
                    KEY_SOFT_BIOMETRIC,
                    b"true".to_vec(),
                    AccessPolicy::UnlockedDeviceOnly,
                )
                .await
                .map_err(|e| {
                    error!("storing soft-biometric marker failed: {e}");
                    VaultError::StoreWriteFailed(e.to_string())
                })?;
        } else {
            self.store.delete(KEY_SOFT_BIOMETRIC).await.map_err(|e| {
                error!("deleting soft-biometric marker failed: {e}");
                VaultError::StoreWriteFailed(e.to_string())
            })?;
        }

        let descriptor = descriptor::read_or_default(&self.descriptor_path);
        let security = EnabledSecurity::derive(&descriptor, enabled);
        self.publish(security);
        info!("soft biometrics {}", if enabled { "enabled" } else { "disabled" });
        Ok(security)
    }

    /// Whether the soft-biometric marker is present.
    pub async fn soft_biometrics_enabled(&self) -> Result<bool> {
        match self.store.read(KEY_SOFT_BIOMETRIC, None).await {
            Ok(value) => Ok(value.is_some()),
            Err(e) => {
                error!("reading soft-biometric marker failed: {e}");
                Err(VaultError::StoreReadFailed(e.to_string()))
            }
        }
    }

    /// One-time layout upgrade, safe to run on every launch.
    ///
    /// Before [`SOFT_BIOMETRICS_VERSION`], enabling the biometric factor
    /// implied soft biometrics without a marker. When upgrading across
    /// that boundary with a gated key present, the marker is deleted and
    /// recreated so it carries the current access policy. Idempotent;
    /// failures are logged, never fatal.
    pub async fn migrate(&self, previous_version: u32) -> Result<()> {
        let _guard = self.op_lock.lock().await;

        if previous_version >= SOFT_BIOMETRICS_VERSION {
            return Ok(());
        }

        let gated_key_present = match self.store.contains(KEY_BIOMETRIC).await {
            Ok(present) => present,
            Err(e) => {
                error!("checking biometric key presence failed: {e}");
                false
            }
        };
        if !gated_key_present {
            return Ok(());
        }

        info!("migrating soft-biometric marker from version {previous_version}");

        if let Err(e) = self.store.delete(KEY_SOFT_BIOMETRIC).await {
            warn!("deleting soft-biometric marker failed: {e}");
        }
        if let Err(e) = self
            .store
            .store(
                KEY_SOFT_BIOMETRIC,
                b"true".to_vec(),
                AccessPolicy::UnlockedDeviceOnly,
            )
            .await
        {
            error!("recreating soft-biometric marker failed: {e}");
        }

        Ok(())
    }

    /// Recompute and publish the enabled-security state, e.g. at launch.
    pub async fn refresh_enabled_security(&self) -> EnabledSecurity {
        let _guard = self.op_lock.lock().await;

        let descriptor = descriptor::read_or_default(&self.descriptor_path);
        let security = self.derive_security(&descriptor).await;
        self.publish(security);
        security
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn publish(&self, security: EnabledSecurity) {
        debug!("publishing enabled security: {security:?}");
        self.enabled_tx.send_replace(security);
    }

    async fn derive_security(&self, descriptor: &SecurityDescriptor) -> EnabledSecurity {
        EnabledSecurity::derive(descriptor, self.soft_marker_set().await)
    }

    async fn soft_marker_set(&self) -> bool {
        match self.store.read(KEY_SOFT_BIOMETRIC, None).await {
            Ok(value) => value.is_some(),
            Err(e) => {
                error!("reading soft-biometric marker failed: {e}");
                false
            }
        }
    }

    /// Open the keychain slot with the ungated primary key. Every
    /// failure here is a danger condition: the descriptor says the slot
    /// exists, so the seed should be recoverable.
    async fn open_keychain_slot(&self, descriptor: &SecurityDescriptor) -> Result<RecoveryPhrase> {
        let wrapped = descriptor
            .keychain_slot
            .as_ref()
            .ok_or(VaultError::FactorNotConfigured)?;

        let key_bytes = self.store.read(KEY_PRIMARY, None).await.map_err(|e| {
            error!("reading primary locking key failed: {e}");
            VaultError::from(SeedRisk::StoreReadFailed(e.to_string()))
        })?;
        let key_bytes = key_bytes.ok_or_else(|| {
            error!("primary locking key missing from secret store");
            VaultError::from(SeedRisk::LockingKeyMissing)
        })?;

        self.open_wrapped(wrapped, key_bytes)
    }

    fn open_wrapped(&self, wrapped: &WrappedKey, mut key_bytes: Vec<u8>) -> Result<RecoveryPhrase> {
        let key_len = key_bytes.len();
        let locking_key = LockingKey::from_slice(&key_bytes);
        key_bytes.zeroize();
        let locking_key =
            locking_key.ok_or_else(|| VaultError::from(SeedRisk::LockingKeyInvalid(key_len)))?;

        let mut plaintext = cipher::open(wrapped, &locking_key).map_err(|_| {
            error!("sealed box failed authentication");
            VaultError::from(SeedRisk::BoxCorrupted)
        })?;

        let phrase = RecoveryPhrase::from_payload(&plaintext).map_err(|e| {
            error!("recovery phrase payload corrupted: {e}");
            VaultError::from(SeedRisk::PhraseCorrupted(e.to_string()))
        });
        plaintext.zeroize();
        phrase
    }
}
