//! Derived enabled-security state.

use serde::{Deserialize, Serialize};

use crate::descriptor::SecurityDescriptor;

/// The set of unlock factors currently enabled.
///
/// Derived, never persisted: recomputed from the descriptor and the
/// soft-biometric marker on every mutation and at launch, then published
/// to observers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnabledSecurity {
    /// A biometric prompt is required to unlock.
    pub biometrics: bool,
    /// The seed is held under a separately-keyed, biometric-gated slot.
    pub advanced_security: bool,
    /// An additional user passphrase factor is configured.
    pub passphrase: bool,
}

impl EnabledSecurity {
    /// Pure calculation from the persisted descriptor plus the
    /// soft-biometric marker:
    /// - a biometrics slot enables `biometrics` and `advanced_security`
    /// - otherwise a keychain slot plus the soft marker enables
    ///   `biometrics` alone
    /// - the passphrase flag is independent of both
    pub fn derive(descriptor: &SecurityDescriptor, soft_biometrics: bool) -> Self {
        let mut enabled = Self::default();

        if descriptor.biometrics_slot.is_some() {
            enabled.biometrics = true;
            enabled.advanced_security = true;
        } else if descriptor.keychain_slot.is_some() && soft_biometrics {
            enabled.biometrics = true;
        }

        if descriptor.passphrase_flag {
            enabled.passphrase = true;
        }

        enabled
    }

    /// No factor enabled at all.
    pub fn is_empty(&self) -> bool {
        !(self.biometrics || self.advanced_security || self.passphrase)
    }
}
