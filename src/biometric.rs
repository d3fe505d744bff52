//! Biometric authenticator capability.
//!
//! The vault never talks to a platform biometric API directly; it is
//! handed an implementation of [`BiometricAuthenticator`] that prompts
//! the user and reports pass/fail. A scriptable implementation for tests
//! lives alongside the trait.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

/// Availability of biometric authentication on the current device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BiometricSupport {
    /// Biometrics are enabled and enrolled.
    Available,
    /// Hardware exists but the user has not enrolled.
    NotEnrolled,
    /// No usable biometric hardware.
    NotAvailable,
}

impl BiometricSupport {
    pub fn is_available(&self) -> bool {
        matches!(self, BiometricSupport::Available)
    }
}

/// Why a live authentication prompt did not succeed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BiometricError {
    /// User dismissed the prompt.
    #[error("user cancelled authentication")]
    Cancelled,

    /// The platform authenticator rejected the attempt.
    #[error("authentication denied: {0}")]
    Denied(String),

    /// Biometrics cannot be evaluated on this device right now.
    #[error("biometric authentication not available: {0}")]
    Unavailable(String),
}

/// Capability surface for the platform authenticator.
#[async_trait]
pub trait BiometricAuthenticator: Send + Sync {
    /// Current device support status. Never prompts.
    fn support(&self) -> BiometricSupport;

    /// Prompt the user and block until the platform responds.
    async fn evaluate(&self, prompt: &str) -> Result<(), BiometricError>;
}

/// Scriptable authenticator for tests: returns a configured outcome and
/// counts how many times it was prompted.
pub struct ScriptedAuthenticator {
    outcome: Mutex<Result<(), BiometricError>>,
    prompts: AtomicUsize,
}

impl ScriptedAuthenticator {
    /// An authenticator that approves every prompt.
    pub fn passing() -> Self {
        Self {
            outcome: Mutex::new(Ok(())),
            prompts: AtomicUsize::new(0),
        }
    }

    /// An authenticator that fails every prompt with the given error.
    pub fn failing(error: BiometricError) -> Self {
        Self {
            outcome: Mutex::new(Err(error)),
            prompts: AtomicUsize::new(0),
        }
    }

    /// Change the outcome for subsequent prompts.
    pub fn set_outcome(&self, outcome: Result<(), BiometricError>) {
        *self.outcome.lock().unwrap() = outcome;
    }

    /// How many times `evaluate` ran.
    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BiometricAuthenticator for ScriptedAuthenticator {
    fn support(&self) -> BiometricSupport {
        BiometricSupport::Available
    }

    async fn evaluate(&self, _prompt: &str) -> Result<(), BiometricError> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.outcome.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_authenticator_outcomes() {
        let auth = ScriptedAuthenticator::passing();
        assert!(auth.evaluate("unlock").await.is_ok());

        auth.set_outcome(Err(BiometricError::Cancelled));
        assert_eq!(
            auth.evaluate("unlock").await,
            Err(BiometricError::Cancelled)
        );

        assert_eq!(auth.prompt_count(), 2);
        assert!(auth.support().is_available());
    }
}
