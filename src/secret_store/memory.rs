//! In-memory secret store with a scriptable authenticator.
//!
//! Implements the same interface as the platform-backed stores, plus
//! per-name failure injection so tests can exercise the enrollment
//! ordering protocol step by step.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::{AccessPolicy, SecretStore, SecretStoreError};
use crate::biometric::{BiometricAuthenticator, BiometricError};

/// Prompt used when a gated read is issued without one.
const DEFAULT_PROMPT: &str = "Unlock required";

struct Entry {
    value: Vec<u8>,
    policy: AccessPolicy,
}

pub struct MemorySecretStore {
    entries: RwLock<HashMap<String, Entry>>,
    authenticator: Arc<dyn BiometricAuthenticator>,
    write_failures: RwLock<HashSet<String>>,
    read_failures: RwLock<HashSet<String>>,
    delete_failures: RwLock<HashSet<String>>,
}

impl MemorySecretStore {
    pub fn new(authenticator: Arc<dyn BiometricAuthenticator>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            authenticator,
            write_failures: RwLock::new(HashSet::new()),
            read_failures: RwLock::new(HashSet::new()),
            delete_failures: RwLock::new(HashSet::new()),
        }
    }

    /// Make every `store` of `name` fail until failures are cleared.
    pub async fn fail_writes(&self, name: &str) {
        self.write_failures.write().await.insert(name.to_owned());
    }

    /// Make every `read` of `name` fail until failures are cleared.
    pub async fn fail_reads(&self, name: &str) {
        self.read_failures.write().await.insert(name.to_owned());
    }

    /// Make every `delete` of `name` fail until failures are cleared.
    pub async fn fail_deletes(&self, name: &str) {
        self.delete_failures.write().await.insert(name.to_owned());
    }

    /// Clear all injected failures.
    pub async fn clear_failures(&self) {
        self.write_failures.write().await.clear();
        self.read_failures.write().await.clear();
        self.delete_failures.write().await.clear();
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn store(
        &self,
        name: &str,
        value: Vec<u8>,
        policy: AccessPolicy,
    ) -> Result<(), SecretStoreError> {
        if self.write_failures.read().await.contains(name) {
            return Err(SecretStoreError::WriteFailed(format!(
                "injected write failure for {name}"
            )));
        }

        debug!("storing {} byte secret under '{name}'", value.len());
        self.entries
            .write()
            .await
            .insert(name.to_owned(), Entry { value, policy });
        Ok(())
    }

    async fn read(
        &self,
        name: &str,
        prompt: Option<&str>,
    ) -> Result<Option<Vec<u8>>, SecretStoreError> {
        if self.read_failures.read().await.contains(name) {
            return Err(SecretStoreError::ReadFailed(format!(
                "injected read failure for {name}"
            )));
        }

        let entries = self.entries.read().await;
        let Some(entry) = entries.get(name) else {
            return Ok(None);
        };

        if entry.policy == AccessPolicy::BiometricOrPasscodePresence {
            self.authenticator
                .evaluate(prompt.unwrap_or(DEFAULT_PROMPT))
                .await
                .map_err(|e| match e {
                    BiometricError::Cancelled => SecretStoreError::UserCancelled,
                    BiometricError::Denied(msg) => SecretStoreError::AuthenticationFailed(msg),
                    BiometricError::Unavailable(msg) => SecretStoreError::NotAvailable(msg),
                })?;
        }

        Ok(Some(entry.value.clone()))
    }

    async fn delete(&self, name: &str) -> Result<(), SecretStoreError> {
        if self.delete_failures.read().await.contains(name) {
            return Err(SecretStoreError::DeleteFailed(format!(
                "injected delete failure for {name}"
            )));
        }

        self.entries.write().await.remove(name);
        Ok(())
    }

    async fn contains(&self, name: &str) -> Result<bool, SecretStoreError> {
        Ok(self.entries.read().await.contains_key(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::biometric::ScriptedAuthenticator;

    fn store_with(auth: Arc<ScriptedAuthenticator>) -> MemorySecretStore {
        MemorySecretStore::new(auth)
    }

    #[tokio::test]
    async fn test_store_read_delete_round_trip() {
        let store = store_with(Arc::new(ScriptedAuthenticator::passing()));

        store
            .store("primary", vec![1, 2, 3], AccessPolicy::UnlockedDeviceOnly)
            .await
            .unwrap();
        assert_eq!(
            store.read("primary", None).await.unwrap(),
            Some(vec![1, 2, 3])
        );
        assert!(store.contains("primary").await.unwrap());

        store.delete("primary").await.unwrap();
        assert_eq!(store.read("primary", None).await.unwrap(), None);

        // Delete is idempotent
        store.delete("primary").await.unwrap();
    }

    #[tokio::test]
    async fn test_ungated_read_never_prompts() {
        let auth = Arc::new(ScriptedAuthenticator::failing(BiometricError::Cancelled));
        let store = store_with(auth.clone());

        store
            .store("primary", vec![7], AccessPolicy::UnlockedDeviceOnly)
            .await
            .unwrap();
        assert_eq!(store.read("primary", None).await.unwrap(), Some(vec![7]));
        assert_eq!(auth.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_gated_read_prompts_and_propagates_decline() {
        let auth = Arc::new(ScriptedAuthenticator::passing());
        let store = store_with(auth.clone());

        store
            .store(
                "biometric",
                vec![9],
                AccessPolicy::BiometricOrPasscodePresence,
            )
            .await
            .unwrap();

        assert_eq!(
            store.read("biometric", Some("App is locked")).await.unwrap(),
            Some(vec![9])
        );
        assert_eq!(auth.prompt_count(), 1);

        auth.set_outcome(Err(BiometricError::Cancelled));
        assert!(matches!(
            store.read("biometric", None).await,
            Err(SecretStoreError::UserCancelled)
        ));
    }

    #[tokio::test]
    async fn test_contains_never_prompts() {
        let auth = Arc::new(ScriptedAuthenticator::failing(BiometricError::Cancelled));
        let store = store_with(auth.clone());

        store
            .store(
                "biometric",
                vec![9],
                AccessPolicy::BiometricOrPasscodePresence,
            )
            .await
            .unwrap();

        assert!(store.contains("biometric").await.unwrap());
        assert_eq!(auth.prompt_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = store_with(Arc::new(ScriptedAuthenticator::passing()));

        store.fail_writes("primary").await;
        assert!(store
            .store("primary", vec![1], AccessPolicy::UnlockedDeviceOnly)
            .await
            .is_err());

        store.clear_failures().await;
        store
            .store("primary", vec![1], AccessPolicy::UnlockedDeviceOnly)
            .await
            .unwrap();

        store.fail_reads("primary").await;
        assert!(store.read("primary", None).await.is_err());

        store.fail_deletes("primary").await;
        assert!(store.delete("primary").await.is_err());
    }
}
