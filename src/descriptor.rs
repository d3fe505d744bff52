//! Persisted security descriptor.
//!
//! A single `security.json` per installation records which unlock
//! factors are configured and carries their wrapped key material. The
//! file is always replaced atomically (write to temp file, then rename)
//! so a crash never leaves a partially written descriptor.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::cipher::WrappedKey;

/// Descriptor file name inside the vault data directory.
pub const DESCRIPTOR_FILE_NAME: &str = "security.json";

/// Why a strict descriptor read failed.
#[derive(Debug, Error)]
pub enum DescriptorReadError {
    /// No descriptor file on disk. Treated as an empty descriptor by
    /// callers; not a danger condition.
    #[error("descriptor file not found")]
    Missing,

    /// The file exists but could not be read.
    #[error("error reading descriptor file: {0}")]
    Unreadable(#[source] io::Error),

    /// The file was read but could not be decoded.
    #[error("error decoding descriptor file: {0}")]
    Corrupted(#[source] serde_json::Error),
}

/// Which unlock factors are configured, and their wrapped key material.
///
/// At most one of the two slots is authoritative in the steady state;
/// both may transiently coexist mid-enrollment (see the ordering
/// protocol in the manager).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityDescriptor {
    /// Phrase sealed under the ungated device-bound key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keychain_slot: Option<WrappedKey>,

    /// Phrase sealed under the biometric-gated key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub biometrics_slot: Option<WrappedKey>,

    /// Whether an additional user passphrase factor is configured.
    /// The passphrase value itself is not stored here.
    #[serde(default)]
    pub passphrase_flag: bool,
}

/// Read and decode the descriptor, distinguishing missing, unreadable
/// and corrupt files.
pub fn read(path: &Path) -> Result<SecurityDescriptor, DescriptorReadError> {
    if !path.exists() {
        return Err(DescriptorReadError::Missing);
    }

    let data = std::fs::read(path).map_err(DescriptorReadError::Unreadable)?;
    serde_json::from_slice(&data).map_err(DescriptorReadError::Corrupted)
}

/// Lenient read for paths where a broken descriptor must not block the
/// operation: missing or unreadable files yield an empty descriptor.
pub fn read_or_default(path: &Path) -> SecurityDescriptor {
    match read(path) {
        Ok(descriptor) => descriptor,
        Err(DescriptorReadError::Missing) => SecurityDescriptor::default(),
        Err(e) => {
            warn!("falling back to empty security descriptor: {e}");
            SecurityDescriptor::default()
        }
    }
}

/// Encode and write the descriptor atomically.
///
/// Format: JSON, written to a temp file in the same directory and then
/// renamed over the target, with `0o600` permissions on Unix.
pub fn write(path: &Path, descriptor: &SecurityDescriptor) -> io::Result<()> {
    let data = serde_json::to_vec_pretty(descriptor).map_err(io::Error::other)?;

    let temp_path = temp_path_for(path);
    std::fs::write(&temp_path, &data)?;

    // Restrict the temp file before it becomes visible under the final name
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = std::fs::metadata(&temp_path)?.permissions();
        perms.set_mode(0o600);
        std::fs::set_permissions(&temp_path, perms)?;
    }

    std::fs::rename(&temp_path, path)?;

    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    path.with_extension("json.tmp")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::{seal, LockingKey};
    use tempfile::TempDir;

    fn descriptor_with_keychain_slot() -> SecurityDescriptor {
        let key = LockingKey::generate();
        SecurityDescriptor {
            keychain_slot: Some(seal(b"payload", &key).unwrap()),
            biometrics_slot: None,
            passphrase_flag: false,
        }
    }

    #[test]
    fn test_missing_file_is_distinguished() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DESCRIPTOR_FILE_NAME);

        assert!(matches!(read(&path), Err(DescriptorReadError::Missing)));
        assert_eq!(read_or_default(&path), SecurityDescriptor::default());
    }

    #[test]
    fn test_write_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DESCRIPTOR_FILE_NAME);

        let descriptor = descriptor_with_keychain_slot();
        write(&path, &descriptor).unwrap();

        assert_eq!(read(&path).unwrap(), descriptor);
        // No temp file left behind after the rename
        assert!(!temp_path_for(&path).exists());
    }

    #[test]
    fn test_corrupted_file_is_distinguished() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DESCRIPTOR_FILE_NAME);

        std::fs::write(&path, b"{\"keychainSlot\": tru").unwrap();

        assert!(matches!(read(&path), Err(DescriptorReadError::Corrupted(_))));
        // Lenient read falls back to empty
        assert_eq!(read_or_default(&path), SecurityDescriptor::default());
    }

    #[test]
    fn test_json_field_names() {
        let descriptor = SecurityDescriptor {
            passphrase_flag: true,
            ..descriptor_with_keychain_slot()
        };

        let json = serde_json::to_string(&descriptor).unwrap();
        assert!(json.contains("\"keychainSlot\""));
        assert!(json.contains("\"passphraseFlag\""));
        // Empty slots are omitted entirely
        assert!(!json.contains("\"biometricsSlot\""));
    }

    #[test]
    fn test_absent_fields_default() {
        let descriptor: SecurityDescriptor = serde_json::from_str("{}").unwrap();
        assert_eq!(descriptor, SecurityDescriptor::default());
        assert!(!descriptor.passphrase_flag);
    }

    #[cfg(unix)]
    #[test]
    fn test_written_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DESCRIPTOR_FILE_NAME);

        write(&path, &descriptor_with_keychain_slot()).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
