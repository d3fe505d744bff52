//! Recovery phrase domain object and its sealed payload codec.
//!
//! The phrase only exists in plaintext transiently in memory during
//! unlock and enrollment; it is zeroized on drop and never written to
//! disk outside a sealed box.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Language tag assumed for payloads that predate the JSON format.
const LEGACY_LANGUAGE: &str = "en";

/// Errors decoding a sealed phrase payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhraseDecodeError {
    #[error("payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("payload is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("payload is empty")]
    Empty,
}

/// A wallet recovery phrase: a word list plus a language tag.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct RecoveryPhrase {
    pub words: Vec<String>,
    pub language: String,
}

impl RecoveryPhrase {
    pub fn new(words: Vec<String>, language: impl Into<String>) -> Self {
        Self {
            words,
            language: language.into(),
        }
    }

    /// Serialize the phrase for sealing.
    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decode a sealed payload back into a phrase.
    ///
    /// Two formats exist on disk:
    /// - version 2: JSON-encoded `RecoveryPhrase`
    /// - version 1 (legacy): a bare whitespace-separated mnemonic string,
    ///   implicitly English
    pub fn from_payload(payload: &[u8]) -> Result<Self, PhraseDecodeError> {
        let text = std::str::from_utf8(payload).map_err(|_| PhraseDecodeError::InvalidUtf8)?;

        if text.starts_with('{') {
            return serde_json::from_slice(payload)
                .map_err(|e| PhraseDecodeError::InvalidJson(e.to_string()));
        }

        let words: Vec<String> = text.split_whitespace().map(str::to_owned).collect();
        if words.is_empty() {
            return Err(PhraseDecodeError::Empty);
        }

        Ok(Self::new(words, LEGACY_LANGUAGE))
    }
}

impl std::fmt::Debug for RecoveryPhrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log the actual words
        f.debug_struct("RecoveryPhrase")
            .field("words", &"[REDACTED]")
            .field("language", &self.language)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_phrase() -> RecoveryPhrase {
        RecoveryPhrase::new(
            vec!["abandon".into(), "ability".into(), "able".into()],
            "en",
        )
    }

    #[test]
    fn test_payload_round_trip() {
        let phrase = sample_phrase();
        let payload = phrase.to_payload().unwrap();
        let back = RecoveryPhrase::from_payload(&payload).unwrap();
        assert_eq!(back, phrase);
    }

    #[test]
    fn test_legacy_payload_decodes_as_english() {
        let back = RecoveryPhrase::from_payload(b"abandon ability able").unwrap();
        assert_eq!(back.words, vec!["abandon", "ability", "able"]);
        assert_eq!(back.language, "en");
    }

    #[test]
    fn test_invalid_utf8_payload_rejected() {
        assert_eq!(
            RecoveryPhrase::from_payload(&[0xff, 0xfe, 0xfd]),
            Err(PhraseDecodeError::InvalidUtf8)
        );
    }

    #[test]
    fn test_truncated_json_payload_rejected() {
        let result = RecoveryPhrase::from_payload(b"{\"words\":[\"aban");
        assert!(matches!(result, Err(PhraseDecodeError::InvalidJson(_))));
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert_eq!(
            RecoveryPhrase::from_payload(b"   "),
            Err(PhraseDecodeError::Empty)
        );
    }

    #[test]
    fn test_debug_is_redacted() {
        let debug = format!("{:?}", sample_phrase());
        assert!(debug.contains("REDACTED"));
        assert!(!debug.contains("abandon"));
    }
}
