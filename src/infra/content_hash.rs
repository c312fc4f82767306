//! Content fingerprints for change detection.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// SHA-256 fingerprint of a file's raw bytes.
///
/// Computed before any BOM stripping or decoding so that it reflects the
/// exact bytes on disk. Stored as 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentHash {
    hex: String,
}

/// Errors when reading a stored fingerprint back.
#[derive(Debug, Error)]
pub enum ContentHashError {
    #[error("invalid fingerprint: expected 64 hex characters, got {0} characters")]
    InvalidLength(usize),

    #[error("invalid hex character at position {position}: '{character}'")]
    InvalidCharacter { position: usize, character: char },
}

/// Fingerprints raw bytes.
pub fn fingerprint(bytes: &[u8]) -> ContentHash {
    ContentHash::compute(bytes)
}

impl ContentHash {
    /// Computes the SHA-256 of the given bytes.
    pub fn compute(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        Self {
            hex: format!("{:x}", digest),
        }
    }

    /// Parses a stored hex fingerprint, normalizing to lowercase.
    ///
    /// # Errors
    ///
    /// Returns `ContentHashError::InvalidLength` unless exactly 64 characters,
    /// `ContentHashError::InvalidCharacter` on the first non-hex character.
    pub fn from_hex(hex: &str) -> Result<Self, ContentHashError> {
        if hex.len() != 64 {
            return Err(ContentHashError::InvalidLength(hex.len()));
        }

        if let Some((position, character)) =
            hex.chars().enumerate().find(|(_, c)| !c.is_ascii_hexdigit())
        {
            return Err(ContentHashError::InvalidCharacter {
                position,
                character,
            });
        }

        Ok(Self {
            hex: hex.to_ascii_lowercase(),
        })
    }

    /// Returns the 64-character lowercase hex form.
    pub fn as_str(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hex)
    }
}

impl Serialize for ContentHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.hex)
    }
}
