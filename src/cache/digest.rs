//! Digest validation
//!
//! A digest names content by its cryptographic hash and doubles as the
//! cache key. It is validated before any filesystem path is derived
//! from it, so an accepted digest is always a safe single path component.

use crate::error::{HoardError, HoardResult};
use std::fmt;

/// Shortest accepted digest, in hex characters (128 bits)
pub const MIN_DIGEST_LEN: usize = 32;

/// A validated, lowercase hexadecimal content digest
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(String);

impl Digest {
    /// Normalize and validate a caller-supplied digest
    pub fn parse(input: &str) -> HoardResult<Self> {
        let normalized = input.to_ascii_lowercase();

        if normalized.len() < MIN_DIGEST_LEN || !normalized.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(HoardError::InvalidDigest(input.to_string()));
        }

        Ok(Self(normalized))
    }

    /// The digest as a hex string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against a computed hex digest
    pub fn matches(&self, actual: &str) -> bool {
        self.0.eq_ignore_ascii_case(actual)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Digest {
    type Err = HoardError;

    fn from_str(s: &str) -> HoardResult<Self> {
        Self::parse(s)
    }
}
