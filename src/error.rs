//! Error types for hoard
//!
//! All modules use `HoardResult<T>` as their return type.
//!
//! Errors are `Clone` so a single terminal failure can be delivered
//! identically to every consumer attached to an in-flight acquisition.
//! I/O sources are therefore held behind an `Arc`.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Result type alias for hoard operations
pub type HoardResult<T> = Result<T, HoardError>;

/// All errors that can occur in hoard
#[derive(Error, Debug, Clone)]
pub enum HoardError {
    // Acquisition errors
    #[error("Invalid digest {0:?}: expected at least 32 hexadecimal characters")]
    InvalidDigest(String),

    #[error("Store I/O error: {context}")]
    StoreIo {
        context: String,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("Digest mismatch: expected `{expected}`, got `{actual}`")]
    DigestMismatch { expected: String, actual: String },

    #[error("Source error: {context}")]
    Source {
        context: String,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("Not cached: {0}")]
    NotCached(String),

    #[error("{0} store entries failed verification")]
    VerifyFailed(usize),

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    // IO errors outside the store
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: Arc<io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(Arc<serde_json::Error>),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for HoardError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(Arc::new(e))
    }
}

impl HoardError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source: Arc::new(source),
        }
    }

    /// Create a store IO error with context
    pub fn store_io(context: impl Into<String>, source: io::Error) -> Self {
        Self::StoreIo {
            context: context.into(),
            source: Arc::new(source),
        }
    }

    /// Create a source error with context
    pub fn source(context: impl Into<String>, source: io::Error) -> Self {
        Self::Source {
            context: context.into(),
            source: Arc::new(source),
        }
    }

    /// Check if the same request may succeed when issued again
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Source { .. } | Self::StoreIo { .. })
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::InvalidDigest(_) => Some("Digests are lowercase hex, e.g. a sha256 sum"),
            Self::DigestMismatch { .. } => Some(
                "If a stored entry is corrupted, delete it from the store directory to refetch",
            ),
            Self::NotCached(_) => Some("Fetch it first with: hoard get <digest> <source>"),
            Self::VerifyFailed(_) => Some("Delete the listed entries and fetch them again"),
            Self::ConfigInvalid { .. } => Some("Run: hoard config init --force"),
            _ => None,
        }
    }
}
