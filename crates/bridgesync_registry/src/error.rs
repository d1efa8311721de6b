//! Registry error types.

use thiserror::Error;

/// Errors surfaced by the registry.
///
/// Malformed stored blobs are not an error: they are treated as absent, the
/// same way a fresh installation starts out. Only the storage backend itself
/// can fail.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The configuration storage backend failed.
    #[error("config storage failed for key `{key}`: {reason}")]
    Storage {
        /// The key being read or written.
        key: String,
        /// Backend-reported reason.
        reason: String,
    },
}

impl RegistryError {
    /// Builds a storage error for the given key.
    pub fn storage(key: impl Into<String>, reason: impl Into<String>) -> Self {
        RegistryError::Storage {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
