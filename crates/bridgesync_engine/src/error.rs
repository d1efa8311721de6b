//! Engine error types.

use bridgesync_registry::RegistryError;
use thiserror::Error;

/// Errors surfaced by the dispatch engine.
///
/// Per-site delivery failures are not errors; they land in the dispatch
/// report. Only the local side (storage, payload handling) can fail a call.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The configuration storage backend failed.
    #[error(transparent)]
    Storage(#[from] RegistryError),

    /// An inbound payload could not be interpreted.
    #[error("invalid inbound payload: {0}")]
    InvalidPayload(String),
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
