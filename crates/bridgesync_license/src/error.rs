//! License subsystem error types.

use bridgesync_registry::RegistryError;
use thiserror::Error;

/// Errors surfaced by license operations.
///
/// An unreachable license server is deliberately not represented here: the
/// manager absorbs it into a short-lived cached sentinel so the plugin keeps
/// working through store outages.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// The configuration storage backend failed.
    #[error(transparent)]
    Storage(#[from] RegistryError),
}

/// Result alias for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
