//! Server error types.

use bridgesync_license::LicenseError;
use bridgesync_registry::RegistryError;
use thiserror::Error;

/// Errors surfaced by RPC handling.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The configuration storage backend failed.
    #[error(transparent)]
    Storage(#[from] RegistryError),

    /// The license subsystem failed.
    #[error(transparent)]
    License(#[from] LicenseError),

    /// The caller's token is not bound to any service.
    #[error("unknown service token")]
    UnknownToken,

    /// The caller's service does not include the requested function.
    #[error("function `{0}` is not enabled for this service")]
    FunctionNotEnabled(String),

    /// Cohort enrollment is administratively disabled on this site.
    #[error("cohort enrollment is disabled")]
    CohortEnrolDisabled,
}

/// Result alias for RPC handling.
pub type ServerResult<T> = Result<T, ServerError>;
