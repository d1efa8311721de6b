//! # BridgeSync Server
//!
//! The inbound half of the bridge: the typed RPC surface the partner site
//! calls, the web service capability sets it expects, and the in-memory
//! [`SiteDirectory`] the handlers operate on.
//!
//! [`BridgeServer`] dispatches [`RpcRequest`](bridgesync_protocol::RpcRequest)
//! values. Token-authenticated callers go through
//! [`BridgeServer::handle_with_token`], which first checks that the called
//! function is enabled on the token's service. Licensed functionality is
//! gated through the [`EntitlementSource`] seam, implemented in production by
//! the license manager.

mod directory;
mod error;
mod server;
mod service;

pub use directory::{
    Cohort, CohortEnrolInstance, DirectoryCourse, DirectoryUser, ExternalService, SiteDirectory,
    DEFAULT_STUDENT_ROLE_ID,
};
pub use error::{ServerError, ServerResult};
pub use server::BridgeServer;
pub use service::{
    count_missing, ensure_required_functions, required_functions, EntitlementSource,
    FixedEntitlement, CORE_FUNCTIONS, LICENSED_FUNCTIONS, SSO_FUNCTIONS,
};
