//! # BridgeSync Protocol
//!
//! Wire types shared between the sync engine, the license subsystem, and the
//! RPC surface consumed by the partner site.
//!
//! This crate provides:
//! - Outbound webhook events and their form-encoded payloads
//! - License API requests, raw responses, and the classify step that turns a
//!   loose JSON response into an explicit verdict
//! - Per-site synchronization preference flags
//! - Typed request/response pairs for every RPC function, with wire-exact
//!   field names
//!
//! ## Wire compatibility
//!
//! Field names and `action` strings are load-bearing: the partner site routes
//! on them. Numeric flags travel as `0`/`1`, identifiers as integers, free
//! text as strings. Nothing in this crate performs I/O.

mod event;
mod license;
mod preferences;
mod rpc;
mod serde_util;

pub use event::{EventAction, OutboundEvent, UserIdentity};
pub use license::{
    classify, LicenseRequest, LicenseResponse, LicenseVerdict, ACTION_ACTIVATE, ACTION_CHECK,
    ACTION_DEACTIVATE,
};
pub use preferences::SyncPreferences;
pub use rpc::{
    CohortEnrollment, CohortRef, CohortUser, CohortUserResult, CourseProgressEntry, CourseRecord,
    CreateServiceRequest, CreateServiceResponse, DeleteCohortRequest, DeleteCohortResponse,
    EnablePluginSettingsResponse, GetCourseProgressRequest, GetCoursesRequest, GetCoursesResponse,
    GetSiteDataRequest, GetUsersRequest, GetUsersResponse, MandatorySettingsResponse,
    ManageCohortEnrollmentRequest, ManageUserCohortEnrollmentRequest,
    ManageUserCohortEnrollmentResponse, RpcRequest, RpcResponse, TestConnectionRequest,
    TestConnectionResponse, UserRecord, VerifySsoTokenRequest, VerifySsoTokenResponse,
    TEST_DIRECTION_MOODLE, TEST_DIRECTION_WORDPRESS,
};
