//! Typed request/response pairs for the inbound RPC surface.
//!
//! Each pair mirrors one externally callable function. Wire field names are
//! frozen; the cohort payloads use camelCase member names while everything
//! else is snake_case, and that asymmetry is deliberate.

use crate::serde_util::bool_as_int;
use serde::{Deserialize, Serialize};

/// `test_connection` direction probing this side's own configuration.
pub const TEST_DIRECTION_MOODLE: &str = "moodle";
/// `test_connection` direction probing the partner site over HTTP.
pub const TEST_DIRECTION_WORDPRESS: &str = "wordpress";

fn default_test_direction() -> String {
    TEST_DIRECTION_MOODLE.into()
}

/// Connectivity probe between the two sites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConnectionRequest {
    /// Partner site URL.
    pub wp_url: String,
    /// Shared token identifying the connection under test.
    pub wp_token: String,
    /// Probe direction; defaults to [`TEST_DIRECTION_MOODLE`].
    #[serde(default = "default_test_direction")]
    pub test_connection: String,
}

/// Result of a connectivity probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestConnectionResponse {
    /// `1` on success, `0` on failure.
    #[serde(with = "bool_as_int")]
    pub status: bool,
    /// Human-readable outcome message.
    pub msg: String,
    /// Non-fatal findings, such as a token that matches no stored connection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<Vec<String>>,
}

/// Fetch per-site synchronization preferences by site identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetSiteDataRequest {
    /// Identifier of the connection whose preferences are requested.
    pub site_index: String,
}

/// Paged course listing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetCoursesRequest {
    /// Number of records to skip.
    pub offset: u64,
    /// Maximum number of records to return.
    pub limit: u64,
    /// Substring filter on the course full name; empty means no filter.
    #[serde(default)]
    pub search_string: String,
    /// When set, the response also carries the unfiltered total count.
    #[serde(with = "bool_as_int", default)]
    pub total_courses: bool,
}

/// One course in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseRecord {
    /// Course id.
    pub id: u64,
    /// Full display name.
    pub fullname: String,
    /// Category id.
    pub categoryid: u64,
}

/// Paged course listing response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetCoursesResponse {
    /// Unfiltered course count; `0` when the request did not ask for it.
    pub total_courses: u64,
    /// The requested page.
    pub courses: Vec<CourseRecord>,
}

/// Paged user listing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetUsersRequest {
    /// Number of records to skip.
    pub offset: u64,
    /// Maximum number of records to return.
    pub limit: u64,
    /// Substring filter on first name, last name, or username.
    #[serde(default)]
    pub search_string: String,
    /// When set, the response also carries the unfiltered total count.
    #[serde(with = "bool_as_int", default)]
    pub total_users: bool,
}

/// One user in a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// User id.
    pub id: u64,
    /// Login name.
    pub username: String,
    /// First name.
    pub firstname: String,
    /// Last name.
    pub lastname: String,
    /// Email address.
    pub email: String,
}

/// Paged user listing response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetUsersResponse {
    /// Unfiltered user count; `0` when the request did not ask for it.
    pub total_users: u64,
    /// The requested page.
    pub users: Vec<UserRecord>,
}

/// Provision a web service and an auth token for the given user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateServiceRequest {
    /// Name for the new service.
    pub web_service_name: String,
    /// Id of the user the service token is issued for.
    pub user_id: u64,
}

/// Result of service provisioning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateServiceResponse {
    /// The issued token; empty on failure.
    pub token: String,
    /// This site's own URL, echoed for the caller's connection form.
    pub site_url: String,
    /// Id of the created service; `0` on failure.
    pub service_id: u64,
    /// `1` on success, `0` on failure.
    #[serde(with = "bool_as_int")]
    pub status: bool,
    /// Outcome message.
    pub msg: String,
}

/// Per-user course completion query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetCourseProgressRequest {
    /// Id of the user whose progress is requested.
    pub user_id: u64,
}

/// Completion percentage for one enrolled course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseProgressEntry {
    /// Course id.
    pub course_id: u64,
    /// Completion percentage, `0..=100`, rounded up.
    pub completion: u8,
}

/// One cohort-to-course enrollment instruction.
///
/// Member names are camelCase on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortEnrollment {
    /// Target course.
    #[serde(rename = "courseId")]
    pub course_id: u64,
    /// Cohort to enroll or unenroll.
    #[serde(rename = "cohortId")]
    pub cohort_id: u64,
    /// When set, removes the cohort's enrollment instead of adding it.
    #[serde(with = "bool_as_int", default)]
    pub unenroll: bool,
}

/// Batch of cohort enrollment instructions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManageCohortEnrollmentRequest {
    /// Instructions, applied in order.
    pub cohort: Vec<CohortEnrollment>,
}

/// Reference to a cohort by id, camelCase on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortRef {
    /// The cohort id.
    #[serde(rename = "cohortId")]
    pub cohort_id: u64,
}

/// Batch cohort deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteCohortRequest {
    /// Cohorts to delete.
    pub cohort: Vec<CohortRef>,
}

/// Result of batch cohort deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteCohortResponse {
    /// `1` when every deletion succeeded, `0` if any failed.
    #[serde(with = "bool_as_int")]
    pub status: bool,
}

/// A user to create (if needed) and add to a cohort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortUser {
    /// First name.
    pub firstname: String,
    /// Last name.
    pub lastname: String,
    /// Plaintext password for a newly created account.
    pub password: String,
    /// Requested login name; uniqued with a numeric suffix on collision.
    pub username: String,
    /// Email address; an existing account with this email is reused.
    pub email: String,
}

/// Batch cohort membership request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManageUserCohortEnrollmentRequest {
    /// Target cohort.
    pub cohort_id: u64,
    /// Users to add.
    pub users: Vec<CohortUser>,
}

/// Per-user outcome of a cohort membership request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohortUserResult {
    /// Id of the created or reused account; `0` when creation failed.
    pub user_id: u64,
    /// Final (possibly uniqued) login name; absent when creation failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Password echoed back for the caller; absent when creation failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Email address.
    pub email: String,
    /// `1` when the user was newly added to the cohort.
    #[serde(with = "bool_as_int")]
    pub enrolled: bool,
    /// The cohort the user was added to.
    pub cohort_id: u64,
    /// `1` when account creation failed.
    #[serde(with = "bool_as_int")]
    pub creation_error: bool,
}

/// Batch cohort membership response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManageUserCohortEnrollmentResponse {
    /// `1` when the batch was rejected outright (unknown cohort).
    #[serde(with = "bool_as_int")]
    pub error: bool,
    /// Rejection reason; empty when `error` is `0`.
    pub error_msg: String,
    /// Per-user outcomes; empty when the batch was rejected.
    pub users: Vec<CohortUserResult>,
}

/// Single sign-on token check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifySsoTokenRequest {
    /// Token to compare against the stored shared secret.
    pub token: String,
}

/// Result of a single sign-on token check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifySsoTokenResponse {
    /// Whether the token matched.
    pub success: bool,
    /// Outcome message.
    pub msg: String,
}

/// Settings state after force-enabling everything the bridge requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnablePluginSettingsResponse {
    /// REST protocol enabled.
    #[serde(with = "bool_as_int")]
    pub rest_protocol: bool,
    /// Web services enabled.
    #[serde(with = "bool_as_int")]
    pub web_service: bool,
    /// Password policy disabled.
    #[serde(with = "bool_as_int")]
    pub disable_password: bool,
    /// Extended username characters allowed.
    #[serde(with = "bool_as_int")]
    pub allow_extended_char: bool,
    /// Site language code.
    pub lang_code: String,
}

/// Current state of the settings the bridge depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MandatorySettingsResponse {
    /// REST protocol enabled.
    #[serde(with = "bool_as_int")]
    pub rest_protocol: bool,
    /// Web services enabled.
    #[serde(with = "bool_as_int")]
    pub web_service: bool,
    /// Extended username characters allowed.
    #[serde(with = "bool_as_int")]
    pub allow_extended_char: bool,
    /// Password policy enforced.
    #[serde(with = "bool_as_int")]
    pub password_policy: bool,
    /// Site language code.
    pub lang_code: String,
    /// Id of the student role used for enrollments.
    pub student_role_id: u64,
}

/// A dispatchable RPC call.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcRequest {
    /// Connectivity probe.
    TestConnection(TestConnectionRequest),
    /// Fetch per-site synchronization preferences.
    GetSiteData(GetSiteDataRequest),
    /// Paged course listing.
    GetCourses(GetCoursesRequest),
    /// Paged user listing.
    GetUsers(GetUsersRequest),
    /// Provision a service and token.
    CreateService(CreateServiceRequest),
    /// Per-user course completion.
    GetCourseProgress(GetCourseProgressRequest),
    /// Batch cohort-to-course enrollment.
    ManageCohortEnrollment(ManageCohortEnrollmentRequest),
    /// Batch cohort deletion.
    DeleteCohort(DeleteCohortRequest),
    /// Batch cohort membership with on-the-fly user creation.
    ManageUserCohortEnrollment(ManageUserCohortEnrollmentRequest),
    /// Single sign-on token check.
    VerifySsoToken(VerifySsoTokenRequest),
    /// Force-enable the settings the bridge requires.
    EnablePluginSettings,
    /// Read the settings the bridge depends on.
    GetMandatorySettings,
}

impl RpcRequest {
    /// The externally registered function name this call maps to.
    pub fn function_name(&self) -> &'static str {
        match self {
            RpcRequest::TestConnection(_) => "auth_edwiserbridge_test_connection",
            RpcRequest::GetSiteData(_) => "auth_edwiserbridge_get_site_data",
            RpcRequest::GetCourses(_) => "auth_edwiserbridge_get_courses",
            RpcRequest::GetUsers(_) => "auth_edwiserbridge_get_users",
            RpcRequest::CreateService(_) => "auth_edwiserbridge_create_service",
            RpcRequest::GetCourseProgress(_) => "auth_edwiserbridge_get_course_progress",
            RpcRequest::ManageCohortEnrollment(_) => "auth_edwiserbridge_manage_cohort_enrollment",
            RpcRequest::DeleteCohort(_) => "auth_edwiserbridge_delete_cohort",
            RpcRequest::ManageUserCohortEnrollment(_) => {
                "auth_edwiserbridge_manage_user_cohort_enrollment"
            }
            RpcRequest::VerifySsoToken(_) => "auth_edwiserbridge_verify_sso_token",
            RpcRequest::EnablePluginSettings => "auth_edwiserbridge_enable_plugin_settings",
            RpcRequest::GetMandatorySettings => "auth_edwiserbridge_get_mandatory_settings",
        }
    }
}

/// A successful RPC result, one variant per call.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcResponse {
    /// Connectivity probe outcome.
    TestConnection(TestConnectionResponse),
    /// Synchronization preferences for the requested site.
    GetSiteData(crate::SyncPreferences),
    /// Course listing page.
    GetCourses(GetCoursesResponse),
    /// User listing page.
    GetUsers(GetUsersResponse),
    /// Provisioning outcome.
    CreateService(CreateServiceResponse),
    /// Per-course completion entries.
    GetCourseProgress(Vec<CourseProgressEntry>),
    /// Id of the last touched enrollment instance.
    ManageCohortEnrollment(u64),
    /// Batch deletion outcome.
    DeleteCohort(DeleteCohortResponse),
    /// Batch membership outcome.
    ManageUserCohortEnrollment(ManageUserCohortEnrollmentResponse),
    /// Token check outcome.
    VerifySsoToken(VerifySsoTokenResponse),
    /// Settings state after force-enabling.
    EnablePluginSettings(EnablePluginSettingsResponse),
    /// Current settings state.
    GetMandatorySettings(MandatorySettingsResponse),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cohort_fields_are_camel_case() {
        let req = ManageCohortEnrollmentRequest {
            cohort: vec![CohortEnrollment {
                course_id: 4,
                cohort_id: 9,
                unenroll: false,
            }],
        };
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(r#""courseId":4"#));
        assert!(json.contains(r#""cohortId":9"#));
        assert!(json.contains(r#""unenroll":0"#));
    }

    #[test]
    fn unenroll_defaults_off() {
        let req: ManageCohortEnrollmentRequest =
            serde_json::from_str(r#"{"cohort":[{"courseId":1,"cohortId":2}]}"#).unwrap();
        assert!(!req.cohort[0].unenroll);
    }

    #[test]
    fn test_connection_direction_defaults_to_moodle() {
        let req: TestConnectionRequest =
            serde_json::from_str(r#"{"wp_url":"https://shop.example.org","wp_token":"t"}"#)
                .unwrap();
        assert_eq!(req.test_connection, TEST_DIRECTION_MOODLE);
    }

    #[test]
    fn function_names_are_wire_frozen() {
        let req = RpcRequest::VerifySsoToken(VerifySsoTokenRequest { token: "t".into() });
        assert_eq!(req.function_name(), "auth_edwiserbridge_verify_sso_token");
        assert_eq!(
            RpcRequest::EnablePluginSettings.function_name(),
            "auth_edwiserbridge_enable_plugin_settings"
        );
    }

    #[test]
    fn failed_creation_result_omits_credentials() {
        let result = CohortUserResult {
            user_id: 0,
            username: None,
            password: None,
            email: "a@example.org".into(),
            enrolled: false,
            cohort_id: 3,
            creation_error: true,
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("username"));
        assert!(!json.contains("password"));
        assert!(json.contains(r#""creation_error":1"#));
    }

    #[test]
    fn status_flags_travel_as_integers() {
        let resp = TestConnectionResponse {
            status: true,
            msg: "Connection Successful".into(),
            warnings: None,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains(r#""status":1"#));
        assert!(!json.contains("warnings"));
    }
}
