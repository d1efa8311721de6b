//! The inbound RPC surface.

use crate::directory::SiteDirectory;
use crate::error::{ServerError, ServerResult};
use crate::service::{count_missing, required_functions, EntitlementSource};
use bridgesync_engine::{DispatchConfig, DispatchOutcome, HttpClient, SyncDispatcher};
use bridgesync_protocol::{
    CohortUserResult, CourseProgressEntry, CourseRecord, CreateServiceRequest,
    CreateServiceResponse, DeleteCohortRequest, DeleteCohortResponse, EnablePluginSettingsResponse,
    GetCourseProgressRequest, GetCoursesRequest, GetCoursesResponse, GetSiteDataRequest,
    GetUsersRequest, GetUsersResponse, MandatorySettingsResponse, ManageCohortEnrollmentRequest,
    ManageUserCohortEnrollmentRequest, ManageUserCohortEnrollmentResponse, RpcRequest, RpcResponse,
    TestConnectionRequest, TestConnectionResponse, UserRecord, VerifySsoTokenRequest,
    VerifySsoTokenResponse, TEST_DIRECTION_WORDPRESS,
};
use bridgesync_registry::{
    ConfigStore, PreferenceStore, SiteSettings, LAST_TOKEN_KEY, SELECTED_SERVICE_KEY,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Dispatches typed RPC calls against the site directory, the settings
/// store, and the outbound dispatcher.
///
/// [`handle`](Self::handle) trusts the caller; [`handle_with_token`]
/// (Self::handle_with_token) first resolves the token to a service and
/// checks that the called function is enabled on it.
pub struct BridgeServer<S, H, E> {
    store: Arc<S>,
    directory: Arc<SiteDirectory>,
    preferences: PreferenceStore<S>,
    settings: SiteSettings<S>,
    dispatcher: SyncDispatcher<S, H>,
    entitlement: E,
    site_url: String,
}

impl<S: ConfigStore, H: HttpClient, E: EntitlementSource> BridgeServer<S, H, E> {
    /// Creates a server over shared storage, the site directory, and an
    /// HTTP client for outbound probes.
    pub fn new(
        store: Arc<S>,
        directory: Arc<SiteDirectory>,
        http: Arc<H>,
        entitlement: E,
        site_url: impl Into<String>,
    ) -> Self {
        Self {
            preferences: PreferenceStore::new(Arc::clone(&store)),
            settings: SiteSettings::new(Arc::clone(&store)),
            dispatcher: SyncDispatcher::new(Arc::clone(&store), http, DispatchConfig::default()),
            store,
            directory,
            entitlement,
            site_url: site_url.into(),
        }
    }

    /// Handles one call from a trusted context.
    pub fn handle(&self, request: RpcRequest) -> ServerResult<RpcResponse> {
        match request {
            RpcRequest::TestConnection(req) => {
                Ok(RpcResponse::TestConnection(self.test_connection(req)))
            }
            RpcRequest::GetSiteData(req) => self.get_site_data(req),
            RpcRequest::GetCourses(req) => Ok(RpcResponse::GetCourses(self.get_courses(req))),
            RpcRequest::GetUsers(req) => Ok(RpcResponse::GetUsers(self.get_users(req))),
            RpcRequest::CreateService(req) => self.create_service(req),
            RpcRequest::GetCourseProgress(req) => {
                Ok(RpcResponse::GetCourseProgress(self.course_progress(req)))
            }
            RpcRequest::ManageCohortEnrollment(req) => self.manage_cohort_enrollment(req),
            RpcRequest::DeleteCohort(req) => Ok(RpcResponse::DeleteCohort(self.delete_cohort(req))),
            RpcRequest::ManageUserCohortEnrollment(req) => Ok(
                RpcResponse::ManageUserCohortEnrollment(self.manage_user_cohort_enrollment(req)),
            ),
            RpcRequest::VerifySsoToken(req) => self.verify_sso_token(req),
            RpcRequest::EnablePluginSettings => self.enable_plugin_settings(),
            RpcRequest::GetMandatorySettings => self.mandatory_settings(),
        }
    }

    /// Handles one call authenticated by a service token.
    pub fn handle_with_token(&self, token: &str, request: RpcRequest) -> ServerResult<RpcResponse> {
        let service_id = self
            .directory
            .token_service(token)
            .ok_or(ServerError::UnknownToken)?;
        let function = request.function_name();
        let enabled = self
            .directory
            .service_functions(service_id)
            .ok_or(ServerError::UnknownToken)?;
        if !enabled.contains(function) {
            return Err(ServerError::FunctionNotEnabled(function.into()));
        }
        self.handle(request)
    }

    fn test_connection(&self, req: TestConnectionRequest) -> TestConnectionResponse {
        if req.test_connection == TEST_DIRECTION_WORDPRESS {
            return self.test_own_service(&req.wp_token);
        }

        // Probe the partner end of the link and relay its verdict.
        let (outcome, body) = self.dispatcher.probe(&req.wp_url, &req.wp_token);
        match outcome {
            DispatchOutcome::Delivered { status } if (200..300).contains(&status) => {
                match body.as_deref().and_then(parse_probe_body) {
                    Some((true, msg)) => TestConnectionResponse {
                        status: true,
                        msg,
                        warnings: None,
                    },
                    Some((false, msg)) => TestConnectionResponse {
                        status: false,
                        msg,
                        warnings: None,
                    },
                    None => TestConnectionResponse {
                        status: false,
                        msg: "Partner site answered with an unrecognized response.".into(),
                        warnings: None,
                    },
                }
            }
            DispatchOutcome::Delivered { status } => TestConnectionResponse {
                status: false,
                msg: format!("Partner site answered with HTTP {status}."),
                warnings: None,
            },
            DispatchOutcome::Failed { reason } => TestConnectionResponse {
                status: false,
                msg: format!("Partner site is unreachable: {reason}"),
                warnings: None,
            },
            // probe() bypasses preferences and always has a token.
            DispatchOutcome::SkippedByPreference | DispatchOutcome::SkippedNoToken => {
                TestConnectionResponse {
                    status: false,
                    msg: "Probe was not sent.".into(),
                    warnings: None,
                }
            }
        }
    }

    /// Checks that a token maps to a local service with every required
    /// function enabled.
    fn test_own_service(&self, token: &str) -> TestConnectionResponse {
        let Some(service_id) = self.directory.token_service(token) else {
            return TestConnectionResponse {
                status: false,
                msg: "Token does not match any web service token on this site.".into(),
                warnings: None,
            };
        };
        let Some(enabled) = self.directory.service_functions(service_id) else {
            return TestConnectionResponse {
                status: false,
                msg: "The service behind this token no longer exists.".into(),
                warnings: None,
            };
        };

        let missing = count_missing(&enabled, self.entitlement.licensed());
        let warnings = (missing > 0).then(|| {
            vec![format!(
                "{missing} required web service functions are not enabled on this service."
            )]
        });
        TestConnectionResponse {
            status: true,
            msg: "Connection successful.".into(),
            warnings,
        }
    }

    fn get_site_data(&self, req: GetSiteDataRequest) -> ServerResult<RpcResponse> {
        Ok(RpcResponse::GetSiteData(
            self.preferences.get(&req.site_index)?,
        ))
    }

    fn get_courses(&self, req: GetCoursesRequest) -> GetCoursesResponse {
        let (page, total) = self.directory.courses_page(
            req.offset as usize,
            req.limit as usize,
            &req.search_string,
        );
        GetCoursesResponse {
            total_courses: if req.total_courses { total } else { 0 },
            courses: page
                .into_iter()
                .map(|c| CourseRecord {
                    id: c.id,
                    fullname: c.fullname,
                    categoryid: c.categoryid,
                })
                .collect(),
        }
    }

    fn get_users(&self, req: GetUsersRequest) -> GetUsersResponse {
        let (page, total) =
            self.directory
                .users_page(req.offset as usize, req.limit as usize, &req.search_string);
        GetUsersResponse {
            total_users: if req.total_users { total } else { 0 },
            users: page
                .into_iter()
                .map(|u| UserRecord {
                    id: u.id,
                    username: u.username,
                    firstname: u.firstname,
                    lastname: u.lastname,
                    email: u.email,
                })
                .collect(),
        }
    }

    fn create_service(&self, req: CreateServiceRequest) -> ServerResult<RpcResponse> {
        if !self.directory.user_exists(req.user_id) {
            return Ok(RpcResponse::CreateService(CreateServiceResponse {
                token: String::new(),
                site_url: self.site_url.clone(),
                service_id: 0,
                status: false,
                msg: "The selected user does not exist.".into(),
            }));
        }

        let functions = required_functions(self.entitlement.licensed());
        let service_id = self
            .directory
            .create_service(&req.web_service_name, &functions);
        let Some(token) = self.directory.issue_token(service_id, req.user_id) else {
            return Ok(RpcResponse::CreateService(CreateServiceResponse {
                token: String::new(),
                site_url: self.site_url.clone(),
                service_id: 0,
                status: false,
                msg: "Token creation failed.".into(),
            }));
        };

        self.store
            .set(SELECTED_SERVICE_KEY, &service_id.to_string())?;
        self.store.set(LAST_TOKEN_KEY, &token)?;
        info!(service = %req.web_service_name, service_id, "web service provisioned");

        Ok(RpcResponse::CreateService(CreateServiceResponse {
            token,
            site_url: self.site_url.clone(),
            service_id,
            status: true,
            msg: "Web service created successfully.".into(),
        }))
    }

    fn course_progress(&self, req: GetCourseProgressRequest) -> Vec<CourseProgressEntry> {
        self.directory
            .progress_for(req.user_id)
            .into_iter()
            .map(|(course_id, completion)| CourseProgressEntry {
                course_id,
                completion,
            })
            .collect()
    }

    fn manage_cohort_enrollment(
        &self,
        req: ManageCohortEnrollmentRequest,
    ) -> ServerResult<RpcResponse> {
        if !self.directory.cohort_enrol_enabled() {
            return Err(ServerError::CohortEnrolDisabled);
        }

        let mut last_instance = 0;
        for item in &req.cohort {
            if item.unenroll {
                last_instance = self
                    .directory
                    .find_cohort_instance(item.course_id, item.cohort_id)
                    .unwrap_or(0);
                self.directory
                    .remove_cohort_instances(item.course_id, item.cohort_id);
                continue;
            }

            if !self.directory.course_exists(item.course_id)
                || !self.directory.cohort_exists(item.cohort_id)
            {
                warn!(
                    course = item.course_id,
                    cohort = item.cohort_id,
                    "skipping enrollment against unknown course or cohort"
                );
                continue;
            }
            last_instance = match self
                .directory
                .find_cohort_instance(item.course_id, item.cohort_id)
            {
                Some(existing) => existing,
                None => self
                    .directory
                    .add_cohort_instance(item.course_id, item.cohort_id),
            };
        }
        Ok(RpcResponse::ManageCohortEnrollment(last_instance))
    }

    fn delete_cohort(&self, req: DeleteCohortRequest) -> DeleteCohortResponse {
        let mut all_deleted = !req.cohort.is_empty();
        for cohort in &req.cohort {
            if !self.directory.delete_cohort(cohort.cohort_id) {
                warn!(cohort = cohort.cohort_id, "cohort deletion target missing");
                all_deleted = false;
            }
        }
        DeleteCohortResponse {
            status: all_deleted,
        }
    }

    fn manage_user_cohort_enrollment(
        &self,
        req: ManageUserCohortEnrollmentRequest,
    ) -> ManageUserCohortEnrollmentResponse {
        if !self.directory.cohort_exists(req.cohort_id) {
            return ManageUserCohortEnrollmentResponse {
                error: true,
                error_msg: "Cohort does not exist.".into(),
                users: Vec::new(),
            };
        }

        let users = req
            .users
            .into_iter()
            .map(|user| {
                if user.email.is_empty() || user.username.is_empty() {
                    return CohortUserResult {
                        user_id: 0,
                        username: None,
                        password: None,
                        email: user.email,
                        enrolled: false,
                        cohort_id: req.cohort_id,
                        creation_error: true,
                    };
                }

                // An account with this email is reused; otherwise one is
                // created, uniquing the username on collision.
                let (user_id, username) = match self.directory.user_by_email(&user.email) {
                    Some(existing) => (existing, user.username.clone()),
                    None => self.directory.create_user(
                        &user.username,
                        &user.firstname,
                        &user.lastname,
                        &user.email,
                    ),
                };
                let enrolled = self.directory.add_cohort_member(req.cohort_id, user_id);
                CohortUserResult {
                    user_id,
                    username: Some(username),
                    password: Some(user.password),
                    email: user.email,
                    enrolled,
                    cohort_id: req.cohort_id,
                    creation_error: false,
                }
            })
            .collect();

        ManageUserCohortEnrollmentResponse {
            error: false,
            error_msg: String::new(),
            users,
        }
    }

    fn verify_sso_token(&self, req: VerifySsoTokenRequest) -> ServerResult<RpcResponse> {
        let secret = self.settings.sso_settings()?.shared_secret;
        let response = if secret.is_empty() {
            VerifySsoTokenResponse {
                success: false,
                msg: "Single sign-on secret key is not configured.".into(),
            }
        } else if secret == req.token {
            VerifySsoTokenResponse {
                success: true,
                msg: "Token verified successfully.".into(),
            }
        } else {
            VerifySsoTokenResponse {
                success: false,
                msg: "Token mismatch.".into(),
            }
        };
        Ok(RpcResponse::VerifySsoToken(response))
    }

    fn enable_plugin_settings(&self) -> ServerResult<RpcResponse> {
        let state = self.settings.enable_required_settings()?;
        Ok(RpcResponse::EnablePluginSettings(
            EnablePluginSettingsResponse {
                rest_protocol: state.rest_protocol,
                web_service: state.web_service,
                disable_password: !state.pass_policy,
                allow_extended_char: state.extended_username,
                lang_code: self.settings.lang_code()?,
            },
        ))
    }

    fn mandatory_settings(&self) -> ServerResult<RpcResponse> {
        let state = self.settings.required_settings()?;
        Ok(RpcResponse::GetMandatorySettings(
            MandatorySettingsResponse {
                rest_protocol: state.rest_protocol,
                web_service: state.web_service,
                allow_extended_char: state.extended_username,
                password_policy: state.pass_policy,
                lang_code: self.settings.lang_code()?,
                student_role_id: self.directory.student_role_id(),
            },
        ))
    }
}

/// Pulls `status` and `msg` out of a probe response body. The partner
/// answers with `status` as either an integer flag or a bare bool.
fn parse_probe_body(body: &str) -> Option<(bool, String)> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let status = match value.get("status")? {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_i64()? == 1,
        serde_json::Value::String(s) => s == "1",
        _ => return None,
    };
    let msg = value
        .get("msg")
        .and_then(|m| m.as_str())
        .unwrap_or_default()
        .to_string();
    Some((status, msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{DirectoryCourse, DirectoryUser};
    use crate::service::FixedEntitlement;
    use bridgesync_engine::{HttpResponse, RecordingClient};
    use bridgesync_protocol::{
        CohortEnrollment, CohortRef, CohortUser, SyncPreferences, TEST_DIRECTION_MOODLE,
    };
    use bridgesync_registry::{
        ConnectionRegistry, MemoryConfigStore, SiteConnection, SsoSettings,
    };
    use std::collections::BTreeMap;

    type TestServer = BridgeServer<MemoryConfigStore, RecordingClient, FixedEntitlement>;

    struct Fixture {
        store: Arc<MemoryConfigStore>,
        directory: Arc<SiteDirectory>,
        http: Arc<RecordingClient>,
        server: TestServer,
    }

    fn fixture(licensed: bool) -> Fixture {
        let store = Arc::new(MemoryConfigStore::new());
        let directory = Arc::new(SiteDirectory::new());
        let http = Arc::new(RecordingClient::new());
        let server = BridgeServer::new(
            Arc::clone(&store),
            Arc::clone(&directory),
            Arc::clone(&http),
            FixedEntitlement(licensed),
            "https://lms.example.org",
        );
        Fixture {
            store,
            directory,
            http,
            server,
        }
    }

    fn seed_user(directory: &SiteDirectory, id: u64, username: &str, email: &str) {
        directory.insert_user(DirectoryUser {
            id,
            username: username.into(),
            firstname: "First".into(),
            lastname: "Last".into(),
            email: email.into(),
            confirmed: true,
        });
    }

    #[test]
    fn moodle_direction_probe_relays_the_partner_verdict() {
        let fx = fixture(false);
        fx.http
            .push_response(HttpResponse::ok(r#"{"status":1,"msg":"Connection successful"}"#));

        let resp = fx.server.test_connection(TestConnectionRequest {
            wp_url: "https://shop.example.org".into(),
            wp_token: "tok".into(),
            test_connection: TEST_DIRECTION_MOODLE.into(),
        });
        assert!(resp.status);
        assert_eq!(resp.msg, "Connection successful");

        let requests = fx.http.requests();
        assert_eq!(
            requests[0].url,
            "https://shop.example.org/wp-json/edwiser-bridge/wisdmlabs/"
        );
    }

    #[test]
    fn moodle_direction_probe_reports_unreachable_partner() {
        let fx = fixture(false);
        fx.http.push_failure("connection refused");

        let resp = fx.server.test_connection(TestConnectionRequest {
            wp_url: "https://down.example.org".into(),
            wp_token: "tok".into(),
            test_connection: TEST_DIRECTION_MOODLE.into(),
        });
        assert!(!resp.status);
        assert!(resp.msg.contains("unreachable"));
    }

    #[test]
    fn wordpress_direction_rejects_unknown_tokens() {
        let fx = fixture(false);
        let resp = fx.server.test_connection(TestConnectionRequest {
            wp_url: String::new(),
            wp_token: "bogus".into(),
            test_connection: TEST_DIRECTION_WORDPRESS.into(),
        });
        assert!(!resp.status);
        assert!(resp.msg.contains("does not match"));
    }

    #[test]
    fn wordpress_direction_warns_about_missing_functions() {
        let fx = fixture(true);
        seed_user(&fx.directory, 2, "admin", "admin@example.org");
        let service = fx.directory.create_service("partial", &["core_user_create_users"]);
        let token = fx.directory.issue_token(service, 2).unwrap();

        let resp = fx.server.test_connection(TestConnectionRequest {
            wp_url: String::new(),
            wp_token: token,
            test_connection: TEST_DIRECTION_WORDPRESS.into(),
        });
        assert!(resp.status);
        let warnings = resp.warnings.unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("27"));
    }

    #[test]
    fn site_data_returns_stored_preferences() {
        let fx = fixture(false);
        let connections = ConnectionRegistry::new(Arc::clone(&fx.store));
        let mut sites = BTreeMap::new();
        sites.insert(
            "shop".to_string(),
            SiteConnection {
                wp_name: "shop".into(),
                wp_url: "https://shop.example.org".into(),
                wp_token: "tok".into(),
            },
        );
        connections.save_sites(&sites).unwrap();
        PreferenceStore::new(Arc::clone(&fx.store))
            .save(&connections, "shop", SyncPreferences::all_enabled())
            .unwrap();

        let resp = fx
            .server
            .handle(RpcRequest::GetSiteData(GetSiteDataRequest {
                site_index: "shop".into(),
            }))
            .unwrap();
        assert_eq!(
            resp,
            RpcResponse::GetSiteData(SyncPreferences::all_enabled())
        );
    }

    #[test]
    fn course_listing_honors_total_flag() {
        let fx = fixture(false);
        for id in 1..=3 {
            fx.directory.insert_course(DirectoryCourse {
                id,
                fullname: format!("Course {id}"),
                categoryid: 1,
            });
        }

        let with_total = fx.server.get_courses(GetCoursesRequest {
            offset: 0,
            limit: 2,
            search_string: String::new(),
            total_courses: true,
        });
        assert_eq!(with_total.total_courses, 3);
        assert_eq!(with_total.courses.len(), 2);

        let without_total = fx.server.get_courses(GetCoursesRequest {
            offset: 0,
            limit: 2,
            search_string: String::new(),
            total_courses: false,
        });
        assert_eq!(without_total.total_courses, 0);
    }

    #[test]
    fn create_service_issues_token_and_records_it() {
        let fx = fixture(true);
        seed_user(&fx.directory, 2, "admin", "admin@example.org");

        let resp = fx
            .server
            .handle(RpcRequest::CreateService(CreateServiceRequest {
                web_service_name: "edwiser".into(),
                user_id: 2,
            }))
            .unwrap();
        let RpcResponse::CreateService(created) = resp else {
            panic!("wrong response variant");
        };
        assert!(created.status);
        assert!(!created.token.is_empty());
        assert_eq!(created.site_url, "https://lms.example.org");

        // The token maps back to a service carrying the full licensed set.
        let service = fx.directory.token_service(&created.token).unwrap();
        let functions = fx.directory.service_functions(service).unwrap();
        assert_eq!(functions.len(), required_functions(true).len());

        assert_eq!(
            fx.store.get(LAST_TOKEN_KEY).unwrap().unwrap(),
            created.token
        );
        assert_eq!(
            fx.store.get(SELECTED_SERVICE_KEY).unwrap().unwrap(),
            created.service_id.to_string()
        );
    }

    #[test]
    fn create_service_for_missing_user_fails_cleanly() {
        let fx = fixture(false);
        let RpcResponse::CreateService(created) = fx
            .server
            .handle(RpcRequest::CreateService(CreateServiceRequest {
                web_service_name: "edwiser".into(),
                user_id: 99,
            }))
            .unwrap()
        else {
            panic!("wrong response variant");
        };
        assert!(!created.status);
        assert!(created.token.is_empty());
        assert_eq!(created.service_id, 0);
    }

    #[test]
    fn course_progress_covers_every_enrollment() {
        let fx = fixture(false);
        seed_user(&fx.directory, 7, "jdoe", "jdoe@example.org");
        fx.directory.enroll(7, 41);
        fx.directory.enroll(7, 42);
        fx.directory.set_progress(7, 42, 65);

        let entries = fx
            .server
            .course_progress(GetCourseProgressRequest { user_id: 7 });
        assert_eq!(entries.len(), 2);
        assert!(entries.contains(&CourseProgressEntry {
            course_id: 41,
            completion: 0
        }));
        assert!(entries.contains(&CourseProgressEntry {
            course_id: 42,
            completion: 65
        }));
    }

    #[test]
    fn cohort_enrollment_reuses_existing_instances() {
        let fx = fixture(true);
        fx.directory.insert_course(DirectoryCourse {
            id: 4,
            fullname: "Course 4".into(),
            categoryid: 1,
        });
        fx.directory.insert_cohort(9, "Batch A");

        let enroll = RpcRequest::ManageCohortEnrollment(ManageCohortEnrollmentRequest {
            cohort: vec![CohortEnrollment {
                course_id: 4,
                cohort_id: 9,
                unenroll: false,
            }],
        });
        let RpcResponse::ManageCohortEnrollment(first) = fx.server.handle(enroll.clone()).unwrap()
        else {
            panic!("wrong response variant");
        };
        let RpcResponse::ManageCohortEnrollment(second) = fx.server.handle(enroll).unwrap() else {
            panic!("wrong response variant");
        };
        assert_eq!(first, second);

        let unenroll = RpcRequest::ManageCohortEnrollment(ManageCohortEnrollmentRequest {
            cohort: vec![CohortEnrollment {
                course_id: 4,
                cohort_id: 9,
                unenroll: true,
            }],
        });
        fx.server.handle(unenroll).unwrap();
        assert!(fx.directory.find_cohort_instance(4, 9).is_none());
    }

    #[test]
    fn cohort_enrollment_requires_the_plugin_to_be_enabled() {
        let fx = fixture(true);
        fx.directory.set_cohort_enrol_enabled(false);

        let err = fx
            .server
            .handle(RpcRequest::ManageCohortEnrollment(
                ManageCohortEnrollmentRequest { cohort: vec![] },
            ))
            .unwrap_err();
        assert!(matches!(err, ServerError::CohortEnrolDisabled));
    }

    #[test]
    fn delete_cohort_reports_partial_failure() {
        let fx = fixture(true);
        fx.directory.insert_cohort(9, "Batch A");

        let resp = fx.server.delete_cohort(DeleteCohortRequest {
            cohort: vec![CohortRef { cohort_id: 9 }, CohortRef { cohort_id: 10 }],
        });
        assert!(!resp.status);
        assert!(!fx.directory.cohort_exists(9));
    }

    #[test]
    fn user_cohort_enrollment_rejects_unknown_cohorts() {
        let fx = fixture(true);
        let resp = fx
            .server
            .manage_user_cohort_enrollment(ManageUserCohortEnrollmentRequest {
                cohort_id: 99,
                users: vec![],
            });
        assert!(resp.error);
        assert_eq!(resp.error_msg, "Cohort does not exist.");
    }

    #[test]
    fn user_cohort_enrollment_creates_and_reuses_accounts() {
        let fx = fixture(true);
        fx.directory.insert_cohort(9, "Batch A");
        seed_user(&fx.directory, 3, "existing", "known@example.org");

        let resp = fx
            .server
            .manage_user_cohort_enrollment(ManageUserCohortEnrollmentRequest {
                cohort_id: 9,
                users: vec![
                    CohortUser {
                        firstname: "New".into(),
                        lastname: "User".into(),
                        password: "pw-1".into(),
                        username: "existing".into(),
                        email: "new@example.org".into(),
                    },
                    CohortUser {
                        firstname: "Known".into(),
                        lastname: "User".into(),
                        password: "pw-2".into(),
                        username: "whatever".into(),
                        email: "known@example.org".into(),
                    },
                ],
            });
        assert!(!resp.error);
        assert_eq!(resp.users.len(), 2);

        // The new account got a uniqued username.
        assert_eq!(resp.users[0].username.as_deref(), Some("existing1"));
        assert!(resp.users[0].enrolled);
        // The known email reused the existing account.
        assert_eq!(resp.users[1].user_id, 3);
        assert!(resp.users[1].enrolled);

        // Re-adding the same member reports enrolled = 0.
        let again = fx
            .server
            .manage_user_cohort_enrollment(ManageUserCohortEnrollmentRequest {
                cohort_id: 9,
                users: vec![CohortUser {
                    firstname: "Known".into(),
                    lastname: "User".into(),
                    password: "pw-2".into(),
                    username: "whatever".into(),
                    email: "known@example.org".into(),
                }],
            });
        assert!(!again.users[0].enrolled);
    }

    #[test]
    fn sso_token_check_against_shared_secret() {
        let fx = fixture(false);
        let settings = SiteSettings::new(Arc::clone(&fx.store));

        // Unconfigured secret never verifies.
        let RpcResponse::VerifySsoToken(resp) = fx
            .server
            .handle(RpcRequest::VerifySsoToken(VerifySsoTokenRequest {
                token: String::new(),
            }))
            .unwrap()
        else {
            panic!("wrong response variant");
        };
        assert!(!resp.success);

        settings
            .save_sso_settings(&SsoSettings {
                shared_secret: "s3cret".into(),
                ..Default::default()
            })
            .unwrap();
        let RpcResponse::VerifySsoToken(resp) = fx
            .server
            .handle(RpcRequest::VerifySsoToken(VerifySsoTokenRequest {
                token: "s3cret".into(),
            }))
            .unwrap()
        else {
            panic!("wrong response variant");
        };
        assert!(resp.success);
    }

    #[test]
    fn enable_plugin_settings_forces_required_state() {
        let fx = fixture(false);
        let RpcResponse::EnablePluginSettings(resp) =
            fx.server.handle(RpcRequest::EnablePluginSettings).unwrap()
        else {
            panic!("wrong response variant");
        };
        assert!(resp.rest_protocol);
        assert!(resp.web_service);
        assert!(resp.disable_password);
        assert!(resp.allow_extended_char);
        assert_eq!(resp.lang_code, "en");
    }

    #[test]
    fn mandatory_settings_reflect_current_state() {
        let fx = fixture(false);
        let RpcResponse::GetMandatorySettings(before) =
            fx.server.handle(RpcRequest::GetMandatorySettings).unwrap()
        else {
            panic!("wrong response variant");
        };
        assert!(!before.rest_protocol);
        assert_eq!(before.student_role_id, 5);

        fx.server.handle(RpcRequest::EnablePluginSettings).unwrap();
        let RpcResponse::GetMandatorySettings(after) =
            fx.server.handle(RpcRequest::GetMandatorySettings).unwrap()
        else {
            panic!("wrong response variant");
        };
        assert!(after.rest_protocol);
        assert!(!after.password_policy);
    }

    #[test]
    fn token_gating_checks_service_membership() {
        let fx = fixture(false);
        seed_user(&fx.directory, 2, "admin", "admin@example.org");
        let service = fx
            .directory
            .create_service("narrow", &["auth_edwiserbridge_get_mandatory_settings"]);
        let token = fx.directory.issue_token(service, 2).unwrap();

        assert!(fx
            .server
            .handle_with_token(&token, RpcRequest::GetMandatorySettings)
            .is_ok());

        let err = fx
            .server
            .handle_with_token(&token, RpcRequest::EnablePluginSettings)
            .unwrap_err();
        assert!(matches!(err, ServerError::FunctionNotEnabled(f)
            if f == "auth_edwiserbridge_enable_plugin_settings"));

        let err = fx
            .server
            .handle_with_token("bogus", RpcRequest::GetMandatorySettings)
            .unwrap_err();
        assert!(matches!(err, ServerError::UnknownToken));
    }
}
