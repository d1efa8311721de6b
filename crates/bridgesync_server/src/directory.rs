//! In-memory site directory backing the RPC surface.
//!
//! Holds the users, courses, cohorts, enrollments, and external services
//! the handlers operate on. A deployment adapts this to its real database;
//! the handlers only see the methods here.

use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

/// Default role id assigned to cohort-enrolled learners.
pub const DEFAULT_STUDENT_ROLE_ID: u64 = 5;

/// One user account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryUser {
    /// User id.
    pub id: u64,
    /// Login name, unique across the directory.
    pub username: String,
    /// First name.
    pub firstname: String,
    /// Last name.
    pub lastname: String,
    /// Email address.
    pub email: String,
    /// Whether the account is confirmed; unconfirmed accounts are hidden
    /// from listings.
    pub confirmed: bool,
}

/// One course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryCourse {
    /// Course id.
    pub id: u64,
    /// Full display name.
    pub fullname: String,
    /// Category id.
    pub categoryid: u64,
}

/// One cohort with its member set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cohort {
    /// Cohort name.
    pub name: String,
    /// Member user ids.
    pub members: BTreeSet<u64>,
}

/// One cohort-to-course enrollment instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CohortEnrolInstance {
    /// Instance id.
    pub id: u64,
    /// The course the cohort is enrolled into.
    pub course_id: u64,
    /// The enrolled cohort.
    pub cohort_id: u64,
}

/// One provisioned external service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExternalService {
    /// Service name.
    pub name: String,
    /// Functions enabled on this service.
    pub functions: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    users: BTreeMap<u64, DirectoryUser>,
    courses: BTreeMap<u64, DirectoryCourse>,
    cohorts: BTreeMap<u64, Cohort>,
    cohort_instances: BTreeMap<u64, CohortEnrolInstance>,
    enrollments: BTreeSet<(u64, u64)>,
    progress: BTreeMap<(u64, u64), u8>,
    services: BTreeMap<u64, ExternalService>,
    tokens: BTreeMap<String, u64>,
    next_user_id: u64,
    next_instance_id: u64,
    next_service_id: u64,
    cohort_enrol_enabled: bool,
    student_role_id: u64,
}

/// Thread-safe in-memory directory.
pub struct SiteDirectory {
    state: RwLock<DirectoryState>,
}

impl Default for SiteDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteDirectory {
    /// Creates an empty directory with cohort enrollment enabled.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(DirectoryState {
                next_user_id: 1,
                next_instance_id: 1,
                next_service_id: 1,
                cohort_enrol_enabled: true,
                student_role_id: DEFAULT_STUDENT_ROLE_ID,
                ..Default::default()
            }),
        }
    }

    // -- users ------------------------------------------------------------

    /// Inserts a fully specified user, for seeding.
    pub fn insert_user(&self, user: DirectoryUser) {
        let mut state = self.state.write();
        state.next_user_id = state.next_user_id.max(user.id + 1);
        state.users.insert(user.id, user);
    }

    /// Creates a confirmed user, uniquing the username with a numeric
    /// suffix on collision. Returns the new id and the final username.
    pub fn create_user(
        &self,
        username: &str,
        firstname: &str,
        lastname: &str,
        email: &str,
    ) -> (u64, String) {
        let mut state = self.state.write();
        let mut final_name = username.to_string();
        let mut suffix = 1u32;
        while state.users.values().any(|u| u.username == final_name) {
            final_name = format!("{username}{suffix}");
            suffix += 1;
        }

        let id = state.next_user_id;
        state.next_user_id += 1;
        state.users.insert(
            id,
            DirectoryUser {
                id,
                username: final_name.clone(),
                firstname: firstname.into(),
                lastname: lastname.into(),
                email: email.into(),
                confirmed: true,
            },
        );
        (id, final_name)
    }

    /// Finds a user id by email.
    pub fn user_by_email(&self, email: &str) -> Option<u64> {
        self.state
            .read()
            .users
            .values()
            .find(|u| u.email == email)
            .map(|u| u.id)
    }

    /// Whether a user with the given id exists.
    pub fn user_exists(&self, id: u64) -> bool {
        self.state.read().users.contains_key(&id)
    }

    /// A page of confirmed users, filtered on first name, last name, or
    /// username. Returns the page and the unfiltered total.
    pub fn users_page(
        &self,
        offset: usize,
        limit: usize,
        search: &str,
    ) -> (Vec<DirectoryUser>, u64) {
        let state = self.state.read();
        let listed: Vec<&DirectoryUser> = state
            .users
            .values()
            .filter(|u| u.confirmed && u.username != "guest")
            .collect();
        let total = listed.len() as u64;

        let page = listed
            .into_iter()
            .filter(|u| {
                search.is_empty()
                    || u.firstname.contains(search)
                    || u.lastname.contains(search)
                    || u.username.contains(search)
            })
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        (page, total)
    }

    // -- courses ----------------------------------------------------------

    /// Inserts a course, for seeding.
    pub fn insert_course(&self, course: DirectoryCourse) {
        self.state.write().courses.insert(course.id, course);
    }

    /// A page of courses, filtered on full name. Returns the page and the
    /// unfiltered total.
    pub fn courses_page(
        &self,
        offset: usize,
        limit: usize,
        search: &str,
    ) -> (Vec<DirectoryCourse>, u64) {
        let state = self.state.read();
        let total = state.courses.len() as u64;
        let page = state
            .courses
            .values()
            .filter(|c| search.is_empty() || c.fullname.contains(search))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        (page, total)
    }

    /// Whether a course with the given id exists.
    pub fn course_exists(&self, id: u64) -> bool {
        self.state.read().courses.contains_key(&id)
    }

    // -- enrollment and progress ------------------------------------------

    /// Enrolls a user into a course.
    pub fn enroll(&self, user_id: u64, course_id: u64) {
        self.state.write().enrollments.insert((user_id, course_id));
    }

    /// Records a user's completion percentage in a course.
    pub fn set_progress(&self, user_id: u64, course_id: u64, completion: u8) {
        self.state
            .write()
            .progress
            .insert((user_id, course_id), completion.min(100));
    }

    /// Completion per enrolled course; unstarted courses report zero.
    pub fn progress_for(&self, user_id: u64) -> Vec<(u64, u8)> {
        let state = self.state.read();
        state
            .enrollments
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .map(|&(_, course_id)| {
                let completion = state
                    .progress
                    .get(&(user_id, course_id))
                    .copied()
                    .unwrap_or(0);
                (course_id, completion)
            })
            .collect()
    }

    // -- cohorts ----------------------------------------------------------

    /// Inserts a cohort, for seeding. Returns its id.
    pub fn insert_cohort(&self, id: u64, name: &str) -> u64 {
        self.state.write().cohorts.insert(
            id,
            Cohort {
                name: name.into(),
                members: BTreeSet::new(),
            },
        );
        id
    }

    /// Whether a cohort with the given id exists.
    pub fn cohort_exists(&self, id: u64) -> bool {
        self.state.read().cohorts.contains_key(&id)
    }

    /// Adds a user to a cohort. Returns whether the user was newly added.
    pub fn add_cohort_member(&self, cohort_id: u64, user_id: u64) -> bool {
        let mut state = self.state.write();
        match state.cohorts.get_mut(&cohort_id) {
            Some(cohort) => cohort.members.insert(user_id),
            None => false,
        }
    }

    /// Deletes a cohort and its enrollment instances. Returns whether the
    /// cohort existed.
    pub fn delete_cohort(&self, cohort_id: u64) -> bool {
        let mut state = self.state.write();
        let existed = state.cohorts.remove(&cohort_id).is_some();
        if existed {
            state
                .cohort_instances
                .retain(|_, inst| inst.cohort_id != cohort_id);
        }
        existed
    }

    /// Whether cohort enrollment is enabled site-wide.
    pub fn cohort_enrol_enabled(&self) -> bool {
        self.state.read().cohort_enrol_enabled
    }

    /// Toggles site-wide cohort enrollment.
    pub fn set_cohort_enrol_enabled(&self, enabled: bool) {
        self.state.write().cohort_enrol_enabled = enabled;
    }

    /// The enrollment instance binding a cohort to a course, if any.
    pub fn find_cohort_instance(&self, course_id: u64, cohort_id: u64) -> Option<u64> {
        self.state
            .read()
            .cohort_instances
            .values()
            .find(|inst| inst.course_id == course_id && inst.cohort_id == cohort_id)
            .map(|inst| inst.id)
    }

    /// Creates an enrollment instance binding a cohort to a course.
    pub fn add_cohort_instance(&self, course_id: u64, cohort_id: u64) -> u64 {
        let mut state = self.state.write();
        let id = state.next_instance_id;
        state.next_instance_id += 1;
        state.cohort_instances.insert(
            id,
            CohortEnrolInstance {
                id,
                course_id,
                cohort_id,
            },
        );
        id
    }

    /// Removes every instance binding `cohort_id` to `course_id`.
    pub fn remove_cohort_instances(&self, course_id: u64, cohort_id: u64) {
        self.state
            .write()
            .cohort_instances
            .retain(|_, inst| !(inst.course_id == course_id && inst.cohort_id == cohort_id));
    }

    // -- services and tokens ----------------------------------------------

    /// Creates an external service with the given enabled functions.
    pub fn create_service(&self, name: &str, functions: &[&str]) -> u64 {
        let mut state = self.state.write();
        let id = state.next_service_id;
        state.next_service_id += 1;
        state.services.insert(
            id,
            ExternalService {
                name: name.into(),
                functions: functions.iter().map(|f| (*f).to_string()).collect(),
            },
        );
        id
    }

    /// Issues a token bound to a service for the given user.
    ///
    /// Token derivation is deterministic per (service, user, name) so the
    /// directory stays reproducible in tests.
    pub fn issue_token(&self, service_id: u64, user_id: u64) -> Option<String> {
        let mut state = self.state.write();
        let name = state.services.get(&service_id)?.name.clone();
        let digest = Sha256::digest(format!("{service_id}:{user_id}:{name}").as_bytes());
        let token: String = digest
            .iter()
            .take(16)
            .map(|b| format!("{b:02x}"))
            .collect();
        state.tokens.insert(token.clone(), service_id);
        Some(token)
    }

    /// The service a token is bound to, if any.
    pub fn token_service(&self, token: &str) -> Option<u64> {
        self.state.read().tokens.get(token).copied()
    }

    /// The functions enabled on a service.
    pub fn service_functions(&self, service_id: u64) -> Option<BTreeSet<String>> {
        self.state
            .read()
            .services
            .get(&service_id)
            .map(|s| s.functions.clone())
    }

    /// Enables additional functions on a service. Returns how many were
    /// newly added.
    pub fn enable_service_functions(&self, service_id: u64, functions: &[&str]) -> usize {
        let mut state = self.state.write();
        match state.services.get_mut(&service_id) {
            Some(service) => functions
                .iter()
                .filter(|f| service.functions.insert((**f).to_string()))
                .count(),
            None => 0,
        }
    }

    /// The role id assigned to cohort-enrolled learners.
    pub fn student_role_id(&self) -> u64 {
        self.state.read().student_role_id
    }
}
