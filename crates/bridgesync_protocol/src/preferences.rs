//! Per-site synchronization preference flags.

use crate::event::EventAction;
use crate::serde_util::bool_as_int;
use serde::{Deserialize, Serialize};

/// Per-site, per-event-type gates controlling outbound dispatch.
///
/// A site with no stored preference entry is treated as all-false: nothing is
/// synchronized until an administrator opts the site in. Flags travel on the
/// wire as `0`/`1` integers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPreferences {
    /// Notify the site when a user is enrolled into a course.
    #[serde(with = "bool_as_int", default)]
    pub course_enrollment: bool,
    /// Notify the site when a user is unenrolled from a course.
    #[serde(with = "bool_as_int", default)]
    pub course_un_enrollment: bool,
    /// Notify the site when a user account is created.
    #[serde(with = "bool_as_int", default)]
    pub user_creation: bool,
    /// Notify the site when a user account is updated (including passwords).
    #[serde(with = "bool_as_int", default)]
    pub user_updation: bool,
    /// Notify the site when a user account is deleted.
    #[serde(with = "bool_as_int", default)]
    pub user_deletion: bool,
    /// Notify the site when a course is created.
    #[serde(with = "bool_as_int", default)]
    pub course_creation: bool,
    /// Notify the site when a course is deleted.
    #[serde(with = "bool_as_int", default)]
    pub course_deletion: bool,
}

impl SyncPreferences {
    /// Preferences with every flag enabled.
    pub fn all_enabled() -> Self {
        Self {
            course_enrollment: true,
            course_un_enrollment: true,
            user_creation: true,
            user_updation: true,
            user_deletion: true,
            course_creation: true,
            course_deletion: true,
        }
    }

    /// Returns whether dispatch of the given action is enabled for this site.
    ///
    /// Test-connection probes are not preference-gated: they are sent
    /// explicitly by an administrator, never by an observer.
    pub fn allows(&self, action: EventAction) -> bool {
        match action {
            EventAction::CourseEnrollment => self.course_enrollment,
            EventAction::CourseUnEnrollment => self.course_un_enrollment,
            EventAction::UserCreation => self.user_creation,
            EventAction::UserUpdated => self.user_updation,
            EventAction::UserDeletion => self.user_deletion,
            EventAction::CourseCreated => self.course_creation,
            EventAction::CourseDeleted => self.course_deletion,
            EventAction::TestConnection => true,
        }
    }
}
