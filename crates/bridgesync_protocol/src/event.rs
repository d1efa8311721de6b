//! Outbound webhook events and their wire payloads.

/// The action discriminant carried in every outbound webhook payload.
///
/// The partner site routes on the string form, so the mapping in
/// [`EventAction::as_str`] is wire-frozen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventAction {
    /// A user was enrolled into a course.
    CourseEnrollment,
    /// A user was unenrolled from a course.
    CourseUnEnrollment,
    /// A user account was created.
    UserCreation,
    /// A user account (or its password) was updated.
    UserUpdated,
    /// A user account was deleted.
    UserDeletion,
    /// A course was created.
    CourseCreated,
    /// A course was deleted.
    CourseDeleted,
    /// An administrator-triggered connectivity probe.
    TestConnection,
}

impl EventAction {
    /// The wire string the partner routes on.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventAction::CourseEnrollment => "course_enrollment",
            EventAction::CourseUnEnrollment => "course_un_enrollment",
            EventAction::UserCreation => "user_creation",
            EventAction::UserUpdated => "user_updated",
            EventAction::UserDeletion => "user_deletion",
            EventAction::CourseCreated => "course_created",
            EventAction::CourseDeleted => "course_deleted",
            EventAction::TestConnection => "test_connection",
        }
    }
}

/// Identity fields shared by user-centric events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserIdentity {
    /// Local user id.
    pub user_id: u64,
    /// Login name.
    pub user_name: String,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Email address.
    pub email: String,
}

/// An ephemeral domain event destined for remote sites.
///
/// Events are site-independent: the per-site `secret_key` (and, for
/// password-bearing events, the per-site ciphertext) is injected by the
/// dispatcher at send time and never stored here. Nothing persists an
/// `OutboundEvent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    /// User enrolled into a course.
    CourseEnrollment {
        /// Who was enrolled.
        user: UserIdentity,
        /// The course they were enrolled into.
        course_id: u64,
    },
    /// User unenrolled from a course.
    CourseUnEnrollment {
        /// Who was unenrolled.
        user: UserIdentity,
        /// The course they were removed from.
        course_id: u64,
    },
    /// New user account.
    UserCreation {
        /// The new account.
        user: UserIdentity,
        /// Plaintext password, if one was supplied with the creating request.
        /// Encrypted per-site before transmission.
        password: Option<String>,
        /// JSON-encoded custom profile fields.
        custom_fields: String,
    },
    /// Updated user account.
    UserUpdated {
        /// The updated account.
        user: UserIdentity,
        /// Country code.
        country: String,
        /// City.
        city: String,
        /// Phone number.
        phone: String,
        /// New plaintext password, if the update changed it.
        password: Option<String>,
        /// JSON-encoded custom profile fields.
        custom_fields: String,
    },
    /// Password change without a profile update. Travels as `user_updated`.
    PasswordUpdated {
        /// Local user id.
        user_id: u64,
        /// Email address.
        email: String,
        /// The new plaintext password.
        password: Option<String>,
    },
    /// Deleted user account.
    UserDeletion {
        /// Local user id.
        user_id: u64,
    },
    /// New course.
    CourseCreated {
        /// Local course id.
        course_id: u64,
        /// Full display name.
        fullname: String,
        /// Course summary.
        summary: String,
        /// Category id.
        category_id: u64,
    },
    /// Deleted course.
    CourseDeleted {
        /// Local course id.
        course_id: u64,
    },
    /// Connectivity probe; carries only the action and secret.
    TestConnection,
}

impl OutboundEvent {
    /// The action discriminant for this event.
    pub fn action(&self) -> EventAction {
        match self {
            OutboundEvent::CourseEnrollment { .. } => EventAction::CourseEnrollment,
            OutboundEvent::CourseUnEnrollment { .. } => EventAction::CourseUnEnrollment,
            OutboundEvent::UserCreation { .. } => EventAction::UserCreation,
            OutboundEvent::UserUpdated { .. } | OutboundEvent::PasswordUpdated { .. } => {
                EventAction::UserUpdated
            }
            OutboundEvent::UserDeletion { .. } => EventAction::UserDeletion,
            OutboundEvent::CourseCreated { .. } => EventAction::CourseCreated,
            OutboundEvent::CourseDeleted { .. } => EventAction::CourseDeleted,
            OutboundEvent::TestConnection => EventAction::TestConnection,
        }
    }

    /// The plaintext password carried by this event, if any.
    pub fn plain_password(&self) -> Option<&str> {
        match self {
            OutboundEvent::UserCreation { password, .. }
            | OutboundEvent::UserUpdated { password, .. }
            | OutboundEvent::PasswordUpdated { password, .. } => password.as_deref(),
            _ => None,
        }
    }

    /// Builds the site-independent payload fields, starting with `action`.
    ///
    /// Password and `secret_key` fields are deliberately absent; the
    /// dispatcher appends them per site.
    pub fn base_fields(&self) -> Vec<(String, String)> {
        let mut fields = vec![("action".into(), self.action().as_str().into())];

        match self {
            OutboundEvent::CourseEnrollment { user, course_id }
            | OutboundEvent::CourseUnEnrollment { user, course_id } => {
                fields.push(("user_id".into(), user.user_id.to_string()));
                fields.push(("course_id".into(), course_id.to_string()));
                fields.push(("user_name".into(), user.user_name.clone()));
                fields.push(("first_name".into(), user.first_name.clone()));
                fields.push(("last_name".into(), user.last_name.clone()));
                fields.push(("email".into(), user.email.clone()));
            }
            OutboundEvent::UserCreation {
                user,
                custom_fields,
                ..
            } => {
                fields.push(("user_id".into(), user.user_id.to_string()));
                fields.push(("user_name".into(), user.user_name.clone()));
                fields.push(("first_name".into(), user.first_name.clone()));
                fields.push(("last_name".into(), user.last_name.clone()));
                fields.push(("email".into(), user.email.clone()));
                fields.push(("custom_fields".into(), custom_fields.clone()));
            }
            OutboundEvent::UserUpdated {
                user,
                country,
                city,
                phone,
                custom_fields,
                ..
            } => {
                fields.push(("user_id".into(), user.user_id.to_string()));
                fields.push(("first_name".into(), user.first_name.clone()));
                fields.push(("last_name".into(), user.last_name.clone()));
                fields.push(("email".into(), user.email.clone()));
                fields.push(("country".into(), country.clone()));
                fields.push(("city".into(), city.clone()));
                fields.push(("phone".into(), phone.clone()));
                fields.push(("custom_fields".into(), custom_fields.clone()));
            }
            OutboundEvent::PasswordUpdated { user_id, email, .. } => {
                fields.push(("user_id".into(), user_id.to_string()));
                fields.push(("email".into(), email.clone()));
            }
            OutboundEvent::UserDeletion { user_id } => {
                fields.push(("user_id".into(), user_id.to_string()));
            }
            OutboundEvent::CourseCreated {
                course_id,
                fullname,
                summary,
                category_id,
            } => {
                fields.push(("course_id".into(), course_id.to_string()));
                fields.push(("fullname".into(), fullname.clone()));
                fields.push(("summary".into(), summary.clone()));
                fields.push(("cat".into(), category_id.to_string()));
            }
            OutboundEvent::CourseDeleted { course_id } => {
                fields.push(("course_id".into(), course_id.to_string()));
            }
            OutboundEvent::TestConnection => {}
        }

        fields
    }
}
