//! Web service capability sets and the entitlement seam.
//!
//! The bridge expects its service to expose a fixed set of external
//! functions. The base set ships with the free tier; the cohort functions
//! require an active license, and the single sign-on check ships with the
//! SSO add-on. Function names are wire-frozen.

use crate::directory::SiteDirectory;
use bridgesync_license::{Clock, LicenseManager, LicenseTransport};
use bridgesync_registry::ConfigStore;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Functions every bridge service must expose.
pub const CORE_FUNCTIONS: [&str; 18] = [
    "core_user_create_users",
    "core_user_get_users_by_field",
    "core_user_update_users",
    "core_course_get_courses",
    "core_course_get_categories",
    "enrol_manual_enrol_users",
    "enrol_manual_unenrol_users",
    "core_enrol_get_users_courses",
    "auth_edwiserbridge_test_connection",
    "auth_edwiserbridge_get_site_data",
    "auth_edwiserbridge_get_course_progress",
    "auth_edwiserbridge_get_edwiser_plugins_info",
    "auth_edwiserbridge_get_course_enrollment_method",
    "auth_edwiserbridge_update_course_enrollment_method",
    "auth_edwiserbridge_get_mandatory_settings",
    "auth_edwiserbridge_enable_plugin_settings",
    "auth_edwiserbridge_get_users",
    "auth_edwiserbridge_get_courses",
];

/// Functions the cohort features need, gated on an active license.
pub const LICENSED_FUNCTIONS: [&str; 9] = [
    "core_cohort_add_cohort_members",
    "core_cohort_create_cohorts",
    "core_role_assign_roles",
    "core_role_unassign_roles",
    "core_cohort_delete_cohort_members",
    "core_cohort_get_cohorts",
    "auth_edwiserbridge_manage_cohort_enrollment",
    "auth_edwiserbridge_delete_cohort",
    "auth_edwiserbridge_manage_user_cohort_enrollment",
];

/// Functions the single sign-on add-on needs.
pub const SSO_FUNCTIONS: [&str; 1] = ["auth_edwiserbridge_verify_sso_token"];

/// Answers whether licensed functionality is currently usable.
///
/// The production implementation is [`LicenseManager`]; tests pin the
/// answer with [`FixedEntitlement`].
pub trait EntitlementSource {
    /// Whether the cohort tier is usable right now.
    fn licensed(&self) -> bool;
}

impl<S: ConfigStore, T: LicenseTransport, C: Clock> EntitlementSource for LicenseManager<S, T, C> {
    fn licensed(&self) -> bool {
        match self.availability() {
            Ok(availability) => availability.is_available(),
            Err(err) => {
                warn!(%err, "entitlement check failed, treating as unlicensed");
                false
            }
        }
    }
}

/// Entitlement source with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedEntitlement(pub bool);

impl EntitlementSource for FixedEntitlement {
    fn licensed(&self) -> bool {
        self.0
    }
}

/// Every function a fully provisioned service needs, given the current
/// entitlement. The SSO check is always included; the partner site simply
/// never calls it without the add-on.
pub fn required_functions(licensed: bool) -> Vec<&'static str> {
    let mut functions: Vec<&'static str> = CORE_FUNCTIONS.to_vec();
    if licensed {
        functions.extend_from_slice(&LICENSED_FUNCTIONS);
    }
    functions.extend_from_slice(&SSO_FUNCTIONS);
    functions
}

/// How many required functions a service is missing.
pub fn count_missing(enabled: &BTreeSet<String>, licensed: bool) -> usize {
    required_functions(licensed)
        .iter()
        .filter(|f| !enabled.contains(**f))
        .count()
}

/// Enables every missing required function on a service, bringing an older
/// or hand-built service up to the current tier. Returns how many were
/// added.
pub fn ensure_required_functions(
    directory: &SiteDirectory,
    service_id: u64,
    licensed: bool,
) -> usize {
    let added = directory.enable_service_functions(service_id, &required_functions(licensed));
    if added > 0 {
        info!(service_id, added, "enabled missing web service functions");
    }
    added
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_set_grows_with_license() {
        let free = required_functions(false);
        let licensed = required_functions(true);
        assert_eq!(free.len(), 19);
        assert_eq!(licensed.len(), 28);
        assert!(licensed.contains(&"auth_edwiserbridge_manage_cohort_enrollment"));
        assert!(!free.contains(&"core_cohort_create_cohorts"));
        // The SSO check is in both tiers.
        assert!(free.contains(&"auth_edwiserbridge_verify_sso_token"));
    }

    #[test]
    fn missing_count_reflects_gaps() {
        let mut enabled: BTreeSet<String> = required_functions(true)
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(count_missing(&enabled, true), 0);

        enabled.remove("core_cohort_get_cohorts");
        enabled.remove("auth_edwiserbridge_get_users");
        assert_eq!(count_missing(&enabled, true), 2);
        // Without the license the cohort gap does not count.
        assert_eq!(count_missing(&enabled, false), 1);
    }

    #[test]
    fn ensure_fills_in_missing_functions() {
        let dir = SiteDirectory::new();
        let service = dir.create_service("legacy", &["core_user_create_users"]);

        let added = ensure_required_functions(&dir, service, false);
        assert_eq!(added, required_functions(false).len() - 1);
        assert_eq!(count_missing(&dir.service_functions(service).unwrap(), false), 0);

        // Upgrading to the licensed tier adds only the cohort set.
        let upgraded = ensure_required_functions(&dir, service, true);
        assert_eq!(upgraded, LICENSED_FUNCTIONS.len());
        assert_eq!(ensure_required_functions(&dir, service, true), 0);
    }

    #[test]
    fn fixed_entitlement_is_constant() {
        assert!(FixedEntitlement(true).licensed());
        assert!(!FixedEntitlement(false).licensed());
    }
}
