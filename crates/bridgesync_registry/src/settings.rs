//! Host-platform settings the bridge depends on.

use crate::error::RegistryResult;
use crate::store::ConfigStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

const WEBSERVICE_PROTOCOLS_KEY: &str = "webserviceprotocols";
const ENABLE_WEB_SERVICES_KEY: &str = "enablewebservices";
const EXTENDED_USERNAME_KEY: &str = "extendedusernamechars";
const PASSWORD_POLICY_KEY: &str = "passwordpolicy";
const AUTO_UPDATE_CHECK_KEY: &str = "enable_auto_update_check";
const LANG_KEY: &str = "lang";
const SETUP_PROGRESS_KEY: &str = "eb_setup_progress";

/// Config key remembering the service the setup flow selected or created.
pub const SELECTED_SERVICE_KEY: &str = "ebexistingserviceselect";
/// Config key remembering the most recently issued service token.
pub const LAST_TOKEN_KEY: &str = "edwiser_bridge_last_created_token";

const SHARED_SECRET_KEY: &str = "sharedsecret";
const SSO_SITE_URL_KEY: &str = "wpsiteurl";
const SSO_LOGOUT_REDIRECT_KEY: &str = "logoutredirecturl";
const SSO_LOGIN_BTN_ENABLED_KEY: &str = "wploginenablebtn";
const SSO_LOGIN_BTN_TEXT_KEY: &str = "wploginbtntext";

/// The host-platform switches the bridge needs in a particular position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredSettings {
    /// REST protocol is among the enabled web service protocols.
    pub rest_protocol: bool,
    /// Web services are enabled at all.
    pub web_service: bool,
    /// Extended characters are allowed in usernames.
    pub extended_username: bool,
    /// Password policy enforcement; the bridge wants this off so partner
    /// generated passwords are accepted verbatim.
    pub pass_policy: bool,
    /// Background plugin-update checks are enabled.
    pub auto_update_check: bool,
}

/// Overall health of the bridge configuration, as shown on the summary page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryStatus {
    /// Every switch is in position and a service token exists.
    Success,
    /// Switches are in position but no service is selected or no token has
    /// been issued yet.
    Warning,
    /// At least one required switch is in the wrong position.
    Error,
}

/// Single sign-on settings for the partner site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsoSettings {
    /// Shared secret the partner signs SSO payloads with.
    pub shared_secret: String,
    /// Partner site URL used for login redirects.
    pub wp_site_url: String,
    /// Where to send the browser after logout.
    pub logout_redirect_url: String,
    /// Whether the partner-login button is shown.
    pub login_button_enabled: bool,
    /// Label on the partner-login button.
    pub login_button_text: String,
}

/// Reads and writes host-platform settings through a [`ConfigStore`].
pub struct SiteSettings<S> {
    store: Arc<S>,
}

impl<S: ConfigStore> SiteSettings<S> {
    /// Creates a settings handle over the given storage backend.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    fn flag(&self, key: &str, default: bool) -> RegistryResult<bool> {
        Ok(match self.store.get(key)?.as_deref() {
            Some(v) => v == "1",
            None => default,
        })
    }

    fn set_flag(&self, key: &str, value: bool) -> RegistryResult<()> {
        self.store.set(key, if value { "1" } else { "0" })
    }

    fn rest_enabled(&self) -> RegistryResult<bool> {
        let protocols = self.store.get(WEBSERVICE_PROTOCOLS_KEY)?.unwrap_or_default();
        Ok(protocols.split(',').any(|p| p == "rest"))
    }

    fn set_rest_enabled(&self, enabled: bool) -> RegistryResult<()> {
        let protocols = self.store.get(WEBSERVICE_PROTOCOLS_KEY)?.unwrap_or_default();
        let mut active: Vec<&str> = protocols.split(',').filter(|p| !p.is_empty()).collect();
        active.retain(|p| *p != "rest");
        if enabled {
            active.push("rest");
        }
        self.store.set(WEBSERVICE_PROTOCOLS_KEY, &active.join(","))
    }

    /// The current position of every required switch.
    pub fn required_settings(&self) -> RegistryResult<RequiredSettings> {
        Ok(RequiredSettings {
            rest_protocol: self.rest_enabled()?,
            web_service: self.flag(ENABLE_WEB_SERVICES_KEY, false)?,
            extended_username: self.flag(EXTENDED_USERNAME_KEY, false)?,
            pass_policy: self.flag(PASSWORD_POLICY_KEY, false)?,
            auto_update_check: self.flag(AUTO_UPDATE_CHECK_KEY, true)?,
        })
    }

    /// Writes every required switch at once.
    pub fn apply_required_settings(&self, settings: RequiredSettings) -> RegistryResult<()> {
        self.set_rest_enabled(settings.rest_protocol)?;
        self.set_flag(ENABLE_WEB_SERVICES_KEY, settings.web_service)?;
        self.set_flag(EXTENDED_USERNAME_KEY, settings.extended_username)?;
        self.set_flag(PASSWORD_POLICY_KEY, settings.pass_policy)?;
        self.set_flag(AUTO_UPDATE_CHECK_KEY, settings.auto_update_check)
    }

    /// Forces every switch into the position the bridge requires and returns
    /// the resulting state.
    pub fn enable_required_settings(&self) -> RegistryResult<RequiredSettings> {
        info!("forcing bridge-required platform settings");
        self.set_rest_enabled(true)?;
        self.set_flag(ENABLE_WEB_SERVICES_KEY, true)?;
        self.set_flag(EXTENDED_USERNAME_KEY, true)?;
        self.set_flag(PASSWORD_POLICY_KEY, false)?;
        self.required_settings()
    }

    /// Names of switches currently in the wrong position.
    pub fn misconfigured(&self) -> RegistryResult<Vec<&'static str>> {
        let current = self.required_settings()?;
        let mut wrong = Vec::new();
        if !current.rest_protocol {
            wrong.push("rest_protocol");
        }
        if !current.web_service {
            wrong.push("web_service");
        }
        if !current.extended_username {
            wrong.push("extended_username");
        }
        if current.pass_policy {
            wrong.push("pass_policy");
        }
        Ok(wrong)
    }

    /// Site language code; defaults to `en`.
    pub fn lang_code(&self) -> RegistryResult<String> {
        Ok(self.store.get(LANG_KEY)?.unwrap_or_else(|| "en".into()))
    }

    /// Sets the site language code.
    pub fn set_lang_code(&self, lang: &str) -> RegistryResult<()> {
        self.store.set(LANG_KEY, lang)
    }

    /// Current single sign-on settings; absent fields read as empty.
    pub fn sso_settings(&self) -> RegistryResult<SsoSettings> {
        Ok(SsoSettings {
            shared_secret: self.store.get(SHARED_SECRET_KEY)?.unwrap_or_default(),
            wp_site_url: self.store.get(SSO_SITE_URL_KEY)?.unwrap_or_default(),
            logout_redirect_url: self.store.get(SSO_LOGOUT_REDIRECT_KEY)?.unwrap_or_default(),
            login_button_enabled: self.flag(SSO_LOGIN_BTN_ENABLED_KEY, false)?,
            login_button_text: self.store.get(SSO_LOGIN_BTN_TEXT_KEY)?.unwrap_or_default(),
        })
    }

    /// Replaces the single sign-on settings.
    pub fn save_sso_settings(&self, sso: &SsoSettings) -> RegistryResult<()> {
        self.store.set(SHARED_SECRET_KEY, &sso.shared_secret)?;
        self.store.set(SSO_SITE_URL_KEY, &sso.wp_site_url)?;
        self.store
            .set(SSO_LOGOUT_REDIRECT_KEY, &sso.logout_redirect_url)?;
        self.set_flag(SSO_LOGIN_BTN_ENABLED_KEY, sso.login_button_enabled)?;
        self.store.set(SSO_LOGIN_BTN_TEXT_KEY, &sso.login_button_text)
    }

    /// Rolls the switch positions and provisioning state up into one
    /// traffic-light status.
    pub fn summary_status(&self) -> RegistryResult<SummaryStatus> {
        if !self.misconfigured()?.is_empty() {
            return Ok(SummaryStatus::Error);
        }
        let service_selected = self
            .store
            .get(SELECTED_SERVICE_KEY)?
            .is_some_and(|v| !v.is_empty() && v != "-1");
        let token_issued = self
            .store
            .get(LAST_TOKEN_KEY)?
            .is_some_and(|v| !v.is_empty());
        if service_selected && token_issued {
            Ok(SummaryStatus::Success)
        } else {
            Ok(SummaryStatus::Warning)
        }
    }

    /// The last completed step of the guided setup, if any.
    pub fn setup_progress(&self) -> RegistryResult<Option<String>> {
        self.store.get(SETUP_PROGRESS_KEY)
    }

    /// Records the last completed setup step.
    pub fn set_setup_progress(&self, step: &str) -> RegistryResult<()> {
        self.store.set(SETUP_PROGRESS_KEY, step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryConfigStore;

    fn settings() -> SiteSettings<MemoryConfigStore> {
        SiteSettings::new(Arc::new(MemoryConfigStore::new()))
    }

    #[test]
    fn fresh_install_is_fully_misconfigured() {
        let settings = settings();
        assert_eq!(
            settings.misconfigured().unwrap(),
            vec!["rest_protocol", "web_service", "extended_username"]
        );
    }

    #[test]
    fn enable_required_fixes_everything() {
        let settings = settings();
        let state = settings.enable_required_settings().unwrap();
        assert!(state.rest_protocol);
        assert!(state.web_service);
        assert!(state.extended_username);
        assert!(!state.pass_policy);
        assert!(settings.misconfigured().unwrap().is_empty());
    }

    #[test]
    fn rest_toggle_preserves_other_protocols() {
        let settings = settings();
        settings
            .store
            .set(WEBSERVICE_PROTOCOLS_KEY, "soap,xmlrpc")
            .unwrap();
        settings.set_rest_enabled(true).unwrap();
        assert_eq!(
            settings.store.get(WEBSERVICE_PROTOCOLS_KEY).unwrap().unwrap(),
            "soap,xmlrpc,rest"
        );
        settings.set_rest_enabled(false).unwrap();
        assert_eq!(
            settings.store.get(WEBSERVICE_PROTOCOLS_KEY).unwrap().unwrap(),
            "soap,xmlrpc"
        );
    }

    #[test]
    fn pass_policy_on_is_flagged() {
        let settings = settings();
        settings.enable_required_settings().unwrap();
        settings.set_flag(PASSWORD_POLICY_KEY, true).unwrap();
        assert_eq!(settings.misconfigured().unwrap(), vec!["pass_policy"]);
    }

    #[test]
    fn sso_settings_roundtrip() {
        let settings = settings();
        assert_eq!(settings.sso_settings().unwrap(), SsoSettings::default());

        let sso = SsoSettings {
            shared_secret: "s3cret".into(),
            wp_site_url: "https://shop.example.org".into(),
            logout_redirect_url: "https://shop.example.org/bye".into(),
            login_button_enabled: true,
            login_button_text: "Log in via shop".into(),
        };
        settings.save_sso_settings(&sso).unwrap();
        assert_eq!(settings.sso_settings().unwrap(), sso);
    }

    #[test]
    fn setup_progress_marker() {
        let settings = settings();
        assert!(settings.setup_progress().unwrap().is_none());
        settings.set_setup_progress("web_service").unwrap();
        assert_eq!(
            settings.setup_progress().unwrap().as_deref(),
            Some("web_service")
        );
    }

    #[test]
    fn summary_status_traffic_light() {
        let settings = settings();
        assert_eq!(settings.summary_status().unwrap(), SummaryStatus::Error);

        settings.enable_required_settings().unwrap();
        assert_eq!(settings.summary_status().unwrap(), SummaryStatus::Warning);

        settings.store.set(SELECTED_SERVICE_KEY, "3").unwrap();
        settings.store.set(LAST_TOKEN_KEY, "tok-abc").unwrap();
        assert_eq!(settings.summary_status().unwrap(), SummaryStatus::Success);

        // A placeholder selection does not count as a service.
        settings.store.set(SELECTED_SERVICE_KEY, "-1").unwrap();
        assert_eq!(settings.summary_status().unwrap(), SummaryStatus::Warning);
    }

    #[test]
    fn lang_code_defaults_to_en() {
        let settings = settings();
        assert_eq!(settings.lang_code().unwrap(), "en");
        settings.set_lang_code("de").unwrap();
        assert_eq!(settings.lang_code().unwrap(), "de");
    }
}
