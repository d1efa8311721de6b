//! License subsystem configuration.

use std::time::Duration;

/// Default license server request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP status codes accepted as a real answer from the license server.
/// Anything else is treated the same as no response at all.
pub const VALID_STATUS_CODES: [u16; 2] = [200, 301];

/// Settings for talking to the license server.
#[derive(Debug, Clone)]
pub struct LicenseConfig {
    /// License server endpoint.
    pub store_url: String,
    /// Product name registered with the store.
    pub item_name: String,
    /// Slug used as the prefix of every persisted license key.
    pub plugin_slug: String,
    /// Installed product version, reported with every request.
    pub current_version: String,
    /// This site's own URL, reported with every request.
    pub site_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Whether to verify the license server's TLS certificate. Off by
    /// default, matching long-standing deployed behavior; see DESIGN.md.
    pub verify_tls: bool,
}

impl LicenseConfig {
    /// Creates a config for the given store endpoint and site.
    pub fn new(
        store_url: impl Into<String>,
        item_name: impl Into<String>,
        current_version: impl Into<String>,
        site_url: impl Into<String>,
    ) -> Self {
        Self {
            store_url: store_url.into(),
            item_name: item_name.into(),
            plugin_slug: "moodle_edwiser_bridge".into(),
            current_version: current_version.into(),
            site_url: site_url.into(),
            timeout: DEFAULT_TIMEOUT,
            verify_tls: false,
        }
    }

    /// Overrides the persisted-key slug.
    pub fn with_plugin_slug(mut self, slug: impl Into<String>) -> Self {
        self.plugin_slug = slug.into();
        self
    }

    /// Overrides the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enables TLS certificate verification.
    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    /// Config key holding the license key.
    pub fn license_key_key(&self) -> String {
        format!("edd_{}_license_key", self.plugin_slug)
    }

    /// Config key holding the last classified status.
    pub fn status_key(&self) -> String {
        format!("edd_{}_license_status", self.plugin_slug)
    }

    /// Config key holding the cached status transient.
    pub fn transient_key(&self) -> String {
        format!("wdm_{}_license_trans", self.plugin_slug)
    }

    /// Config key holding the renewal link.
    pub fn renew_link_key(&self) -> String {
        format!("wdm_{}_product_site", self.plugin_slug)
    }

    /// Config key holding the list of sites the key is active on.
    pub fn activated_sites_key(&self) -> String {
        format!("wdm_{}_license_key_sites", self.plugin_slug)
    }

    /// Config key holding the activation limit.
    pub fn max_sites_key(&self) -> String {
        format!("wdm_{}_license_max_site", self.plugin_slug)
    }
}
