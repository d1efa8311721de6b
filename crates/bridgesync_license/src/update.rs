//! Plugin update feed polling.

use crate::clock::Clock;
use crate::config::LicenseConfig;
use crate::error::LicenseResult;
use crate::transport::LicenseTransport;
use bridgesync_registry::ConfigStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default update feed location.
pub const DEFAULT_FEED_URL: &str =
    "https://edwiser.org/edwiserdemoimporter/bridge-free-plugin-info.json";

const THROTTLE_KEY: &str = "plugin_update_transient";
const AUTO_CHECK_KEY: &str = "enable_auto_update_check";
const FEED_CACHE_KEY: &str = "edwiserbridge_plugins_versions";
const UPDATE_AVAILABLE_KEY: &str = "edwiserbridge_update_available";
const UPDATE_MSG_KEY: &str = "edwiserbridge_update_msg";
const UPDATE_DISMISSED_KEY: &str = "edwiserbridge_dismiss_update_notification";
const UPDATE_DATA_KEY: &str = "edwiserbridge_update_data";

const THROTTLE_SECS: i64 = 7 * 24 * 60 * 60;
const FEED_CACHE_SECS: i64 = 24 * 60 * 60;

/// One published release from the update feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRelease {
    /// Published version.
    pub version: String,
    /// Download location.
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Deserialize)]
struct PluginFeed {
    moodle_edwiser_bridge: Option<PluginRelease>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedFeed {
    time: i64,
    data: String,
}

/// Polls the update feed and records a pending-update notification.
///
/// Polling is throttled to once per week, and a fetched feed body is cached
/// for a day so other surfaces can render version info without refetching.
pub struct UpdateChecker<S, T, C> {
    store: Arc<S>,
    transport: T,
    clock: C,
    http: LicenseConfig,
    feed_url: String,
    installed_version: String,
}

impl<S: ConfigStore, T: LicenseTransport, C: Clock> UpdateChecker<S, T, C> {
    /// Creates a checker reusing the license subsystem's HTTP settings.
    pub fn new(store: Arc<S>, transport: T, clock: C, http: LicenseConfig) -> Self {
        let installed_version = http.current_version.clone();
        Self {
            store,
            transport,
            clock,
            http,
            feed_url: DEFAULT_FEED_URL.into(),
            installed_version,
        }
    }

    /// Overrides the feed location.
    pub fn with_feed_url(mut self, url: impl Into<String>) -> Self {
        self.feed_url = url.into();
        self
    }

    /// Runs a check if auto-checking is enabled and the weekly throttle
    /// window has passed. Returns whether a check actually ran.
    pub fn maybe_check(&self) -> LicenseResult<bool> {
        let auto_enabled = self
            .store
            .get(AUTO_CHECK_KEY)?
            .map_or(true, |v| v == "1");
        if !auto_enabled {
            return Ok(false);
        }

        let throttle_until: i64 = self
            .store
            .get(THROTTLE_KEY)?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        if self.clock.now() < throttle_until {
            debug!("update check throttled");
            return Ok(false);
        }

        self.check_now()?;
        self.store.set(
            THROTTLE_KEY,
            &(self.clock.now() + THROTTLE_SECS).to_string(),
        )?;
        Ok(true)
    }

    /// Fetches the feed immediately, ignoring the throttle.
    ///
    /// Returns the published release when it is newer than the installed
    /// version. Feed outages are swallowed; the previous notification state
    /// stays in place.
    pub fn check_now(&self) -> LicenseResult<Option<PluginRelease>> {
        let response = match self.transport.get(&self.feed_url, &self.http) {
            Ok(response) if response.status == 200 => response,
            Ok(response) => {
                warn!(status = response.status, "update feed returned unexpected status");
                return Ok(None);
            }
            Err(err) => {
                warn!(%err, "update feed unreachable");
                return Ok(None);
            }
        };

        let cached = CachedFeed {
            time: self.clock.now() + FEED_CACHE_SECS,
            data: response.body.clone(),
        };
        if let Ok(blob) = serde_json::to_string(&cached) {
            self.store.set(FEED_CACHE_KEY, &blob)?;
        }

        let feed: PluginFeed = match serde_json::from_str(&response.body) {
            Ok(feed) => feed,
            Err(err) => {
                warn!(%err, "update feed body unparseable");
                return Ok(None);
            }
        };
        let Some(release) = feed.moodle_edwiser_bridge else {
            return Ok(None);
        };

        if version_newer(&release.version, &self.installed_version) {
            info!(version = %release.version, "plugin update available");
            self.store.set(UPDATE_AVAILABLE_KEY, "1")?;
            self.store.set(UPDATE_DISMISSED_KEY, "0")?;
            self.store.set(
                UPDATE_MSG_KEY,
                &format!(
                    "Version {} of the bridge plugin is available (installed: {}).",
                    release.version, self.installed_version
                ),
            )?;
            if let Ok(blob) = serde_json::to_string(&release) {
                self.store.set(UPDATE_DATA_KEY, &blob)?;
            }
            Ok(Some(release))
        } else {
            Ok(None)
        }
    }

    /// The cached feed body, while its day-long cache window holds.
    pub fn cached_feed(&self) -> LicenseResult<Option<String>> {
        let Some(raw) = self.store.get(FEED_CACHE_KEY)? else {
            return Ok(None);
        };
        let Ok(cached) = serde_json::from_str::<CachedFeed>(&raw) else {
            return Ok(None);
        };
        if self.clock.now() > cached.time {
            return Ok(None);
        }
        Ok(Some(cached.data))
    }

    /// Whether an update notification is pending and not dismissed.
    pub fn update_available(&self) -> LicenseResult<bool> {
        let available = self
            .store
            .get(UPDATE_AVAILABLE_KEY)?
            .is_some_and(|v| v == "1");
        let dismissed = self
            .store
            .get(UPDATE_DISMISSED_KEY)?
            .is_some_and(|v| v == "1");
        Ok(available && !dismissed)
    }

    /// The pending release, if a notification is recorded.
    pub fn pending_release(&self) -> LicenseResult<Option<PluginRelease>> {
        Ok(self
            .store
            .get(UPDATE_DATA_KEY)?
            .and_then(|blob| serde_json::from_str(&blob).ok()))
    }

    /// Silences the pending notification until a newer release appears.
    pub fn dismiss_notification(&self) -> LicenseResult<()> {
        self.store.set(UPDATE_DISMISSED_KEY, "1")?;
        Ok(())
    }
}

/// Dotted-version comparison; missing components count as zero, and
/// non-numeric components compare as zero.
fn version_newer(candidate: &str, installed: &str) -> bool {
    let parse = |v: &str| -> Vec<u64> {
        v.split('.')
            .map(|part| part.trim().parse().unwrap_or(0))
            .collect()
    };
    let a = parse(candidate);
    let b = parse(installed);
    let len = a.len().max(b.len());
    for i in 0..len {
        let x = a.get(i).copied().unwrap_or(0);
        let y = b.get(i).copied().unwrap_or(0);
        if x != y {
            return x > y;
        }
    }
    false
}
