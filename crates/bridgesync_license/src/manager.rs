//! License lifecycle and cached entitlement checks.

use crate::clock::Clock;
use crate::config::{LicenseConfig, VALID_STATUS_CODES};
use crate::error::LicenseResult;
use crate::transport::LicenseTransport;
use bridgesync_protocol::{classify, LicenseRequest, LicenseResponse, LicenseVerdict};
use bridgesync_registry::ConfigStore;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

/// Cached status recorded when the license server gave no usable answer.
pub const SERVER_DID_NOT_RESPOND: &str = "server_did_not_respond";

const VALID_TTL_SECS: i64 = 7 * 24 * 60 * 60;
const OTHER_TTL_SECS: i64 = 24 * 60 * 60;
const SENTINEL_TTL_SECS: i64 = 24 * 60 * 60;

/// Whether licensed functionality is currently usable.
///
/// An expired license stays [`Available`](Availability::Available): paid
/// features keep working, only renewal nagging differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// Licensed functionality is usable.
    Available,
    /// Licensed functionality is locked.
    Unavailable,
}

impl Availability {
    /// Maps a persisted status string to an availability.
    pub fn from_status(status: &str) -> Self {
        match status {
            "valid" | "expired" => Availability::Available,
            _ => Availability::Unavailable,
        }
    }

    /// True for [`Availability::Available`].
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

/// Outcome of an activate or deactivate call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// The server answered and the response was classified.
    Classified(LicenseVerdict),
    /// The server was unreachable or answered garbage; a short-lived
    /// sentinel was cached and the stored state is unchanged.
    ServerDidNotRespond,
    /// No license key is stored, so there was nothing to send.
    NoLicenseKey,
}

/// Drives license activation and answers entitlement checks from cache.
///
/// Status lookups hit the license server at most once per cache window: a
/// fresh check caches for seven days when the license is valid and one day
/// otherwise, and an unreachable server caches a one-day
/// [`SERVER_DID_NOT_RESPOND`] sentinel so a store outage cannot hammer it.
/// On top of the stored transient sits a per-instance memo, so repeated
/// checks within one request never re-read storage.
pub struct LicenseManager<S, T, C> {
    store: Arc<S>,
    transport: T,
    clock: C,
    config: LicenseConfig,
    memo: RwLock<Option<Availability>>,
}

impl<S: ConfigStore, T: LicenseTransport, C: Clock> LicenseManager<S, T, C> {
    /// Creates a manager over the given storage, transport, and clock.
    pub fn new(store: Arc<S>, transport: T, clock: C, config: LicenseConfig) -> Self {
        Self {
            store,
            transport,
            clock,
            config,
            memo: RwLock::new(None),
        }
    }

    /// Drops the per-instance memo so the next check re-reads storage.
    pub fn clear_cached(&self) {
        *self.memo.write() = None;
    }

    /// The stored license key, if any.
    pub fn license_key(&self) -> LicenseResult<Option<String>> {
        Ok(self.store.get(&self.config.license_key_key())?)
    }

    /// The last persisted license status, if any.
    pub fn license_status(&self) -> LicenseResult<Option<String>> {
        Ok(self.store.get(&self.config.status_key())?)
    }

    /// The stored renewal link, if any.
    pub fn renew_link(&self) -> LicenseResult<Option<String>> {
        Ok(self.store.get(&self.config.renew_link_key())?)
    }

    /// Activates `license_key` against the license server.
    ///
    /// The key is stored before the request goes out, so a retry after a
    /// store outage does not need it re-entered.
    pub fn activate(&self, license_key: &str) -> LicenseResult<ActivationOutcome> {
        if license_key.is_empty() {
            return Ok(ActivationOutcome::NoLicenseKey);
        }
        self.store.set(&self.config.license_key_key(), license_key)?;
        self.clear_cached();

        let request = LicenseRequest::activate(
            license_key,
            &self.config.item_name,
            &self.config.current_version,
            &self.config.site_url,
        );
        let Some(response) = self.exchange(&request)? else {
            return Ok(ActivationOutcome::ServerDidNotRespond);
        };

        if let Some(link) = response.renew_link.as_deref().filter(|l| !l.is_empty()) {
            self.store.set(&self.config.renew_link_key(), link)?;
        }

        let verdict = classify(&response, self.clock.now());
        let status = verdict.status_str().to_string();
        self.store.set(&self.config.status_key(), &status)?;

        let ttl = if status == "valid" {
            VALID_TTL_SECS
        } else {
            OTHER_TTL_SECS
        };
        self.write_transient(&status, self.clock.now() + ttl)?;

        info!(status = %status, "license activation classified");
        Ok(ActivationOutcome::Classified(verdict))
    }

    /// Deactivates the stored license key.
    ///
    /// On success the cached status is pinned (deadline `0`, never expiring)
    /// so entitlement checks stop calling home until the next activation.
    pub fn deactivate(&self) -> LicenseResult<ActivationOutcome> {
        let Some(license_key) = self.license_key()?.filter(|k| !k.is_empty()) else {
            return Ok(ActivationOutcome::NoLicenseKey);
        };
        self.clear_cached();

        let request = LicenseRequest::deactivate(
            license_key,
            &self.config.item_name,
            &self.config.current_version,
            &self.config.site_url,
        );
        let Some(response) = self.exchange(&request)? else {
            return Ok(ActivationOutcome::ServerDidNotRespond);
        };

        let reported = response.license.clone().unwrap_or_default();
        if reported == "deactivated" || reported == "failed" {
            self.store.set(&self.config.status_key(), "deactivated")?;
        }
        self.write_transient(&reported, 0)?;

        info!(status = %reported, "license deactivated");
        Ok(ActivationOutcome::Classified(classify(
            &response,
            self.clock.now(),
        )))
    }

    /// Whether licensed functionality is currently usable.
    ///
    /// Served from the memo, then the stored transient, and only then the
    /// license server. When the server is unreachable the last persisted
    /// status keeps ruling for another day.
    pub fn availability(&self) -> LicenseResult<Availability> {
        if let Some(cached) = *self.memo.read() {
            return Ok(cached);
        }

        let availability = if self.transient_fresh()? {
            let status = self.license_status()?.unwrap_or_default();
            Availability::from_status(&status)
        } else {
            self.refresh_from_server()?
        };

        *self.memo.write() = Some(availability);
        Ok(availability)
    }

    /// Sites the key is already active on, when the activation limit is hit.
    ///
    /// Returns `None` while the limit still has room. The current site never
    /// counts against itself; URLs are compared scheme-insensitively.
    pub fn sites_over_limit(&self) -> LicenseResult<Option<Vec<String>>> {
        let sites_blob = self.store.get(&self.config.activated_sites_key())?;
        let max: usize = self
            .store
            .get(&self.config.max_sites_key())?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        let nested: Vec<Vec<String>> = sites_blob
            .as_deref()
            .and_then(|blob| serde_json::from_str(blob).ok())
            .unwrap_or_default();

        let own = normalize_site_url(&self.config.site_url);
        let others: Vec<String> = nested
            .into_iter()
            .flatten()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !normalize_site_url(url).eq_ignore_ascii_case(&own))
            .collect();

        if !others.is_empty() && others.len() >= max {
            Ok(Some(others))
        } else {
            Ok(None)
        }
    }

    /// Sends one request and filters out non-answers. Unreachable servers
    /// and unparseable bodies cache the sentinel and yield `None`.
    fn exchange(&self, request: &LicenseRequest) -> LicenseResult<Option<LicenseResponse>> {
        let response = match self.transport.post_form(
            &self.config.store_url,
            &request.form_fields(),
            &self.config,
        ) {
            Ok(response) if VALID_STATUS_CODES.contains(&response.status) => response,
            Ok(response) => {
                warn!(status = response.status, "license server returned unexpected status");
                self.write_transient(SERVER_DID_NOT_RESPOND, self.clock.now() + SENTINEL_TTL_SECS)?;
                return Ok(None);
            }
            Err(err) => {
                warn!(%err, "license server unreachable");
                self.write_transient(SERVER_DID_NOT_RESPOND, self.clock.now() + SENTINEL_TTL_SECS)?;
                return Ok(None);
            }
        };

        match LicenseResponse::parse(&response.body) {
            Some(parsed) => Ok(Some(parsed)),
            None => {
                warn!("license server returned unparseable body");
                self.write_transient(SERVER_DID_NOT_RESPOND, self.clock.now() + SENTINEL_TTL_SECS)?;
                Ok(None)
            }
        }
    }

    fn refresh_from_server(&self) -> LicenseResult<Availability> {
        let Some(license_key) = self.license_key()?.filter(|k| !k.is_empty()) else {
            return Ok(Availability::Unavailable);
        };

        let request = LicenseRequest::check(
            license_key,
            &self.config.item_name,
            &self.config.current_version,
            &self.config.site_url,
        );

        let status = match self.exchange(&request)? {
            Some(response) => {
                let status = response.license.unwrap_or_default();
                if status.is_empty() {
                    return Ok(Availability::Unavailable);
                }
                self.store.set(&self.config.status_key(), &status)?;
                let ttl = if status == "valid" {
                    VALID_TTL_SECS
                } else {
                    OTHER_TTL_SECS
                };
                self.write_transient(&status, self.clock.now() + ttl)?;
                status
            }
            None => {
                // Sentinel already cached; keep ruling on the last known
                // status for the sentinel window.
                match self.license_status()? {
                    Some(stored) if !stored.is_empty() => stored,
                    _ => return Ok(Availability::Unavailable),
                }
            }
        };

        Ok(Availability::from_status(&status))
    }

    /// Whether a stored transient exists and has not passed its deadline.
    /// Expired transients are removed on read. Deadline `0` never expires.
    fn transient_fresh(&self) -> LicenseResult<bool> {
        let key = self.config.transient_key();
        let Some(raw) = self.store.get(&key)? else {
            return Ok(false);
        };
        let Ok((_, deadline)) = serde_json::from_str::<(String, i64)>(&raw) else {
            self.store.remove(&key)?;
            return Ok(false);
        };
        if deadline > 0 && self.clock.now() > deadline {
            self.store.remove(&key)?;
            return Ok(false);
        }
        Ok(true)
    }

    fn write_transient(&self, status: &str, deadline: i64) -> LicenseResult<()> {
        let blob = serde_json::to_string(&(status, deadline)).unwrap_or_else(|_| "[\"\",0]".into());
        self.store.set(&self.config.transient_key(), &blob)?;
        Ok(())
    }
}

fn normalize_site_url(url: &str) -> String {
    let stripped = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    stripped.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::transport::{HttpResponse, MockLicenseServer};
    use bridgesync_registry::MemoryConfigStore;

    const NOW: i64 = 1_700_000_000;

    fn manager(
        server: MockLicenseServer,
    ) -> LicenseManager<MemoryConfigStore, MockLicenseServer, ManualClock> {
        let config = LicenseConfig::new(
            "https://store.example.org",
            "Edwiser Bridge",
            "3.0.0",
            "https://lms.example.org",
        );
        LicenseManager::new(
            Arc::new(MemoryConfigStore::new()),
            server,
            ManualClock::at(NOW),
            config,
        )
    }

    #[test]
    fn activation_persists_key_status_and_renew_link() {
        let server = MockLicenseServer::new();
        server.push_response(HttpResponse::ok(
            r#"{"success":true,"license":"valid","expires":"lifetime","renew_link":"https://store.example.org/renew"}"#,
        ));
        let manager = manager(server);

        let outcome = manager.activate("KEY-1").unwrap();
        assert_eq!(outcome, ActivationOutcome::Classified(LicenseVerdict::Valid));
        assert_eq!(manager.license_key().unwrap().as_deref(), Some("KEY-1"));
        assert_eq!(manager.license_status().unwrap().as_deref(), Some("valid"));
        assert_eq!(
            manager.renew_link().unwrap().as_deref(),
            Some("https://store.example.org/renew")
        );
        assert_eq!(
            manager.transport.field(0, "edd_action").as_deref(),
            Some("activate_license")
        );
        assert!(manager.availability().unwrap().is_available());
    }

    #[test]
    fn unreachable_server_caches_sentinel_and_keeps_key() {
        let server = MockLicenseServer::new();
        server.push_unreachable();
        let manager = manager(server);

        let outcome = manager.activate("KEY-1").unwrap();
        assert_eq!(outcome, ActivationOutcome::ServerDidNotRespond);
        assert_eq!(manager.license_key().unwrap().as_deref(), Some("KEY-1"));

        // The sentinel keeps availability checks off the wire for a day.
        assert!(!manager.availability().unwrap().is_available());
        assert_eq!(manager.transport.requests().len(), 1);
    }

    #[test]
    fn html_error_page_counts_as_no_response() {
        let server = MockLicenseServer::new();
        server.push_response(HttpResponse::ok("<html>Bad Gateway</html>"));
        let manager = manager(server);

        assert_eq!(
            manager.activate("KEY-1").unwrap(),
            ActivationOutcome::ServerDidNotRespond
        );
    }

    #[test]
    fn availability_is_cached_for_the_transient_window() {
        let server = MockLicenseServer::new();
        server.push_response(HttpResponse::ok(r#"{"success":true,"license":"valid"}"#));
        let manager = manager(server);
        manager.activate("KEY-1").unwrap();

        for _ in 0..5 {
            assert!(manager.availability().unwrap().is_available());
        }
        // Only the activation request went out.
        assert_eq!(manager.transport.requests().len(), 1);
    }

    #[test]
    fn expired_transient_triggers_a_check_request() {
        let server = MockLicenseServer::new();
        server.push_response(HttpResponse::ok(r#"{"success":true,"license":"valid"}"#));
        server.push_response(HttpResponse::ok(r#"{"success":true,"license":"valid"}"#));
        let manager = manager(server);
        manager.activate("KEY-1").unwrap();

        manager.clock.advance(VALID_TTL_SECS + 1);
        manager.clear_cached();
        assert!(manager.availability().unwrap().is_available());
        assert_eq!(manager.transport.requests().len(), 2);
        assert_eq!(
            manager.transport.field(1, "edd_action").as_deref(),
            Some("check_license")
        );
    }

    #[test]
    fn expired_license_stays_available() {
        let server = MockLicenseServer::new();
        server.push_response(HttpResponse::ok(
            r#"{"success":false,"error":"expired","license":"expired"}"#,
        ));
        let manager = manager(server);
        let outcome = manager.activate("KEY-1").unwrap();
        assert_eq!(
            outcome,
            ActivationOutcome::Classified(LicenseVerdict::Expired)
        );
        assert!(manager.availability().unwrap().is_available());
    }

    #[test]
    fn server_outage_during_check_falls_back_to_stored_status() {
        let server = MockLicenseServer::new();
        server.push_response(HttpResponse::ok(r#"{"success":true,"license":"valid"}"#));
        server.push_unreachable();
        let manager = manager(server);
        manager.activate("KEY-1").unwrap();

        manager.clock.advance(VALID_TTL_SECS + 1);
        manager.clear_cached();
        // Store is down, but the last persisted status was valid.
        assert!(manager.availability().unwrap().is_available());

        // The sentinel now absorbs further checks for a day.
        manager.clear_cached();
        assert!(manager.availability().unwrap().is_available());
        assert_eq!(manager.transport.requests().len(), 2);
    }

    #[test]
    fn http_500_on_check_falls_back_and_throttles() {
        let server = MockLicenseServer::new();
        server.push_response(HttpResponse::ok(r#"{"success":true,"license":"valid"}"#));
        server.push_response(HttpResponse {
            status: 500,
            body: "Internal Server Error".into(),
        });
        let manager = manager(server);
        manager.activate("KEY-1").unwrap();

        manager.clock.advance(VALID_TTL_SECS + 1);
        manager.clear_cached();
        // The check hit a 500; the last persisted status keeps ruling.
        assert!(manager.availability().unwrap().is_available());
        assert_eq!(manager.license_status().unwrap().as_deref(), Some("valid"));

        // A one-day sentinel was cached in place of a verdict.
        let raw = manager
            .store
            .get(&manager.config.transient_key())
            .unwrap()
            .unwrap();
        let (status, deadline): (String, i64) = serde_json::from_str(&raw).unwrap();
        assert_eq!(status, SERVER_DID_NOT_RESPOND);
        assert_eq!(deadline, manager.clock.now() + SENTINEL_TTL_SECS);

        // Further checks inside the sentinel window stay off the wire.
        manager.clear_cached();
        assert!(manager.availability().unwrap().is_available());
        assert_eq!(manager.transport.requests().len(), 2);
    }

    #[test]
    fn deactivation_pins_the_cached_status() {
        let server = MockLicenseServer::new();
        server.push_response(HttpResponse::ok(r#"{"success":true,"license":"valid"}"#));
        server.push_response(HttpResponse::ok(r#"{"license":"deactivated"}"#));
        let manager = manager(server);
        manager.activate("KEY-1").unwrap();

        let outcome = manager.deactivate().unwrap();
        assert_eq!(
            outcome,
            ActivationOutcome::Classified(LicenseVerdict::Deactivated)
        );
        assert_eq!(
            manager.license_status().unwrap().as_deref(),
            Some("deactivated")
        );

        // Deadline 0 never expires, so no check request goes out even
        // years later.
        manager.clock.advance(10 * 365 * 24 * 60 * 60);
        manager.clear_cached();
        assert!(!manager.availability().unwrap().is_available());
        assert_eq!(manager.transport.requests().len(), 2);
    }

    #[test]
    fn deactivate_without_key_is_a_no_op() {
        let manager = manager(MockLicenseServer::new());
        assert_eq!(
            manager.deactivate().unwrap(),
            ActivationOutcome::NoLicenseKey
        );
        assert!(manager.transport.requests().is_empty());
    }

    #[test]
    fn no_key_means_unavailable_without_network() {
        let manager = manager(MockLicenseServer::new());
        assert!(!manager.availability().unwrap().is_available());
        assert!(manager.transport.requests().is_empty());
    }

    #[test]
    fn sites_over_limit_ignores_own_site() {
        let manager = manager(MockLicenseServer::new());
        let config = &manager.config;
        manager
            .store
            .set(
                &config.activated_sites_key(),
                r#"[["lms.example.org/"],["other.example.org/"]]"#,
            )
            .unwrap();
        manager.store.set(&config.max_sites_key(), "1").unwrap();

        assert_eq!(
            manager.sites_over_limit().unwrap(),
            Some(vec!["other.example.org".to_string()])
        );
    }

    #[test]
    fn sites_under_limit_report_nothing() {
        let manager = manager(MockLicenseServer::new());
        let config = &manager.config;
        manager
            .store
            .set(&config.activated_sites_key(), r#"[["other.example.org"]]"#)
            .unwrap();
        manager.store.set(&config.max_sites_key(), "5").unwrap();

        assert!(manager.sites_over_limit().unwrap().is_none());
    }
}
