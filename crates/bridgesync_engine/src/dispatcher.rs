//! Outbound webhook fan-out.

use crate::error::EngineResult;
use crate::http::{HttpClient, HttpResponse};
use crate::password::encrypt_password;
use bridgesync_protocol::{EventAction, OutboundEvent};
use bridgesync_registry::{ConfigStore, ConnectionRegistry, PreferenceStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Path appended to each site's base URL for webhook delivery.
pub const WEBHOOK_PATH: &str = "/wp-json/edwiser-bridge/wisdmlabs/";

/// Default per-site delivery timeout.
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Per-site delivery timeout.
    pub timeout: Duration,
    /// Webhook path appended to each site's base URL.
    pub webhook_path: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_DISPATCH_TIMEOUT,
            webhook_path: WEBHOOK_PATH.into(),
        }
    }
}

impl DispatchConfig {
    /// Overrides the delivery timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// How delivery to one site went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The site answered; the answer itself is not inspected.
    Delivered {
        /// HTTP status the site answered with.
        status: u16,
    },
    /// The POST never produced a response.
    Failed {
        /// Transport-reported reason.
        reason: String,
    },
    /// The site has this event type switched off.
    SkippedByPreference,
    /// The site has no token configured, so nothing could be signed.
    SkippedNoToken,
}

/// Delivery record for one site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchAttempt {
    /// Site name from the connection registry.
    pub site: String,
    /// Outcome of this site's delivery.
    pub outcome: DispatchOutcome,
}

/// What happened to one event across all registered sites.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// One entry per registered site, in site-name order.
    pub attempts: Vec<DispatchAttempt>,
}

impl DispatchReport {
    /// Number of sites the event was actually delivered to.
    pub fn delivered(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| matches!(a.outcome, DispatchOutcome::Delivered { .. }))
            .count()
    }

    /// Number of sites where delivery failed outright.
    pub fn failed(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| matches!(a.outcome, DispatchOutcome::Failed { .. }))
            .count()
    }
}

/// Fans one domain event out to every opted-in partner site.
///
/// Delivery is fire-and-forget: each site gets one POST, failures are logged
/// and reported but never retried, and one site's failure never blocks
/// another's delivery. Responses are not interpreted.
pub struct SyncDispatcher<S, H> {
    connections: ConnectionRegistry<S>,
    preferences: PreferenceStore<S>,
    http: Arc<H>,
    config: DispatchConfig,
}

impl<S: ConfigStore, H: HttpClient> SyncDispatcher<S, H> {
    /// Creates a dispatcher over the given registry storage and HTTP client.
    pub fn new(store: Arc<S>, http: Arc<H>, config: DispatchConfig) -> Self {
        Self {
            connections: ConnectionRegistry::new(Arc::clone(&store)),
            preferences: PreferenceStore::new(store),
            http,
            config,
        }
    }

    /// Dispatches `event` to every registered site that opted in.
    pub fn dispatch(&self, event: &OutboundEvent) -> EngineResult<DispatchReport> {
        let action = event.action();
        let sites = self.connections.get_sites()?;
        let mut report = DispatchReport::default();

        for (name, site) in sites {
            if !self.preferences.get(&name)?.allows(action) {
                debug!(site = %name, action = action.as_str(), "event gated off by preference");
                report.attempts.push(DispatchAttempt {
                    site: name,
                    outcome: DispatchOutcome::SkippedByPreference,
                });
                continue;
            }
            if site.wp_token.is_empty() {
                report.attempts.push(DispatchAttempt {
                    site: name,
                    outcome: DispatchOutcome::SkippedNoToken,
                });
                continue;
            }

            let fields = self.payload_for(event, &site.wp_token);
            let outcome = self.deliver(&site.wp_url, &fields);
            report.attempts.push(DispatchAttempt {
                site: name,
                outcome,
            });
        }

        info!(
            action = action.as_str(),
            delivered = report.delivered(),
            failed = report.failed(),
            "event dispatched"
        );
        Ok(report)
    }

    /// Sends a connectivity probe to one URL with one token, bypassing the
    /// registry and preferences. Returns the outcome and the response body.
    pub fn probe(&self, wp_url: &str, token: &str) -> (DispatchOutcome, Option<String>) {
        let fields = self.payload_for(&OutboundEvent::TestConnection, token);
        match self
            .http
            .post_form(&self.endpoint(wp_url), &fields, self.config.timeout)
        {
            Ok(HttpResponse { status, body }) => {
                (DispatchOutcome::Delivered { status }, Some(body))
            }
            Err(err) => (
                DispatchOutcome::Failed {
                    reason: err.to_string(),
                },
                None,
            ),
        }
    }

    /// Builds the full per-site payload: the event's own fields, encrypted
    /// credentials for password-bearing events, and the site secret last.
    fn payload_for(&self, event: &OutboundEvent, token: &str) -> Vec<(String, String)> {
        let mut fields = event.base_fields();

        if matches!(
            event.action(),
            EventAction::UserCreation | EventAction::UserUpdated
        ) {
            // The password travels encrypted per site, or as empty strings
            // when the triggering change carried no password.
            match event.plain_password().filter(|p| !p.is_empty()) {
                Some(plain) => {
                    let enc = encrypt_password(token, plain);
                    fields.push(("password".into(), enc.password));
                    fields.push(("enc_iv".into(), enc.enc_iv));
                }
                None => {
                    fields.push(("password".into(), String::new()));
                    fields.push(("enc_iv".into(), String::new()));
                }
            }
        }

        fields.push(("secret_key".into(), token.into()));
        fields
    }

    fn endpoint(&self, wp_url: &str) -> String {
        format!(
            "{}{}",
            wp_url.trim_end_matches('/'),
            self.config.webhook_path
        )
    }

    fn deliver(&self, wp_url: &str, fields: &[(String, String)]) -> DispatchOutcome {
        let url = self.endpoint(wp_url);
        match self.http.post_form(&url, fields, self.config.timeout) {
            Ok(response) => DispatchOutcome::Delivered {
                status: response.status,
            },
            Err(err) => {
                warn!(url = %url, %err, "webhook delivery failed");
                DispatchOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }
}
