//! # BridgeSync License
//!
//! License activation against the vendor store, cached entitlement checks,
//! and plugin update polling.
//!
//! The heart of the crate is [`LicenseManager`]: it drives the
//! activate/deactivate lifecycle and answers "is licensed functionality
//! usable right now" from a layered cache (per-instance memo, stored
//! transient, then the license server). A store outage degrades into a
//! short-lived cached sentinel instead of an error, so the bridge keeps
//! working while the vendor is down.
//!
//! HTTP goes through the [`LicenseTransport`] seam; time goes through
//! [`Clock`]. [`MockLicenseServer`] and [`ManualClock`] script both in tests.

mod clock;
mod config;
mod error;
mod manager;
mod transport;
mod update;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{LicenseConfig, DEFAULT_TIMEOUT, VALID_STATUS_CODES};
pub use error::{LicenseError, LicenseResult};
pub use manager::{ActivationOutcome, Availability, LicenseManager, SERVER_DID_NOT_RESPOND};
pub use transport::{HttpResponse, LicenseTransport, MockLicenseServer, RecordedRequest, TransportError};
pub use update::{PluginRelease, UpdateChecker, DEFAULT_FEED_URL};
