//! # BridgeSync Registry
//!
//! Durable plugin state: named partner-site connections, per-site
//! synchronization preferences, and the host-platform switches the bridge
//! needs in a particular position.
//!
//! Everything persists through the [`ConfigStore`] seam as string key/value
//! pairs, with structured values stored as JSON blobs under well-known keys.
//! [`MemoryConfigStore`] backs embedded use and tests; a deployment wires in
//! its own backend.
//!
//! Stored blobs are treated as untrusted: a malformed or half-filled entry
//! reads as absent rather than failing the caller.

mod connection;
mod error;
mod preferences;
mod settings;
mod store;

pub use connection::{ConnectionRegistry, SiteConnection, CONNECTION_SETTINGS_KEY};
pub use error::{RegistryError, RegistryResult};
pub use preferences::{PreferenceStore, SYNC_SETTINGS_KEY};
pub use settings::{
    RequiredSettings, SiteSettings, SsoSettings, SummaryStatus, LAST_TOKEN_KEY,
    SELECTED_SERVICE_KEY,
};
pub use store::{ConfigStore, MemoryConfigStore};
