//! Named partner-site connections.

use crate::error::RegistryResult;
use crate::store::ConfigStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Config key holding the connection map as a JSON blob.
pub const CONNECTION_SETTINGS_KEY: &str = "eb_connection_settings";

/// One registered partner site.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConnection {
    /// Display name; doubles as the map key.
    pub wp_name: String,
    /// Base URL events are delivered to.
    pub wp_url: String,
    /// Shared secret injected into every payload sent to this site.
    pub wp_token: String,
}

impl SiteConnection {
    /// A connection is usable only when all three fields are present.
    pub fn is_complete(&self) -> bool {
        !self.wp_name.is_empty() && !self.wp_url.is_empty() && !self.wp_token.is_empty()
    }
}

/// Reads and writes the named-connection map.
///
/// The map is keyed by site name. Incomplete entries are dropped on both read
/// and write rather than rejected: the settings form saves whatever rows it
/// has, and a half-filled row simply never becomes a connection.
pub struct ConnectionRegistry<S> {
    store: Arc<S>,
}

impl<S: ConfigStore> ConnectionRegistry<S> {
    /// Creates a registry over the given storage backend.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// All complete connections, keyed by site name.
    ///
    /// A missing or malformed blob reads as an empty map.
    pub fn get_sites(&self) -> RegistryResult<BTreeMap<String, SiteConnection>> {
        let Some(raw) = self.store.get(CONNECTION_SETTINGS_KEY)? else {
            return Ok(BTreeMap::new());
        };
        let mut sites: BTreeMap<String, SiteConnection> = match serde_json::from_str(&raw) {
            Ok(sites) => sites,
            Err(err) => {
                warn!(key = CONNECTION_SETTINGS_KEY, %err, "dropping malformed connection blob");
                return Ok(BTreeMap::new());
            }
        };
        sites.retain(|name, site| {
            if site.is_complete() {
                true
            } else {
                warn!(site = %name, "dropping incomplete connection entry");
                false
            }
        });
        Ok(sites)
    }

    /// Replaces the connection map, dropping incomplete entries.
    pub fn save_sites(&self, sites: &BTreeMap<String, SiteConnection>) -> RegistryResult<()> {
        let complete: BTreeMap<&String, &SiteConnection> = sites
            .iter()
            .filter(|(_, site)| site.is_complete())
            .collect();
        let blob = serde_json::to_string(&complete).unwrap_or_else(|_| "{}".into());
        self.store.set(CONNECTION_SETTINGS_KEY, &blob)
    }

    /// Looks up a connection by its shared token.
    pub fn find_by_token(&self, token: &str) -> RegistryResult<Option<SiteConnection>> {
        Ok(self
            .get_sites()?
            .into_values()
            .find(|site| site.wp_token == token))
    }

    /// Whether a site with the given name is registered.
    pub fn is_registered(&self, site_name: &str) -> RegistryResult<bool> {
        Ok(self.get_sites()?.contains_key(site_name))
    }

    /// Names of all registered sites, sorted.
    pub fn site_names(&self) -> RegistryResult<Vec<String>> {
        Ok(self.get_sites()?.into_keys().collect())
    }
}
