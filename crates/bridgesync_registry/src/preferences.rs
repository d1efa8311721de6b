//! Per-site synchronization preference storage.

use crate::connection::ConnectionRegistry;
use crate::error::RegistryResult;
use crate::store::ConfigStore;
use bridgesync_protocol::SyncPreferences;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Config key holding the per-site preference map as a JSON blob.
pub const SYNC_SETTINGS_KEY: &str = "eb_synch_settings";

/// Reads and writes per-site [`SyncPreferences`].
pub struct PreferenceStore<S> {
    store: Arc<S>,
}

impl<S: ConfigStore> PreferenceStore<S> {
    /// Creates a preference store over the given storage backend.
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    fn load_map(&self) -> RegistryResult<BTreeMap<String, SyncPreferences>> {
        let Some(raw) = self.store.get(SYNC_SETTINGS_KEY)? else {
            return Ok(BTreeMap::new());
        };
        match serde_json::from_str(&raw) {
            Ok(map) => Ok(map),
            Err(err) => {
                warn!(key = SYNC_SETTINGS_KEY, %err, "dropping malformed preference blob");
                Ok(BTreeMap::new())
            }
        }
    }

    /// Preferences for one site. Sites with no stored entry read as
    /// all-disabled.
    pub fn get(&self, site_name: &str) -> RegistryResult<SyncPreferences> {
        Ok(self.load_map()?.get(site_name).copied().unwrap_or_default())
    }

    /// Stores preferences for one site, leaving other sites untouched.
    ///
    /// Preferences for a site that is not in the connection registry are
    /// silently ignored; a preference row without a connection can never
    /// gate anything.
    pub fn save(
        &self,
        connections: &ConnectionRegistry<S>,
        site_name: &str,
        preferences: SyncPreferences,
    ) -> RegistryResult<()> {
        let mut map = self.load_map()?;
        if connections.is_registered(site_name)? {
            map.insert(site_name.into(), preferences);
        } else {
            warn!(site = %site_name, "ignoring preferences for unregistered site");
        }
        let blob = serde_json::to_string(&map).unwrap_or_else(|_| "{}".into());
        self.store.set(SYNC_SETTINGS_KEY, &blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::SiteConnection;
    use crate::store::MemoryConfigStore;
    use proptest::prelude::*;

    fn fixtures() -> (
        Arc<MemoryConfigStore>,
        ConnectionRegistry<MemoryConfigStore>,
        PreferenceStore<MemoryConfigStore>,
    ) {
        let store = Arc::new(MemoryConfigStore::new());
        let connections = ConnectionRegistry::new(Arc::clone(&store));
        let preferences = PreferenceStore::new(Arc::clone(&store));
        (store, connections, preferences)
    }

    fn register(connections: &ConnectionRegistry<MemoryConfigStore>, names: &[&str]) {
        let sites = names
            .iter()
            .map(|name| {
                (
                    (*name).to_string(),
                    SiteConnection {
                        wp_name: (*name).into(),
                        wp_url: format!("https://{name}.example.org"),
                        wp_token: format!("tok-{name}"),
                    },
                )
            })
            .collect();
        connections.save_sites(&sites).unwrap();
    }

    #[test]
    fn unknown_site_reads_all_disabled() {
        let (_, _, preferences) = fixtures();
        assert_eq!(preferences.get("shop").unwrap(), SyncPreferences::default());
    }

    #[test]
    fn save_preserves_other_sites() {
        let (_, connections, preferences) = fixtures();
        register(&connections, &["shop", "campus"]);

        preferences
            .save(&connections, "shop", SyncPreferences::all_enabled())
            .unwrap();
        let campus = SyncPreferences {
            user_creation: true,
            ..Default::default()
        };
        preferences.save(&connections, "campus", campus).unwrap();

        assert_eq!(
            preferences.get("shop").unwrap(),
            SyncPreferences::all_enabled()
        );
        assert_eq!(preferences.get("campus").unwrap(), campus);
    }

    #[test]
    fn unregistered_site_save_is_ignored() {
        let (_, connections, preferences) = fixtures();
        register(&connections, &["shop"]);

        preferences
            .save(&connections, "blog", SyncPreferences::all_enabled())
            .unwrap();
        assert_eq!(preferences.get("blog").unwrap(), SyncPreferences::default());
    }

    #[test]
    fn malformed_blob_reads_as_empty() {
        let (store, _, preferences) = fixtures();
        store.set(SYNC_SETTINGS_KEY, "[1,2,3]").unwrap();
        assert_eq!(preferences.get("shop").unwrap(), SyncPreferences::default());
    }

    proptest! {
        // Saving any combination of flags for one registered site never
        // disturbs another site's stored flags.
        #[test]
        fn saves_are_isolated_per_site(
            shop_flags in any::<[bool; 7]>(),
            campus_flags in any::<[bool; 7]>(),
        ) {
            let from_flags = |f: [bool; 7]| SyncPreferences {
                course_enrollment: f[0],
                course_un_enrollment: f[1],
                user_creation: f[2],
                user_updation: f[3],
                user_deletion: f[4],
                course_creation: f[5],
                course_deletion: f[6],
            };
            let (_, connections, preferences) = fixtures();
            register(&connections, &["shop", "campus"]);

            preferences.save(&connections, "shop", from_flags(shop_flags)).unwrap();
            preferences.save(&connections, "campus", from_flags(campus_flags)).unwrap();

            prop_assert_eq!(preferences.get("shop").unwrap(), from_flags(shop_flags));
            prop_assert_eq!(preferences.get("campus").unwrap(), from_flags(campus_flags));
        }
    }
}
