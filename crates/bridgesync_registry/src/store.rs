//! Flat key/value configuration storage.

use crate::error::{RegistryError, RegistryResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// Backend holding plugin configuration as string key/value pairs.
///
/// Structured values (connection maps, preference maps, cached license
/// payloads) are stored as JSON blobs under well-known keys; this trait only
/// moves strings. Implementations must be safe to share across threads.
pub trait ConfigStore: Send + Sync {
    /// Reads the value stored under `key`, if any.
    fn get(&self, key: &str) -> RegistryResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> RegistryResult<()>;

    /// Removes the value stored under `key`. Removing an absent key is a
    /// no-op.
    fn remove(&self, key: &str) -> RegistryResult<()>;
}

/// In-memory [`ConfigStore`] for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    entries: RwLock<HashMap<String, String>>,
    fail_all: AtomicBool,
}

impl MemoryConfigStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, every subsequent operation fails. Used to exercise error
    /// propagation paths in tests.
    pub fn set_fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn check_available(&self, key: &str) -> RegistryResult<()> {
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(RegistryError::storage(key, "backend unavailable"));
        }
        Ok(())
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> RegistryResult<Option<String>> {
        self.check_available(key)?;
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> RegistryResult<()> {
        self.check_available(key)?;
        self.entries.write().insert(key.into(), value.into());
        Ok(())
    }

    fn remove(&self, key: &str) -> RegistryResult<()> {
        self.check_available(key)?;
        self.entries.write().remove(key);
        Ok(())
    }
}
