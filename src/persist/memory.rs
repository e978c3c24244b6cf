//! In-process key-value store.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::SnapshotStore;
use crate::error::PersistError;

/// Shared in-memory store.
///
/// Clones share the same map, so one handle can be given to an engine and
/// another kept for inspection. Can be switched unavailable to simulate a
/// full or disabled backend.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, String>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle availability; an unavailable store fails every operation.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Is `key` present?
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains_key(key))
            .unwrap_or(false)
    }

    /// Raw stored value.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> T,
    ) -> Result<T, PersistError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PersistError::Unavailable("store disabled".to_string()));
        }
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| PersistError::Unavailable("store lock poisoned".to_string()))?;
        Ok(f(&mut entries))
    }
}

impl SnapshotStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        self.with_entries(|entries| entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistError> {
        self.with_entries(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&mut self, key: &str) -> Result<(), PersistError> {
        self.with_entries(|entries| {
            entries.remove(key);
        })
    }
}
