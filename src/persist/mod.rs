//! Snapshot Persistence
//!
//! Best-effort durability for session state. Stores are plain string
//! key-value backends; the [`PersistenceAdapter`] owns the session key and
//! the JSON snapshot format. Callers swallow every error: a failed write is
//! dropped and a failed load means "start fresh".

pub mod memory;
pub mod file;

use tracing::{debug, warn};

use crate::error::PersistError;
use crate::game::state::{SessionState, Snapshot};

pub use file::FileStore;
pub use memory::MemoryStore;

/// Durable string key-value store.
pub trait SnapshotStore: Send {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<String>, PersistError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&mut self, key: &str, value: &str) -> Result<(), PersistError>;

    /// Delete `key`. Removing a missing key is not an error.
    fn remove(&mut self, key: &str) -> Result<(), PersistError>;
}

/// Reads and writes one session's snapshot under a fixed key.
pub struct PersistenceAdapter {
    store: Box<dyn SnapshotStore>,
    key: String,
}

impl std::fmt::Debug for PersistenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceAdapter")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl PersistenceAdapter {
    /// Wrap a store for the given session key.
    pub fn new(store: impl SnapshotStore + 'static, key: impl Into<String>) -> Self {
        Self {
            store: Box::new(store),
            key: key.into(),
        }
    }

    /// Storage key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load a prior snapshot, if one exists and is structurally valid.
    ///
    /// Read, parse and validation failures are logged and yield `None`.
    pub fn load(&self) -> Option<SessionState> {
        match self.try_load() {
            Ok(state) => state,
            Err(e) => {
                warn!("Discarding stored session {:?}: {}", self.key, e);
                None
            }
        }
    }

    fn try_load(&self) -> Result<Option<SessionState>, PersistError> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(None);
        };
        Ok(Some(Snapshot::from_json(&raw)?.into_state()))
    }

    /// Serialize and write the full state.
    pub fn save(&mut self, state: &SessionState) -> Result<(), PersistError> {
        let json = Snapshot::of(state).to_json()?;
        self.store.set(&self.key, &json)?;
        debug!("Saved session {:?} ({} bytes)", self.key, json.len());
        Ok(())
    }

    /// Delete the stored snapshot.
    pub fn clear(&mut self) -> Result<(), PersistError> {
        self.store.remove(&self.key)
    }
}
