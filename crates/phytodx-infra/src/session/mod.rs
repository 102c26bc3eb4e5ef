//! Session snapshot stores implementing `SnapshotStore`.
//!
//! - `memory` -- process-lifetime store backed by `DashMap`
//! - `file` -- one JSON file per key so a CLI session survives restarts

pub mod file;
pub mod memory;

use std::path::Path;

use phytodx_core::wizard::persistence::{Snapshot, SnapshotStore};
use phytodx_types::config::SessionConfig;
use phytodx_types::error::RepositoryError;

use crate::filesystem::sessions_dir;

pub use file::FileSnapshotStore;
pub use memory::MemorySnapshotStore;

/// The store picked by `session.persist_to_disk`.
#[derive(Debug, Clone)]
pub enum SessionStore {
    Memory(MemorySnapshotStore),
    File(FileSnapshotStore),
}

impl SessionStore {
    pub fn from_config(session: &SessionConfig, data_dir: &Path) -> Self {
        if session.persist_to_disk {
            Self::File(FileSnapshotStore::new(sessions_dir(data_dir)))
        } else {
            Self::Memory(MemorySnapshotStore::new())
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::File(_))
    }
}

impl SnapshotStore for SessionStore {
    async fn get(&self, key: &str) -> Result<Option<Snapshot>, RepositoryError> {
        match self {
            Self::Memory(store) => store.get(key).await,
            Self::File(store) => store.get(key).await,
        }
    }

    async fn put(&self, snapshot: Snapshot) -> Result<(), RepositoryError> {
        match self {
            Self::Memory(store) => store.put(snapshot).await,
            Self::File(store) => store.put(snapshot).await,
        }
    }

    async fn remove(&self, key: &str) -> Result<(), RepositoryError> {
        match self {
            Self::Memory(store) => store.remove(key).await,
            Self::File(store) => store.remove(key).await,
        }
    }
}
