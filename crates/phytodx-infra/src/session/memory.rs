use std::sync::Arc;

use dashmap::DashMap;

use phytodx_core::wizard::persistence::{Snapshot, SnapshotStore};
use phytodx_types::error::RepositoryError;

/// In-memory session store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    entries: Arc<DashMap<String, Snapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SnapshotStore for MemorySnapshotStore {
    async fn get(&self, key: &str) -> Result<Option<Snapshot>, RepositoryError> {
        Ok(self.entries.get(key).map(|r| r.value().clone()))
    }

    async fn put(&self, snapshot: Snapshot) -> Result<(), RepositoryError> {
        self.entries.insert(snapshot.key.clone(), snapshot);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), RepositoryError> {
        self.entries.remove(key);
        Ok(())
    }
}
