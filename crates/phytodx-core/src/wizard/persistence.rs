//! Session snapshot persistence.
//!
//! Defines the `SnapshotStore` port and `PersistenceBridge`, which mirrors a
//! wizard's state into the store under a fixed key after every mutation and
//! rehydrates it on mount. Only one workflow of each kind is active at a
//! time, so keys are per-workflow, not per-user.
//!
//! Snapshots are a session convenience, not durable storage: the remote
//! inference job can always be re-fetched by id.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use phytodx_types::error::RepositoryError;

/// Current snapshot layout version.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Domain types
// ---------------------------------------------------------------------------

/// A stored snapshot of one wizard's state.
///
/// `schema_version` lets a later release detect and discard snapshots whose
/// `state_json` layout it no longer understands.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Snapshot {
    pub key: String,
    pub state_json: String,
    pub schema_version: u32,
    pub saved_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Session cache backing the persistence bridge.
///
/// Uses RPITIT (return position `impl Trait` in traits) consistent with
/// all async ports in this workspace.
pub trait SnapshotStore: Send + Sync {
    /// Load the snapshot stored under `key`, if any.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<Snapshot>, RepositoryError>> + Send;

    /// Save or replace the snapshot for `snapshot.key`.
    fn put(&self, snapshot: Snapshot) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    /// Remove the snapshot under `key`. No-op if absent.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

// ---------------------------------------------------------------------------
// PersistenceBridge
// ---------------------------------------------------------------------------

/// Errors from bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot store error: {0}")]
    Store(#[from] RepositoryError),

    #[error("snapshot serialization failed: {0}")]
    Serialize(String),

    #[error("snapshot schema version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("snapshot is corrupt: {0}")]
    Corrupt(String),
}

/// Mirrors a wizard state into a `SnapshotStore` under a fixed key.
pub struct PersistenceBridge<S: SnapshotStore> {
    store: S,
    key: &'static str,
}

impl<S: SnapshotStore> PersistenceBridge<S> {
    pub fn new(store: S, key: &'static str) -> Self {
        Self { store, key }
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Load and deserialize the stored state.
    pub async fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, SnapshotError> {
        let Some(snapshot) = self.store.get(self.key).await? else {
            return Ok(None);
        };

        if snapshot.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(SnapshotError::UnsupportedVersion {
                found: snapshot.schema_version,
                expected: SNAPSHOT_SCHEMA_VERSION,
            });
        }

        serde_json::from_str(&snapshot.state_json)
            .map(Some)
            .map_err(|e| SnapshotError::Corrupt(e.to_string()))
    }

    /// Snapshot the full state.
    pub async fn save<T: Serialize>(&self, state: &T) -> Result<(), SnapshotError> {
        let state_json =
            serde_json::to_string(state).map_err(|e| SnapshotError::Serialize(e.to_string()))?;

        self.store
            .put(Snapshot {
                key: self.key.to_string(),
                state_json,
                schema_version: SNAPSHOT_SCHEMA_VERSION,
                saved_at: Utc::now(),
            })
            .await?;

        tracing::trace!(key = self.key, "snapshot saved");
        Ok(())
    }

    /// Remove the snapshot ("start over").
    pub async fn clear(&self) -> Result<(), SnapshotError> {
        self.store.remove(self.key).await?;
        tracing::debug!(key = self.key, "snapshot cleared");
        Ok(())
    }
}
