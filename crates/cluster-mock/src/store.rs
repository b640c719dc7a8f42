//! In-memory cluster store.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use galera_cluster::{ClusterId, ClusterManifest, ClusterRecord, ClusterStatus, ClusterStore};
use parking_lot::Mutex;

use crate::Error;

#[derive(Debug, Default)]
struct Entry {
    manifest: ClusterManifest,
    status: Option<ClusterStatus>,
    status_writes: usize,
    unreadable: bool,
}

/// Cluster store keeping manifests and status in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<ClusterId, Entry>>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a manifest, keeping any status already written.
    pub fn apply(&self, manifest: ClusterManifest) -> ClusterId {
        let id = manifest.id();
        self.entries.lock().entry(id.clone()).or_default().manifest = manifest;
        id
    }

    /// Edits the stored manifest in place.
    pub fn update(&self, id: &ClusterId, edit: impl FnOnce(&mut ClusterManifest)) {
        if let Some(entry) = self.entries.lock().get_mut(id) {
            edit(&mut entry.manifest);
        }
    }

    /// Marks a cluster for deletion.
    pub fn request_deletion(&self, id: &ClusterId) {
        self.update(id, |manifest| manifest.metadata.deletion_requested = true);
    }

    /// Removes a cluster outright, as if its object vanished.
    pub fn remove(&self, id: &ClusterId) {
        self.entries.lock().remove(id);
    }

    /// Makes reads of a cluster's manifest fail as unparsable, or succeed again.
    pub fn set_unreadable(&self, id: &ClusterId, unreadable: bool) {
        if let Some(entry) = self.entries.lock().get_mut(id) {
            entry.unreadable = unreadable;
        }
    }

    /// Last status written for a cluster.
    #[must_use]
    pub fn status(&self, id: &ClusterId) -> Option<ClusterStatus> {
        self.entries
            .lock()
            .get(id)
            .and_then(|entry| entry.status.clone())
    }

    /// Number of status writes for a cluster.
    #[must_use]
    pub fn status_writes(&self, id: &ClusterId) -> usize {
        self.entries
            .lock()
            .get(id)
            .map_or(0, |entry| entry.status_writes)
    }

    /// Whether the store holds the cluster.
    #[must_use]
    pub fn contains(&self, id: &ClusterId) -> bool {
        self.entries.lock().contains_key(id)
    }
}

#[async_trait]
impl ClusterStore for MemoryStore {
    type Error = Error;

    async fn list(&self) -> Result<Vec<ClusterId>, Error> {
        Ok(self.entries.lock().keys().cloned().collect())
    }

    async fn get(&self, id: &ClusterId) -> Result<Option<ClusterRecord>, Error> {
        let entries = self.entries.lock();
        let Some(entry) = entries.get(id) else {
            return Ok(None);
        };
        if entry.unreadable {
            return Err(Error::Invalid(id.to_string()));
        }
        Ok(Some(ClusterRecord {
            manifest: entry.manifest.clone(),
        }))
    }

    async fn update_status(&self, id: &ClusterId, status: &ClusterStatus) -> Result<(), Error> {
        let mut entries = self.entries.lock();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        entry.status = Some(status.clone());
        entry.status_writes += 1;
        Ok(())
    }

    async fn finalize(&self, id: &ClusterId) -> Result<(), Error> {
        self.entries.lock().remove(id);
        Ok(())
    }
}
