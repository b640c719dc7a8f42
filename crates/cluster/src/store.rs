//! API-object store holding manifests and receiving status.

use async_trait::async_trait;

use crate::{ClusterId, ClusterManifest, ClusterStatus, ClusterStoreError};

/// One stored cluster object.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ClusterRecord {
    /// The declared manifest.
    pub manifest: ClusterManifest,
}

impl ClusterRecord {
    /// Whether the user asked for the cluster to be removed.
    #[must_use]
    pub const fn deletion_requested(&self) -> bool {
        self.manifest.metadata.deletion_requested
    }
}

/// Source of desired state and sink for observed status.
#[async_trait]
pub trait ClusterStore: Send + Sync + 'static {
    /// The error type for store operations.
    type Error: ClusterStoreError;

    /// Identities of every stored cluster.
    async fn list(&self) -> Result<Vec<ClusterId>, Self::Error>;

    /// Reads one cluster; `None` once it no longer exists.
    async fn get(&self, id: &ClusterId) -> Result<Option<ClusterRecord>, Self::Error>;

    /// Overwrites the status of one cluster.
    async fn update_status(&self, id: &ClusterId, status: &ClusterStatus)
    -> Result<(), Self::Error>;

    /// Drops a cluster whose deletion was requested once all its members are gone.
    async fn finalize(&self, id: &ClusterId) -> Result<(), Self::Error>;
}
