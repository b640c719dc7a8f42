//! Compute-unit lifecycle on the orchestration platform.

use async_trait::async_trait;

use crate::{
    ClusterId, ComputePlatformError, MemberRef, Ordinal, PodPolicy, Resources, Role,
    ServicePolicy, TlsPolicy,
};

/// A compute unit the platform knows about.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ComputeUnit {
    /// Ordinal the unit belongs to.
    pub ordinal: Ordinal,

    /// Image the unit runs, when the platform reports it.
    pub version: Option<String>,
}

/// Everything the platform needs to create one member's compute unit.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BootstrapParams {
    /// Role the member will be started in; `Unknown` when only provisioned.
    pub role: Role,

    /// Image to run.
    pub image: String,

    /// Member to join, when starting as a joiner.
    pub peer: Option<MemberRef>,

    /// Name of the internal peer service.
    pub service: String,

    /// Scheduling policy.
    pub pod: PodPolicy,

    /// Client service policy.
    pub service_policy: Option<ServicePolicy>,

    /// TLS material.
    pub tls: Option<TlsPolicy>,

    /// Resource requests.
    pub resources: Resources,
}

/// Creates and deletes the compute units members run on.
#[async_trait]
pub trait ComputePlatform: Send + Sync + 'static {
    /// The error type for platform operations.
    type Error: ComputePlatformError;

    /// Lists every compute unit of a cluster.
    async fn list(&self, cluster: &ClusterId) -> Result<Vec<ComputeUnit>, Self::Error>;

    /// Looks up the compute unit of one member.
    async fn exists(&self, member: &MemberRef) -> Result<Option<ComputeUnit>, Self::Error>;

    /// Creates the compute unit of one member.
    async fn create(&self, member: &MemberRef, params: &BootstrapParams)
    -> Result<(), Self::Error>;

    /// Deletes the compute unit of one member. Deleting a missing unit succeeds.
    async fn delete(&self, member: &MemberRef) -> Result<(), Self::Error>;
}
