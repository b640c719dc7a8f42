//! Data model and external interfaces of a galera cluster operator.
//!
//! This crate provides:
//! - The declared cluster shape (`ClusterSpec`, `ClusterManifest`)
//! - Observed member state (`Member`, `ClusterMembership`, `ClusterStatus`)
//! - The seams the reconciler drives (`CommandExecutor`, `ComputePlatform`, `ClusterStore`)
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;
mod executor;
mod id;
mod manifest;
mod member;
mod membership;
mod platform;
mod spec;
mod status;
mod store;

pub use error::{
    ClusterStoreError, ComputePlatformError, ErrorKind, MemberCommandsError, SpecError,
};
pub use executor::{CommandExecutor, MemberCommands, StatusReport};
pub use id::{ClusterId, DEFAULT_NAMESPACE};
pub use manifest::{ClusterManifest, Metadata};
pub use member::{Health, Member, MemberRef, Ordinal, RecoveryPosition, Role, member_name};
pub use membership::ClusterMembership;
pub use platform::{BootstrapParams, ComputePlatform, ComputeUnit};
pub use spec::{
    ClusterCommands, ClusterSpec, DEFAULT_MEMORY_REQUEST, MIN_VIABLE_SIZE, PodPolicy,
    ResolvedCommands, ResourceRequests, Resources, ServicePolicy, StaticTls, TlsPolicy,
};
pub use status::{ClusterPhase, ClusterStatus, MemberStatus};
pub use store::{ClusterRecord, ClusterStore};
