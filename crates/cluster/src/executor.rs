//! Per-member database control contract.

use async_trait::async_trait;

use crate::{
    ClusterId, Health, MemberCommandsError, MemberRef, RecoveryPosition, ResolvedCommands, Role,
};

/// Result of a successful Status invocation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StatusReport {
    /// Healthy, Starting or Unhealthy.
    pub health: Health,

    /// Role the member reports.
    pub role: Role,
}

impl StatusReport {
    /// Creates a new report.
    #[must_use]
    pub const fn new(health: Health, role: Role) -> Self {
        Self { health, role }
    }
}

/// Database control operations for the members of one cluster.
///
/// Every method is a single invocation of an externally supplied command. The
/// caller bounds each call with its own timeout.
#[async_trait]
pub trait MemberCommands: Send + Sync + 'static {
    /// The error type for command invocations.
    type Error: MemberCommandsError;

    /// Reports the member's health and role.
    async fn status(&self, member: &MemberRef) -> Result<StatusReport, Self::Error>;

    /// Reports the member's recovery position.
    async fn sequence(&self, member: &MemberRef) -> Result<RecoveryPosition, Self::Error>;

    /// Starts the member as the seed of a new cluster.
    async fn seed(&self, member: &MemberRef) -> Result<(), Self::Error>;

    /// Starts the member as a primary joining `peer`.
    async fn primary(&self, member: &MemberRef, peer: &MemberRef) -> Result<(), Self::Error>;

    /// Starts the member as a secondary joining `peer`.
    async fn secondary(&self, member: &MemberRef, peer: &MemberRef) -> Result<(), Self::Error>;

    /// Stops the database on the member.
    async fn stop(&self, member: &MemberRef) -> Result<(), Self::Error>;
}

/// Builds the command set of a cluster from its resolved templates.
pub trait CommandExecutor: Send + Sync + 'static {
    /// Commands bound to one cluster.
    type Commands: MemberCommands;

    /// Binds the executor to one cluster's command templates.
    fn commands_for(&self, cluster: &ClusterId, commands: &ResolvedCommands) -> Self::Commands;
}
