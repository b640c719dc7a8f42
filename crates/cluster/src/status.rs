//! Status written back to the API layer after every pass.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{ClusterMembership, Health, Role, member_name};

/// Coarse phase of a cluster.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum ClusterPhase {
    /// No primary has been established yet.
    #[default]
    Bootstrapping,

    /// Actions are pending.
    Converging,

    /// Observed membership equals desired membership and everything is healthy.
    Converged,

    /// No safe action exists; automation is withheld.
    Degraded,

    /// Reconciliation suspended by the user.
    Paused,
}

impl fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// One row of the member table.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberStatus {
    /// Ordinal slot.
    pub ordinal: u32,

    /// Compute unit name.
    pub name: String,

    /// Observed role.
    pub role: Role,

    /// Observed health.
    pub health: Health,

    /// Image the member runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Status of one cluster.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    /// Coarse phase.
    pub phase: ClusterPhase,

    /// Human-readable explanation for Degraded and waiting states.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Members that have a compute unit.
    pub size: u32,

    /// Members holding the seed or primary role.
    pub primaries: u32,

    /// Per-member table.
    #[serde(default)]
    pub members: Vec<MemberStatus>,

    /// Description of the action taken in the pass that wrote this status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_action: Option<String>,
}

impl ClusterStatus {
    /// Builds the status of a cluster from an observed membership.
    #[must_use]
    pub fn from_membership(
        cluster_name: &str,
        membership: &ClusterMembership,
        phase: ClusterPhase,
        reason: Option<String>,
    ) -> Self {
        let members = membership
            .present()
            .map(|member| MemberStatus {
                ordinal: member.ordinal.get(),
                name: member_name(cluster_name, member.ordinal),
                role: member.role,
                health: member.health,
                version: member.running_version.clone(),
            })
            .collect();

        Self {
            phase,
            reason,
            size: u32::try_from(membership.present_count()).unwrap_or(u32::MAX),
            primaries: u32::try_from(membership.current_primaries()).unwrap_or(u32::MAX),
            members,
            last_action: None,
        }
    }
}
