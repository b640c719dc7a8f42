//! Rolling members onto the declared image, one at a time.

use galera_cluster::{ClusterMembership, ClusterSpec, Health, Member, Role};

use crate::{Action, ObservationHistory};

/// Next step of a rolling upgrade.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum UpgradeStep {
    /// Every present member runs the declared image.
    UpToDate,

    /// Upgrade this member next.
    Act(Action),

    /// A previous step has not settled yet.
    Waiting(String),

    /// The upgrade cannot make progress on its own.
    Stalled(String),
}

/// Whether the member runs something other than the declared image.
#[must_use]
pub fn is_outdated(member: &Member, spec: &ClusterSpec) -> bool {
    member.is_present()
        && member
            .running_version
            .as_deref()
            .is_some_and(|version| version != spec.image)
}

/// Reports an upgraded member that keeps failing while others still wait
/// for the new image.
///
/// A member counts as failing while it is starting or unhealthy; repairs that
/// restart it do not reset the count. Nothing is reported once every member
/// runs the declared image.
#[must_use]
pub fn stalled_member(
    membership: &ClusterMembership,
    spec: &ClusterSpec,
    history: &ObservationHistory,
    stall_passes: u32,
) -> Option<String> {
    if !membership.members().iter().any(|member| is_outdated(member, spec)) {
        return None;
    }

    membership
        .present()
        .filter(|member| !is_outdated(member, spec))
        .find(|member| history.failing_passes(member.ordinal) > stall_passes)
        .map(|member| {
            format!(
                "upgraded member {} has been {} for {} passes",
                member.ordinal,
                member.health,
                history.failing_passes(member.ordinal)
            )
        })
}

/// Plans the next upgrade step.
///
/// Only consulted once the planner reports the membership converged.
#[must_use]
pub fn next_upgrade(
    membership: &ClusterMembership,
    spec: &ClusterSpec,
    history: &ObservationHistory,
    stall_passes: u32,
) -> UpgradeStep {
    let outdated: Vec<&Member> = membership
        .members()
        .iter()
        .filter(|member| is_outdated(member, spec))
        .collect();
    if outdated.is_empty() {
        return UpgradeStep::UpToDate;
    }

    if let Some(reason) = stalled_member(membership, spec, history, stall_passes) {
        return UpgradeStep::Stalled(reason);
    }

    if let Some(member) = membership
        .present()
        .filter(|member| !is_outdated(member, spec))
        .find(|member| member.health != Health::Healthy)
    {
        return UpgradeStep::Waiting(format!(
            "upgraded member {} is {}",
            member.ordinal, member.health
        ));
    }

    let rank = |role: Role| match role {
        Role::Secondary | Role::Unknown => 0,
        Role::Primary => 1,
        Role::Seed => 2,
    };
    let Some(candidate) = outdated
        .iter()
        .filter(|member| member.health == Health::Healthy)
        .min_by_key(|member| (rank(member.role), std::cmp::Reverse(member.ordinal)))
    else {
        return UpgradeStep::Waiting("no outdated member is healthy".to_string());
    };

    let join = membership
        .join_target(Some(candidate.ordinal))
        .or_else(|| membership.any_serving_peer(candidate.ordinal));
    let Some(join) = join else {
        return UpgradeStep::Stalled(format!(
            "no healthy peer for member {} to rejoin",
            candidate.ordinal
        ));
    };

    UpgradeStep::Act(Action::Upgrade {
        ordinal: candidate.ordinal,
        role: candidate.role,
        join,
    })
}
