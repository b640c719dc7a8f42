//! Deciding the next membership change.

use galera_cluster::{ClusterMembership, ClusterSpec, Health, Member, Ordinal, Role};

use crate::election::elect_seed;
use crate::{Action, QuorumGuard, Verdict};

/// What the planner wants done this pass.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Plan {
    /// Take exactly this action.
    Act(Action),

    /// Observed membership matches the declared shape.
    Converged,

    /// Something is in flight; check again next pass.
    Waiting(String),

    /// No safe action exists.
    Blocked(String),
}

/// Computes the single next action for a cluster.
///
/// `spec` is expected to be normalized. Removals are filtered through the
/// quorum guard here so a vetoed candidate does not hide a later safe one; the
/// caller still checks whatever action comes back.
#[must_use]
pub fn plan(membership: &ClusterMembership, spec: &ClusterSpec) -> Plan {
    if spec.paused {
        return Plan::Converged;
    }

    if spec.replicas == 0 {
        return scale_to_zero(membership);
    }

    if let Some(member) = membership.with_health(Health::Starting).next() {
        return Plan::Waiting(format!("member {} is starting", member.ordinal));
    }

    if membership.is_bootstrapped() {
        plan_bootstrapped(membership, spec)
    } else {
        plan_bootstrap(membership, spec)
    }
}

fn in_range(spec: &ClusterSpec) -> impl Iterator<Item = Ordinal> {
    (0..spec.replicas).map(Ordinal)
}

fn member_at(membership: &ClusterMembership, ordinal: Ordinal) -> Member {
    membership
        .get(ordinal)
        .cloned()
        .unwrap_or_else(|| Member::absent(ordinal))
}

fn removal(member: &Member) -> Action {
    Action::Remove {
        ordinal: member.ordinal,
        role: member.role,
        graceful: member.is_reachable(),
    }
}

fn scale_to_zero(membership: &ClusterMembership) -> Plan {
    membership
        .present()
        .last()
        .map_or(Plan::Converged, |member| Plan::Act(removal(member)))
}

fn plan_bootstrap(membership: &ClusterMembership, spec: &ClusterSpec) -> Plan {
    if let Some(ordinal) = in_range(spec).find(|ordinal| !member_at(membership, *ordinal).is_present())
    {
        return Plan::Act(Action::Provision { ordinal });
    }

    match elect_seed(membership.members()) {
        Some(ordinal) => Plan::Act(Action::CreateAsSeed { ordinal }),
        None => Plan::Blocked(
            "no member has a readable recovery position; refusing to elect a seed".to_string(),
        ),
    }
}

fn plan_bootstrapped(membership: &ClusterMembership, spec: &ClusterSpec) -> Plan {
    let desired_primaries = spec.desired_primaries() as usize;

    // Repair and scale-up, lowest ordinal first.
    for ordinal in in_range(spec) {
        let member = member_at(membership, ordinal);
        match member.health {
            Health::Absent | Health::Unhealthy => {
                let Some(join) = membership.join_target(Some(ordinal)) else {
                    return Plan::Blocked(format!(
                        "member {ordinal} needs to join but no primary is healthy"
                    ));
                };
                let others = membership.current_primaries()
                    - usize::from(member.is_present() && member.role.is_primary());
                return if others < desired_primaries {
                    Plan::Act(Action::CreateAsPrimary { ordinal, join })
                } else {
                    Plan::Act(Action::CreateAsSecondary { ordinal, join })
                };
            }
            Health::Unreachable => {
                return Plan::Waiting(format!("member {ordinal} is unreachable"));
            }
            Health::Healthy if member.role == Role::Unknown => {
                return Plan::Waiting(format!("member {ordinal} has not reported a role"));
            }
            Health::Healthy | Health::Starting => {}
        }
    }

    if let Some(plan) = plan_scale_down(membership, spec) {
        return plan;
    }

    plan_role_balance(membership, desired_primaries)
}

fn plan_scale_down(membership: &ClusterMembership, spec: &ClusterSpec) -> Option<Plan> {
    let surplus: Vec<&Member> = membership
        .present()
        .filter(|member| member.ordinal.get() >= spec.replicas)
        .collect();
    if surplus.is_empty() {
        return None;
    }

    let (primaries, others): (Vec<&Member>, Vec<&Member>) =
        surplus.into_iter().partition(|member| member.role.is_primary());
    let candidates = if others.is_empty() { primaries } else { others };

    let guard = QuorumGuard::new(membership, spec);
    let mut first_denial = None;
    for member in candidates.into_iter().rev() {
        let action = removal(member);
        match guard.check(&action) {
            Verdict::Allow => return Some(Plan::Act(action)),
            Verdict::Deny(reason) => {
                first_denial.get_or_insert(reason);
            }
        }
    }

    Some(Plan::Blocked(
        first_denial.unwrap_or_else(|| "no member can be removed safely".to_string()),
    ))
}

fn plan_role_balance(membership: &ClusterMembership, desired_primaries: usize) -> Plan {
    let current = membership.current_primaries();

    if current < desired_primaries {
        let candidate = membership
            .members()
            .iter()
            .find(|member| member.role == Role::Secondary && member.health == Health::Healthy);
        if let Some(member) = candidate {
            if let Some(join) = membership.join_target(Some(member.ordinal)) {
                return Plan::Act(Action::Promote {
                    ordinal: member.ordinal,
                    join,
                });
            }
            return Plan::Blocked(format!(
                "cannot promote {}: no primary is healthy",
                member.ordinal
            ));
        }
    }

    if current > desired_primaries {
        let candidate = membership
            .members()
            .iter()
            .rev()
            .find(|member| member.role == Role::Primary && member.health == Health::Healthy);
        if let Some(member) = candidate {
            if let Some(join) = membership.join_target(Some(member.ordinal)) {
                return Plan::Act(Action::Demote {
                    ordinal: member.ordinal,
                    join,
                });
            }
        }
    }

    Plan::Converged
}
