//! Veto on actions that would cost the cluster its primary component.

use std::fmt;

use galera_cluster::{ClusterMembership, ClusterSpec, Health, MIN_VIABLE_SIZE};

use crate::Action;

/// Outcome of a guard check.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Verdict {
    /// The action is safe.
    Allow,

    /// The action must not run.
    Deny(String),
}

impl Verdict {
    /// Whether the action may run.
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allow => f.write_str("allow"),
            Self::Deny(reason) => write!(f, "deny: {reason}"),
        }
    }
}

/// Primaries that must stay healthy for a cluster wanting `desired_primaries`.
///
/// A cluster that wants no primaries has no quorum to protect.
#[must_use]
pub const fn required_primaries(desired_primaries: u32) -> usize {
    if desired_primaries == 0 {
        0
    } else {
        (desired_primaries / 2 + 1) as usize
    }
}

/// Quorum checks against one pass's membership.
#[derive(Clone, Copy, Debug)]
pub struct QuorumGuard<'a> {
    membership: &'a ClusterMembership,
    spec: &'a ClusterSpec,
}

impl<'a> QuorumGuard<'a> {
    /// Creates a guard for one pass.
    #[must_use]
    pub const fn new(membership: &'a ClusterMembership, spec: &'a ClusterSpec) -> Self {
        Self { membership, spec }
    }

    /// Primaries that must stay healthy.
    #[must_use]
    pub fn required(&self) -> usize {
        required_primaries(self.spec.desired_primaries())
    }

    /// Checks one action.
    #[must_use]
    pub fn check(&self, action: &Action) -> Verdict {
        match action {
            Action::CreateAsSeed { ordinal } => {
                if let Some(seed) = self.membership.seeds().first() {
                    return Verdict::Deny(format!(
                        "cannot bootstrap {ordinal}: member {seed} already holds the seed role"
                    ));
                }
                let primaries = self.membership.current_primaries();
                if primaries > 0 {
                    return Verdict::Deny(format!(
                        "cannot bootstrap {ordinal}: {primaries} primaries are already present"
                    ));
                }
                Verdict::Allow
            }
            Action::Remove { ordinal, .. } => {
                if self.spec.replicas > 0 {
                    let remaining = self.membership.present_count().saturating_sub(1);
                    if remaining < MIN_VIABLE_SIZE as usize {
                        return Verdict::Deny(format!(
                            "removing {ordinal} would leave {remaining} members, below {MIN_VIABLE_SIZE}"
                        ));
                    }
                }
                self.check_primary_loss(action)
            }
            Action::Demote { .. } | Action::Upgrade { .. } => self.check_primary_loss(action),
            Action::Provision { .. }
            | Action::CreateAsPrimary { .. }
            | Action::CreateAsSecondary { .. }
            | Action::Promote { .. } => Verdict::Allow,
        }
    }

    fn check_primary_loss(&self, action: &Action) -> Verdict {
        let ordinal = action.target();
        let Some(member) = self.membership.get(ordinal) else {
            return Verdict::Allow;
        };
        if member.health != Health::Healthy || !member.role.is_primary() {
            return Verdict::Allow;
        }

        let remaining = self.membership.healthy_primaries().saturating_sub(1);
        let required = self.required();
        if remaining < required {
            return Verdict::Deny(format!(
                "{action} would leave {remaining} healthy primaries, {required} required"
            ));
        }
        Verdict::Allow
    }
}
