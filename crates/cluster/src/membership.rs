//! Point-in-time view of every member of one cluster.

use serde::{Deserialize, Serialize};

use crate::{Health, Member, Ordinal, Role};

/// All members observed in a single pass, sorted by ordinal.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClusterMembership {
    members: Vec<Member>,
}

impl ClusterMembership {
    /// Builds a membership from observed members.
    #[must_use]
    pub fn new(mut members: Vec<Member>) -> Self {
        members.sort_by_key(|member| member.ordinal);
        members.dedup_by_key(|member| member.ordinal);
        Self { members }
    }

    /// All members, ascending by ordinal.
    #[must_use]
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Looks up one member.
    #[must_use]
    pub fn get(&self, ordinal: Ordinal) -> Option<&Member> {
        self.members
            .binary_search_by_key(&ordinal, |member| member.ordinal)
            .ok()
            .map(|index| &self.members[index])
    }

    /// Members that have a compute unit.
    pub fn present(&self) -> impl Iterator<Item = &Member> {
        self.members.iter().filter(|member| member.is_present())
    }

    /// Number of members that have a compute unit.
    #[must_use]
    pub fn present_count(&self) -> usize {
        self.present().count()
    }

    /// Present members holding the seed or primary role.
    #[must_use]
    pub fn current_primaries(&self) -> usize {
        self.present()
            .filter(|member| member.role.is_primary())
            .count()
    }

    /// Healthy members holding the seed or primary role.
    #[must_use]
    pub fn healthy_primaries(&self) -> usize {
        self.members
            .iter()
            .filter(|member| member.health == Health::Healthy && member.role.is_primary())
            .count()
    }

    /// Reachable members reporting the seed role.
    #[must_use]
    pub fn seeds(&self) -> Vec<Ordinal> {
        self.members
            .iter()
            .filter(|member| member.is_reachable() && member.role == Role::Seed)
            .map(|member| member.ordinal)
            .collect()
    }

    /// The single seed, if exactly one member reports the role.
    #[must_use]
    pub fn current_seed(&self) -> Option<Ordinal> {
        match self.seeds().as_slice() {
            [seed] => Some(*seed),
            _ => None,
        }
    }

    /// Whether more than one member claims to be the seed.
    #[must_use]
    pub fn has_dual_seed(&self) -> bool {
        self.seeds().len() > 1
    }

    /// Whether any member is serving, i.e. the cluster has been bootstrapped
    /// and has not fully failed since.
    #[must_use]
    pub fn is_bootstrapped(&self) -> bool {
        self.members.iter().any(Member::is_serving)
    }

    /// Members in the given health.
    pub fn with_health(&self, health: Health) -> impl Iterator<Item = &Member> {
        self.members
            .iter()
            .filter(move |member| member.health == health)
    }

    /// Lowest-ordinal healthy seed or primary other than `excluding`.
    #[must_use]
    pub fn join_target(&self, excluding: Option<Ordinal>) -> Option<Ordinal> {
        self.members
            .iter()
            .filter(|member| Some(member.ordinal) != excluding)
            .find(|member| member.health == Health::Healthy && member.role.is_primary())
            .map(|member| member.ordinal)
    }

    /// Lowest-ordinal serving member of any role other than `excluding`.
    #[must_use]
    pub fn any_serving_peer(&self, excluding: Ordinal) -> Option<Ordinal> {
        self.members
            .iter()
            .filter(|member| member.ordinal != excluding)
            .find(|member| member.is_serving())
            .map(|member| member.ordinal)
    }
}
