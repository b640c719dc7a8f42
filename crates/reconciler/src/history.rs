//! Counters carried from one pass to the next.
//!
//! The observer uses it to remember what an unreachable member last reported.
//! The loop uses it to tell a momentary blip from a persistent failure, and to
//! remember which slots held a primary role after the member stops reporting
//! one. Losing it is safe: counters restart at zero.

use std::collections::{BTreeMap, BTreeSet};

use galera_cluster::{ClusterMembership, Health, Member, Ordinal, Role};

/// Per-ordinal observation counters of one cluster.
#[derive(Clone, Debug, Default)]
pub struct ObservationHistory {
    unreachable: BTreeMap<Ordinal, u32>,
    starting: BTreeMap<Ordinal, u32>,
    failing: BTreeMap<Ordinal, u32>,
    primaries: BTreeSet<Ordinal>,
    previous: Option<ClusterMembership>,
}

impl ObservationHistory {
    /// Creates an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one pass's membership into the counters.
    pub fn record(&mut self, membership: &ClusterMembership) {
        let mut unreachable = BTreeMap::new();
        let mut starting = BTreeMap::new();
        let mut failing = BTreeMap::new();

        for member in membership.members() {
            match member.health {
                Health::Unreachable => {
                    let passes = self.unreachable_passes(member.ordinal) + 1;
                    unreachable.insert(member.ordinal, passes);
                }
                Health::Starting => {
                    let passes = self.starting_passes(member.ordinal) + 1;
                    starting.insert(member.ordinal, passes);
                }
                Health::Healthy | Health::Unhealthy | Health::Absent => {}
            }

            if matches!(member.health, Health::Starting | Health::Unhealthy) {
                let passes = self.failing_passes(member.ordinal) + 1;
                failing.insert(member.ordinal, passes);
            }

            match member.role {
                Role::Seed | Role::Primary if member.health == Health::Healthy => {
                    self.primaries.insert(member.ordinal);
                }
                Role::Secondary => {
                    self.primaries.remove(&member.ordinal);
                }
                Role::Seed | Role::Primary | Role::Unknown => {}
            }
        }

        self.unreachable = unreachable;
        self.starting = starting;
        self.failing = failing;
        self.previous = Some(membership.clone());
    }

    /// Forgets that a slot held a primary role, once its member was removed on purpose.
    pub fn forget(&mut self, ordinal: Ordinal) {
        self.primaries.remove(&ordinal);
        self.failing.remove(&ordinal);
    }

    /// Whether the slot has served as seed or primary, even if its member has
    /// since stopped reporting any role.
    #[must_use]
    pub fn was_primary(&self, ordinal: Ordinal) -> bool {
        self.primaries.contains(&ordinal)
    }

    /// Consecutive passes the member has been present but not healthy
    /// (starting or unhealthy), including the last recorded one.
    #[must_use]
    pub fn failing_passes(&self, ordinal: Ordinal) -> u32 {
        self.failing.get(&ordinal).copied().unwrap_or(0)
    }

    /// Consecutive passes the member has been unreachable, including the last recorded one.
    #[must_use]
    pub fn unreachable_passes(&self, ordinal: Ordinal) -> u32 {
        self.unreachable.get(&ordinal).copied().unwrap_or(0)
    }

    /// Consecutive passes the member has been starting, including the last recorded one.
    #[must_use]
    pub fn starting_passes(&self, ordinal: Ordinal) -> u32 {
        self.starting.get(&ordinal).copied().unwrap_or(0)
    }

    /// What the member looked like in the previous pass.
    #[must_use]
    pub fn remembered(&self, ordinal: Ordinal) -> Option<&Member> {
        self.previous
            .as_ref()
            .and_then(|membership| membership.get(ordinal))
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
