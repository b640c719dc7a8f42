//! The single mutating step a pass may take.

use std::fmt;

use galera_cluster::{Ordinal, Role};

/// One mutating step against one member.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Action {
    /// Create the compute unit without starting the database.
    Provision {
        /// Member to provision.
        ordinal: Ordinal,
    },

    /// Bootstrap a new cluster from this member's history.
    CreateAsSeed {
        /// Elected member.
        ordinal: Ordinal,
    },

    /// Start the member as a primary joining `join`.
    CreateAsPrimary {
        /// Member to start.
        ordinal: Ordinal,
        /// Member to join.
        join: Ordinal,
    },

    /// Start the member as a secondary joining `join`.
    CreateAsSecondary {
        /// Member to start.
        ordinal: Ordinal,
        /// Member to join.
        join: Ordinal,
    },

    /// Stop the member and delete its compute unit.
    Remove {
        /// Member to remove.
        ordinal: Ordinal,
        /// Role the member held.
        role: Role,
        /// Stop the database before deleting the unit.
        graceful: bool,
    },

    /// Restart a secondary as a primary.
    Promote {
        /// Member to promote.
        ordinal: Ordinal,
        /// Member to join.
        join: Ordinal,
    },

    /// Restart a primary as a secondary.
    Demote {
        /// Member to demote.
        ordinal: Ordinal,
        /// Member to join.
        join: Ordinal,
    },

    /// Stop, re-create on the declared image and restart with `role`.
    Upgrade {
        /// Member to upgrade.
        ordinal: Ordinal,
        /// Role held before the upgrade.
        role: Role,
        /// Member to rejoin.
        join: Ordinal,
    },
}

impl Action {
    /// Member the action mutates.
    #[must_use]
    pub const fn target(&self) -> Ordinal {
        match self {
            Self::Provision { ordinal }
            | Self::CreateAsSeed { ordinal }
            | Self::CreateAsPrimary { ordinal, .. }
            | Self::CreateAsSecondary { ordinal, .. }
            | Self::Remove { ordinal, .. }
            | Self::Promote { ordinal, .. }
            | Self::Demote { ordinal, .. }
            | Self::Upgrade { ordinal, .. } => *ordinal,
        }
    }

    /// Whether the action only takes members away.
    #[must_use]
    pub const fn is_removal(&self) -> bool {
        matches!(self, Self::Remove { .. })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Provision { ordinal } => write!(f, "provision {ordinal}"),
            Self::CreateAsSeed { ordinal } => write!(f, "bootstrap {ordinal} as seed"),
            Self::CreateAsPrimary { ordinal, join } => {
                write!(f, "start {ordinal} as primary joining {join}")
            }
            Self::CreateAsSecondary { ordinal, join } => {
                write!(f, "start {ordinal} as secondary joining {join}")
            }
            Self::Remove { ordinal, role, .. } => write!(f, "remove {role} {ordinal}"),
            Self::Promote { ordinal, join } => write!(f, "promote {ordinal} joining {join}"),
            Self::Demote { ordinal, join } => write!(f, "demote {ordinal} joining {join}"),
            Self::Upgrade { ordinal, role, join } => {
                write!(f, "upgrade {role} {ordinal} rejoining {join}")
            }
        }
    }
}
