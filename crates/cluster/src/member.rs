//! Member identity, role, health and recovery position.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ClusterId;

/// Stable identity of a member slot within a cluster.
#[derive(
    Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Ordinal(pub u32);

impl Ordinal {
    /// Returns the raw ordinal value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for Ordinal {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for Ordinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Role a member plays in the replication group.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Role not known (not running, or never reported).
    #[default]
    Unknown,

    /// The member that bootstrapped the cluster from its own history.
    Seed,

    /// Member of the synchronous write set, counted toward quorum.
    Primary,

    /// Replicating member not counted toward quorum.
    Secondary,
}

impl Role {
    /// Whether the role counts toward the primary write set.
    #[must_use]
    pub const fn is_primary(self) -> bool {
        matches!(self, Self::Seed | Self::Primary)
    }

    /// Lowercase name used in command templates and status output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Seed => "seed",
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "seed" => Ok(Self::Seed),
            "primary" => Ok(Self::Primary),
            "secondary" => Ok(Self::Secondary),
            "unknown" | "" => Ok(Self::Unknown),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Observed health of a member.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    /// Database process is coming up (joining, state transfer).
    Starting,

    /// Database process is running and reports healthy.
    Healthy,

    /// Compute unit exists but the database is not serving.
    Unhealthy,

    /// Compute unit could not be queried this pass.
    Unreachable,

    /// No compute unit exists for the ordinal.
    #[default]
    Absent,
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Starting => "starting",
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
            Self::Unreachable => "unreachable",
            Self::Absent => "absent",
        };
        f.write_str(s)
    }
}

/// How much replicated history a member has persisted.
///
/// Parsed from the galera `<history-uuid>:<seqno>` form or a bare `<seqno>`.
/// Ordered by `seqno`; `history` only breaks ties so the order is total.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct RecoveryPosition {
    /// Identifier of the replication history the position belongs to.
    pub history: Option<String>,

    /// Last committed sequence number; `-1` when the member does not know it.
    pub seqno: i64,
}

impl RecoveryPosition {
    /// Position with no history tag.
    #[must_use]
    pub const fn new(seqno: i64) -> Self {
        Self {
            history: None,
            seqno,
        }
    }

    /// Position tagged with a history identifier.
    pub fn with_history(history: impl Into<String>, seqno: i64) -> Self {
        Self {
            history: Some(history.into()),
            seqno,
        }
    }
}

impl Ord for RecoveryPosition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.seqno
            .cmp(&other.seqno)
            .then_with(|| self.history.cmp(&other.history))
    }
}

impl PartialOrd for RecoveryPosition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for RecoveryPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.history {
            Some(history) => write!(f, "{history}:{}", self.seqno),
            None => write!(f, "{}", self.seqno),
        }
    }
}

impl FromStr for RecoveryPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (history, seqno) = match s.rsplit_once(':') {
            Some((history, seqno)) => (Some(history.trim()), seqno.trim()),
            None => (None, s),
        };

        let seqno = seqno
            .parse::<i64>()
            .map_err(|e| format!("invalid seqno in recovery position '{s}': {e}"))?;

        Ok(Self {
            history: history.filter(|h| !h.is_empty()).map(str::to_string),
            seqno,
        })
    }
}

/// Address of one member of one cluster, handed to executors and platforms.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct MemberRef {
    /// Owning cluster.
    pub cluster: ClusterId,

    /// Ordinal slot.
    pub ordinal: Ordinal,
}

impl MemberRef {
    /// Creates a new member reference.
    #[must_use]
    pub const fn new(cluster: ClusterId, ordinal: Ordinal) -> Self {
        Self { cluster, ordinal }
    }

    /// Name of the member's compute unit, e.g. `galera-0001`.
    #[must_use]
    pub fn name(&self) -> String {
        member_name(&self.cluster.name, self.ordinal)
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.cluster.namespace, self.name())
    }
}

/// Builds the compute unit name of a member.
#[must_use]
pub fn member_name(cluster_name: &str, ordinal: Ordinal) -> String {
    format!("{cluster_name}-{:04}", ordinal.0)
}

/// One member as observed in a single reconciliation pass.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Ordinal slot.
    pub ordinal: Ordinal,

    /// Reported (or, when unreachable, last known) role.
    pub role: Role,

    /// Observed health.
    pub health: Health,

    /// Recovery position, when queried this pass or remembered for an unreachable member.
    pub recovery_position: Option<RecoveryPosition>,

    /// Image the compute unit runs.
    pub running_version: Option<String>,
}

impl Member {
    /// A member with no compute unit.
    #[must_use]
    pub const fn absent(ordinal: Ordinal) -> Self {
        Self {
            ordinal,
            role: Role::Unknown,
            health: Health::Absent,
            recovery_position: None,
            running_version: None,
        }
    }

    /// Whether a compute unit exists for the member.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.health != Health::Absent
    }

    /// Healthy with a known role.
    #[must_use]
    pub fn is_serving(&self) -> bool {
        self.health == Health::Healthy && self.role != Role::Unknown
    }

    /// Whether the member answered this pass.
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        !matches!(self.health, Health::Absent | Health::Unreachable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_galera_positions() {
        let position: RecoveryPosition = "6d6c2c4a-2bf1-11ef-a000-0242ac120002:1234".parse().unwrap();
        assert_eq!(position.seqno, 1234);
        assert_eq!(
            position.history.as_deref(),
            Some("6d6c2c4a-2bf1-11ef-a000-0242ac120002")
        );

        let bare: RecoveryPosition = " 42\n".parse().unwrap();
        assert_eq!(bare, RecoveryPosition::new(42));

        let unknown: RecoveryPosition = "abc:-1".parse().unwrap();
        assert_eq!(unknown.seqno, -1);

        assert!("abc:".parse::<RecoveryPosition>().is_err());
        assert!("not-a-number".parse::<RecoveryPosition>().is_err());
    }

    #[test]
    fn positions_order_by_seqno_first() {
        let low = RecoveryPosition::with_history("zzz", 10);
        let high = RecoveryPosition::with_history("aaa", 11);
        assert!(low < high);
        assert!(RecoveryPosition::new(-1) < RecoveryPosition::new(0));
        assert!(RecoveryPosition::new(5) < RecoveryPosition::with_history("a", 5));
    }

    #[test]
    fn member_names_are_zero_padded() {
        let member = MemberRef::new(ClusterId::named("galera"), Ordinal(7));
        assert_eq!(member.name(), "galera-0007");
        assert_eq!(member.to_string(), "default/galera-0007");
    }

    #[test]
    fn roles_round_trip_through_strings() {
        for role in [Role::Seed, Role::Primary, Role::Secondary, Role::Unknown] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("leader".parse::<Role>().is_err());
        assert!(Role::Seed.is_primary());
        assert!(!Role::Secondary.is_primary());
    }
}
