//! Building a point-in-time membership from the platform and the members.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use galera_cluster::{
    ClusterId, ClusterMembership, ComputePlatform, ComputeUnit, Health, Member, MemberCommands,
    MemberRef, Ordinal, Role,
};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::{Error, ObservationHistory};

/// How much to ask each member.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ObserveMode {
    /// Status and, for members not serving, Sequence.
    Full,

    /// Status only.
    StatusOnly,
}

/// Queries every candidate member of one cluster concurrently.
pub struct Observer<'a, C, P> {
    commands: &'a C,
    platform: &'a P,
    timeout: Duration,
}

impl<'a, C, P> Observer<'a, C, P>
where
    C: MemberCommands,
    P: ComputePlatform,
{
    /// Creates an observer bounding every call by `timeout`.
    pub const fn new(commands: &'a C, platform: &'a P, timeout: Duration) -> Self {
        Self {
            commands,
            platform,
            timeout,
        }
    }

    /// Observes every ordinal in `[0, replicas)` plus any unit the platform lists.
    ///
    /// # Errors
    ///
    /// Returns an error only if the platform cannot list the cluster's units.
    pub async fn observe(
        &self,
        cluster: &ClusterId,
        replicas: u32,
        history: &ObservationHistory,
        mode: ObserveMode,
    ) -> Result<ClusterMembership, Error> {
        let listed = bounded(self.timeout, "list", self.platform.list(cluster))
            .await?
            .map_err(|e| Error::platform("list", &e))?;
        let listed: BTreeMap<Ordinal, ComputeUnit> =
            listed.into_iter().map(|unit| (unit.ordinal, unit)).collect();

        let ordinals: BTreeSet<Ordinal> = (0..replicas)
            .map(Ordinal)
            .chain(listed.keys().copied())
            .collect();

        let members = join_all(ordinals.into_iter().map(|ordinal| {
            let member = MemberRef::new(cluster.clone(), ordinal);
            self.observe_member(member, history, mode)
        }))
        .await;

        let membership = ClusterMembership::new(members);
        debug!(
            %cluster,
            present = membership.present_count(),
            healthy_primaries = membership.healthy_primaries(),
            "observed membership"
        );
        Ok(membership)
    }

    async fn observe_member(
        &self,
        member: MemberRef,
        history: &ObservationHistory,
        mode: ObserveMode,
    ) -> Member {
        let ordinal = member.ordinal;

        let lookup = bounded(self.timeout, "exists", self.platform.exists(&member))
            .await
            .and_then(|result| result.map_err(|e| Error::platform("exists", &e)));
        let unit = match lookup {
            Ok(Some(unit)) => unit,
            Ok(None) => return Member::absent(ordinal),
            Err(e) => {
                warn!(%member, error = %e, "platform lookup failed");
                return unreachable(ordinal, history, None);
            }
        };

        let status = bounded(self.timeout, "status", self.commands.status(&member))
            .await
            .and_then(|result| result.map_err(|e| Error::command("status", &e)));
        let report = match status {
            Ok(report) => report,
            Err(e) if e.kind().is_transient() => {
                warn!(%member, error = %e, "member unreachable");
                return unreachable(ordinal, history, unit.version);
            }
            Err(e) => {
                debug!(%member, error = %e, "status failed");
                return self
                    .with_position(unhealthy(ordinal, unit.version), &member, mode)
                    .await;
            }
        };

        let observed = Member {
            ordinal,
            role: if report.health == Health::Unhealthy {
                Role::Unknown
            } else {
                report.role
            },
            health: report.health,
            recovery_position: None,
            running_version: unit.version,
        };

        if observed.is_serving() {
            observed
        } else {
            self.with_position(observed, &member, mode).await
        }
    }

    async fn with_position(
        &self,
        mut observed: Member,
        member: &MemberRef,
        mode: ObserveMode,
    ) -> Member {
        if mode == ObserveMode::StatusOnly {
            return observed;
        }

        let sequence = bounded(self.timeout, "sequence", self.commands.sequence(member))
            .await
            .and_then(|result| result.map_err(|e| Error::command("sequence", &e)));
        match sequence {
            Ok(position) => observed.recovery_position = Some(position),
            Err(e) => debug!(%member, error = %e, "sequence failed"),
        }
        observed
    }
}

fn unhealthy(ordinal: Ordinal, version: Option<String>) -> Member {
    Member {
        ordinal,
        role: Role::Unknown,
        health: Health::Unhealthy,
        recovery_position: None,
        running_version: version,
    }
}

fn unreachable(ordinal: Ordinal, history: &ObservationHistory, version: Option<String>) -> Member {
    let remembered = history.remembered(ordinal);
    Member {
        ordinal,
        role: remembered.map_or(Role::Unknown, |member| member.role),
        health: Health::Unreachable,
        recovery_position: remembered.and_then(|member| member.recovery_position.clone()),
        running_version: version
            .or_else(|| remembered.and_then(|member| member.running_version.clone())),
    }
}

/// Runs `future` bounded by `limit`.
pub(crate) async fn bounded<F: Future>(
    limit: Duration,
    operation: &'static str,
    future: F,
) -> Result<F::Output, Error> {
    timeout(limit, future)
        .await
        .map_err(|_| Error::Timeout(operation))
}
