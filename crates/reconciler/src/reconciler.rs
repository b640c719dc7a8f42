//! One reconciliation pass: observe, decide, act at most once, report.

use std::sync::Arc;

use galera_cluster::{
    ClusterId, ClusterManifest, ClusterMembership, ClusterPhase, ClusterRecord, ClusterSpec,
    ClusterStatus, ClusterStore, CommandExecutor, ComputePlatform, ErrorKind, Health, MemberRef,
    ResolvedCommands,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::actuator::Actuator;
use crate::observer::{ObserveMode, Observer, bounded};
use crate::planner::{Plan, plan};
use crate::quorum::{QuorumGuard, Verdict, required_primaries};
use crate::upgrade::{UpgradeStep, is_outdated, next_upgrade, stalled_member};
use crate::{Action, Error, ObservationHistory, ReconcilerConfig};

/// What one pass did.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PassReport {
    /// Phase published, if a status was written.
    pub phase: Option<ClusterPhase>,

    /// Reason published alongside the phase.
    pub reason: Option<String>,

    /// Action chosen this pass, whether or not it succeeded.
    pub action: Option<Action>,

    /// Whether the chosen action completed.
    pub applied: bool,

    /// The pass stopped before acting because the cluster was deleted or
    /// the reconciler is shutting down.
    pub aborted: bool,

    /// Nothing is left to do for this cluster; the worker may exit.
    pub finished: bool,
}

/// Drives one cluster toward its declared shape.
pub struct Reconciler<E, P, S> {
    id: ClusterId,
    executor: Arc<E>,
    platform: Arc<P>,
    store: Arc<S>,
    config: ReconcilerConfig,
    history: ObservationHistory,
    last_manifest: Option<(ClusterManifest, ResolvedCommands)>,
}

impl<E, P, S> Reconciler<E, P, S>
where
    E: CommandExecutor,
    P: ComputePlatform,
    S: ClusterStore,
{
    /// Creates a reconciler for one cluster.
    pub fn new(
        id: ClusterId,
        executor: Arc<E>,
        platform: Arc<P>,
        store: Arc<S>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            id,
            executor,
            platform,
            store,
            config,
            history: ObservationHistory::new(),
            last_manifest: None,
        }
    }

    /// Identity of the reconciled cluster.
    #[must_use]
    pub const fn id(&self) -> &ClusterId {
        &self.id
    }

    /// Runs one pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written, or the
    /// platform cannot list the cluster's units. A failed action is reported
    /// in the returned [`PassReport`], not as an error. A manifest the store
    /// holds but cannot parse is reported as degraded and nothing is touched.
    #[instrument(skip(self, cancel), fields(cluster = %self.id))]
    pub async fn pass(&mut self, cancel: &CancellationToken) -> Result<PassReport, Error> {
        let record = match self.read_record().await {
            Ok(record) => record,
            Err(e) if e.kind() == ErrorKind::Invalid => return self.unreadable(&e).await,
            Err(e) => return Err(e),
        };

        let record = match record {
            Some(record) if !record.deletion_requested() => record,
            record => return self.tear_down(record, cancel).await,
        };
        let manifest = record.manifest;

        if let Err(e) = manifest.validate() {
            warn!(error = %e, "manifest is invalid");
            let reason = format!("invalid manifest: {e}");
            let status = ClusterStatus {
                phase: ClusterPhase::Degraded,
                reason: Some(reason.clone()),
                ..ClusterStatus::default()
            };
            self.publish(&status).await?;
            return Ok(PassReport {
                phase: Some(ClusterPhase::Degraded),
                reason: Some(reason),
                ..PassReport::default()
            });
        }

        let resolved = manifest.spec.resolve_commands()?;
        let spec = manifest.spec.normalized();
        let commands = self.executor.commands_for(&self.id, &resolved);
        self.last_manifest = Some((manifest.clone(), resolved));

        let observer = Observer::new(&commands, &*self.platform, self.config.command_timeout);

        if spec.paused {
            let membership = observer
                .observe(&self.id, spec.replicas, &self.history, ObserveMode::StatusOnly)
                .await?;
            self.history.record(&membership);
            return self
                .report(&membership, ClusterPhase::Paused, None, None, false)
                .await;
        }

        let membership = observer
            .observe(&self.id, spec.replicas, &self.history, ObserveMode::Full)
            .await?;
        self.history.record(&membership);

        let decision = self.decide(&membership, &spec);
        let Decision {
            action,
            mut degraded,
            waiting,
            converged,
        } = decision;

        if degraded.is_none() {
            degraded = self.quorum_fault(&membership, &spec);
        }
        if degraded.is_none() {
            degraded = self.stuck_member(&membership, &spec);
        }

        let mut applied = false;
        let mut failure = None;
        if let Some(action) = &action {
            if self.should_abort(cancel).await? {
                info!(%action, "cluster deleted or shutting down; not acting");
                return Ok(PassReport {
                    action: Some(action.clone()),
                    aborted: true,
                    ..PassReport::default()
                });
            }

            let actuator = Actuator::new(
                &commands,
                &*self.platform,
                &manifest,
                self.config.command_timeout,
            );
            match actuator.apply(action).await {
                Ok(()) => {
                    applied = true;
                    if let Action::Remove { ordinal, .. } = action {
                        self.history.forget(*ordinal);
                    }
                }
                Err(e) => {
                    warn!(%action, error = %e, "action failed");
                    failure = Some(format!("{action} failed: {e}"));
                }
            }
        }

        let (phase, reason) = if let Some(reason) = degraded {
            (ClusterPhase::Degraded, Some(reason))
        } else if !membership.is_bootstrapped() {
            (ClusterPhase::Bootstrapping, failure.or(waiting))
        } else if converged && action.is_none() {
            (ClusterPhase::Converged, None)
        } else {
            (ClusterPhase::Converging, failure.or(waiting))
        };

        self.report(&membership, phase, reason, action, applied).await
    }

    fn decide(&self, membership: &ClusterMembership, spec: &ClusterSpec) -> Decision {
        let guard = QuorumGuard::new(membership, spec);

        if let Some(reason) = stalled_member(
            membership,
            spec,
            &self.history,
            self.config.upgrade_stall_passes,
        ) {
            warn!(%reason, "upgrade stalled");
            return Decision::degraded(format!("upgrade stalled: {reason}"));
        }

        let mut decision = match plan(membership, spec) {
            Plan::Act(action) => Decision::act(action),
            Plan::Waiting(reason) => Decision::waiting(reason),
            Plan::Blocked(reason) => Decision::degraded(reason),
            Plan::Converged => match next_upgrade(
                membership,
                spec,
                &self.history,
                self.config.upgrade_stall_passes,
            ) {
                UpgradeStep::UpToDate => Decision::converged(),
                UpgradeStep::Act(action) => Decision::act(action),
                UpgradeStep::Waiting(reason) => Decision::waiting(reason),
                UpgradeStep::Stalled(reason) => {
                    Decision::degraded(format!("upgrade stalled: {reason}"))
                }
            },
        };

        if membership.has_dual_seed() {
            let seeds: Vec<String> = membership
                .seeds()
                .iter()
                .map(ToString::to_string)
                .collect();
            let reason = format!("members {} all claim the seed role", seeds.join(", "));
            warn!(%reason, "dual seed detected");
            decision.degraded = Some(reason);
            if !decision.action.as_ref().is_some_and(Action::is_removal) {
                decision.action = None;
            }
        }

        if let Some(action) = &decision.action {
            if let Verdict::Deny(reason) = guard.check(action) {
                info!(%action, %reason, "quorum guard denied action");
                decision.action = None;
                decision.degraded.get_or_insert(reason);
            }
        }

        decision
    }

    /// Degraded once a primary is lost and fewer primaries serve than a
    /// majority of the desired count.
    ///
    /// A primary counts as lost when its slot has served as one and is now
    /// absent, starting, unhealthy, or unreachable past the grace period. A
    /// primary that is merely slow to answer is not lost yet.
    fn quorum_fault(&self, membership: &ClusterMembership, spec: &ClusterSpec) -> Option<String> {
        let threshold = self.config.unreachable_passes_before_degraded;
        let lost = membership
            .members()
            .iter()
            .filter(|member| self.history.was_primary(member.ordinal))
            .filter(|member| match member.health {
                Health::Healthy => false,
                Health::Unreachable => self.history.unreachable_passes(member.ordinal) >= threshold,
                Health::Starting | Health::Unhealthy | Health::Absent => true,
            })
            .count();
        if lost == 0 {
            return None;
        }

        let healthy = membership.healthy_primaries();
        let required = required_primaries(spec.desired_primaries());
        (healthy < required).then(|| {
            format!("{healthy} of {required} required primaries healthy, {lost} lost")
        })
    }

    fn stuck_member(&self, membership: &ClusterMembership, spec: &ClusterSpec) -> Option<String> {
        let limit = self.config.upgrade_stall_passes;
        let stuck = membership
            .with_health(Health::Starting)
            .find(|member| self.history.starting_passes(member.ordinal) > limit)?;
        let passes = self.history.starting_passes(stuck.ordinal);

        let upgrading = membership.members().iter().any(|member| is_outdated(member, spec));
        Some(if upgrading {
            format!(
                "upgrade stalled: member {} has been starting for {passes} passes",
                stuck.ordinal
            )
        } else {
            format!("member {} has been starting for {passes} passes", stuck.ordinal)
        })
    }

    async fn unreadable(&self, error: &Error) -> Result<PassReport, Error> {
        warn!(%error, "manifest cannot be read; leaving members untouched");
        let reason = format!("unreadable manifest: {error}");
        let status = ClusterStatus {
            phase: ClusterPhase::Degraded,
            reason: Some(reason.clone()),
            ..ClusterStatus::default()
        };
        if let Err(e) = self.publish(&status).await {
            warn!(error = %e, "could not publish status");
        }
        Ok(PassReport {
            phase: Some(ClusterPhase::Degraded),
            reason: Some(reason),
            ..PassReport::default()
        })
    }

    async fn should_abort(&self, cancel: &CancellationToken) -> Result<bool, Error> {
        if cancel.is_cancelled() {
            return Ok(true);
        }
        match self.read_record().await {
            Ok(record) => Ok(!record.is_some_and(|record| !record.deletion_requested())),
            Err(e) if e.kind() == ErrorKind::Invalid => Ok(true),
            Err(e) => Err(e),
        }
    }

    async fn tear_down(
        &mut self,
        record: Option<ClusterRecord>,
        cancel: &CancellationToken,
    ) -> Result<PassReport, Error> {
        let manifest = record
            .as_ref()
            .map(|record| record.manifest.clone())
            .or_else(|| self.last_manifest.as_ref().map(|(manifest, _)| manifest.clone()))
            .unwrap_or_else(|| ClusterManifest::new(&self.id.name, ClusterSpec::default()));
        let resolved = match (&record, &self.last_manifest) {
            (Some(record), _) => record.manifest.spec.resolve_commands().ok(),
            (None, Some((_, resolved))) => Some(resolved.clone()),
            (None, None) => None,
        };

        let units = bounded(
            self.config.command_timeout,
            "list",
            self.platform.list(&self.id),
        )
        .await?
        .map_err(|e| Error::platform("list", &e))?;

        let Some(highest) = units.iter().map(|unit| unit.ordinal).max() else {
            info!("every member removed");
            if record.is_some() {
                bounded(self.config.command_timeout, "finalize", self.store.finalize(&self.id))
                    .await?
                    .map_err(|e| Error::store("finalize", &e))?;
            }
            self.history.clear();
            return Ok(PassReport {
                finished: true,
                ..PassReport::default()
            });
        };

        let action = Action::Remove {
            ordinal: highest,
            role: self
                .history
                .remembered(highest)
                .map(|member| member.role)
                .unwrap_or_default(),
            graceful: resolved.is_some(),
        };

        if cancel.is_cancelled() {
            return Ok(PassReport {
                action: Some(action),
                aborted: true,
                ..PassReport::default()
            });
        }

        let applied = if let Some(resolved) = &resolved {
            let commands = self.executor.commands_for(&self.id, resolved);
            let actuator = Actuator::new(
                &commands,
                &*self.platform,
                &manifest,
                self.config.command_timeout,
            );
            actuator.tear_down(highest).await
        } else {
            bounded(
                self.config.command_timeout,
                "delete",
                self.platform.delete(&MemberRef::new(self.id.clone(), highest)),
            )
            .await?
            .map_err(|e| Error::platform("delete", &e))
        };
        let applied = match applied {
            Ok(()) => true,
            Err(e) => {
                warn!(ordinal = %highest, error = %e, "teardown step failed");
                false
            }
        };

        let mut report = PassReport {
            action: Some(action.clone()),
            applied,
            ..PassReport::default()
        };

        if record.is_some() {
            let remaining = units.len() - usize::from(applied);
            let status = ClusterStatus {
                phase: ClusterPhase::Converging,
                reason: Some(format!("deleting cluster, {remaining} members left")),
                size: u32::try_from(remaining).unwrap_or(u32::MAX),
                last_action: Some(action.to_string()),
                ..ClusterStatus::default()
            };
            self.publish(&status).await?;
            report.phase = Some(status.phase);
            report.reason = status.reason;
        }

        Ok(report)
    }

    async fn report(
        &self,
        membership: &ClusterMembership,
        phase: ClusterPhase,
        reason: Option<String>,
        action: Option<Action>,
        applied: bool,
    ) -> Result<PassReport, Error> {
        let mut status =
            ClusterStatus::from_membership(&self.id.name, membership, phase, reason.clone());
        status.last_action = action.as_ref().map(ToString::to_string);

        debug!(%phase, ?reason, "publishing status");
        self.publish(&status).await?;

        Ok(PassReport {
            phase: Some(phase),
            reason,
            action,
            applied,
            aborted: false,
            finished: false,
        })
    }

    async fn read_record(&self) -> Result<Option<ClusterRecord>, Error> {
        bounded(self.config.command_timeout, "get", self.store.get(&self.id))
            .await?
            .map_err(|e| Error::store("get", &e))
    }

    async fn publish(&self, status: &ClusterStatus) -> Result<(), Error> {
        bounded(
            self.config.command_timeout,
            "update_status",
            self.store.update_status(&self.id, status),
        )
        .await?
        .map_err(|e| Error::store("update_status", &e))
    }
}

#[derive(Debug, Default)]
struct Decision {
    action: Option<Action>,
    degraded: Option<String>,
    waiting: Option<String>,
    converged: bool,
}

impl Decision {
    fn act(action: Action) -> Self {
        Self {
            action: Some(action),
            ..Self::default()
        }
    }

    fn waiting(reason: String) -> Self {
        Self {
            waiting: Some(reason),
            ..Self::default()
        }
    }

    fn degraded(reason: String) -> Self {
        Self {
            degraded: Some(reason),
            ..Self::default()
        }
    }

    fn converged() -> Self {
        Self {
            converged: true,
            ..Self::default()
        }
    }
}
