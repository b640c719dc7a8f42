//! Compiling an action into platform and executor calls.

use std::time::Duration;

use galera_cluster::{
    BootstrapParams, ClusterId, ClusterManifest, ComputePlatform, MemberCommands, MemberRef,
    Ordinal, Role,
};
use tracing::{info, warn};

use crate::observer::bounded;
use crate::{Action, Error};

/// Applies actions to one cluster. Every call is bounded by the timeout.
pub struct Actuator<'a, C, P> {
    commands: &'a C,
    platform: &'a P,
    manifest: &'a ClusterManifest,
    cluster: ClusterId,
    timeout: Duration,
}

impl<'a, C, P> Actuator<'a, C, P>
where
    C: MemberCommands,
    P: ComputePlatform,
{
    /// Creates an actuator for the cluster described by `manifest`.
    pub fn new(
        commands: &'a C,
        platform: &'a P,
        manifest: &'a ClusterManifest,
        timeout: Duration,
    ) -> Self {
        Self {
            commands,
            platform,
            manifest,
            cluster: manifest.id(),
            timeout,
        }
    }

    fn member(&self, ordinal: Ordinal) -> MemberRef {
        MemberRef::new(self.cluster.clone(), ordinal)
    }

    /// Applies one action. A failure leaves the action not applied.
    ///
    /// # Errors
    ///
    /// Returns the first failing call.
    pub async fn apply(&self, action: &Action) -> Result<(), Error> {
        info!(cluster = %self.cluster, %action, "applying action");

        match *action {
            Action::Provision { ordinal } => {
                self.ensure_unit(ordinal, Role::Unknown, None).await?;
            }
            Action::CreateAsSeed { ordinal } => {
                let member = self.ensure_unit(ordinal, Role::Seed, None).await?;
                self.call("seed", self.commands.seed(&member)).await?;
            }
            Action::CreateAsPrimary { ordinal, join } => {
                let member = self.ensure_unit(ordinal, Role::Primary, Some(join)).await?;
                self.start(&member, Role::Primary, join).await?;
            }
            Action::CreateAsSecondary { ordinal, join } => {
                let member = self.ensure_unit(ordinal, Role::Secondary, Some(join)).await?;
                self.start(&member, Role::Secondary, join).await?;
            }
            Action::Remove {
                ordinal, graceful, ..
            } => {
                let member = self.member(ordinal);
                if graceful {
                    self.call("stop", self.commands.stop(&member)).await?;
                }
                self.delete(&member).await?;
            }
            Action::Promote { ordinal, join } => {
                let member = self.member(ordinal);
                self.call("stop", self.commands.stop(&member)).await?;
                self.start(&member, Role::Primary, join).await?;
            }
            Action::Demote { ordinal, join } => {
                let member = self.member(ordinal);
                self.call("stop", self.commands.stop(&member)).await?;
                self.start(&member, Role::Secondary, join).await?;
            }
            Action::Upgrade { ordinal, role, join } => {
                let role = if role.is_primary() {
                    Role::Primary
                } else {
                    Role::Secondary
                };
                let member = self.member(ordinal);
                self.call("stop", self.commands.stop(&member)).await?;
                self.delete(&member).await?;
                self.create(&member, role, Some(join)).await?;
                self.start(&member, role, join).await?;
            }
        }

        Ok(())
    }

    /// Stops and deletes a member without any safety check.
    ///
    /// A failed stop is logged and the unit is deleted anyway.
    ///
    /// # Errors
    ///
    /// Returns an error if the unit cannot be deleted.
    pub async fn tear_down(&self, ordinal: Ordinal) -> Result<(), Error> {
        let member = self.member(ordinal);
        info!(%member, "tearing down member");

        if let Err(e) = self.call("stop", self.commands.stop(&member)).await {
            warn!(%member, error = %e, "stop failed during teardown");
        }
        self.delete(&member).await
    }

    async fn start(&self, member: &MemberRef, role: Role, join: Ordinal) -> Result<(), Error> {
        let peer = self.member(join);
        match role {
            Role::Secondary => {
                self.call("secondary", self.commands.secondary(member, &peer))
                    .await
            }
            _ => self.call("primary", self.commands.primary(member, &peer)).await,
        }
    }

    async fn ensure_unit(
        &self,
        ordinal: Ordinal,
        role: Role,
        join: Option<Ordinal>,
    ) -> Result<MemberRef, Error> {
        let member = self.member(ordinal);
        let existing = bounded(self.timeout, "exists", self.platform.exists(&member))
            .await?
            .map_err(|e| Error::platform("exists", &e))?;
        if existing.is_none() {
            self.create(&member, role, join).await?;
        }
        Ok(member)
    }

    async fn create(
        &self,
        member: &MemberRef,
        role: Role,
        join: Option<Ordinal>,
    ) -> Result<(), Error> {
        let spec = &self.manifest.spec;
        let params = BootstrapParams {
            role,
            image: spec.image.clone(),
            peer: join.map(|ordinal| self.member(ordinal)),
            service: self.manifest.service_name(true),
            pod: spec.pod.clone(),
            service_policy: spec.service.clone(),
            tls: spec.tls.clone(),
            resources: spec.resources.clone(),
        };

        bounded(self.timeout, "create", self.platform.create(member, &params))
            .await?
            .map_err(|e| Error::platform("create", &e))
    }

    async fn delete(&self, member: &MemberRef) -> Result<(), Error> {
        bounded(self.timeout, "delete", self.platform.delete(member))
            .await?
            .map_err(|e| Error::platform("delete", &e))
    }

    async fn call<F>(&self, operation: &'static str, future: F) -> Result<(), Error>
    where
        F: Future<Output = Result<(), C::Error>>,
    {
        bounded(self.timeout, operation, future)
            .await?
            .map_err(|e| Error::command(operation, &e))
    }
}
