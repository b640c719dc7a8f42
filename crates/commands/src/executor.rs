//! Member commands backed by the cluster's own argv templates.

use async_trait::async_trait;
use galera_cluster::{
    ClusterId, CommandExecutor, Health, MemberCommands, MemberRef, RecoveryPosition,
    ResolvedCommands, Role, StatusReport,
};
use tracing::debug;

use crate::Error;
use crate::runner::{CommandRunner, Output, UNREACHABLE_EXIT_CODE};
use crate::template::{Vars, render};

/// Builds [`TemplateCommands`] for each cluster.
#[derive(Clone, Debug, Default)]
pub struct TemplateExecutor {
    runner: CommandRunner,
}

impl TemplateExecutor {
    /// Creates an executor running commands with `runner`.
    #[must_use]
    pub const fn new(runner: CommandRunner) -> Self {
        Self { runner }
    }
}

impl CommandExecutor for TemplateExecutor {
    type Commands = TemplateCommands;

    fn commands_for(&self, cluster: &ClusterId, commands: &ResolvedCommands) -> Self::Commands {
        TemplateCommands {
            cluster: cluster.clone(),
            commands: commands.clone(),
            runner: self.runner.clone(),
        }
    }
}

/// The resolved command templates of one cluster.
///
/// Status contract: exit 0 is healthy, any other code is unhealthy and 255
/// means the member could not be reached. A `state=starting` token marks a
/// member that is still joining, a `role=<role>` token reports its role.
/// Sequence contract: the last non-empty stdout line is the recovery
/// position. Every other command succeeds on exit 0.
#[derive(Clone, Debug)]
pub struct TemplateCommands {
    cluster: ClusterId,
    commands: ResolvedCommands,
    runner: CommandRunner,
}

impl TemplateCommands {
    /// Cluster the commands are bound to.
    #[must_use]
    pub const fn cluster(&self) -> &ClusterId {
        &self.cluster
    }

    async fn invoke(
        &self,
        operation: &'static str,
        template: &[String],
        vars: &Vars,
    ) -> Result<Output, Error> {
        let argv = render(operation, template, vars)?;
        debug!(operation, program = program(&argv), "invoking member command");
        self.runner.run(&argv, &[]).await
    }

    async fn invoke_checked(
        &self,
        operation: &'static str,
        template: &[String],
        vars: &Vars,
    ) -> Result<(), Error> {
        let argv = render(operation, template, vars)?;
        self.runner.run_checked(&argv, &[]).await.map(|_| ())
    }

    async fn start(
        &self,
        operation: &'static str,
        template: &[String],
        member: &MemberRef,
        peer: Option<&MemberRef>,
        role: Role,
    ) -> Result<(), Error> {
        let vars = Vars::for_member(member).with_peer(peer).with_role(role);
        self.invoke_checked(operation, template, &vars).await
    }
}

fn program(template: &[String]) -> &str {
    template.first().map_or("", String::as_str)
}

fn parse_status(program: &str, output: &Output) -> Result<StatusReport, Error> {
    if output.code == UNREACHABLE_EXIT_CODE {
        return Err(Error::Exit {
            program: program.to_string(),
            code: output.code,
        });
    }

    let role = match output.value("role") {
        Some(role) => role.parse::<Role>().map_err(|message| Error::Parse {
            program: program.to_string(),
            message,
        })?,
        None => Role::Unknown,
    };

    let health = if output
        .value("state")
        .is_some_and(|state| state.eq_ignore_ascii_case("starting"))
    {
        Health::Starting
    } else if output.success() {
        Health::Healthy
    } else {
        Health::Unhealthy
    };

    Ok(StatusReport::new(health, role))
}

fn parse_sequence(program: &str, output: &Output) -> Result<RecoveryPosition, Error> {
    if !output.success() {
        return Err(Error::Exit {
            program: program.to_string(),
            code: output.code,
        });
    }

    let line = output.last_line().ok_or_else(|| Error::Parse {
        program: program.to_string(),
        message: "no recovery position on stdout".to_string(),
    })?;

    line.parse().map_err(|message| Error::Parse {
        program: program.to_string(),
        message,
    })
}

#[async_trait]
impl MemberCommands for TemplateCommands {
    type Error = Error;

    async fn status(&self, member: &MemberRef) -> Result<StatusReport, Self::Error> {
        let template = &self.commands.status;
        let output = self
            .invoke("status", template, &Vars::for_member(member))
            .await?;
        parse_status(program(template), &output)
    }

    async fn sequence(&self, member: &MemberRef) -> Result<RecoveryPosition, Self::Error> {
        let template = &self.commands.sequence;
        let output = self
            .invoke("sequence", template, &Vars::for_member(member))
            .await?;
        parse_sequence(program(template), &output)
    }

    async fn seed(&self, member: &MemberRef) -> Result<(), Self::Error> {
        self.start("seed", &self.commands.seed, member, None, Role::Seed)
            .await
    }

    async fn primary(&self, member: &MemberRef, peer: &MemberRef) -> Result<(), Self::Error> {
        self.start(
            "primary",
            &self.commands.primary,
            member,
            Some(peer),
            Role::Primary,
        )
        .await
    }

    async fn secondary(&self, member: &MemberRef, peer: &MemberRef) -> Result<(), Self::Error> {
        self.start(
            "secondary",
            &self.commands.secondary,
            member,
            Some(peer),
            Role::Secondary,
        )
        .await
    }

    async fn stop(&self, member: &MemberRef) -> Result<(), Self::Error> {
        self.invoke_checked("stop", &self.commands.stop, &Vars::for_member(member))
            .await
    }
}
