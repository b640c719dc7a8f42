//! Compute platform driven by operator-configured argv templates.

use async_trait::async_trait;
use galera_cluster::{BootstrapParams, ClusterId, ComputePlatform, ComputeUnit, MemberRef, Ordinal};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Error;
use crate::runner::{CommandRunner, Output};
use crate::template::{Vars, render};

/// Argv templates for the four platform operations.
///
/// Besides the member placeholders, `create` may use `{image}` and `{service}`.
/// `list` only sees `{cluster}` and `{namespace}`.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformCommands {
    /// Prints one `<ordinal> [image]` line per compute unit of the cluster.
    pub list: Vec<String>,

    /// Exits 0 when the unit exists (optionally printing `image=<image>`),
    /// 1 when it does not.
    pub exists: Vec<String>,

    /// Creates the unit. Scheduling and TLS settings arrive as `GALERA_*`
    /// environment variables.
    pub create: Vec<String>,

    /// Deletes the unit; must succeed when it is already gone.
    pub delete: Vec<String>,
}

/// [`ComputePlatform`] running [`PlatformCommands`].
#[derive(Clone, Debug)]
pub struct TemplatePlatform {
    commands: PlatformCommands,
    runner: CommandRunner,
}

impl TemplatePlatform {
    /// Creates a platform running `commands` with `runner`.
    #[must_use]
    pub const fn new(commands: PlatformCommands, runner: CommandRunner) -> Self {
        Self { commands, runner }
    }
}

fn program(argv: &[String]) -> &str {
    argv.first().map_or("", String::as_str)
}

fn parse_units(program: &str, output: &Output) -> Result<Vec<ComputeUnit>, Error> {
    output
        .stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let mut fields = line.split_whitespace();
            let ordinal = fields
                .next()
                .and_then(|field| field.parse::<u32>().ok())
                .ok_or_else(|| Error::Parse {
                    program: program.to_string(),
                    message: format!("expected '<ordinal> [image]', got '{line}'"),
                })?;
            Ok(ComputeUnit {
                ordinal: Ordinal(ordinal),
                version: fields.next().map(str::to_string),
            })
        })
        .collect()
}

fn bootstrap_env(params: &BootstrapParams) -> Vec<(String, String)> {
    let mut env = Vec::new();
    let mut set = |key: &str, value: String| env.push((key.to_string(), value));

    if let Some(memory) = &params.resources.requests.memory {
        set("GALERA_MEMORY_REQUEST", memory.clone());
    }
    if let Some(cpu) = &params.resources.requests.cpu {
        set("GALERA_CPU_REQUEST", cpu.clone());
    }
    if !params.pod.node_selector.is_empty() {
        let selector = params
            .pod
            .node_selector
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(",");
        set("GALERA_NODE_SELECTOR", selector);
    }
    if params.pod.anti_affinity {
        set("GALERA_ANTI_AFFINITY", "true".to_string());
    }
    if let Some(automount) = params.pod.automount_service_account_token {
        set("GALERA_AUTOMOUNT_SERVICE_ACCOUNT_TOKEN", automount.to_string());
    }
    if let Some(static_tls) = params.tls.as_ref().and_then(|tls| tls.static_tls.as_ref()) {
        set("GALERA_TLS_MEMBER_SECRET", static_tls.member_secret.clone());
        if let Some(operator) = &static_tls.operator_secret {
            set("GALERA_TLS_OPERATOR_SECRET", operator.clone());
        }
    }
    if let Some(affinity) = params
        .service_policy
        .as_ref()
        .and_then(|policy| policy.session_affinity.as_ref())
    {
        set("GALERA_SESSION_AFFINITY", affinity.clone());
    }

    env
}

#[async_trait]
impl ComputePlatform for TemplatePlatform {
    type Error = Error;

    async fn list(&self, cluster: &ClusterId) -> Result<Vec<ComputeUnit>, Self::Error> {
        let vars = Vars::default()
            .with("cluster", &cluster.name)
            .with("namespace", &cluster.namespace);
        let argv = render("list", &self.commands.list, &vars)?;
        let output = self.runner.run_checked(&argv, &[]).await?;
        parse_units(program(&argv), &output)
    }

    async fn exists(&self, member: &MemberRef) -> Result<Option<ComputeUnit>, Self::Error> {
        let argv = render("exists", &self.commands.exists, &Vars::for_member(member))?;
        let output = self.runner.run(&argv, &[]).await?;
        match output.code {
            0 => Ok(Some(ComputeUnit {
                ordinal: member.ordinal,
                version: output.value("image").map(str::to_string),
            })),
            1 => Ok(None),
            code => Err(Error::Exit {
                program: program(&argv).to_string(),
                code,
            }),
        }
    }

    async fn create(
        &self,
        member: &MemberRef,
        params: &BootstrapParams,
    ) -> Result<(), Self::Error> {
        let vars = Vars::for_member(member)
            .with_peer(params.peer.as_ref())
            .with_role(params.role)
            .with("image", &params.image)
            .with("service", &params.service);
        let argv = render("create", &self.commands.create, &vars)?;

        info!(%member, image = %params.image, role = %params.role, "creating compute unit");
        self.runner
            .run_checked(&argv, &bootstrap_env(params))
            .await
            .map(|_| ())
    }

    async fn delete(&self, member: &MemberRef) -> Result<(), Self::Error> {
        let argv = render("delete", &self.commands.delete, &Vars::for_member(member))?;
        debug!(%member, "deleting compute unit");
        self.runner.run_checked(&argv, &[]).await.map(|_| ())
    }
}
