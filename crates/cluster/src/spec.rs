//! Desired cluster shape as declared by the user.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::SpecError;

/// Smallest cluster that survives the loss of one member.
pub const MIN_VIABLE_SIZE: u32 = 3;

/// Memory request applied when the spec does not set one.
pub const DEFAULT_MEMORY_REQUEST: &str = "2M";

/// Command templates, one argv vector per database control operation.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCommands {
    /// Reports health and role.
    #[serde(default)]
    pub status: Vec<String>,

    /// Reports the recovery position.
    #[serde(default)]
    pub sequence: Vec<String>,

    /// Stops the database.
    #[serde(default)]
    pub stop: Vec<String>,

    /// Bootstraps a new cluster from local history.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub seed: Vec<String>,

    /// Starts the database as a primary joining `{peer}`.
    #[serde(default)]
    pub primary: Vec<String>,

    /// Starts the database as a secondary joining `{peer}`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secondary: Vec<String>,
}

impl ClusterCommands {
    fn is_empty(&self) -> bool {
        self.status.is_empty()
            && self.sequence.is_empty()
            && self.stop.is_empty()
            && self.seed.is_empty()
            && self.primary.is_empty()
            && self.secondary.is_empty()
    }
}

/// Command set after legacy resolution and fallbacks have been applied.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedCommands {
    /// Reports health and role.
    pub status: Vec<String>,

    /// Reports the recovery position.
    pub sequence: Vec<String>,

    /// Stops the database.
    pub stop: Vec<String>,

    /// Bootstraps a new cluster.
    pub seed: Vec<String>,

    /// Starts as primary.
    pub primary: Vec<String>,

    /// Starts as secondary.
    pub secondary: Vec<String>,
}

/// Pod scheduling policy passed through to the platform.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodPolicy {
    /// Labels a node must carry for a member to be scheduled on it.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub node_selector: BTreeMap<String, String>,

    /// Avoid placing two members of the cluster on the same node.
    #[serde(default)]
    pub anti_affinity: bool,

    /// Whether the platform mounts its API token into members.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub automount_service_account_token: Option<bool>,
}

/// Client-facing service policy.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePolicy {
    /// Service name override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Session affinity mode (`None` or `ClientIP`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_affinity: Option<String>,
}

/// Static TLS secrets for peer and client traffic.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticTls {
    /// Secret holding the member peer certificate.
    #[serde(default)]
    pub member_secret: String,

    /// Secret holding the operator client certificate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_secret: Option<String>,
}

/// TLS configuration for the cluster.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsPolicy {
    /// Certificates provided up front as secrets.
    #[serde(default, rename = "static", skip_serializing_if = "Option::is_none")]
    pub static_tls: Option<StaticTls>,
}

impl TlsPolicy {
    /// Checks that the policy names everything it needs.
    ///
    /// # Errors
    ///
    /// Returns an error if static TLS is selected without a member secret.
    pub fn validate(&self) -> Result<(), SpecError> {
        if let Some(static_tls) = &self.static_tls {
            if static_tls.member_secret.trim().is_empty() {
                return Err(SpecError::Tls("static TLS requires a member secret".into()));
            }
        }
        Ok(())
    }
}

/// Resource requests for one member.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequests {
    /// Memory request, e.g. `512Mi`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,

    /// CPU request, e.g. `500m`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
}

/// Resource requirements for one member.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resources {
    /// Requested resources.
    #[serde(default)]
    pub requests: ResourceRequests,
}

/// Desired shape of one galera cluster.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    /// Desired number of members.
    #[serde(default, alias = "size")]
    pub replicas: u32,

    /// Desired number of primaries; `0` makes every member a primary.
    #[serde(default)]
    pub primaries: u32,

    /// Suspends all reconciliation actions for the cluster.
    #[serde(default)]
    pub paused: bool,

    /// Declared image; members running anything else are upgraded.
    #[serde(default)]
    pub image: String,

    /// Command templates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commands: Option<ClusterCommands>,

    /// Legacy status command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_command: Option<Vec<String>>,

    /// Legacy sequence command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_command: Option<Vec<String>>,

    /// Legacy stop command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_command: Option<Vec<String>>,

    /// Legacy seed command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_command: Option<Vec<String>>,

    /// Legacy primary command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_command: Option<Vec<String>>,

    /// Legacy secondary command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary_command: Option<Vec<String>>,

    /// Pod scheduling policy.
    #[serde(default)]
    pub pod: PodPolicy,

    /// Client service policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<ServicePolicy>,

    /// Service name override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,

    /// Resource requirements.
    #[serde(default)]
    pub resources: Resources,

    /// TLS configuration.
    #[serde(default, rename = "TLS", alias = "tls", skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsPolicy>,
}

impl ClusterSpec {
    /// Returns a copy with defaults filled in and sizes coerced into range.
    ///
    /// A one- or two-member cluster cannot tolerate any failure, so such sizes
    /// are raised to [`MIN_VIABLE_SIZE`]. Zero stays zero.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut spec = self.clone();

        if spec.replicas > 0 && spec.replicas < MIN_VIABLE_SIZE {
            spec.replicas = MIN_VIABLE_SIZE;
        }

        if spec.primaries > spec.replicas {
            spec.primaries = spec.replicas;
        }

        if spec.resources.requests.memory.is_none() {
            spec.resources.requests.memory = Some(DEFAULT_MEMORY_REQUEST.to_string());
        }

        spec
    }

    /// Effective number of primaries the cluster should run.
    #[must_use]
    pub fn desired_primaries(&self) -> u32 {
        if self.primaries == 0 {
            self.replicas
        } else {
            self.primaries.min(self.replicas)
        }
    }

    /// Merges the `commands` struct and the legacy fields into one command set.
    ///
    /// # Errors
    ///
    /// Returns an error if both forms are given with different values, or a
    /// required template is missing.
    pub fn resolve_commands(&self) -> Result<ResolvedCommands, SpecError> {
        let legacy = ClusterCommands {
            status: self.status_command.clone().unwrap_or_default(),
            sequence: self.sequence_command.clone().unwrap_or_default(),
            stop: self.stop_command.clone().unwrap_or_default(),
            seed: self.seed_command.clone().unwrap_or_default(),
            primary: self.primary_command.clone().unwrap_or_default(),
            secondary: self.secondary_command.clone().unwrap_or_default(),
        };

        let commands = match &self.commands {
            Some(commands) if !legacy.is_empty() => ClusterCommands {
                status: merge("statusCommand", &commands.status, legacy.status)?,
                sequence: merge("sequenceCommand", &commands.sequence, legacy.sequence)?,
                stop: merge("stopCommand", &commands.stop, legacy.stop)?,
                seed: merge("seedCommand", &commands.seed, legacy.seed)?,
                primary: merge("primaryCommand", &commands.primary, legacy.primary)?,
                secondary: merge("secondaryCommand", &commands.secondary, legacy.secondary)?,
            },
            Some(commands) => commands.clone(),
            None => legacy,
        };

        require("status", &commands.status)?;
        require("sequence", &commands.sequence)?;
        require("stop", &commands.stop)?;
        require("primary", &commands.primary)?;

        let seed = if commands.seed.is_empty() {
            commands.primary.clone()
        } else {
            commands.seed
        };
        let secondary = if commands.secondary.is_empty() {
            commands.primary.clone()
        } else {
            commands.secondary
        };

        Ok(ResolvedCommands {
            status: commands.status,
            sequence: commands.sequence,
            stop: commands.stop,
            seed,
            primary: commands.primary,
            secondary,
        })
    }
}

fn merge(
    field: &'static str,
    new: &[String],
    legacy: Vec<String>,
) -> Result<Vec<String>, SpecError> {
    if new.is_empty() {
        return Ok(legacy);
    }
    if !legacy.is_empty() && new != legacy.as_slice() {
        return Err(SpecError::ConflictingCommands(field));
    }
    Ok(new.to_vec())
}

fn require(name: &'static str, command: &[String]) -> Result<(), SpecError> {
    if command.iter().all(|arg| arg.trim().is_empty()) {
        return Err(SpecError::MissingCommand(name));
    }
    Ok(())
}
