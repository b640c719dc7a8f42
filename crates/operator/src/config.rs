//! Operator configuration file.

use std::path::Path;
use std::time::Duration;

use galera_commands::PlatformCommands;
use galera_reconciler::{ControllerConfig, ReconcilerConfig};
use serde::Deserialize;

use crate::Error;

/// Timings of the reconciliation loop, in seconds unless noted.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct Timings {
    /// Bound on every command, platform and store call (default: 30)
    pub command_timeout_secs: u64,

    /// Interval between store listings (default: 30)
    pub resync_interval_secs: u64,

    /// Interval between two passes of one cluster (default: 5)
    pub requeue_interval_secs: u64,

    /// Passes before an unreachable primary counts against quorum (default: 3)
    pub unreachable_passes_before_degraded: u32,

    /// Passes a member may stay starting before it is reported stuck (default: 10)
    pub upgrade_stall_passes: u32,
}

impl Default for Timings {
    fn default() -> Self {
        let controller = ControllerConfig::default();
        Self {
            command_timeout_secs: controller.reconciler.command_timeout.as_secs(),
            resync_interval_secs: controller.resync_interval.as_secs(),
            requeue_interval_secs: controller.requeue_interval.as_secs(),
            unreachable_passes_before_degraded: controller
                .reconciler
                .unreachable_passes_before_degraded,
            upgrade_stall_passes: controller.reconciler.upgrade_stall_passes,
        }
    }
}

/// Contents of the operator's TOML configuration file.
///
/// ```toml
/// [platform]
/// list = ["galera-units", "list", "{namespace}", "{cluster}"]
/// exists = ["galera-units", "exists", "{member}"]
/// create = ["galera-units", "create", "{member}", "{image}", "{role}", "{peer}"]
/// delete = ["galera-units", "delete", "{member}"]
///
/// [timings]
/// resyncIntervalSecs = 60
/// ```
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperatorConfig {
    /// Compute platform command templates.
    pub platform: PlatformCommands,

    /// Loop timings.
    #[serde(default)]
    pub timings: Timings,
}

impl OperatorConfig {
    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid TOML.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        toml::from_str(&contents).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Bound on each command.
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.timings.command_timeout_secs)
    }

    /// Controller configuration derived from the timings.
    #[must_use]
    pub const fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            resync_interval: Duration::from_secs(self.timings.resync_interval_secs),
            requeue_interval: Duration::from_secs(self.timings.requeue_interval_secs),
            reconciler: ReconcilerConfig {
                command_timeout: self.command_timeout(),
                unreachable_passes_before_degraded: self.timings.unreachable_passes_before_degraded,
                upgrade_stall_passes: self.timings.upgrade_stall_passes,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn loads_platform_templates_and_defaults_timings() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            [platform]
            list = ["units", "list", "{{cluster}}"]
            exists = ["units", "exists", "{{member}}"]
            create = ["units", "create", "{{member}}", "{{image}}"]
            delete = ["units", "delete", "{{member}}"]

            [timings]
            resyncIntervalSecs = 60
            "#
        )
        .unwrap();

        let config = OperatorConfig::load(file.path()).unwrap();
        assert_eq!(config.platform.list, vec!["units", "list", "{cluster}"]);

        let controller = config.controller_config();
        assert_eq!(controller.resync_interval, Duration::from_secs(60));
        assert_eq!(controller.requeue_interval, Duration::from_secs(5));
        assert_eq!(controller.reconciler.command_timeout, Duration::from_secs(30));
        assert_eq!(controller.reconciler.upgrade_stall_passes, 10);
    }

    #[test]
    fn rejects_malformed_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "platform = 3").unwrap();
        assert_matches!(OperatorConfig::load(file.path()), Err(Error::Config { .. }));

        assert_matches!(
            OperatorConfig::load(Path::new("/nonexistent/galera.toml")),
            Err(Error::Io { .. })
        );
    }
}
