//! Galera operator wiring: configuration, manifest directory store and the
//! command-template executor and platform.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod config;
mod error;
mod store;

use std::sync::Arc;

use galera_commands::{CommandRunner, TemplateExecutor, TemplatePlatform};
use galera_reconciler::Controller;
use tokio_util::sync::CancellationToken;

pub use config::{OperatorConfig, Timings};
pub use error::Error;
pub use store::DirectoryStore;

/// Controller over a manifest directory with command-template backends.
pub type OperatorController = Controller<TemplateExecutor, TemplatePlatform, DirectoryStore>;

/// Builds the controller for `config` over the manifests in `store`.
#[must_use]
pub fn build_controller(
    config: &OperatorConfig,
    store: DirectoryStore,
    shutdown: CancellationToken,
) -> OperatorController {
    let runner = CommandRunner::new(config.command_timeout());
    let executor = TemplateExecutor::new(runner.clone());
    let platform = TemplatePlatform::new(config.platform.clone(), runner);

    Controller::new_with_shutdown(
        Arc::new(executor),
        Arc::new(platform),
        Arc::new(store),
        config.controller_config(),
        shutdown,
    )
}
