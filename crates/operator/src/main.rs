//! Runs the galera reconciliation controller over a manifest directory.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::path::PathBuf;

use clap::Parser;
use galera_operator::{DirectoryStore, Error, OperatorConfig, build_controller};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Clone, Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// Operator configuration file
    #[arg(long, default_value = "/etc/galera/operator.toml", env = "GALERA_OPERATOR_CONFIG")]
    config: PathBuf,

    /// Directory holding cluster manifests
    #[arg(long, default_value = "/etc/galera/clusters", env = "GALERA_MANIFESTS_DIR")]
    manifests_dir: PathBuf,

    /// Overrides the resync interval from the configuration file (seconds)
    #[arg(long, env = "GALERA_RESYNC_INTERVAL_SECS")]
    resync_interval_secs: Option<u64>,

    /// Overrides the command timeout from the configuration file (seconds)
    #[arg(long, env = "GALERA_COMMAND_TIMEOUT_SECS")]
    command_timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut config = OperatorConfig::load(&args.config)?;
    if let Some(secs) = args.resync_interval_secs {
        config.timings.resync_interval_secs = secs;
    }
    if let Some(secs) = args.command_timeout_secs {
        config.timings.command_timeout_secs = secs;
    }

    let shutdown_token = CancellationToken::new();

    let signal_shutdown_token = shutdown_token.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutting down");
        signal_shutdown_token.cancel();
    });

    info!(
        manifests = %args.manifests_dir.display(),
        config = %args.config.display(),
        "starting galera operator"
    );

    let store = DirectoryStore::new(args.manifests_dir);
    build_controller(&config, store, shutdown_token).run().await;

    Ok(())
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM"),
                _ = sigint.recv() => info!("Received SIGINT"),
            }
        }
        _ => {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received interrupt signal");
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Received interrupt signal");
}
