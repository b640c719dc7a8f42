//! Reconciler and controller configuration.

use std::time::Duration;

/// Configuration for reconciliation passes of one cluster.
#[derive(Clone, Debug)]
pub struct ReconcilerConfig {
    /// Bound on every executor, platform and store call (default: 30s)
    pub command_timeout: Duration,

    /// Consecutive unreachable passes before an unreachable primary counts
    /// against quorum (default: 3)
    pub unreachable_passes_before_degraded: u32,

    /// Consecutive starting passes after which a member is considered stuck
    /// and an in-flight upgrade stalled (default: 10)
    pub upgrade_stall_passes: u32,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_secs(30),
            unreachable_passes_before_degraded: 3,
            upgrade_stall_passes: 10,
        }
    }
}

/// Configuration for the per-cluster controller.
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// How often the store is listed for new clusters (default: 30s)
    pub resync_interval: Duration,

    /// Delay between two passes of the same cluster (default: 5s)
    pub requeue_interval: Duration,

    /// Per-pass configuration.
    pub reconciler: ReconcilerConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            resync_interval: Duration::from_secs(30),
            requeue_interval: Duration::from_secs(5),
            reconciler: ReconcilerConfig::default(),
        }
    }
}
