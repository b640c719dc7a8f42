//! Harness driving a reconciler against the simulated cluster.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use galera_cluster::{ClusterCommands, ClusterId, ClusterManifest, ClusterPhase, ClusterSpec};
use galera_cluster_mock::{MemoryStore, MockCluster};
use galera_reconciler::{PassReport, Reconciler, ReconcilerConfig};
use tokio_util::sync::CancellationToken;

pub fn spec(replicas: u32, primaries: u32, image: &str) -> ClusterSpec {
    let argv = |s: &str| s.split_whitespace().map(str::to_string).collect();
    ClusterSpec {
        replicas,
        primaries,
        image: image.to_string(),
        commands: Some(ClusterCommands {
            status: argv("galera-status {member}"),
            sequence: argv("galera-sequence {member}"),
            stop: argv("galera-stop {member}"),
            seed: argv("galera-start {member} --bootstrap"),
            primary: argv("galera-start {member} --join {peer}"),
            secondary: argv("galera-start {member} --join {peer} --read-only"),
        }),
        ..ClusterSpec::default()
    }
}

pub fn config() -> ReconcilerConfig {
    ReconcilerConfig {
        command_timeout: Duration::from_secs(1),
        unreachable_passes_before_degraded: 3,
        upgrade_stall_passes: 3,
    }
}

pub struct Harness {
    pub id: ClusterId,
    pub cluster: MockCluster,
    pub store: MemoryStore,
    pub reconciler: Reconciler<MockCluster, MockCluster, MemoryStore>,
    pub cancel: CancellationToken,
}

impl Harness {
    pub fn new(name: &str, spec: ClusterSpec) -> Self {
        Self::with_cluster(name, spec, MockCluster::new())
    }

    pub fn with_cluster(name: &str, spec: ClusterSpec, cluster: MockCluster) -> Self {
        let store = MemoryStore::new();
        let id = store.apply(ClusterManifest::new(name, spec));
        let reconciler = Reconciler::new(
            id.clone(),
            Arc::new(cluster.clone()),
            Arc::new(cluster.clone()),
            Arc::new(store.clone()),
            config(),
        );
        Self {
            id,
            cluster,
            store,
            reconciler,
            cancel: CancellationToken::new(),
        }
    }

    pub async fn pass(&mut self) -> PassReport {
        self.reconciler
            .pass(&self.cancel)
            .await
            .expect("pass should not fail")
    }

    /// Runs passes until the cluster reports `Converged`, returning every report.
    pub async fn converge(&mut self, max_passes: usize) -> Vec<PassReport> {
        let mut reports = Vec::new();
        for _ in 0..max_passes {
            let report = self.pass().await;
            let done = report.phase == Some(ClusterPhase::Converged);
            reports.push(report);
            if done {
                return reports;
            }
        }
        panic!("cluster did not converge in {max_passes} passes: {reports:#?}");
    }

    pub fn edit(&self, edit: impl FnOnce(&mut ClusterSpec)) {
        self.store.update(&self.id, |manifest| edit(&mut manifest.spec));
    }

    pub fn phase(&self) -> Option<ClusterPhase> {
        self.store.status(&self.id).map(|status| status.phase)
    }
}
