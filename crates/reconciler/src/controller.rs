//! Work queue keyed by cluster identity.
//!
//! Each cluster gets its own worker task running passes strictly one after
//! another. Different clusters are reconciled concurrently and share nothing
//! but the executor, platform and store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use galera_cluster::{ClusterId, ClusterStore, CommandExecutor, ComputePlatform};
use tokio::sync::{Notify, RwLock};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::observer::bounded;
use crate::{ControllerConfig, Error, Reconciler};

/// Per-cluster worker handle.
struct WorkerHandle {
    /// Wakes the worker for an immediate pass.
    wake: Arc<Notify>,

    /// Cancellation token for this worker.
    cancel: CancellationToken,
}

type Workers = Arc<RwLock<HashMap<ClusterId, WorkerHandle>>>;

/// Spawns and tracks one reconciler worker per stored cluster.
pub struct Controller<E, P, S> {
    executor: Arc<E>,
    platform: Arc<P>,
    store: Arc<S>,
    config: ControllerConfig,
    workers: Workers,
    task_tracker: TaskTracker,
    shutdown: CancellationToken,
}

impl<E, P, S> Controller<E, P, S>
where
    E: CommandExecutor,
    P: ComputePlatform,
    S: ClusterStore,
{
    /// Creates a controller with its own shutdown token.
    pub fn new(
        executor: Arc<E>,
        platform: Arc<P>,
        store: Arc<S>,
        config: ControllerConfig,
    ) -> Self {
        Self::new_with_shutdown(executor, platform, store, config, CancellationToken::new())
    }

    /// Creates a controller that stops when `shutdown` is cancelled.
    pub fn new_with_shutdown(
        executor: Arc<E>,
        platform: Arc<P>,
        store: Arc<S>,
        config: ControllerConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            executor,
            platform,
            store,
            config,
            workers: Arc::new(RwLock::new(HashMap::new())),
            task_tracker: TaskTracker::new(),
            shutdown,
        }
    }

    /// Returns the shutdown token.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Returns the number of active workers.
    pub async fn worker_count(&self) -> usize {
        self.workers.read().await.len()
    }

    /// Checks if a worker exists for the given cluster.
    pub async fn has_worker(&self, id: &ClusterId) -> bool {
        self.workers.read().await.contains_key(id)
    }

    /// Resyncs until shutdown, then waits for every worker to stop.
    pub async fn run(&self) {
        info!("controller started");

        loop {
            match self.resync().await {
                Ok(count) => debug!(clusters = count, "resynced"),
                Err(e) => warn!(error = %e, "resync failed"),
            }

            tokio::select! {
                () = self.shutdown.cancelled() => break,
                () = tokio::time::sleep(self.config.resync_interval) => {}
            }
        }

        info!("controller shutting down");
        self.task_tracker.close();
        self.task_tracker.wait().await;
        info!("all workers stopped");
    }

    /// Lists the store and makes sure every cluster has a worker.
    ///
    /// Existing workers are woken for an immediate pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be listed.
    pub async fn resync(&self) -> Result<usize, Error> {
        let ids = bounded(
            self.config.reconciler.command_timeout,
            "list",
            self.store.list(),
        )
        .await?
        .map_err(|e| Error::store("list", &e))?;

        for id in &ids {
            self.enqueue(id).await;
        }

        Ok(ids.len())
    }

    /// Wakes the worker of `id`, spawning it if needed.
    pub async fn enqueue(&self, id: &ClusterId) {
        // First, try to wake an existing worker (read lock)
        {
            let workers = self.workers.read().await;
            if let Some(handle) = workers.get(id) {
                handle.wake.notify_one();
                return;
            }
        }

        let mut workers = self.workers.write().await;

        // Double-check after acquiring write lock
        if let Some(handle) = workers.get(id) {
            handle.wake.notify_one();
            return;
        }

        if self.shutdown.is_cancelled() || self.task_tracker.is_closed() {
            return;
        }

        debug!(cluster = %id, "spawning worker");
        let wake = Arc::new(Notify::new());
        let cancel = self.shutdown.child_token();

        let reconciler = Reconciler::new(
            id.clone(),
            Arc::clone(&self.executor),
            Arc::clone(&self.platform),
            Arc::clone(&self.store),
            self.config.reconciler.clone(),
        );
        let worker = Worker {
            reconciler,
            wake: Arc::clone(&wake),
            cancel: cancel.clone(),
            workers: Arc::clone(&self.workers),
            requeue_interval: self.config.requeue_interval,
        };
        self.task_tracker.spawn(worker.run());

        workers.insert(id.clone(), WorkerHandle { wake, cancel });
    }

    /// Stops the worker of `id` after its current pass.
    pub async fn remove_worker(&self, id: &ClusterId) -> bool {
        if let Some(handle) = self.workers.write().await.remove(id) {
            handle.cancel.cancel();
            true
        } else {
            false
        }
    }
}

struct Worker<E, P, S> {
    reconciler: Reconciler<E, P, S>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
    workers: Workers,
    requeue_interval: Duration,
}

impl<E, P, S> Worker<E, P, S>
where
    E: CommandExecutor,
    P: ComputePlatform,
    S: ClusterStore,
{
    async fn run(mut self) {
        let id = self.reconciler.id().clone();
        info!(cluster = %id, "worker started");

        loop {
            match self.reconciler.pass(&self.cancel).await {
                Ok(report) if report.finished => {
                    info!(cluster = %id, "cluster removed; worker exiting");
                    break;
                }
                Ok(report) => {
                    if let Some(action) = &report.action {
                        debug!(cluster = %id, %action, applied = report.applied, "pass complete");
                    }
                }
                Err(e) => error!(cluster = %id, error = %e, "pass failed"),
            }

            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = self.wake.notified() => {}
                () = tokio::time::sleep(self.requeue_interval) => {}
            }
        }

        self.workers.write().await.remove(&id);
        info!(cluster = %id, "worker stopped");
    }
}
