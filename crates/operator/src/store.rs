//! Cluster store backed by a directory of YAML manifests.
//!
//! Each `<stem>.yaml` (or `.yml`) file holds one [`ClusterManifest`]. Status is
//! written next to it as `<stem>.status.json`. Removing a manifest file makes
//! the cluster vanish; setting `metadata.deletionRequested` tears it down and
//! removes both files once every member is gone.
//!
//! A manifest file that cannot be parsed never makes its cluster look
//! vanished: looking up a cluster that is not found while some manifest is
//! unparsable is an [`Error::Manifest`], and the cluster's status can still be
//! written next to the file it was last read from.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use galera_cluster::{ClusterId, ClusterManifest, ClusterRecord, ClusterStatus, ClusterStore};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::Error;

const STATUS_SUFFIX: &str = ".status.json";

/// [`ClusterStore`] over a manifest directory.
#[derive(Clone, Debug)]
pub struct DirectoryStore {
    dir: PathBuf,
    seen: Arc<Mutex<BTreeMap<ClusterId, PathBuf>>>,
}

struct Entry {
    path: PathBuf,
    manifest: ClusterManifest,
}

impl Entry {
    fn status_path(&self) -> PathBuf {
        status_path(&self.path)
    }
}

#[derive(Default)]
struct Scan {
    entries: Vec<Entry>,
    broken: Vec<(PathBuf, Error)>,
}

fn status_path(manifest: &Path) -> PathBuf {
    let stem = manifest
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    manifest.with_file_name(format!("{stem}{STATUS_SUFFIX}"))
}

fn is_manifest(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == "yaml" || ext == "yml")
}

impl DirectoryStore {
    /// Creates a store over `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            seen: Arc::default(),
        }
    }

    /// Directory holding the manifests.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Reads the status last written for a cluster.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be scanned or the status file
    /// is unreadable.
    pub async fn status(&self, id: &ClusterId) -> Result<Option<ClusterStatus>, Error> {
        let Some(manifest) = self.locate(id).await? else {
            return Ok(None);
        };

        let path = status_path(&manifest);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(path, e)),
        }
    }

    async fn scan(&self) -> Result<Scan, Error> {
        let mut dir = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| Error::io(&self.dir, e))?;

        let mut scan = Scan::default();
        while let Some(item) = dir.next_entry().await.map_err(|e| Error::io(&self.dir, e))? {
            let path = item.path();
            if !is_manifest(&path) {
                continue;
            }

            match read_manifest(&path).await {
                Ok(manifest) => scan.entries.push(Entry { path, manifest }),
                Err(e) => scan.broken.push((path, e)),
            }
        }

        scan.entries.sort_by(|a, b| a.path.cmp(&b.path));
        scan.broken.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(scan)
    }

    /// Parsed manifests, skipping the ones that cannot be read.
    async fn entries(&self) -> Result<Vec<Entry>, Error> {
        let scan = self.scan().await?;
        for (path, e) in &scan.broken {
            warn!(file = %path.display(), error = %e, "skipping manifest");
        }
        Ok(scan.entries)
    }

    /// Finds a cluster's manifest.
    ///
    /// Errors instead of reporting the cluster missing when the file it was
    /// last read from, or any manifest of a cluster never read before, cannot
    /// be parsed.
    async fn find(&self, id: &ClusterId) -> Result<Option<Entry>, Error> {
        let scan = self.scan().await?;
        let mut matches = scan
            .entries
            .into_iter()
            .filter(|entry| entry.manifest.id() == *id);

        if let Some(first) = matches.next() {
            if let Some(duplicate) = matches.next() {
                warn!(cluster = %id, file = %duplicate.path.display(), "duplicate manifest ignored");
            }
            self.seen.lock().insert(id.clone(), first.path.clone());
            return Ok(Some(first));
        }

        let seen = self.seen.lock().get(id).cloned();
        let mut broken = scan.broken.into_iter();
        let unreadable = match &seen {
            Some(path) => broken.find(|(broken, _)| broken == path),
            None => broken.next(),
        };
        match unreadable {
            Some((_, e)) => Err(e),
            None => Ok(None),
        }
    }

    /// Path of the manifest a cluster lives in, even if it no longer parses.
    async fn locate(&self, id: &ClusterId) -> Result<Option<PathBuf>, Error> {
        let scan = self.scan().await?;
        if let Some(entry) = scan.entries.iter().find(|entry| entry.manifest.id() == *id) {
            self.seen.lock().insert(id.clone(), entry.path.clone());
            return Ok(Some(entry.path.clone()));
        }

        let seen = self.seen.lock().get(id).cloned();
        Ok(seen.filter(|path| scan.broken.iter().any(|(broken, _)| broken == path)))
    }
}

async fn read_manifest(path: &Path) -> Result<ClusterManifest, Error> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::io(path, e))?;
    serde_yaml::from_str(&contents).map_err(|source| Error::Manifest {
        path: path.to_path_buf(),
        source,
    })
}

async fn remove_if_exists(path: &Path) -> Result<(), Error> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

#[async_trait]
impl ClusterStore for DirectoryStore {
    type Error = Error;

    async fn list(&self) -> Result<Vec<ClusterId>, Self::Error> {
        let mut ids: Vec<ClusterId> = self
            .entries()
            .await?
            .into_iter()
            .map(|entry| entry.manifest.id())
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn get(&self, id: &ClusterId) -> Result<Option<ClusterRecord>, Self::Error> {
        Ok(self
            .find(id)
            .await?
            .map(|entry| ClusterRecord {
                manifest: entry.manifest,
            }))
    }

    async fn update_status(
        &self,
        id: &ClusterId,
        status: &ClusterStatus,
    ) -> Result<(), Self::Error> {
        let manifest = self
            .locate(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let path = status_path(&manifest);
        let staging = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(status)?;

        tokio::fs::write(&staging, bytes)
            .await
            .map_err(|e| Error::io(&staging, e))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|e| Error::io(&path, e))?;

        debug!(cluster = %id, phase = %status.phase, "status written");
        Ok(())
    }

    async fn finalize(&self, id: &ClusterId) -> Result<(), Self::Error> {
        let Some(entry) = self.find(id).await? else {
            return Ok(());
        };

        remove_if_exists(&entry.status_path()).await?;
        remove_if_exists(&entry.path).await?;
        self.seen.lock().remove(id);

        info!(cluster = %id, file = %entry.path.display(), "cluster removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use galera_cluster::{ClusterPhase, ClusterStoreError, ErrorKind};

    const MANIFEST: &str = r"
metadata:
  name: galera
  namespace: db
spec:
  replicas: 3
  image: mariadb:11.4
  commands:
    status: [galera-ctl, status, '{member}']
    sequence: [galera-ctl, sequence, '{member}']
    stop: [galera-ctl, stop, '{member}']
    primary: [galera-ctl, start, '{member}', '{peer}']
";

    fn store_with_manifest() -> (tempfile::TempDir, DirectoryStore) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("galera.yaml"), MANIFEST).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let store = DirectoryStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn lists_and_reads_manifests() {
        let (_dir, store) = store_with_manifest();
        let id = ClusterId::new("db", "galera");

        assert_eq!(store.list().await.unwrap(), vec![id.clone()]);

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.manifest.spec.replicas, 3);
        assert!(!record.deletion_requested());
        assert!(record.manifest.validate().is_ok());

        assert!(store.get(&ClusterId::named("other")).await.unwrap().is_none());
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn malformed_manifests_are_skipped() {
        let (dir, store) = store_with_manifest();
        std::fs::write(dir.path().join("broken.yml"), "spec: [").unwrap();

        assert_eq!(store.list().await.unwrap().len(), 1);
        assert!(logs_contain("skipping manifest"));
    }

    #[tokio::test]
    async fn unparsable_manifest_is_an_error_not_a_missing_cluster() {
        let (dir, store) = store_with_manifest();
        let id = ClusterId::new("db", "galera");
        assert!(store.get(&id).await.unwrap().is_some());

        std::fs::write(dir.path().join("galera.yaml"), "spec: [").unwrap();
        assert_matches!(store.get(&id).await, Err(Error::Manifest { .. }));
        assert_eq!(
            ClusterStoreError::kind(&store.get(&id).await.unwrap_err()),
            ErrorKind::Invalid
        );

        let status = ClusterStatus {
            phase: ClusterPhase::Degraded,
            ..ClusterStatus::default()
        };
        store.update_status(&id, &status).await.unwrap();
        assert_eq!(store.status(&id).await.unwrap(), Some(status));

        store.finalize(&id).await.unwrap_err();
        assert!(dir.path().join("galera.yaml").exists());

        std::fs::remove_file(dir.path().join("galera.yaml")).unwrap();
        assert!(store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_cluster_with_an_unparsable_manifest_around_is_an_error() {
        let (dir, store) = store_with_manifest();
        std::fs::write(dir.path().join("broken.yml"), "spec: [").unwrap();

        assert!(store.get(&ClusterId::new("db", "galera")).await.unwrap().is_some());
        assert_matches!(
            store.get(&ClusterId::named("other")).await,
            Err(Error::Manifest { .. })
        );
    }

    #[tokio::test]
    async fn writes_status_next_to_the_manifest() {
        let (dir, store) = store_with_manifest();
        let id = ClusterId::new("db", "galera");
        let status = ClusterStatus {
            phase: ClusterPhase::Converging,
            size: 1,
            ..ClusterStatus::default()
        };

        store.update_status(&id, &status).await.unwrap();
        assert!(dir.path().join("galera.status.json").exists());
        assert_eq!(store.status(&id).await.unwrap(), Some(status));
        assert_eq!(store.list().await.unwrap().len(), 1);

        assert_matches!(
            store
                .update_status(&ClusterId::named("other"), &ClusterStatus::default())
                .await,
            Err(Error::NotFound(_))
        );
    }

    #[tokio::test]
    async fn finalize_removes_manifest_and_status() {
        let (dir, store) = store_with_manifest();
        let id = ClusterId::new("db", "galera");
        store
            .update_status(&id, &ClusterStatus::default())
            .await
            .unwrap();

        store.finalize(&id).await.unwrap();
        assert!(!dir.path().join("galera.yaml").exists());
        assert!(!dir.path().join("galera.status.json").exists());
        assert!(store.list().await.unwrap().is_empty());

        store.finalize(&id).await.unwrap();
    }
}
