use std::path::PathBuf;

use galera_cluster::{ClusterStoreError, ErrorKind};
use thiserror::Error;

/// Errors raised by the operator's configuration and manifest store.
#[derive(Debug, Error)]
pub enum Error {
    /// Reading or writing a file failed.
    #[error("{path}: {source}")]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A manifest could not be parsed.
    #[error("invalid manifest {path}: {source}")]
    Manifest {
        /// Manifest file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_yaml::Error,
    },

    /// The configuration file could not be parsed.
    #[error("invalid config {path}: {source}")]
    Config {
        /// Configuration file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: toml::de::Error,
    },

    /// Status could not be serialized.
    #[error("failed to encode status: {0}")]
    Status(#[from] serde_json::Error),

    /// A cluster the store was asked about has no manifest.
    #[error("cluster {0} not found")]
    NotFound(String),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl ClusterStoreError for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                ErrorKind::NotFound
            }
            Self::Manifest { .. } | Self::Config { .. } => ErrorKind::Invalid,
            Self::Io { .. } | Self::Status(_) => ErrorKind::Failed,
        }
    }
}
