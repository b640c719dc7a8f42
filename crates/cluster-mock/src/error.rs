use galera_cluster::{ClusterStoreError, ComputePlatformError, ErrorKind, MemberCommandsError};
use thiserror::Error;

/// Errors returned by the simulated cluster and store.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum Error {
    /// The member's unit does not exist.
    #[error("member {0} not found")]
    NotFound(String),

    /// The member does not answer.
    #[error("member {0} unreachable")]
    Unreachable(String),

    /// The operation ran and failed.
    #[error("{0}")]
    Failed(String),

    /// Stored data could not be parsed.
    #[error("unparsable: {0}")]
    Invalid(String),
}

impl Error {
    const fn error_kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unreachable(_) => ErrorKind::Unreachable,
            Self::Failed(_) => ErrorKind::Failed,
            Self::Invalid(_) => ErrorKind::Invalid,
        }
    }
}

impl MemberCommandsError for Error {
    fn kind(&self) -> ErrorKind {
        self.error_kind()
    }
}

impl ComputePlatformError for Error {
    fn kind(&self) -> ErrorKind {
        self.error_kind()
    }
}

impl ClusterStoreError for Error {
    fn kind(&self) -> ErrorKind {
        self.error_kind()
    }
}
