use galera_cluster::{
    ClusterStoreError, ComputePlatformError, ErrorKind, MemberCommandsError, SpecError,
};
use thiserror::Error;

/// Errors that can occur while reconciling a cluster.
#[derive(Debug, Error)]
pub enum Error {
    /// A database control command failed.
    #[error("{operation} failed ({kind}): {message}")]
    Command {
        /// Operation that was invoked.
        operation: &'static str,
        /// Classification of the failure.
        kind: ErrorKind,
        /// Error message.
        message: String,
    },

    /// A compute-unit operation failed.
    #[error("platform {operation} failed ({kind}): {message}")]
    Platform {
        /// Operation that was invoked.
        operation: &'static str,
        /// Classification of the failure.
        kind: ErrorKind,
        /// Error message.
        message: String,
    },

    /// The cluster store failed.
    #[error("store {operation} failed ({kind}): {message}")]
    Store {
        /// Operation that was invoked.
        operation: &'static str,
        /// Classification of the failure.
        kind: ErrorKind,
        /// Error message.
        message: String,
    },

    /// An external call did not finish within the command timeout.
    #[error("{0} timed out")]
    Timeout(&'static str),

    /// The manifest cannot be acted on.
    #[error(transparent)]
    Spec(#[from] SpecError),
}

impl Error {
    pub(crate) fn command<E: MemberCommandsError>(operation: &'static str, error: &E) -> Self {
        Self::Command {
            operation,
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub(crate) fn platform<E: ComputePlatformError>(operation: &'static str, error: &E) -> Self {
        Self::Platform {
            operation,
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub(crate) fn store<E: ClusterStoreError>(operation: &'static str, error: &E) -> Self {
        Self::Store {
            operation,
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    /// Classification of the failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Command { kind, .. } | Self::Platform { kind, .. } | Self::Store { kind, .. } => {
                *kind
            }
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Spec(_) => ErrorKind::Invalid,
        }
    }
}
