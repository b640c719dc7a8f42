//! Error types shared by the cluster model and its external interfaces.

use std::error::Error;
use std::fmt::{self, Debug};

use thiserror::Error as ThisError;

/// Errors produced while normalizing or validating a cluster manifest.
#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum SpecError {
    /// Both the `commands` struct and the legacy command fields are set and disagree.
    #[error("conflicting command definitions: `commands` and legacy `{0}` differ")]
    ConflictingCommands(&'static str),

    /// The manifest carries a label reserved for the operator.
    #[error("cluster contains reserved label: {0}={1}")]
    ReservedLabel(String, String),

    /// No image is configured for the cluster.
    #[error("no image configured for cluster {0}")]
    MissingImage(String),

    /// A required command template is missing or empty.
    #[error("missing command template: {0}")]
    MissingCommand(&'static str),

    /// TLS policy is incomplete.
    #[error("invalid TLS policy: {0}")]
    Tls(String),

    /// The manifest has no name.
    #[error("cluster manifest has no name")]
    MissingName,
}

/// Classification of failures crossing an external interface.
///
/// The engine only ever branches on the kind, never on the concrete error type.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// The operation did not complete within its time bound.
    Timeout,

    /// The target could not be reached at all.
    Unreachable,

    /// The target does not exist.
    NotFound,

    /// The input handed to the operation was rejected.
    Invalid,

    /// The operation ran and reported failure.
    Failed,
}

impl ErrorKind {
    /// Whether the failure says nothing about the member itself, only about our
    /// ability to reach it.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::Timeout | Self::Unreachable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Marker trait for `MemberCommands` errors
pub trait MemberCommandsError: Debug + Error + Send + Sync + 'static {
    /// Returns the kind of this error
    fn kind(&self) -> ErrorKind;
}

/// Marker trait for `ComputePlatform` errors
pub trait ComputePlatformError: Debug + Error + Send + Sync + 'static {
    /// Returns the kind of this error
    fn kind(&self) -> ErrorKind;
}

/// Marker trait for `ClusterStore` errors
pub trait ClusterStoreError: Debug + Error + Send + Sync + 'static {
    /// Returns the kind of this error
    fn kind(&self) -> ErrorKind;
}
