//! Cluster identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Namespace used when a manifest does not name one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Identity of one cluster in the API layer.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct ClusterId {
    /// Namespace of the cluster object.
    pub namespace: String,

    /// Name of the cluster object.
    pub name: String,
}

impl ClusterId {
    /// Creates a new cluster id.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Creates a cluster id in the default namespace.
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(DEFAULT_NAMESPACE, name)
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
