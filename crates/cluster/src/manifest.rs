//! API object wrapping a cluster spec with its metadata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ClusterId, ClusterSpec, DEFAULT_NAMESPACE, SpecError};

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// Object metadata of a cluster manifest.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// Cluster name.
    pub name: String,

    /// Cluster namespace.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// User labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Set when the user asked for the cluster to be removed.
    #[serde(default)]
    pub deletion_requested: bool,
}

/// A declared cluster: metadata plus desired spec.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct ClusterManifest {
    /// Object metadata.
    pub metadata: Metadata,

    /// Desired cluster shape.
    pub spec: ClusterSpec,
}

impl ClusterManifest {
    /// Creates a manifest in the default namespace.
    pub fn new(name: impl Into<String>, spec: ClusterSpec) -> Self {
        Self {
            metadata: Metadata {
                name: name.into(),
                namespace: default_namespace(),
                labels: BTreeMap::new(),
                deletion_requested: false,
            },
            spec,
        }
    }

    /// Identity of the cluster.
    #[must_use]
    pub fn id(&self) -> ClusterId {
        ClusterId::new(&self.metadata.namespace, &self.metadata.name)
    }

    /// Name of the client service, or of the internal peer service when `internal`.
    #[must_use]
    pub fn service_name(&self, internal: bool) -> String {
        let name = self
            .spec
            .service_name
            .clone()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| format!("{}-svc", self.metadata.name));

        if internal { format!("{name}-int") } else { name }
    }

    /// Checks the manifest for settings the operator cannot honour.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.metadata.name.trim().is_empty() {
            return Err(SpecError::MissingName);
        }

        if let Some(tls) = &self.spec.tls {
            tls.validate()?;
        }

        for (key, value) in &self.metadata.labels {
            if key == "app" || key.starts_with("rss") {
                return Err(SpecError::ReservedLabel(key.clone(), value.clone()));
            }
        }

        if self.spec.image.trim().is_empty() {
            return Err(SpecError::MissingImage(self.metadata.name.clone()));
        }

        self.spec.resolve_commands()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClusterCommands;
    use assert_matches::assert_matches;

    fn manifest() -> ClusterManifest {
        ClusterManifest::new(
            "galera",
            ClusterSpec {
                replicas: 3,
                image: "mariadb:11.4".to_string(),
                commands: Some(ClusterCommands {
                    status: vec!["status".into()],
                    sequence: vec!["sequence".into()],
                    stop: vec!["stop".into()],
                    primary: vec!["start".into(), "{peer}".into()],
                    ..ClusterCommands::default()
                }),
                ..ClusterSpec::default()
            },
        )
    }

    #[test]
    fn valid_manifest_passes() {
        assert!(manifest().validate().is_ok());
        assert_eq!(manifest().id().to_string(), "default/galera");
    }

    #[test]
    fn reserved_labels_are_rejected() {
        for key in ["app", "rss-owner"] {
            let mut manifest = manifest();
            manifest
                .metadata
                .labels
                .insert(key.to_string(), "x".to_string());
            assert_matches!(manifest.validate(), Err(SpecError::ReservedLabel(k, _)) if k == key);
        }
    }

    #[test]
    fn image_is_required() {
        let mut manifest = manifest();
        manifest.spec.image = " ".to_string();
        assert_matches!(manifest.validate(), Err(SpecError::MissingImage(_)));
    }

    #[test]
    fn service_names_follow_cluster_name() {
        let mut manifest = manifest();
        assert_eq!(manifest.service_name(false), "galera-svc");
        assert_eq!(manifest.service_name(true), "galera-svc-int");

        manifest.spec.service_name = Some("db".to_string());
        assert_eq!(manifest.service_name(true), "db-int");
    }

    #[test]
    fn namespace_defaults_when_missing() {
        let manifest: ClusterManifest = serde_json::from_str(
            r#"{"metadata":{"name":"g1"},"spec":{"replicas":3,"image":"x"}}"#,
        )
        .unwrap();
        assert_eq!(manifest.metadata.namespace, "default");
        assert!(!manifest.metadata.deletion_requested);
    }
}
