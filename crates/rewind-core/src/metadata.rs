//! Backup metadata snapshot.
//!
//! After the volume-prepare stage, the external restore tool writes a
//! JSON document to the backup's storage location describing the source
//! cluster as it was at backup time. The document can reach tens of
//! megabytes (it also inventories volumes), far beyond what fits in an
//! annotation, which is why object storage is the bridge between the
//! tool and this orchestrator.
//!
//! The document is immutable and treated as a point-in-time fact. Decoding
//! tolerates unknown fields so tool-side additions do not break older
//! orchestrators.

use serde::{Deserialize, Serialize};

use crate::cluster::{ClusterSpec, RoleConfig};

/// Object key of the metadata document within the backup location.
pub const METADATA_OBJECT: &str = "clustermeta";

/// The source cluster manifest embedded in the metadata document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterManifest {
    /// The source cluster's spec, in the same shape as the live object.
    #[serde(default)]
    pub spec: ClusterSpec,
}

/// Source-cluster facts recorded by the backup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KubernetesMeta {
    /// The source cluster manifest.
    #[serde(default)]
    pub cluster: ClusterManifest,
}

/// The metadata snapshot written by the external restore tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupMetadata {
    /// Recorded source-cluster topology and configuration.
    #[serde(default)]
    pub kubernetes: KubernetesMeta,
}

impl BackupMetadata {
    /// Decodes the JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns the underlying decode error on malformed input.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Returns the source cluster's columnar replica count; an absent
    /// role counts as zero.
    #[must_use]
    pub fn tiflash_replicas(&self) -> i32 {
        self.kubernetes
            .cluster
            .spec
            .tiflash
            .as_ref()
            .map_or(0, |t| t.replicas)
    }

    /// Returns the source cluster's store count; an absent role counts
    /// as zero.
    #[must_use]
    pub fn tikv_replicas(&self) -> i32 {
        self.kubernetes
            .cluster
            .spec
            .tikv
            .as_ref()
            .map_or(0, |t| t.replicas)
    }

    /// Returns the source storage role's configuration, if recorded.
    #[must_use]
    pub fn tikv_config(&self) -> Option<&RoleConfig> {
        self.kubernetes
            .cluster
            .spec
            .tikv
            .as_ref()
            .and_then(|t| t.config.as_ref())
    }
}
