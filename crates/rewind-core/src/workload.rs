//! Workload object models.
//!
//! These are the objects the orchestrator creates (one-shot jobs, durable
//! volume claims) or inspects (store pods, persistent volumes). They
//! mirror the cluster API's shapes closely enough for the surrounding
//! system to translate them one-to-one, while staying plain data here.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::quantity::Quantity;

/// Access mode requested for restore staging claims.
pub const READ_WRITE_ONCE: &str = "ReadWriteOnce";

/// A name/value environment variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    /// Variable name.
    pub name: String,
    /// Variable value.
    pub value: String,
}

impl EnvVar {
    /// Creates an environment variable.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Reference from an owned object back to the restore that created it,
/// so garbage collection cascades when the restore is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerRef {
    /// Kind of the owning object.
    pub kind: String,
    /// Name of the owning object.
    pub name: String,
    /// Whether the owner is the managing controller.
    pub controller: bool,
}

/// Where a job volume gets its contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeSource {
    /// Projected from a secret.
    Secret {
        /// Name of the secret.
        secret_name: String,
    },
    /// Scratch space shared between init and main containers.
    EmptyDir,
    /// Backed by a persistent volume claim.
    Claim {
        /// Name of the claim.
        claim_name: String,
    },
}

/// A named volume in a job's pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeSpec {
    /// Volume name, referenced by mounts.
    pub name: String,
    /// Volume contents.
    pub source: VolumeSource,
}

/// A mount of a named volume into a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    /// Volume name.
    pub name: String,
    /// Mount path inside the container.
    pub mount_path: String,
    /// Whether the mount is read-only.
    pub read_only: bool,
}

impl VolumeMount {
    /// Creates a read-only mount.
    #[must_use]
    pub fn read_only(name: impl Into<String>, mount_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mount_path: mount_path.into(),
            read_only: true,
        }
    }

    /// Creates a writable mount.
    #[must_use]
    pub fn writable(name: impl Into<String>, mount_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mount_path: mount_path.into(),
            read_only: false,
        }
    }
}

/// A container within a job's pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSpec {
    /// Container name.
    pub name: String,
    /// Image reference.
    pub image: String,
    /// Entrypoint override; empty keeps the image default.
    #[serde(default)]
    pub command: Vec<String>,
    /// Arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment.
    #[serde(default)]
    pub env: Vec<EnvVar>,
    /// Volume mounts.
    #[serde(default)]
    pub mounts: Vec<VolumeMount>,
}

/// Specification of a one-shot external work unit.
///
/// Jobs never restart and never retry (`backoff_limit` 0): progress and
/// retries are owned by the reconciliation loop, which observes the
/// restore's conditions instead of babysitting the pod.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Namespace of the job.
    pub namespace: String,
    /// Deterministic, restore-derived job name.
    pub name: String,
    /// Labels.
    pub labels: BTreeMap<String, String>,
    /// Annotations, carried over from the restore.
    pub annotations: BTreeMap<String, String>,
    /// Back-reference to the owning restore.
    pub owner: OwnerRef,
    /// Service account the pod runs as.
    pub service_account: String,
    /// Optional scheduling priority class.
    #[serde(default)]
    pub priority_class_name: Option<String>,
    /// Init containers, used to stage tool binaries.
    #[serde(default)]
    pub init_containers: Vec<ContainerSpec>,
    /// The single work container.
    pub container: ContainerSpec,
    /// Pod volumes.
    #[serde(default)]
    pub volumes: Vec<VolumeSpec>,
    /// Number of retries before the job is marked failed. Always 0 here.
    pub backoff_limit: i32,
}

/// A pod, as far as the orchestrator needs to see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    /// Namespace.
    pub namespace: String,
    /// Name.
    pub name: String,
    /// Labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Set once deletion has been requested.
    #[serde(default)]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

impl Pod {
    /// Returns `true` if the pod is already shutting down.
    #[must_use]
    pub const fn is_terminating(&self) -> bool {
        self.deletion_timestamp.is_some()
    }
}

/// A persistent volume backing a store member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentVolume {
    /// Name.
    pub name: String,
    /// Labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// A durable volume claim used by the simple import path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    /// Namespace.
    pub namespace: String,
    /// Deterministic, restore-derived claim name.
    pub name: String,
    /// Labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Requested storage capacity.
    pub storage_request: Quantity,
    /// Storage class, if the restore pinned one.
    #[serde(default)]
    pub storage_class_name: Option<String>,
    /// Requested access modes.
    pub access_modes: Vec<String>,
}
