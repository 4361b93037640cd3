//! Restore request model.
//!
//! A restore is created by a user and read-only to the orchestrator
//! except for its status: the orchestrator appends/merges conditions and
//! observed volume sizes, and never deletes the object. All identities
//! derived from a restore (job name, claim name, the volumes-ready
//! marker value) are deterministic functions of its name so that any
//! number of reconciliation restarts converge on the same objects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::condition::{ConditionSet, ConditionType};
use crate::labels::INSTANCE_LABEL_KEY;
use crate::storage::StorageProvider;
use crate::workload::{EnvVar, OwnerRef};

/// How the backup is brought back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestoreMode {
    /// Full restore from a backup snapshot.
    #[default]
    Snapshot,
    /// Point-in-time recovery up to a logical timestamp.
    Pitr,
    /// Reattach pre-existing volumes to a recovery-mode cluster.
    VolumeSnapshot,
}

impl RestoreMode {
    /// Returns the mode as the flag value the restore tool consumes.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Pitr => "pitr",
            Self::VolumeSnapshot => "volume-snapshot",
        }
    }
}

impl fmt::Display for RestoreMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage marker of a multi-stage volume-snapshot restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VolumeRestorePhase {
    /// Volume reattachment and metadata remapping.
    RestoreVolume,
    /// Final stage: restart stores and leave recovery mode.
    RestoreFinish,
}

/// Linkage to the target cluster for tool-driven restores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrConfig {
    /// Name of the target cluster.
    pub cluster: String,
    /// Namespace of the target cluster; defaults to the restore's.
    #[serde(default)]
    pub cluster_namespace: Option<String>,
}

/// Connection details for the SQL endpoint written into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Secret carrying the database password.
    pub secret_name: String,
    /// Secret carrying client TLS material, when clients present certs.
    #[serde(default)]
    pub tls_client_secret_name: Option<String>,
}

/// Desired state of a restore request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreSpec {
    /// SQL endpoint access, required by the import path.
    #[serde(default)]
    pub to: Option<AccessConfig>,
    /// Where the backup artifacts live.
    pub storage_provider: StorageProvider,
    /// Size of the staging claim for the import path.
    #[serde(default)]
    pub storage_size: Option<String>,
    /// Storage class of the staging claim.
    #[serde(default)]
    pub storage_class_name: Option<String>,
    /// Override for the tool image; an untagged override gets the
    /// storage-engine version appended.
    #[serde(default)]
    pub tool_image: Option<String>,
    /// Target-cluster linkage; absent for the simple import path.
    #[serde(default)]
    pub br: Option<BrConfig>,
    /// Restore mode.
    #[serde(default)]
    pub mode: RestoreMode,
    /// Logical timestamp to recover to, required in PiTR mode.
    #[serde(default)]
    pub pitr_restored_ts: Option<String>,
    /// Availability-zone hint for volume placement.
    #[serde(default)]
    pub volume_az: Option<String>,
    /// Stage marker for multi-stage volume-snapshot restores.
    #[serde(default)]
    pub volume_restore_phase: Option<VolumeRestorePhase>,
    /// Extra environment passed to the work container.
    #[serde(default)]
    pub env: Vec<EnvVar>,
    /// Service account override for the job pod.
    #[serde(default)]
    pub service_account: Option<String>,
    /// Scheduling priority class for the job pod.
    #[serde(default)]
    pub priority_class_name: Option<String>,
    /// Whether credential secrets are KMS-wrapped.
    #[serde(default)]
    pub use_kms: bool,
}

/// Observed state of a restore request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreStatus {
    /// Condition ledger.
    #[serde(default)]
    pub conditions: ConditionSet,
    /// Restored bytes per volume, reported by the volume stage.
    #[serde(default)]
    pub volume_restore_sizes: BTreeMap<String, u64>,
}

/// A user-submitted recovery request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restore {
    /// Namespace.
    pub namespace: String,
    /// Name.
    pub name: String,
    /// Labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Annotations, propagated onto the job.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Desired state.
    pub spec: RestoreSpec,
    /// Observed state.
    #[serde(default)]
    pub status: RestoreStatus,
}

impl Restore {
    /// Returns the globally unique `namespace/name` identity.
    #[must_use]
    pub fn ident(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Returns the deterministic name of this restore's job.
    #[must_use]
    pub fn job_name(&self) -> String {
        format!("restore-{}", self.name)
    }

    /// Returns the deterministic name of this restore's staging claim.
    #[must_use]
    pub fn claim_name(&self) -> String {
        format!("restore-pvc-{}", self.name)
    }

    /// Returns the instance name used in labels: the instance label if
    /// the user set one, the restore name otherwise.
    #[must_use]
    pub fn instance_name(&self) -> &str {
        self.labels
            .get(INSTANCE_LABEL_KEY)
            .map_or(self.name.as_str(), String::as_str)
    }

    /// Returns `true` if the restore is linked to a target cluster.
    #[must_use]
    pub const fn is_br(&self) -> bool {
        self.spec.br.is_some()
    }

    /// Returns the owner reference attached to created objects.
    #[must_use]
    pub fn owner_ref(&self) -> OwnerRef {
        OwnerRef {
            kind: "Restore".to_string(),
            name: self.name.clone(),
            controller: true,
        }
    }

    /// Returns `true` if the job has been created.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.status.conditions.is_true(ConditionType::Scheduled)
    }

    /// Returns `true` once volume reattachment has completed.
    #[must_use]
    pub fn is_volume_complete(&self) -> bool {
        self.status.conditions.is_true(ConditionType::VolumeComplete)
    }

    /// Returns `true` once store volumes are tagged and serving again.
    #[must_use]
    pub fn is_tikv_complete(&self) -> bool {
        self.status.conditions.is_true(ConditionType::TikvComplete)
    }

    /// Returns `true` once the restore has finished.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status.conditions.is_true(ConditionType::Complete)
    }
}
