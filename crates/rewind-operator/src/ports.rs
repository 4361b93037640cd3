//! Collaborator ports.
//!
//! The orchestrator never talks to the cluster API, object storage or a
//! cloud provider directly; it goes through the traits defined here. The
//! surrounding system wires real clients in, tests wire in-memory fakes.
//!
//! Listers are read-only and may serve from a cache; lookups are always
//! bounded by namespace + name or namespace + selector. Controllers
//! perform single-object optimistic writes; creates are idempotent in
//! the sense that the caller has already checked for existence.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rewind_core::cluster::Cluster;
use rewind_core::metadata::BackupMetadata;
use rewind_core::restore::{Restore, RestoreMode};
use rewind_core::storage::StorageProvider;
use rewind_core::workload::{Claim, EnvVar, JobSpec, PersistentVolume, Pod};

use crate::error::{PortError, StepError};

/// Looks up target clusters by name.
pub trait ClusterLister: Send + Sync {
    /// Returns the cluster, or `PortError::NotFound`.
    fn get(&self, namespace: &str, name: &str) -> Result<Cluster, PortError>;
}

/// Looks up restore jobs by name.
pub trait JobLister: Send + Sync {
    /// Returns the job, or `PortError::NotFound`.
    fn get(&self, namespace: &str, name: &str) -> Result<JobSpec, PortError>;
}

/// Looks up durable volume claims by name.
pub trait ClaimLister: Send + Sync {
    /// Returns the claim, or `PortError::NotFound`.
    fn get(&self, namespace: &str, name: &str) -> Result<Claim, PortError>;
}

/// Lists pods by label selector.
pub trait PodLister: Send + Sync {
    /// Returns the pods in `namespace` matching every selector pair.
    fn list(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<Pod>, PortError>;
}

/// Lists persistent volumes by label selector.
pub trait VolumeLister: Send + Sync {
    /// Returns the volumes matching every selector pair.
    fn list(&self, selector: &BTreeMap<String, String>) -> Result<Vec<PersistentVolume>, PortError>;
}

/// Creates restore jobs.
pub trait JobControl: Send + Sync {
    /// Creates `job`, owned by `restore`.
    fn create(&self, restore: &Restore, job: JobSpec) -> Result<(), PortError>;
}

/// Updates target clusters.
pub trait ClusterControl: Send + Sync {
    /// Writes the cluster back (optimistic, single object).
    fn update(&self, cluster: &Cluster) -> Result<(), PortError>;
}

/// Deletes pods to force a restart by the cluster's own controller.
pub trait PodControl: Send + Sync {
    /// Requests deletion of `pod` belonging to `cluster`.
    fn delete(&self, cluster: &Cluster, pod: &Pod) -> Result<(), PortError>;
}

/// Creates durable volume claims.
pub trait ClaimControl: Send + Sync {
    /// Creates `claim`, owned by `restore`.
    fn create(&self, restore: &Restore, claim: Claim) -> Result<(), PortError>;
}

/// Persists restore status updates.
pub trait RestoreStatusPersister: Send + Sync {
    /// Writes the restore's status subresource back.
    fn persist(&self, restore: &Restore) -> Result<(), PortError>;
}

/// Resolves credential material into job environment.
///
/// Secret retrieval itself is a collaborator concern; the orchestrator
/// only ever sees the resulting environment variables. Failures come
/// back with the collaborator's own reason label.
pub trait CredentialEnv: Send + Sync {
    /// Environment for connecting to the SQL endpoint (password et al).
    fn database_env(&self, restore: &Restore) -> Result<Vec<EnvVar>, StepError>;

    /// Environment for reaching the backup storage (certs, keys).
    fn storage_env(&self, restore: &Restore) -> Result<Vec<EnvVar>, StepError>;
}

/// A handle onto one object-storage location.
///
/// Both operations are single bounded round trips; `timeout` is enforced
/// by the implementation and expiry surfaces as `PortError::Failed`.
pub trait ObjectStorage: Send + Sync {
    /// Returns whether `path` exists.
    fn exists(&self, path: &str, timeout: Duration) -> Result<bool, PortError>;

    /// Reads the full contents of `path`.
    fn read_all(&self, path: &str, timeout: Duration) -> Result<Vec<u8>, PortError>;
}

/// Builds object-storage handles from provider references.
pub trait StorageBackendFactory: Send + Sync {
    /// Resolves credentials and constructs a handle for `provider`.
    fn backend(&self, provider: &StorageProvider) -> Result<Box<dyn ObjectStorage>, PortError>;
}

/// Cloud-side volume operations for snapshot-based restores.
pub trait Snapshotter: Send + Sync {
    /// Tags restored volumes so the cloud provider can account for them.
    fn add_volume_tags(&self, volumes: &[PersistentVolume]) -> Result<(), PortError>;

    /// Remaps volume identifiers recorded in `metadata` and reconciles
    /// claim/volume objects for every store member of the target.
    ///
    /// # Errors
    ///
    /// Failures carry the collaborator's own reason label.
    fn prepare_restore_metadata(
        &self,
        restore: &Restore,
        metadata: &BackupMetadata,
    ) -> Result<(), StepError>;
}

/// Selects the snapshot collaborator for a restore mode.
///
/// Providers are added by adding implementations behind this factory,
/// never by branching inside the volume-phase machine.
pub trait SnapshotterFactory: Send + Sync {
    /// Returns the collaborator handling `mode`.
    fn for_mode(&self, mode: RestoreMode) -> Result<Arc<dyn Snapshotter>, StepError>;
}

/// Static configuration of the orchestrator.
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Image running the work container of every restore job.
    pub manager_image: String,
    /// Service account used when the restore does not override it.
    pub default_service_account: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            manager_image: "rewind/backup-manager:latest".to_string(),
            default_service_account: "rewind-backup-manager".to_string(),
        }
    }
}

/// Bundle of every collaborator the reconciliation core needs.
#[derive(Clone)]
pub struct Deps {
    /// Static configuration.
    pub config: OperatorConfig,
    /// Target-cluster lookups.
    pub clusters: Arc<dyn ClusterLister>,
    /// Restore-job lookups.
    pub jobs: Arc<dyn JobLister>,
    /// Claim lookups.
    pub claims: Arc<dyn ClaimLister>,
    /// Pod lookups.
    pub pods: Arc<dyn PodLister>,
    /// Persistent-volume lookups.
    pub volumes: Arc<dyn VolumeLister>,
    /// Job creation.
    pub job_control: Arc<dyn JobControl>,
    /// Cluster updates.
    pub cluster_control: Arc<dyn ClusterControl>,
    /// Pod deletion.
    pub pod_control: Arc<dyn PodControl>,
    /// Claim creation.
    pub claim_control: Arc<dyn ClaimControl>,
    /// Restore status persistence.
    pub status: Arc<dyn RestoreStatusPersister>,
    /// Credential resolution.
    pub credentials: Arc<dyn CredentialEnv>,
    /// Object-storage handle construction.
    pub storage: Arc<dyn StorageBackendFactory>,
    /// Snapshot collaborator selection.
    pub snapshotters: Arc<dyn SnapshotterFactory>,
}
