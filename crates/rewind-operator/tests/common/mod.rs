//! In-memory collaborators and fixtures for reconciliation tests.
#![allow(dead_code)] // not every test binary uses every helper

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use rewind_core::cluster::{Cluster, ClusterSpec, ClusterStatus, PdSpec, RoleStatus, TikvSpec};
use rewind_core::labels;
use rewind_core::metadata::BackupMetadata;
use rewind_core::restore::{
    AccessConfig, BrConfig, Restore, RestoreMode, RestoreSpec, RestoreStatus, VolumeRestorePhase,
};
use rewind_core::storage::StorageProvider;
use rewind_core::workload::{Claim, EnvVar, JobSpec, PersistentVolume, Pod};
use rewind_operator::error::{PortError, StepError};
use rewind_operator::ports::{
    ClaimControl, ClaimLister, ClusterControl, ClusterLister, CredentialEnv, Deps, JobControl,
    JobLister, ObjectStorage, OperatorConfig, PodControl, PodLister, RestoreStatusPersister,
    Snapshotter, SnapshotterFactory, StorageBackendFactory, VolumeLister,
};
use rewind_operator::RestoreManager;

pub const NAMESPACE: &str = "db";
pub const CLUSTER_NAME: &str = "basic";

// ============================================================================
// Fixtures
// ============================================================================

pub fn simple_restore(name: &str) -> Restore {
    Restore {
        namespace: NAMESPACE.to_string(),
        name: name.to_string(),
        labels: BTreeMap::new(),
        annotations: BTreeMap::new(),
        spec: RestoreSpec {
            to: Some(AccessConfig {
                secret_name: "db-secret".to_string(),
                tls_client_secret_name: None,
            }),
            storage_provider: StorageProvider::S3 {
                bucket: "backups".to_string(),
                prefix: Some("daily".to_string()),
                endpoint: None,
                secret_name: Some("s3-secret".to_string()),
            },
            storage_size: None,
            storage_class_name: None,
            tool_image: None,
            br: None,
            mode: RestoreMode::Snapshot,
            pitr_restored_ts: None,
            volume_az: None,
            volume_restore_phase: None,
            env: Vec::new(),
            service_account: None,
            priority_class_name: None,
            use_kms: false,
        },
        status: RestoreStatus::default(),
    }
}

pub fn linked_restore(name: &str, mode: RestoreMode) -> Restore {
    let mut restore = simple_restore(name);
    restore.spec.to = None;
    restore.spec.br = Some(BrConfig {
        cluster: CLUSTER_NAME.to_string(),
        cluster_namespace: None,
    });
    restore.spec.mode = mode;
    restore
}

pub fn volume_restore(name: &str, phase: VolumeRestorePhase) -> Restore {
    let mut restore = linked_restore(name, RestoreMode::VolumeSnapshot);
    restore.spec.volume_restore_phase = Some(phase);
    restore.spec.volume_az = Some("us-west-2a".to_string());
    restore
}

pub fn cluster() -> Cluster {
    Cluster {
        namespace: NAMESPACE.to_string(),
        name: CLUSTER_NAME.to_string(),
        annotations: BTreeMap::new(),
        spec: ClusterSpec {
            recovery_mode: false,
            pd: Some(PdSpec { replicas: 3 }),
            tikv: Some(TikvSpec {
                replicas: 3,
                image: "pingcap/tikv:v6.5.0".to_string(),
                config: None,
            }),
            ..ClusterSpec::default()
        },
        status: ClusterStatus {
            pd: RoleStatus { ready: 3 },
            tikv: RoleStatus { ready: 3 },
        },
    }
}

pub fn tikv_pod(name: &str) -> Pod {
    Pod {
        namespace: NAMESPACE.to_string(),
        name: name.to_string(),
        labels: rewind_core::labels::Labels::new()
            .instance(CLUSTER_NAME)
            .tikv()
            .into_map(),
        deletion_timestamp: None,
    }
}

pub fn tikv_volume(name: &str) -> PersistentVolume {
    PersistentVolume {
        name: name.to_string(),
        labels: rewind_core::labels::Labels::new()
            .instance(CLUSTER_NAME)
            .tikv()
            .into_map(),
    }
}

/// Metadata document matching [`cluster`]'s topology.
pub fn metadata_doc() -> Vec<u8> {
    metadata_doc_with(3, 0, None)
}

pub fn metadata_doc_with(
    tikv_replicas: i32,
    tiflash_replicas: i32,
    encryption: Option<(&str, Option<&str>)>,
) -> Vec<u8> {
    let mut tikv = serde_json::json!({
        "replicas": tikv_replicas,
        "image": "pingcap/tikv:v6.5.0",
    });
    if let Some((method, key_id)) = encryption {
        let mut config = serde_json::Map::new();
        config.insert(
            "security.encryption.data-encryption-method".to_string(),
            method.into(),
        );
        if let Some(key) = key_id {
            config.insert("security.encryption.master-key.key-id".to_string(), key.into());
        }
        tikv["config"] = config.into();
    }
    let mut spec = serde_json::json!({ "tikv": tikv });
    if tiflash_replicas > 0 {
        spec["tiflash"] = serde_json::json!({ "replicas": tiflash_replicas });
    }
    serde_json::json!({ "kubernetes": { "cluster": { "spec": spec } } })
        .to_string()
        .into_bytes()
}

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
pub struct FakeClusters {
    pub clusters: Mutex<BTreeMap<(String, String), Cluster>>,
    pub updates: Mutex<Vec<Cluster>>,
}

impl FakeClusters {
    pub fn insert(&self, cluster: Cluster) {
        self.clusters
            .lock()
            .unwrap()
            .insert((cluster.namespace.clone(), cluster.name.clone()), cluster);
    }

    pub fn get_stored(&self, namespace: &str, name: &str) -> Option<Cluster> {
        self.clusters
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }
}

impl ClusterLister for FakeClusters {
    fn get(&self, namespace: &str, name: &str) -> Result<Cluster, PortError> {
        self.get_stored(namespace, name)
            .ok_or_else(|| PortError::not_found("cluster", namespace, name))
    }
}

impl ClusterControl for FakeClusters {
    fn update(&self, cluster: &Cluster) -> Result<(), PortError> {
        self.updates.lock().unwrap().push(cluster.clone());
        self.insert(cluster.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeJobs {
    pub created: Mutex<Vec<JobSpec>>,
}

impl FakeJobs {
    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<JobSpec> {
        self.created.lock().unwrap().last().cloned()
    }
}

impl JobLister for FakeJobs {
    fn get(&self, namespace: &str, name: &str) -> Result<JobSpec, PortError> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .find(|j| j.namespace == namespace && j.name == name)
            .cloned()
            .ok_or_else(|| PortError::not_found("job", namespace, name))
    }
}

impl JobControl for FakeJobs {
    fn create(&self, _restore: &Restore, job: JobSpec) -> Result<(), PortError> {
        self.created.lock().unwrap().push(job);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeClaims {
    pub claims: Mutex<BTreeMap<(String, String), Claim>>,
    pub created: Mutex<Vec<Claim>>,
}

impl FakeClaims {
    pub fn insert(&self, claim: Claim) {
        self.claims
            .lock()
            .unwrap()
            .insert((claim.namespace.clone(), claim.name.clone()), claim);
    }

    pub fn created_count(&self) -> usize {
        self.created.lock().unwrap().len()
    }
}

impl ClaimLister for FakeClaims {
    fn get(&self, namespace: &str, name: &str) -> Result<Claim, PortError> {
        self.claims
            .lock()
            .unwrap()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| PortError::not_found("claim", namespace, name))
    }
}

impl ClaimControl for FakeClaims {
    fn create(&self, _restore: &Restore, claim: Claim) -> Result<(), PortError> {
        self.created.lock().unwrap().push(claim.clone());
        self.insert(claim);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakePods {
    pub pods: Mutex<Vec<Pod>>,
    pub deleted: Mutex<Vec<String>>,
}

impl FakePods {
    pub fn insert(&self, pod: Pod) {
        self.pods.lock().unwrap().push(pod);
    }

    pub fn deleted_names(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

impl PodLister for FakePods {
    fn list(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<Pod>, PortError> {
        Ok(self
            .pods
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.namespace == namespace && labels::matches(&p.labels, selector))
            .cloned()
            .collect())
    }
}

impl PodControl for FakePods {
    fn delete(&self, _cluster: &Cluster, pod: &Pod) -> Result<(), PortError> {
        self.deleted.lock().unwrap().push(pod.name.clone());
        let mut pods = self.pods.lock().unwrap();
        if let Some(stored) = pods.iter_mut().find(|p| p.name == pod.name) {
            stored.deletion_timestamp = Some(Utc::now());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeVolumes {
    pub volumes: Mutex<Vec<PersistentVolume>>,
}

impl FakeVolumes {
    pub fn insert(&self, volume: PersistentVolume) {
        self.volumes.lock().unwrap().push(volume);
    }
}

impl VolumeLister for FakeVolumes {
    fn list(&self, selector: &BTreeMap<String, String>) -> Result<Vec<PersistentVolume>, PortError> {
        Ok(self
            .volumes
            .lock()
            .unwrap()
            .iter()
            .filter(|v| labels::matches(&v.labels, selector))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct FakeStatus {
    pub persisted: Mutex<Vec<Restore>>,
}

impl FakeStatus {
    pub fn persist_count(&self) -> usize {
        self.persisted.lock().unwrap().len()
    }
}

impl RestoreStatusPersister for FakeStatus {
    fn persist(&self, restore: &Restore) -> Result<(), PortError> {
        self.persisted.lock().unwrap().push(restore.clone());
        Ok(())
    }
}

pub struct FakeCredentials;

impl CredentialEnv for FakeCredentials {
    fn database_env(&self, _restore: &Restore) -> Result<Vec<EnvVar>, StepError> {
        Ok(vec![EnvVar::new("TIDB_PASSWORD", "secret")])
    }

    fn storage_env(&self, _restore: &Restore) -> Result<Vec<EnvVar>, StepError> {
        Ok(vec![EnvVar::new("AWS_ACCESS_KEY_ID", "test-key")])
    }
}

#[derive(Default)]
pub struct FakeStorage {
    pub objects: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl FakeStorage {
    pub fn put(&self, path: &str, bytes: Vec<u8>) {
        self.objects.lock().unwrap().insert(path.to_string(), bytes);
    }
}

struct MemoryBackend {
    objects: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl ObjectStorage for MemoryBackend {
    fn exists(&self, path: &str, _timeout: Duration) -> Result<bool, PortError> {
        Ok(self.objects.lock().unwrap().contains_key(path))
    }

    fn read_all(&self, path: &str, _timeout: Duration) -> Result<Vec<u8>, PortError> {
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| PortError::failed("read object", format!("{path} vanished")))
    }
}

impl StorageBackendFactory for FakeStorage {
    fn backend(&self, _provider: &StorageProvider) -> Result<Box<dyn ObjectStorage>, PortError> {
        Ok(Box::new(MemoryBackend {
            objects: self.objects.clone(),
        }))
    }
}

#[derive(Default)]
pub struct FakeSnapshotter {
    pub prepared: Mutex<u32>,
    pub tagged: Mutex<Vec<String>>,
}

impl FakeSnapshotter {
    pub fn prepared_count(&self) -> u32 {
        *self.prepared.lock().unwrap()
    }

    pub fn tagged_names(&self) -> Vec<String> {
        self.tagged.lock().unwrap().clone()
    }
}

impl Snapshotter for FakeSnapshotter {
    fn add_volume_tags(&self, volumes: &[PersistentVolume]) -> Result<(), PortError> {
        self.tagged
            .lock()
            .unwrap()
            .extend(volumes.iter().map(|v| v.name.clone()));
        Ok(())
    }

    fn prepare_restore_metadata(
        &self,
        _restore: &Restore,
        _metadata: &BackupMetadata,
    ) -> Result<(), StepError> {
        *self.prepared.lock().unwrap() += 1;
        Ok(())
    }
}

pub struct FakeSnapshotters {
    pub snapshotter: Arc<FakeSnapshotter>,
}

impl Default for FakeSnapshotters {
    fn default() -> Self {
        Self {
            snapshotter: Arc::new(FakeSnapshotter::default()),
        }
    }
}

impl SnapshotterFactory for FakeSnapshotters {
    fn for_mode(&self, _mode: RestoreMode) -> Result<Arc<dyn Snapshotter>, StepError> {
        Ok(self.snapshotter.clone())
    }
}

// ============================================================================
// World
// ============================================================================

/// Everything a reconciliation test needs, with handles kept on the
/// concrete fakes for assertions.
pub struct TestWorld {
    pub clusters: Arc<FakeClusters>,
    pub jobs: Arc<FakeJobs>,
    pub claims: Arc<FakeClaims>,
    pub pods: Arc<FakePods>,
    pub volumes: Arc<FakeVolumes>,
    pub status: Arc<FakeStatus>,
    pub storage: Arc<FakeStorage>,
    pub snapshotters: Arc<FakeSnapshotters>,
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorld {
    pub fn new() -> Self {
        Self {
            clusters: Arc::new(FakeClusters::default()),
            jobs: Arc::new(FakeJobs::default()),
            claims: Arc::new(FakeClaims::default()),
            pods: Arc::new(FakePods::default()),
            volumes: Arc::new(FakeVolumes::default()),
            status: Arc::new(FakeStatus::default()),
            storage: Arc::new(FakeStorage::default()),
            snapshotters: Arc::new(FakeSnapshotters::default()),
        }
    }

    pub fn deps(&self) -> Deps {
        Deps {
            config: OperatorConfig::default(),
            clusters: self.clusters.clone(),
            jobs: self.jobs.clone(),
            claims: self.claims.clone(),
            pods: self.pods.clone(),
            volumes: self.volumes.clone(),
            job_control: self.jobs.clone(),
            cluster_control: self.clusters.clone(),
            pod_control: self.pods.clone(),
            claim_control: self.claims.clone(),
            status: self.status.clone(),
            credentials: Arc::new(FakeCredentials),
            storage: self.storage.clone(),
            snapshotters: self.snapshotters.clone(),
        }
    }

    pub fn manager(&self) -> RestoreManager {
        RestoreManager::new(self.deps())
    }

    pub fn snapshotter(&self) -> &FakeSnapshotter {
        &self.snapshotters.snapshotter
    }
}
