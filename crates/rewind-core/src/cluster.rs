//! Target cluster model.
//!
//! The cluster object is owned by its own controller; the orchestrator
//! reads topology, TLS and encryption configuration from it, answers
//! readiness questions against its status, and (only during the volume
//! phase) performs three narrow mutations: clearing recovery mode,
//! stamping/removing the volumes-ready annotation, and restarting store
//! pods through the pod controller.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Config key declaring the data-encryption method of the storage role.
pub const ENCRYPTION_METHOD_KEY: &str = "security.encryption.data-encryption-method";

/// Config key declaring the master encryption key identifier.
pub const ENCRYPTION_MASTER_KEY_ID_KEY: &str = "security.encryption.master-key.key-id";

/// Encryption method value meaning "no encryption".
pub const PLAINTEXT_METHOD: &str = "plaintext";

/// Flat dotted-key configuration of a cluster role.
///
/// The cluster API stores role configuration as nested TOML; by the time
/// it reaches us (and the backup metadata document) it is flattened to
/// dotted keys, which is also the shape the encryption gate compares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleConfig(BTreeMap<String, String>);

impl RoleConfig {
    /// Creates an empty config.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Returns the value of a dotted key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Sets a dotted key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Returns the configured encryption method, if any.
    #[must_use]
    pub fn encryption_method(&self) -> Option<&str> {
        self.get(ENCRYPTION_METHOD_KEY)
    }

    /// Returns the configured master key identifier, if any.
    #[must_use]
    pub fn master_key_id(&self) -> Option<&str> {
        self.get(ENCRYPTION_MASTER_KEY_ID_KEY)
    }
}

/// Placement-driver role spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdSpec {
    /// Desired member count.
    pub replicas: i32,
}

/// Storage role spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TikvSpec {
    /// Desired store count.
    pub replicas: i32,
    /// Image reference of the storage engine, tag included.
    pub image: String,
    /// Role configuration, including the encryption keys.
    #[serde(default)]
    pub config: Option<RoleConfig>,
}

/// Columnar replica role spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TiflashSpec {
    /// Desired replica count.
    pub replicas: i32,
}

/// Client TLS settings of the SQL role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsClient {
    /// Whether clients must present certificates.
    pub enabled: bool,
    /// Skip CA verification for in-cluster clients.
    #[serde(default)]
    pub skip_internal_client_ca: bool,
}

/// SQL role spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TidbSpec {
    /// Desired instance count.
    pub replicas: i32,
    /// Client TLS settings.
    #[serde(default)]
    pub tls_client: Option<TlsClient>,
}

/// Desired cluster state, as far as restores are concerned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterSpec {
    /// Suppresses normal serving while volumes are being reattached.
    #[serde(default)]
    pub recovery_mode: bool,
    /// Whether intra-cluster TLS is enabled.
    #[serde(default)]
    pub tls_cluster: bool,
    /// Skip client TLS when this operator's tools connect to the SQL role.
    #[serde(default)]
    pub skip_client_tls: bool,
    /// Placement-driver role.
    #[serde(default)]
    pub pd: Option<PdSpec>,
    /// Storage role.
    #[serde(default)]
    pub tikv: Option<TikvSpec>,
    /// Columnar replica role.
    #[serde(default)]
    pub tiflash: Option<TiflashSpec>,
    /// SQL role.
    #[serde(default)]
    pub tidb: Option<TidbSpec>,
}

/// Observed readiness of one role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleStatus {
    /// Members currently healthy and serving.
    pub ready: i32,
}

/// Observed cluster state maintained by the cluster's own controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterStatus {
    /// Placement-driver readiness.
    #[serde(default)]
    pub pd: RoleStatus,
    /// Storage role readiness.
    #[serde(default)]
    pub tikv: RoleStatus,
}

/// The live cluster object being restored into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cluster {
    /// Namespace.
    pub namespace: String,
    /// Name.
    pub name: String,
    /// Free-form annotations, used as cross-reconciliation markers.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Desired state.
    pub spec: ClusterSpec,
    /// Observed state.
    #[serde(default)]
    pub status: ClusterStatus,
}

impl Cluster {
    /// Returns the storage-engine image reference, if the role exists.
    #[must_use]
    pub fn tikv_image(&self) -> Option<&str> {
        self.spec.tikv.as_ref().map(|t| t.image.as_str())
    }

    /// Returns `true` once every desired placement-driver member is ready.
    ///
    /// A cluster without the role has nothing to wait for.
    #[must_use]
    pub fn all_pd_members_ready(&self) -> bool {
        self.spec
            .pd
            .as_ref()
            .is_none_or(|pd| self.status.pd.ready >= pd.replicas)
    }

    /// Returns `true` once every desired store is available.
    #[must_use]
    pub fn all_tikv_stores_available(&self) -> bool {
        self.spec
            .tikv
            .as_ref()
            .is_none_or(|tikv| self.status.tikv.ready >= tikv.replicas)
    }

    /// Returns `true` if intra-cluster TLS is enabled.
    #[must_use]
    pub const fn is_cluster_tls_enabled(&self) -> bool {
        self.spec.tls_cluster
    }

    /// Returns the SQL role's client TLS settings, if enabled.
    #[must_use]
    pub fn enabled_client_tls(&self) -> Option<&TlsClient> {
        self.spec
            .tidb
            .as_ref()
            .and_then(|tidb| tidb.tls_client.as_ref())
            .filter(|tls| tls.enabled)
    }

    /// Returns an annotation value.
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// Sets an annotation.
    pub fn set_annotation(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.annotations.insert(key.into(), value.into());
    }

    /// Removes an annotation, returning its previous value.
    pub fn remove_annotation(&mut self, key: &str) -> Option<String> {
        self.annotations.remove(key)
    }
}
