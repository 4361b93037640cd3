//! Restore validation.
//!
//! Two deliberately separate gates:
//!
//! - [`validate_spec`]: the lightweight check every restore passes
//!   before anything else: the fields the chosen path needs are present
//!   and interpretable.
//! - [`validate_linked`]: the cross-cluster gate for volume-snapshot
//!   restores. It compares the target cluster against the source
//!   topology and encryption configuration recorded in the backup
//!   metadata, and must reject mismatches before any destructive
//!   mutation happens.
//!
//! Mismatches are spec errors: a human has to fix the request or the
//! target cluster. Only the metadata read itself can fail transiently.

use rewind_core::cluster::{Cluster, PLAINTEXT_METHOD};
use rewind_core::error::CoreError;
use rewind_core::metadata::BackupMetadata;
use rewind_core::restore::{Restore, RestoreMode, VolumeRestorePhase};

use crate::error::StepError;
use crate::meta::read_backup_metadata;
use crate::ports::Deps;

/// Failure of the cross-cluster gate.
#[derive(Debug)]
pub(crate) enum ValidateError {
    /// The request or target cluster is wrong; do not retry.
    Spec(CoreError),
    /// Reading the backup metadata failed; retryable.
    Read(StepError),
}

/// Checks that the restore spec is internally consistent.
///
/// The simple import path needs an SQL endpoint and a resolvable backup
/// path; the linked path needs a consistent mode configuration and a
/// target whose storage-engine version can be determined.
///
/// # Errors
///
/// Returns `CoreError::InvalidSpec` naming the missing or inconsistent
/// field.
pub(crate) fn validate_spec(restore: &Restore, tikv_image: Option<&str>) -> Result<(), CoreError> {
    if let Some(br) = &restore.spec.br {
        if br.cluster.is_empty() {
            return Err(CoreError::invalid_spec("br.cluster must name a cluster"));
        }
        match restore.spec.mode {
            RestoreMode::Pitr => {
                if restore.spec.pitr_restored_ts.as_deref().unwrap_or("").is_empty() {
                    return Err(CoreError::invalid_spec(
                        "pitrRestoredTs is required in pitr mode",
                    ));
                }
            }
            RestoreMode::VolumeSnapshot => {
                if restore.spec.volume_restore_phase.is_none() {
                    return Err(CoreError::invalid_spec(
                        "volumeRestorePhase is required in volume-snapshot mode",
                    ));
                }
            }
            RestoreMode::Snapshot => {}
        }
        let image = tikv_image.unwrap_or("");
        if image.is_empty() {
            return Err(CoreError::invalid_spec(
                "target cluster does not configure a storage role",
            ));
        }
    } else {
        if restore.spec.to.is_none() {
            return Err(CoreError::invalid_spec(
                "spec.to is required for import restores",
            ));
        }
        restore.spec.storage_provider.backup_path().map(|_| ())?;
    }
    Ok(())
}

/// Runs the cross-cluster gate for a volume-snapshot restore.
pub(crate) fn validate_linked(
    deps: &Deps,
    restore: &Restore,
    cluster: &Cluster,
) -> Result<(), ValidateError> {
    let metadata = read_backup_metadata(deps, restore).map_err(ValidateError::Read)?;

    check_replicas(&metadata, cluster).map_err(ValidateError::Spec)?;
    check_recovery_mode(restore, cluster).map_err(ValidateError::Spec)?;
    check_encryption(&metadata, cluster).map_err(ValidateError::Spec)?;
    Ok(())
}

/// Per-role replica counts must match exactly; an absent role on either
/// side counts as zero.
fn check_replicas(metadata: &BackupMetadata, cluster: &Cluster) -> Result<(), CoreError> {
    let source_tiflash = metadata.tiflash_replicas();
    let target_tiflash = cluster.spec.tiflash.as_ref().map_or(0, |t| t.replicas);
    if source_tiflash != target_tiflash {
        tracing::error!(
            cluster = %cluster.name,
            source = source_tiflash,
            target = target_tiflash,
            "tiflash replica mismatch"
        );
        return Err(CoreError::invalid_spec(format!(
            "tiflash replica mismatch: backup has {source_tiflash}, cluster has {target_tiflash}"
        )));
    }

    let source_tikv = metadata.tikv_replicas();
    let target_tikv = cluster.spec.tikv.as_ref().map_or(0, |t| t.replicas);
    if source_tikv != target_tikv {
        tracing::error!(
            cluster = %cluster.name,
            source = source_tikv,
            target = target_tikv,
            "tikv replica mismatch"
        );
        return Err(CoreError::invalid_spec(format!(
            "tikv replica mismatch: backup has {source_tikv}, cluster has {target_tikv}"
        )));
    }
    Ok(())
}

/// Until the finish stage, the target must sit in recovery mode: volumes
/// are being swapped underneath it.
fn check_recovery_mode(restore: &Restore, cluster: &Cluster) -> Result<(), CoreError> {
    if restore.spec.mode == RestoreMode::VolumeSnapshot
        && restore.spec.volume_restore_phase != Some(VolumeRestorePhase::RestoreFinish)
        && !cluster.spec.recovery_mode
    {
        return Err(CoreError::invalid_spec(
            "recovery mode is off on the target cluster",
        ));
    }
    Ok(())
}

/// Encryption compatibility gate.
///
/// Restoring an unencrypted backup into an encrypting cluster is fine;
/// the reverse is not, and neither is a method or master-key mismatch.
/// Key identifiers are compared by identity only: key material is
/// externally unique per identifier.
fn check_encryption(metadata: &BackupMetadata, cluster: &Cluster) -> Result<(), CoreError> {
    let Some(backup_config) = metadata.tikv_config() else {
        return Ok(());
    };
    let Some(backup_method) = backup_config.encryption_method() else {
        return Ok(());
    };
    if backup_method == PLAINTEXT_METHOD {
        return Ok(());
    }

    let target_config = cluster
        .spec
        .tikv
        .as_ref()
        .and_then(|t| t.config.as_ref())
        .ok_or_else(|| {
            CoreError::invalid_spec(
                "backup enabled data encryption but the target storage role has no config; \
                 configure matching encryption before restoring",
            )
        })?;

    if target_config.encryption_method() != Some(backup_method) {
        return Err(CoreError::invalid_spec(format!(
            "encryption method mismatch: backup used {backup_method:?}, target declares {:?}",
            target_config.encryption_method().unwrap_or("none")
        )));
    }

    if let Some(backup_key) = backup_config.master_key_id() {
        match target_config.master_key_id() {
            None => {
                return Err(CoreError::invalid_spec(
                    "backup declares a master key id but the target does not",
                ));
            }
            Some(target_key) if target_key != backup_key => {
                return Err(CoreError::invalid_spec(
                    "master key id mismatch between backup and target",
                ));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod unit_tests {
    use std::collections::BTreeMap;

    use rewind_core::cluster::{
        ClusterSpec, ClusterStatus, RoleConfig, TikvSpec, TiflashSpec, ENCRYPTION_MASTER_KEY_ID_KEY,
        ENCRYPTION_METHOD_KEY,
    };
    use rewind_core::metadata::{ClusterManifest, KubernetesMeta};
    use rewind_core::restore::{BrConfig, RestoreSpec, RestoreStatus};
    use rewind_core::storage::StorageProvider;

    use super::*;

    fn restore(mode: RestoreMode, phase: Option<VolumeRestorePhase>) -> Restore {
        Restore {
            namespace: "db".to_string(),
            name: "r1".to_string(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            spec: RestoreSpec {
                to: None,
                storage_provider: StorageProvider::Local {
                    volume_path: "/mnt".to_string(),
                },
                storage_size: None,
                storage_class_name: None,
                tool_image: None,
                br: Some(BrConfig {
                    cluster: "basic".to_string(),
                    cluster_namespace: None,
                }),
                mode,
                pitr_restored_ts: None,
                volume_az: None,
                volume_restore_phase: phase,
                env: Vec::new(),
                service_account: None,
                priority_class_name: None,
                use_kms: false,
            },
            status: RestoreStatus::default(),
        }
    }

    fn cluster(tikv_replicas: Option<i32>, tiflash_replicas: Option<i32>) -> Cluster {
        Cluster {
            namespace: "db".to_string(),
            name: "basic".to_string(),
            annotations: BTreeMap::new(),
            spec: ClusterSpec {
                recovery_mode: true,
                tikv: tikv_replicas.map(|replicas| TikvSpec {
                    replicas,
                    image: "pingcap/tikv:v6.5.0".to_string(),
                    config: None,
                }),
                tiflash: tiflash_replicas.map(|replicas| TiflashSpec { replicas }),
                ..ClusterSpec::default()
            },
            status: ClusterStatus::default(),
        }
    }

    fn metadata(tikv_replicas: Option<i32>, tiflash_replicas: Option<i32>) -> BackupMetadata {
        BackupMetadata {
            kubernetes: KubernetesMeta {
                cluster: ClusterManifest {
                    spec: ClusterSpec {
                        tikv: tikv_replicas.map(|replicas| TikvSpec {
                            replicas,
                            image: "pingcap/tikv:v6.5.0".to_string(),
                            config: None,
                        }),
                        tiflash: tiflash_replicas.map(|replicas| TiflashSpec { replicas }),
                        ..ClusterSpec::default()
                    },
                },
            },
        }
    }

    fn encrypted_metadata(method: &str, key_id: Option<&str>) -> BackupMetadata {
        let mut meta = metadata(Some(3), None);
        let mut config = RoleConfig::new();
        config.set(ENCRYPTION_METHOD_KEY, method);
        if let Some(key) = key_id {
            config.set(ENCRYPTION_MASTER_KEY_ID_KEY, key);
        }
        meta.kubernetes
            .cluster
            .spec
            .tikv
            .as_mut()
            .expect("tikv role")
            .config = Some(config);
        meta
    }

    fn encrypted_cluster(method: &str, key_id: Option<&str>) -> Cluster {
        let mut c = cluster(Some(3), None);
        let mut config = RoleConfig::new();
        config.set(ENCRYPTION_METHOD_KEY, method);
        if let Some(key) = key_id {
            config.set(ENCRYPTION_MASTER_KEY_ID_KEY, key);
        }
        c.spec.tikv.as_mut().expect("tikv role").config = Some(config);
        c
    }

    // =========================================================================
    // validate_spec
    // =========================================================================

    #[test]
    fn test_spec_pitr_requires_timestamp() {
        let mut r = restore(RestoreMode::Pitr, None);
        assert!(validate_spec(&r, Some("pingcap/tikv:v6.5.0")).is_err());
        r.spec.pitr_restored_ts = Some("449348837242425346".to_string());
        assert!(validate_spec(&r, Some("pingcap/tikv:v6.5.0")).is_ok());
    }

    #[test]
    fn test_spec_volume_snapshot_requires_phase() {
        let r = restore(RestoreMode::VolumeSnapshot, None);
        assert!(validate_spec(&r, Some("pingcap/tikv:v6.5.0")).is_err());
        let r = restore(
            RestoreMode::VolumeSnapshot,
            Some(VolumeRestorePhase::RestoreVolume),
        );
        assert!(validate_spec(&r, Some("pingcap/tikv:v6.5.0")).is_ok());
    }

    #[test]
    fn test_spec_linked_requires_storage_role() {
        let r = restore(RestoreMode::Snapshot, None);
        assert!(validate_spec(&r, None).is_err());
        assert!(validate_spec(&r, Some("pingcap/tikv:v6.5.0")).is_ok());
    }

    #[test]
    fn test_spec_simple_requires_access_config() {
        let mut r = restore(RestoreMode::Snapshot, None);
        r.spec.br = None;
        assert!(validate_spec(&r, None).is_err());
        r.spec.to = Some(rewind_core::restore::AccessConfig {
            secret_name: "db-secret".to_string(),
            tls_client_secret_name: None,
        });
        assert!(validate_spec(&r, None).is_ok());
    }

    // =========================================================================
    // Replica gate
    // =========================================================================

    #[test]
    fn test_replicas_match_passes() {
        assert!(check_replicas(&metadata(Some(3), None), &cluster(Some(3), None)).is_ok());
    }

    #[test]
    fn test_storage_role_absent_from_backup_but_configured_fails() {
        assert!(check_replicas(&metadata(None, None), &cluster(Some(3), None)).is_err());
    }

    #[test]
    fn test_storage_role_count_mismatch_fails() {
        assert!(check_replicas(&metadata(Some(5), None), &cluster(Some(3), None)).is_err());
    }

    #[test]
    fn test_tiflash_unconfigured_with_nonzero_backup_fails() {
        assert!(check_replicas(&metadata(Some(3), Some(2)), &cluster(Some(3), None)).is_err());
        assert!(check_replicas(&metadata(Some(3), Some(2)), &cluster(Some(3), Some(2))).is_ok());
    }

    // =========================================================================
    // Recovery-mode gate
    // =========================================================================

    #[test]
    fn test_recovery_mode_required_before_finish() {
        let r = restore(
            RestoreMode::VolumeSnapshot,
            Some(VolumeRestorePhase::RestoreVolume),
        );
        let mut c = cluster(Some(3), None);
        c.spec.recovery_mode = false;
        assert!(check_recovery_mode(&r, &c).is_err());
        c.spec.recovery_mode = true;
        assert!(check_recovery_mode(&r, &c).is_ok());
    }

    #[test]
    fn test_recovery_mode_not_required_at_finish() {
        let r = restore(
            RestoreMode::VolumeSnapshot,
            Some(VolumeRestorePhase::RestoreFinish),
        );
        let mut c = cluster(Some(3), None);
        c.spec.recovery_mode = false;
        assert!(check_recovery_mode(&r, &c).is_ok());
    }

    // =========================================================================
    // Encryption gate
    // =========================================================================

    #[test]
    fn test_plaintext_backup_is_always_compatible() {
        assert!(check_encryption(&metadata(Some(3), None), &cluster(Some(3), None)).is_ok());
        assert!(check_encryption(
            &encrypted_metadata(PLAINTEXT_METHOD, None),
            &cluster(Some(3), None)
        )
        .is_ok());
    }

    #[test]
    fn test_encrypted_backup_against_unconfigured_target_fails() {
        let err = check_encryption(
            &encrypted_metadata("aes256-ctr", Some("k1")),
            &cluster(Some(3), None),
        )
        .expect_err("must fail");
        assert!(err.to_string().contains("encryption"));
    }

    #[test]
    fn test_matching_method_and_key_passes() {
        assert!(check_encryption(
            &encrypted_metadata("aes256-ctr", Some("k1")),
            &encrypted_cluster("aes256-ctr", Some("k1")),
        )
        .is_ok());
    }

    #[test]
    fn test_key_id_mismatch_fails() {
        assert!(check_encryption(
            &encrypted_metadata("aes256-ctr", Some("k1")),
            &encrypted_cluster("aes256-ctr", Some("k2")),
        )
        .is_err());
    }

    #[test]
    fn test_missing_target_key_id_fails() {
        assert!(check_encryption(
            &encrypted_metadata("aes256-ctr", Some("k1")),
            &encrypted_cluster("aes256-ctr", None),
        )
        .is_err());
    }

    #[test]
    fn test_method_mismatch_fails() {
        assert!(check_encryption(
            &encrypted_metadata("aes256-ctr", None),
            &encrypted_cluster("aes128-ctr", None),
        )
        .is_err());
    }

    #[test]
    fn test_backup_without_key_id_skips_key_check() {
        assert!(check_encryption(
            &encrypted_metadata("aes256-ctr", None),
            &encrypted_cluster("aes256-ctr", Some("k9")),
        )
        .is_ok());
    }
}
