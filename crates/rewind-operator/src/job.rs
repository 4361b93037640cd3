//! Work-unit builders.
//!
//! Two builders, selected by whether the restore is linked to a target
//! cluster:
//!
//! - [`build_import_job`] runs the import tool against backup data
//!   staged on the restore's durable claim.
//! - [`build_linked_job`] runs the restore tool against the target
//!   cluster, with mode, version, TLS and placement flags derived from
//!   the restore spec and the target's configuration.
//!
//! Both produce a job with the restore's deterministic job name and an
//! owner reference back to the restore. Neither creates anything: the
//! entry point owns the existence gate and the dispatch.

use rewind_core::image;
use rewind_core::labels::Labels;
use rewind_core::restore::{Restore, RestoreMode};
use rewind_core::workload::{
    ContainerSpec, EnvVar, JobSpec, VolumeMount, VolumeSource, VolumeSpec,
};

use crate::error::StepError;
use crate::ports::Deps;

/// Mount path of the staging claim in import jobs.
pub const BACKUP_ROOT_PATH: &str = "/backup";

/// Mount path for staged restore-tool binaries.
const RESTORE_TOOL_BIN_PATH: &str = "/var/lib/br-bin";

/// Mount path for staged import-tool binaries.
const IMPORT_TOOL_BIN_PATH: &str = "/var/lib/import-bin";

/// Mount path for SQL client TLS material.
const CLIENT_TLS_PATH: &str = "/var/lib/tidb-client-tls";

/// Mount path for intra-cluster TLS material.
const CLUSTER_TLS_PATH: &str = "/var/lib/cluster-client-tls";

/// Default repository of the restore tool image.
const RESTORE_TOOL_IMAGE: &str = "pingcap/br";

/// Builds the import job for a simple (unlinked) restore.
///
/// The staging claim must already exist; the entry point ensures it
/// before dispatch.
pub(crate) fn build_import_job(deps: &Deps, restore: &Restore) -> Result<JobSpec, StepError> {
    let mut env = deps.credentials.database_env(restore)?;
    env.extend(deps.credentials.storage_env(restore)?);
    env.extend(restore.spec.env.iter().cloned());

    let backup_path = restore
        .spec
        .storage_provider
        .backup_path()
        .map_err(|err| StepError::new("GetBackupPathFailed", err))?;

    let mut args = vec![
        "import".to_string(),
        format!("--namespace={}", restore.namespace),
        format!("--restoreName={}", restore.name),
        format!("--backupPath={backup_path}"),
    ];

    let mut mounts = vec![VolumeMount::writable("backup-data", BACKUP_ROOT_PATH)];
    let mut volumes = vec![VolumeSpec {
        name: "backup-data".to_string(),
        source: VolumeSource::Claim {
            claim_name: restore.claim_name(),
        },
    }];
    let mut init_containers = Vec::new();

    if let Some(secret) = restore
        .spec
        .to
        .as_ref()
        .and_then(|to| to.tls_client_secret_name.as_deref())
    {
        args.push("--client-tls=true".to_string());
        mounts.push(VolumeMount::read_only("tidb-client-tls", CLIENT_TLS_PATH));
        volumes.push(VolumeSpec {
            name: "tidb-client-tls".to_string(),
            source: VolumeSource::Secret {
                secret_name: secret.to_string(),
            },
        });
    }

    if let Some(tool_image) = restore.spec.tool_image.as_deref() {
        let bin_mount = VolumeMount::writable("import-bin", IMPORT_TOOL_BIN_PATH);
        mounts.push(bin_mount.clone());
        volumes.push(VolumeSpec {
            name: "import-bin".to_string(),
            source: VolumeSource::EmptyDir,
        });
        init_containers.push(stage_binary_container(
            "import-tool",
            tool_image,
            "/tidb-lightning",
            IMPORT_TOOL_BIN_PATH,
            bin_mount,
        ));
    }

    Ok(assemble(deps, restore, args, env, init_containers, mounts, volumes))
}

/// Builds the restore job for a cluster-linked restore.
pub(crate) fn build_linked_job(deps: &Deps, restore: &Restore) -> Result<JobSpec, StepError> {
    let br = restore
        .spec
        .br
        .as_ref()
        .ok_or_else(|| StepError::message("MakeRestoreJobFailed", "restore has no br config"))?;
    let cluster_namespace = br
        .cluster_namespace
        .as_deref()
        .unwrap_or(&restore.namespace);
    let cluster = deps
        .clusters
        .get(cluster_namespace, &br.cluster)
        .map_err(|err| StepError::new("FetchClusterFailed", err))?;

    let mut env = Vec::new();
    if restore.spec.to.is_some() {
        env.extend(deps.credentials.database_env(restore)?);
    }
    env.extend(deps.credentials.storage_env(restore)?);
    env.push(EnvVar::new("BR_LOG_TO_TERM", "1"));
    env.extend(restore.spec.env.iter().cloned());

    let mut args = vec![
        "restore".to_string(),
        format!("--namespace={}", restore.namespace),
        format!("--restoreName={}", restore.name),
    ];

    let tikv_version = cluster
        .tikv_image()
        .and_then(|img| image::parse(img).1)
        .map(ToString::to_string);
    if let Some(version) = &tikv_version {
        args.push(format!("--tikvVersion={version}"));
    }

    match restore.spec.mode {
        RestoreMode::Pitr => {
            args.push(format!("--mode={}", RestoreMode::Pitr));
            args.push(format!(
                "--pitrRestoredTs={}",
                restore.spec.pitr_restored_ts.as_deref().unwrap_or("")
            ));
        }
        RestoreMode::VolumeSnapshot => {
            args.push(format!("--mode={}", RestoreMode::VolumeSnapshot));
            // The prepare stage runs only while the volume phase is
            // still incomplete; afterwards the tool resumes data work.
            if !restore.is_volume_complete() {
                args.push("--prepare".to_string());
                if let Some(az) = restore.spec.volume_az.as_deref().filter(|az| !az.is_empty()) {
                    args.push(format!("--target-az={az}"));
                }
            }
        }
        RestoreMode::Snapshot => {
            args.push(format!("--mode={}", RestoreMode::Snapshot));
        }
    }

    let mut mounts = Vec::new();
    let mut volumes = Vec::new();

    if cluster.is_cluster_tls_enabled() {
        args.push("--cluster-tls=true".to_string());
        mounts.push(VolumeMount::read_only("cluster-client-tls", CLUSTER_TLS_PATH));
        volumes.push(VolumeSpec {
            name: "cluster-client-tls".to_string(),
            source: VolumeSource::Secret {
                secret_name: format!("{}-cluster-client-secret", br.cluster),
            },
        });
    }

    if restore.spec.to.is_some() && !cluster.spec.skip_client_tls {
        if let Some(tls) = cluster.enabled_client_tls() {
            args.push("--client-tls=true".to_string());
            if tls.skip_internal_client_ca {
                args.push("--skipClientCA=true".to_string());
            }
            let secret_name = restore
                .spec
                .to
                .as_ref()
                .and_then(|to| to.tls_client_secret_name.clone())
                .unwrap_or_else(|| format!("{}-tidb-client-secret", br.cluster));
            mounts.push(VolumeMount::read_only("tidb-client-tls", CLIENT_TLS_PATH));
            volumes.push(VolumeSpec {
                name: "tidb-client-tls".to_string(),
                source: VolumeSource::Secret { secret_name },
            });
        }
    }

    let bin_mount = VolumeMount::writable("br-bin", RESTORE_TOOL_BIN_PATH);
    mounts.push(bin_mount.clone());
    volumes.push(VolumeSpec {
        name: "br-bin".to_string(),
        source: VolumeSource::EmptyDir,
    });

    let tool_image = resolve_tool_image(restore.spec.tool_image.as_deref(), tikv_version.as_deref());
    let init_containers = vec![stage_binary_container(
        "br",
        &tool_image,
        "/br",
        RESTORE_TOOL_BIN_PATH,
        bin_mount,
    )];

    Ok(assemble(deps, restore, args, env, init_containers, mounts, volumes))
}

/// Resolves the restore tool image: an explicit override wins, but an
/// untagged override gets the storage-engine version appended; without
/// an override the default repository is tagged with that version.
fn resolve_tool_image(override_image: Option<&str>, tikv_version: Option<&str>) -> String {
    let version = tikv_version.unwrap_or("latest");
    match override_image {
        Some(img) if image::has_tag(img) => img.to_string(),
        Some(img) => format!("{img}:{version}"),
        None => format!("{RESTORE_TOOL_IMAGE}:{version}"),
    }
}

/// Init container copying a tool binary into a shared scratch volume.
fn stage_binary_container(
    name: &str,
    tool_image: &str,
    binary: &str,
    bin_path: &str,
    mount: VolumeMount,
) -> ContainerSpec {
    ContainerSpec {
        name: name.to_string(),
        image: tool_image.to_string(),
        command: vec!["/bin/sh".to_string(), "-c".to_string()],
        args: vec![format!("cp {binary} {bin_path}/; echo '{name} copy finished'")],
        env: Vec::new(),
        mounts: vec![mount],
    }
}

fn assemble(
    deps: &Deps,
    restore: &Restore,
    args: Vec<String>,
    env: Vec<EnvVar>,
    init_containers: Vec<ContainerSpec>,
    mounts: Vec<VolumeMount>,
    volumes: Vec<VolumeSpec>,
) -> JobSpec {
    let mut labels = Labels::new()
        .instance(restore.instance_name())
        .restore_job()
        .restore(&restore.name)
        .into_map();
    labels.extend(restore.labels.clone());

    JobSpec {
        namespace: restore.namespace.clone(),
        name: restore.job_name(),
        labels,
        annotations: restore.annotations.clone(),
        owner: restore.owner_ref(),
        service_account: restore
            .spec
            .service_account
            .clone()
            .unwrap_or_else(|| deps.config.default_service_account.clone()),
        priority_class_name: restore.spec.priority_class_name.clone(),
        init_containers,
        container: ContainerSpec {
            name: "restore".to_string(),
            image: deps.config.manager_image.clone(),
            command: Vec::new(),
            args,
            env,
            mounts,
        },
        volumes,
        backoff_limit: 0,
    }
}
