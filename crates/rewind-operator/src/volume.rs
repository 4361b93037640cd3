//! Volume-phase state machine.
//!
//! Snapshot-based restores move through multiple reconciliation passes,
//! with state split across two objects: progress the restore has
//! confirmed sits on its own condition ledger, while ownership of the
//! shared cluster is a single annotation whose value is the restore's
//! `namespace/name` identity. Together they form a two-phase marker that
//! survives arbitrary reconciliation restarts without locks.
//!
//! One invocation performs at most one phase's worth of work and
//! returns:
//!
//! - [`PhaseStep::Wait`] when a cluster precondition is not met yet:
//!   a deferred retry, never an error and never a condition;
//! - [`PhaseStep::Settled`] when this pass finished a phase and nothing
//!   further should happen until external state moves;
//! - [`PhaseStep::Dispatch`] when control falls through to restore-job
//!   dispatch.

use rewind_core::cluster::Cluster;
use rewind_core::condition::{Condition, ConditionType};
use rewind_core::labels::{Labels, TIKV_VOLUMES_READY_ANNOTATION};
use rewind_core::restore::{Restore, VolumeRestorePhase};

use crate::error::StepError;
use crate::meta::read_backup_metadata;
use crate::ports::Deps;
use crate::status::StatusLedger;

/// What the caller should do after one volume-phase pass.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub(crate) enum PhaseStep {
    /// A precondition is pending; re-invoke after a delay.
    Wait(String),
    /// This pass is complete; do not dispatch a job.
    Settled,
    /// Continue to work-unit dispatch.
    Dispatch,
}

/// Runs one pass of the volume-phase machine.
pub(crate) fn reconcile(
    deps: &Deps,
    ledger: &StatusLedger,
    restore: &mut Restore,
    cluster: &mut Cluster,
) -> Result<PhaseStep, StepError> {
    mutate_phase(deps, ledger, restore, cluster)?;

    if !cluster.all_pd_members_ready() {
        return Ok(PhaseStep::Wait(format!(
            "restore {}: waiting for all pd members ready in cluster {}/{}",
            restore.ident(),
            cluster.namespace,
            cluster.name
        )));
    }

    if restore.is_volume_complete() && !restore.is_tikv_complete() {
        if !cluster.all_tikv_stores_available() {
            return Ok(PhaseStep::Wait(format!(
                "restore {}: waiting for all tikv stores available in cluster {}/{}",
                restore.ident(),
                cluster.namespace,
                cluster.name
            )));
        }
        tag_store_volumes(deps, ledger, restore, cluster)?;
        return Ok(PhaseStep::Settled);
    }

    if restore.spec.volume_restore_phase == Some(VolumeRestorePhase::RestoreFinish) {
        if restore.is_complete() {
            return Ok(PhaseStep::Settled);
        }
        return Ok(PhaseStep::Wait(format!(
            "restore {}: waiting for the finish stage to complete on cluster {}/{}",
            restore.ident(),
            cluster.namespace,
            cluster.name
        )));
    }

    Ok(PhaseStep::Dispatch)
}

/// The mutating half of the machine: finish handling and metadata
/// preparation. Both branches are guarded by idempotency markers so a
/// crashed-and-restarted reconciliation repeats nothing.
fn mutate_phase(
    deps: &Deps,
    ledger: &StatusLedger,
    restore: &mut Restore,
    cluster: &mut Cluster,
) -> Result<(), StepError> {
    if restore.is_complete() {
        return Ok(());
    }

    if restore.spec.volume_restore_phase == Some(VolumeRestorePhase::RestoreFinish) {
        return finish(deps, ledger, restore, cluster);
    }

    if restore.is_volume_complete()
        && restore.spec.volume_restore_phase == Some(VolumeRestorePhase::RestoreVolume)
    {
        return prepare_metadata(deps, restore, cluster);
    }

    Ok(())
}

/// Finish stage: restart every store pod so it picks the reattached
/// volumes up, take the cluster out of recovery mode, drop the
/// volumes-ready marker, and record completion.
fn finish(
    deps: &Deps,
    ledger: &StatusLedger,
    restore: &mut Restore,
    cluster: &mut Cluster,
) -> Result<(), StepError> {
    tracing::info!(restore = %restore.ident(), "handling the restore-finish stage");

    if !cluster.spec.recovery_mode {
        tracing::info!(
            restore = %restore.ident(),
            cluster = %cluster.name,
            "recovery mode is already off, nothing to finish"
        );
        return Ok(());
    }

    let selector = Labels::new().instance(&cluster.name).tikv().selector();
    let pods = deps
        .pods
        .list(&cluster.namespace, &selector)
        .map_err(|err| StepError::new("ListTikvPodsFailed", err))?;
    for pod in pods.iter().filter(|p| !p.is_terminating()) {
        tracing::info!(
            restore = %restore.ident(),
            pod = %pod.name,
            "restarting store pod after volume restore"
        );
        deps.pod_control
            .delete(cluster, pod)
            .map_err(|err| StepError::new("DeleteTikvPodFailed", err))?;
    }

    cluster.spec.recovery_mode = false;
    cluster.remove_annotation(TIKV_VOLUMES_READY_ANNOTATION);
    deps.cluster_control
        .update(cluster)
        .map_err(|err| StepError::new("ClearRecoveryMarkFailed", err))?;

    ledger.record(restore, Condition::new_true(ConditionType::Complete), None)
}

/// Prepare-metadata stage: read the snapshot the external tool wrote,
/// let the cloud collaborator remap volume identifiers and reconcile
/// claim/volume objects, then stamp the cluster with this restore's
/// identity so no later pass repeats the work.
fn prepare_metadata(
    deps: &Deps,
    restore: &Restore,
    cluster: &mut Cluster,
) -> Result<(), StepError> {
    if cluster.annotation(TIKV_VOLUMES_READY_ANNOTATION).is_some() {
        return Ok(());
    }

    tracing::info!(restore = %restore.ident(), "preparing restored volume metadata");

    let snapshotter = deps.snapshotters.for_mode(restore.spec.mode)?;
    let metadata = read_backup_metadata(deps, restore)?;
    snapshotter.prepare_restore_metadata(restore, &metadata)?;

    cluster.set_annotation(TIKV_VOLUMES_READY_ANNOTATION, restore.ident());
    deps.cluster_control
        .update(cluster)
        .map_err(|err| StepError::new("MarkVolumesReadyFailed", err))
}

/// Volume tagging once every store is serving again: enumerate the store
/// volumes and hand them to the cloud collaborator, then record that the
/// storage role has fully recovered.
fn tag_store_volumes(
    deps: &Deps,
    ledger: &StatusLedger,
    restore: &mut Restore,
    cluster: &Cluster,
) -> Result<(), StepError> {
    let selector = Labels::new().instance(&cluster.name).tikv().selector();
    let volumes = deps
        .volumes
        .list(&selector)
        .map_err(|err| StepError::new("ListVolumesFailed", err))?;

    let snapshotter = deps.snapshotters.for_mode(restore.spec.mode)?;
    snapshotter
        .add_volume_tags(&volumes)
        .map_err(|err| StepError::new("AddVolumeTagFailed", err))?;

    tracing::info!(
        restore = %restore.ident(),
        volumes = volumes.len(),
        "store volumes tagged"
    );
    ledger.record(restore, Condition::new_true(ConditionType::TikvComplete), None)
}
