//! Reconciliation entry point.
//!
//! [`RestoreManager::sync`] is invoked once per reconciliation pass by
//! the surrounding loop driver, which serializes passes per restore. It
//! validates, runs the volume-phase machine for linked volume-snapshot
//! restores, and otherwise dispatches at most one restore job. Every
//! failure is mirrored into the condition ledger with a stable reason
//! label before it propagates; deferred waits propagate as
//! [`SyncOutcome::Requeue`] and touch nothing.

use rewind_core::condition::{Condition, ConditionType};
use rewind_core::restore::{Restore, RestoreMode};

use crate::claim::ensure_claim;
use crate::error::{StepError, SyncError, SyncOutcome, SyncResult};
use crate::job::{build_import_job, build_linked_job};
use crate::ports::Deps;
use crate::status::StatusLedger;
use crate::validate::{validate_linked, validate_spec, ValidateError};
use crate::volume::{reconcile, PhaseStep};

/// Reason label recorded with every spec-invalid condition.
const INVALID_SPEC: &str = "InvalidSpec";

/// Drives restore requests to completion, one pass at a time.
#[derive(Clone)]
pub struct RestoreManager {
    deps: Deps,
    ledger: StatusLedger,
}

impl RestoreManager {
    /// Creates a manager over the given collaborators.
    #[must_use]
    pub fn new(deps: Deps) -> Self {
        let ledger = StatusLedger::new(deps.status.clone());
        Self { deps, ledger }
    }

    /// Returns the condition ledger, for callers that record conditions
    /// on behalf of the external restore tool.
    #[must_use]
    pub const fn ledger(&self) -> &StatusLedger {
        &self.ledger
    }

    /// Runs one reconciliation pass for `restore`.
    ///
    /// # Errors
    ///
    /// [`SyncError::Invalid`] when the spec must be edited by a human
    /// (the driver must not retry); [`SyncError::Retry`] on transient
    /// infrastructure failures.
    pub fn sync(&self, restore: &mut Restore) -> SyncResult {
        let mut cluster = None;

        if let Some(br) = restore.spec.br.clone() {
            let cluster_namespace = br
                .cluster_namespace
                .clone()
                .unwrap_or_else(|| restore.namespace.clone());
            let resolved = match self.deps.clusters.get(&cluster_namespace, &br.cluster) {
                Ok(c) => c,
                Err(err) => {
                    let step = StepError::new("FetchClusterFailed", err);
                    self.record_retry_failed(restore, &step);
                    return Err(step.into());
                }
            };

            if let Err(err) = validate_spec(restore, resolved.tikv_image()) {
                return Err(self.record_invalid(restore, err.to_string()));
            }
            cluster = Some(resolved);
        } else if let Err(err) = validate_spec(restore, None) {
            return Err(self.record_invalid(restore, err.to_string()));
        }

        if let Some(cluster) = cluster.as_mut() {
            if restore.spec.mode == RestoreMode::VolumeSnapshot {
                if let Err(err) = validate_linked(&self.deps, restore, cluster) {
                    return Err(match err {
                        ValidateError::Spec(spec) => {
                            self.record_invalid(restore, spec.to_string())
                        }
                        ValidateError::Read(step) => {
                            self.record_retry_failed(restore, &step);
                            step.into()
                        }
                    });
                }

                match reconcile(&self.deps, &self.ledger, restore, cluster) {
                    Ok(PhaseStep::Wait(reason)) => return Ok(SyncOutcome::requeue(reason)),
                    Ok(PhaseStep::Settled) => return Ok(SyncOutcome::Done),
                    Ok(PhaseStep::Dispatch) => {}
                    Err(step) => {
                        self.record_retry_failed(restore, &step);
                        return Err(step.into());
                    }
                }
            }
        }

        // At most one work unit per restore: an existing job of the
        // deterministic name means a previous pass already dispatched.
        let job_name = restore.job_name();
        match self.deps.jobs.get(&restore.namespace, &job_name) {
            Ok(_) => {
                tracing::info!(
                    restore = %restore.ident(),
                    job = %job_name,
                    "restore job already exists, skipping"
                );
                return Ok(SyncOutcome::Done);
            }
            Err(err) if err.is_not_found() => {}
            Err(err) => {
                return Err(StepError::new("GetRestoreJobFailed", err).into());
            }
        }

        let job = if restore.is_br() {
            match build_linked_job(&self.deps, restore) {
                Ok(job) => job,
                Err(step) => {
                    self.record_retry_failed(restore, &step);
                    return Err(step.into());
                }
            }
        } else {
            let job = match build_import_job(&self.deps, restore) {
                Ok(job) => job,
                Err(step) => {
                    self.record_retry_failed(restore, &step);
                    return Err(step.into());
                }
            };
            if let Err(err) = ensure_claim(&self.deps, restore) {
                if err.is_spec_error() {
                    let step = err.into_step();
                    return Err(self.record_invalid_with_reason(
                        restore,
                        step.reason().to_string(),
                        step.detail(),
                    ));
                }
                let step = err.into_step();
                self.record_retry_failed(restore, &step);
                return Err(step.into());
            }
            job
        };

        if let Err(err) = self.deps.job_control.create(restore, job) {
            let step = StepError::new(
                "CreateRestoreJobFailed",
                format!("create restore job {}/{job_name} failed: {err}", restore.namespace),
            );
            self.record_retry_failed(restore, &step);
            return Err(step.into());
        }
        tracing::info!(restore = %restore.ident(), job = %job_name, "restore job created");

        // A later pass of a multi-job restore may already have moved the
        // phase past Scheduled; the ledger's guard keeps it there, and
        // checking here avoids a pointless status write.
        if !restore.is_scheduled() {
            self.ledger
                .record(restore, Condition::new_true(ConditionType::Scheduled), None)?;
        }

        Ok(SyncOutcome::Done)
    }

    /// Records an `Invalid` condition and returns the matching
    /// non-retried error.
    fn record_invalid(&self, restore: &mut Restore, message: String) -> SyncError {
        self.record_invalid_with_reason(restore, INVALID_SPEC.to_string(), message)
    }

    fn record_invalid_with_reason(
        &self,
        restore: &mut Restore,
        reason: String,
        message: String,
    ) -> SyncError {
        let condition = Condition::new_true(ConditionType::Invalid)
            .with_reason(reason.clone())
            .with_message(message.clone());
        if let Err(persist) = self.ledger.record(restore, condition, None) {
            tracing::warn!(
                restore = %restore.ident(),
                error = %persist,
                "failed to persist Invalid condition"
            );
        }
        SyncError::invalid(restore.ident(), reason, message)
    }

    /// Records a `RetryFailed` condition carrying the step's reason
    /// label and full error text. Persist failures are logged, not
    /// raised: the step error itself is what the caller propagates.
    fn record_retry_failed(&self, restore: &mut Restore, step: &StepError) {
        let condition = Condition::new_true(ConditionType::RetryFailed)
            .with_reason(step.reason())
            .with_message(step.detail());
        if let Err(persist) = self.ledger.record(restore, condition, None) {
            tracing::warn!(
                restore = %restore.ident(),
                error = %persist,
                "failed to persist RetryFailed condition"
            );
        }
    }
}
