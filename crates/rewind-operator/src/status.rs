//! Status condition ledger.
//!
//! The one place that writes restore conditions. Merge semantics
//! (type-keyed update-in-place, `Scheduled` suppression, the
//! no-regression guard) live on the condition set itself; the ledger
//! adds persistence: the updated restore is written back through the
//! status port, and only when the merge actually changed something.
//! Persist failures are reported to the caller, never swallowed.

use std::collections::BTreeMap;
use std::sync::Arc;

use rewind_core::condition::{Condition, MergeOutcome};
use rewind_core::restore::Restore;

use crate::error::StepError;
use crate::ports::RestoreStatusPersister;

/// Reason label for status persistence failures.
pub const UPDATE_STATUS_FAILED: &str = "UpdateRestoreStatusFailed";

/// Append/merge-only recorder of restore conditions.
#[derive(Clone)]
pub struct StatusLedger {
    persister: Arc<dyn RestoreStatusPersister>,
}

impl StatusLedger {
    /// Creates a ledger writing through `persister`.
    #[must_use]
    pub fn new(persister: Arc<dyn RestoreStatusPersister>) -> Self {
        Self { persister }
    }

    /// Merges `condition` into the restore and persists the result.
    ///
    /// `volume_sizes`, when given, replaces the observed per-volume
    /// restore sizes in the same write.
    ///
    /// # Errors
    ///
    /// Returns a [`StepError`] labeled [`UPDATE_STATUS_FAILED`] when the
    /// status write fails; the in-memory restore keeps the merged state
    /// so a later pass can re-persist it.
    pub fn record(
        &self,
        restore: &mut Restore,
        condition: Condition,
        volume_sizes: Option<BTreeMap<String, u64>>,
    ) -> Result<(), StepError> {
        let mut changed = false;

        if let Some(sizes) = volume_sizes {
            if restore.status.volume_restore_sizes != sizes {
                restore.status.volume_restore_sizes = sizes;
                changed = true;
            }
        }

        let condition_type = condition.condition_type;
        match restore.status.conditions.merge(condition) {
            MergeOutcome::Applied => changed = true,
            MergeOutcome::Unchanged => {}
            MergeOutcome::Suppressed => {
                tracing::debug!(
                    restore = %restore.ident(),
                    condition = %condition_type,
                    "condition suppressed by no-regression guard"
                );
            }
        }

        if !changed {
            return Ok(());
        }

        self.persister
            .persist(restore)
            .map_err(|err| StepError::new(UPDATE_STATUS_FAILED, err))
    }
}
