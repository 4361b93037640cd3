//! Durable volume claim ensurer.
//!
//! The simple import path stages backup data on a claim with a
//! deterministic, restore-derived name. The claim is created once and
//! only grows on the user's terms: an existing claim smaller than the
//! request is a hard error telling the user to delete it, never an
//! automatic resize.

use rewind_core::labels::Labels;
use rewind_core::quantity::Quantity;
use rewind_core::restore::Restore;
use rewind_core::workload::{Claim, READ_WRITE_ONCE};

use crate::error::StepError;
use crate::ports::Deps;

/// Claim size used when the restore does not specify one.
pub const DEFAULT_STORAGE_SIZE: &str = "100Gi";

/// Failure of the claim ensurer.
#[derive(Debug)]
pub(crate) enum ClaimError {
    /// The request is wrong; do not retry.
    Spec(StepError),
    /// Infrastructure failed; retryable.
    Infra(StepError),
}

impl ClaimError {
    pub(crate) fn into_step(self) -> StepError {
        match self {
            Self::Spec(e) | Self::Infra(e) => e,
        }
    }

    pub(crate) const fn is_spec_error(&self) -> bool {
        matches!(self, Self::Spec(_))
    }
}

/// Makes sure the restore's staging claim exists and is large enough.
pub(crate) fn ensure_claim(deps: &Deps, restore: &Restore) -> Result<(), ClaimError> {
    let requested_str = restore
        .spec
        .storage_size
        .as_deref()
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_STORAGE_SIZE);
    let requested: Quantity = requested_str.parse().map_err(|err| {
        ClaimError::Spec(StepError::new("ParseStorageSizeFailed", err))
    })?;

    let claim_name = restore.claim_name();
    match deps.claims.get(&restore.namespace, &claim_name) {
        Ok(existing) => {
            if existing.storage_request < requested {
                return Err(ClaimError::Spec(StepError::message(
                    "ClaimStorageTooSmall",
                    format!(
                        "existing claim {}/{claim_name} holds {} but {requested} was requested; \
                         delete the old claim to continue",
                        restore.namespace, existing.storage_request
                    ),
                )));
            }
            // Large enough (or larger): leave it alone.
            Ok(())
        }
        Err(err) if err.is_not_found() => {
            let claim = Claim {
                namespace: restore.namespace.clone(),
                name: claim_name.clone(),
                labels: Labels::new().instance(restore.instance_name()).into_map(),
                storage_request: requested,
                storage_class_name: restore.spec.storage_class_name.clone(),
                access_modes: vec![READ_WRITE_ONCE.to_string()],
            };
            tracing::info!(
                restore = %restore.ident(),
                claim = %claim_name,
                size = requested_str,
                "creating restore staging claim"
            );
            deps.claim_control
                .create(restore, claim)
                .map_err(|err| ClaimError::Infra(StepError::new("CreateClaimFailed", err)))
        }
        Err(err) => Err(ClaimError::Infra(StepError::new("GetClaimFailed", err))),
    }
}
