//! Error and outcome types for restore reconciliation.
//!
//! Reconciliation distinguishes three result classes, and the types here
//! keep them apart so that the driver and observability never confuse
//! them:
//!
//! - **Done / requeue** ([`SyncOutcome`]): waiting on a precondition is
//!   not a failure; it is a typed "try again after a delay" outcome with
//!   a human-readable wait reason, and it never touches the condition
//!   ledger.
//! - **Spec-invalid** ([`SyncError::Invalid`]): a human has to edit the
//!   restore; retrying is pointless and the driver is told not to.
//! - **Retryable** ([`SyncError::Retry`]): infrastructure failed; the
//!   driver retries with its own backoff.
//!
//! Every internal step that can fail returns a [`StepError`]: a stable
//! machine-readable reason label paired with the underlying error, so
//! the entry point can attach the label to a `RetryFailed` condition
//! without re-deriving it.

use std::error::Error;
use std::fmt;

use thiserror::Error;

/// Boxed source error carried alongside a reason label.
pub type BoxedError = Box<dyn Error + Send + Sync>;

/// A failed step, tagged with its stable reason label.
#[derive(Debug, Error)]
#[error("{reason}: {source}")]
pub struct StepError {
    reason: String,
    #[source]
    source: BoxedError,
}

impl StepError {
    /// Wraps a source error under a reason label.
    #[must_use]
    pub fn new(reason: impl Into<String>, source: impl Into<BoxedError>) -> Self {
        Self {
            reason: reason.into(),
            source: source.into(),
        }
    }

    /// Creates a step error from a bare message.
    #[must_use]
    pub fn message(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            source: BoxedError::from(message.into()),
        }
    }

    /// Returns the reason label.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Returns the source error's text.
    #[must_use]
    pub fn detail(&self) -> String {
        self.source.to_string()
    }
}

/// Failure of a collaborator behind one of the ports.
#[derive(Debug, Error)]
pub enum PortError {
    /// The object does not exist.
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Object kind.
        kind: &'static str,
        /// Object namespace.
        namespace: String,
        /// Object name.
        name: String,
    },

    /// The collaborator failed for any other reason.
    #[error("{context}: {message}")]
    Failed {
        /// What was being attempted.
        context: String,
        /// Collaborator-reported detail.
        message: String,
    },
}

impl PortError {
    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(kind: &'static str, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Creates a generic failure.
    #[must_use]
    pub fn failed(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if the object simply does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// The successful outcomes of a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum SyncOutcome {
    /// Nothing more to do this pass.
    Done,

    /// A precondition is not met yet; re-invoke after a delay.
    Requeue {
        /// Human-readable wait reason, surfaced by the driver.
        reason: String,
    },
}

impl SyncOutcome {
    /// Creates a requeue outcome.
    pub fn requeue(reason: impl Into<String>) -> Self {
        Self::Requeue {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the pass finished without a pending wait.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// The failure outcomes of a reconciliation pass.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The restore spec is unusable; the driver must not retry.
    #[error("invalid restore spec {ident}: {message}")]
    Invalid {
        /// `namespace/name` of the restore.
        ident: String,
        /// Stable reason label, mirrored into the `Invalid` condition.
        reason: String,
        /// Human-readable detail.
        message: String,
    },

    /// Infrastructure failed; the driver retries with backoff.
    #[error(transparent)]
    Retry(#[from] StepError),
}

impl SyncError {
    /// Creates a spec-invalid error.
    #[must_use]
    pub fn invalid(
        ident: impl Into<String>,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Invalid {
            ident: ident.into(),
            reason: reason.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if retrying cannot help.
    #[must_use]
    pub const fn is_spec_error(&self) -> bool {
        matches!(self, Self::Invalid { .. })
    }

    /// Returns the reason label.
    #[must_use]
    pub fn reason(&self) -> &str {
        match self {
            Self::Invalid { reason, .. } => reason,
            Self::Retry(step) => step.reason(),
        }
    }
}

/// Result of one reconciliation pass.
pub type SyncResult = Result<SyncOutcome, SyncError>;

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Done => f.write_str("done"),
            Self::Requeue { reason } => write!(f, "requeue: {reason}"),
        }
    }
}
