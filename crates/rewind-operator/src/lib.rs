//! # rewind-operator
//!
//! Restore reconciliation core for the rewind orchestrator.
//!
//! The crate drives a distributed-database cluster through recovery from
//! backup artifacts by dispatching and tracking one-shot external
//! restore jobs. It is invoked by a surrounding reconciliation loop,
//! once per pass, and holds no state of its own between passes: progress
//! lives on the restore's condition ledger and, for the volume phase, in
//! a single ownership annotation on the target cluster.
//!
//! ## Shape
//!
//! - [`ports`]: traits for every external collaborator (cluster API
//!   lookups and writes, object storage, credentials, cloud snapshot
//!   backends), bundled in [`ports::Deps`].
//! - [`status`]: the condition ledger, merge-only recording with
//!   no-regression guarantees, persisted through a port.
//! - [`manager`]: [`manager::RestoreManager::sync`], the entry point.
//!
//! ## Outcomes
//!
//! A pass ends in one of three ways, kept apart by type:
//! [`error::SyncOutcome::Done`], [`error::SyncOutcome::Requeue`] (a
//! precondition is pending: not an error, no condition recorded), or
//! [`error::SyncError`] (spec-invalid, never retried, versus transient,
//! retried by the driver).

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod manager;
pub mod ports;
pub mod status;

mod claim;
mod job;
mod meta;
mod validate;
mod volume;

pub use claim::DEFAULT_STORAGE_SIZE;
pub use error::{PortError, StepError, SyncError, SyncOutcome, SyncResult};
pub use job::BACKUP_ROOT_PATH;
pub use manager::RestoreManager;
pub use meta::METADATA_READ_TIMEOUT;
pub use ports::{Deps, OperatorConfig};
pub use status::StatusLedger;
