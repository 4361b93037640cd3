//! Backup metadata reader.
//!
//! Reads the metadata document the external restore tool left in the
//! backup's storage location after its volume-prepare stage. The read
//! goes through object storage because the document is too large for an
//! annotation or config object.
//!
//! The reader never caches: cluster reconfiguration decisions must be
//! taken against the document as it is now, every time.

use std::time::Duration;

use rewind_core::metadata::{BackupMetadata, METADATA_OBJECT};
use rewind_core::restore::Restore;

use crate::error::StepError;
use crate::ports::Deps;

/// Upper bound on the metadata round trip. The document is small (low
/// tens of megabytes at worst), so one minute is generous.
pub const METADATA_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Fetches and decodes the backup metadata snapshot.
///
/// # Errors
///
/// Each failure point has its own reason label: backend construction
/// (`NewStorageBackendFailed`), the existence check
/// (`FileExistCheckFailed`), a missing document (`FileNotExists`, the
/// prepare stage of the external tool did not run or did not finish),
/// the read itself (`ReadFileFailed`) and decoding
/// (`ParseBackupMetadataFailed`).
pub(crate) fn read_backup_metadata(
    deps: &Deps,
    restore: &Restore,
) -> Result<BackupMetadata, StepError> {
    tracing::info!(restore = %restore.ident(), "reading backup metadata from external storage");

    let backend = deps
        .storage
        .backend(&restore.spec.storage_provider)
        .map_err(|err| StepError::new("NewStorageBackendFailed", err))?;

    let exists = backend
        .exists(METADATA_OBJECT, METADATA_READ_TIMEOUT)
        .map_err(|err| StepError::new("FileExistCheckFailed", err))?;
    if !exists {
        return Err(StepError::message(
            "FileNotExists",
            format!("{METADATA_OBJECT} does not exist"),
        ));
    }

    let bytes = backend
        .read_all(METADATA_OBJECT, METADATA_READ_TIMEOUT)
        .map_err(|err| StepError::new("ReadFileFailed", err))?;

    BackupMetadata::decode(&bytes).map_err(|err| StepError::new("ParseBackupMetadataFailed", err))
}
