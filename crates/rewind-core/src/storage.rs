//! Storage provider references.
//!
//! A restore points at the backup artifacts through a provider reference:
//! which backend holds them, where in that backend, and which secret
//! carries the credentials. Actual I/O lives behind the orchestrator's
//! object-storage port; this module only models the reference and
//! resolves the backup path handed to the import tool.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Reference to the object-storage location holding backup artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageProvider {
    /// An S3-compatible bucket.
    S3 {
        /// Bucket name.
        bucket: String,
        /// Key prefix under the bucket.
        #[serde(default)]
        prefix: Option<String>,
        /// Custom endpoint for S3-compatible services.
        #[serde(default)]
        endpoint: Option<String>,
        /// Secret holding the access credentials.
        #[serde(default)]
        secret_name: Option<String>,
    },

    /// A Google Cloud Storage bucket.
    Gcs {
        /// Bucket name.
        bucket: String,
        /// Key prefix under the bucket.
        #[serde(default)]
        prefix: Option<String>,
        /// Secret holding the service-account key.
        #[serde(default)]
        secret_name: Option<String>,
    },

    /// A locally mounted path, used in tests and air-gapped setups.
    Local {
        /// Absolute path of the mount.
        volume_path: String,
    },
}

impl StorageProvider {
    /// Resolves the backup data path passed to the external tools.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::UnsupportedProvider` if the reference is
    /// incomplete (for example an empty bucket name).
    pub fn backup_path(&self) -> Result<String, CoreError> {
        match self {
            Self::S3 { bucket, prefix, .. } => join_bucket_path("s3", bucket, prefix.as_deref()),
            Self::Gcs { bucket, prefix, .. } => join_bucket_path("gcs", bucket, prefix.as_deref()),
            Self::Local { volume_path } => {
                if volume_path.is_empty() {
                    return Err(CoreError::unsupported_provider("empty local volume path"));
                }
                Ok(format!("local://{volume_path}"))
            }
        }
    }

    /// Returns the credentials secret name, if the provider needs one.
    #[must_use]
    pub fn secret_name(&self) -> Option<&str> {
        match self {
            Self::S3 { secret_name, .. } | Self::Gcs { secret_name, .. } => secret_name.as_deref(),
            Self::Local { .. } => None,
        }
    }
}

fn join_bucket_path(scheme: &str, bucket: &str, prefix: Option<&str>) -> Result<String, CoreError> {
    if bucket.is_empty() {
        return Err(CoreError::unsupported_provider(format!(
            "{scheme} provider has an empty bucket"
        )));
    }
    match prefix.filter(|p| !p.is_empty()) {
        Some(prefix) => Ok(format!("{scheme}://{bucket}/{}", prefix.trim_matches('/'))),
        None => Ok(format!("{scheme}://{bucket}")),
    }
}
