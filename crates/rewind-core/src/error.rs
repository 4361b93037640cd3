//! Error types for the domain model.
//!
//! These errors cover spec-level problems: values a human wrote into a
//! restore request that cannot be interpreted. They are terminal for the
//! request; retrying without editing it cannot fix them.

use thiserror::Error;

/// Errors produced by the domain model.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A storage quantity string could not be parsed.
    #[error("invalid quantity {value:?}: {reason}")]
    InvalidQuantity {
        /// The offending input.
        value: String,
        /// Why it could not be parsed.
        reason: String,
    },

    /// A restore spec field is missing or inconsistent.
    #[error("invalid spec: {reason}")]
    InvalidSpec {
        /// Why the spec is invalid.
        reason: String,
    },

    /// The storage provider reference cannot be resolved to a path.
    #[error("unsupported storage provider: {reason}")]
    UnsupportedProvider {
        /// Why the provider reference is unusable.
        reason: String,
    },
}

impl CoreError {
    /// Creates a new invalid quantity error.
    #[must_use]
    pub fn invalid_quantity(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidQuantity {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new invalid spec error.
    #[must_use]
    pub fn invalid_spec(reason: impl Into<String>) -> Self {
        Self::InvalidSpec {
            reason: reason.into(),
        }
    }

    /// Creates a new unsupported provider error.
    #[must_use]
    pub fn unsupported_provider(reason: impl Into<String>) -> Self {
        Self::UnsupportedProvider {
            reason: reason.into(),
        }
    }
}
