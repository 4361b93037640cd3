//! Restore status conditions and their merge semantics.
//!
//! A restore's observable progress is a set of named boolean conditions.
//! The set is keyed by condition type, so no two conditions of the same
//! type coexist, and merges are append-or-update-in-place. Progress
//! types form a total order used for exactly one thing: refusing merges
//! that would move a restore's phase backwards after a later phase has
//! already been confirmed.
//!
//! # Condition classes
//!
//! - Progress: `Scheduled`, `Running`, `VolumeComplete`, `TikvComplete`,
//!   `Complete`. Once one of these is true, an earlier one is never set
//!   true again for the same restore.
//! - Signals: `Invalid`, `RetryFailed`, `Failed`. These describe failure
//!   detail and never move the phase.
//!
//! `Running` and `Failed` are written by the restore tool running inside
//! the dispatched job; they flow through the same merge path so the
//! no-regression guard covers them too.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The type of a restore condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    /// The restore spec is unusable; a human must edit it.
    Invalid,

    /// A step failed and will be retried by the reconciliation driver.
    RetryFailed,

    /// The restore job has been created.
    Scheduled,

    /// The restore job is executing.
    Running,

    /// Volume reattachment has completed (volume-snapshot mode).
    VolumeComplete,

    /// Store volumes are tagged and the storage role is serving again.
    TikvComplete,

    /// The restore finished successfully (terminal).
    Complete,

    /// The restore job failed (terminal).
    Failed,
}

impl ConditionType {
    /// Returns the condition type as a string identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Invalid => "Invalid",
            Self::RetryFailed => "RetryFailed",
            Self::Scheduled => "Scheduled",
            Self::Running => "Running",
            Self::VolumeComplete => "VolumeComplete",
            Self::TikvComplete => "TikvComplete",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Returns the position of this type in the progress sequence, or
    /// `None` for signal types that never move the phase.
    #[must_use]
    pub const fn progress_rank(&self) -> Option<u8> {
        match self {
            Self::Scheduled => Some(1),
            Self::Running => Some(2),
            Self::VolumeComplete => Some(3),
            Self::TikvComplete => Some(4),
            Self::Complete => Some(5),
            Self::Invalid | Self::RetryFailed | Self::Failed => None,
        }
    }

    /// Returns `true` if this type participates in the progress sequence.
    #[must_use]
    pub const fn is_progress(&self) -> bool {
        self.progress_rank().is_some()
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single condition record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    /// The condition type.
    #[serde(rename = "type")]
    pub condition_type: ConditionType,

    /// Whether the condition currently holds.
    pub status: bool,

    /// Short machine-readable reason label.
    #[serde(default)]
    pub reason: String,

    /// Human-readable detail, usually the full error text.
    #[serde(default)]
    pub message: String,

    /// When `status` last changed.
    pub last_transition_time: DateTime<Utc>,
}

impl Condition {
    /// Creates a condition that holds, stamped with the current time.
    #[must_use]
    pub fn new_true(condition_type: ConditionType) -> Self {
        Self {
            condition_type,
            status: true,
            reason: String::new(),
            message: String::new(),
            last_transition_time: Utc::now(),
        }
    }

    /// Sets the reason label.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    /// Sets the detail message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Sets the transition timestamp. Useful for deterministic tests.
    #[must_use]
    pub const fn with_transition_time(mut self, at: DateTime<Utc>) -> Self {
        self.last_transition_time = at;
        self
    }
}

/// The result of merging a condition into a [`ConditionSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum MergeOutcome {
    /// The set changed; the caller should persist it.
    Applied,

    /// An identical condition was already present.
    Unchanged,

    /// The merge was refused by the no-regression guard.
    Suppressed,
}

/// A type-keyed set of conditions with merge-in-place semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionSet {
    conditions: Vec<Condition>,
}

impl ConditionSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            conditions: Vec::new(),
        }
    }

    /// Returns the conditions in insertion order.
    #[must_use]
    pub fn iter(&self) -> std::slice::Iter<'_, Condition> {
        self.conditions.iter()
    }

    /// Returns the number of conditions in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Returns the condition of the given type, if present.
    #[must_use]
    pub fn get(&self, condition_type: ConditionType) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|c| c.condition_type == condition_type)
    }

    /// Returns `true` if the condition of the given type currently holds.
    #[must_use]
    pub fn is_true(&self, condition_type: ConditionType) -> bool {
        self.get(condition_type).is_some_and(|c| c.status)
    }

    /// Returns the highest progress rank currently held.
    #[must_use]
    pub fn highest_progress_rank(&self) -> Option<u8> {
        self.conditions
            .iter()
            .filter(|c| c.status)
            .filter_map(|c| c.condition_type.progress_rank())
            .max()
    }

    /// Merges a condition into the set.
    ///
    /// Rules, checked in order:
    ///
    /// 1. A true progress condition whose rank is below the highest rank
    ///    already held is suppressed (no phase regression).
    /// 2. `Scheduled` that is already true is suppressed, so that later
    ///    reconciliations re-checking a created-but-not-running job do
    ///    not refresh (and re-timestamp) the scheduling record.
    /// 3. A condition of the same type is updated in place; the
    ///    transition timestamp moves only when the boolean status
    ///    actually changes.
    /// 4. Otherwise the condition is appended.
    pub fn merge(&mut self, condition: Condition) -> MergeOutcome {
        if condition.status {
            if let Some(rank) = condition.condition_type.progress_rank() {
                if self.highest_progress_rank().is_some_and(|held| held > rank) {
                    return MergeOutcome::Suppressed;
                }
            }
            if condition.condition_type == ConditionType::Scheduled
                && self.is_true(ConditionType::Scheduled)
            {
                return MergeOutcome::Suppressed;
            }
        }

        if let Some(existing) = self
            .conditions
            .iter_mut()
            .find(|c| c.condition_type == condition.condition_type)
        {
            if existing.status == condition.status
                && existing.reason == condition.reason
                && existing.message == condition.message
            {
                return MergeOutcome::Unchanged;
            }
            if existing.status != condition.status {
                existing.last_transition_time = condition.last_transition_time;
            }
            existing.status = condition.status;
            existing.reason = condition.reason;
            existing.message = condition.message;
            return MergeOutcome::Applied;
        }

        self.conditions.push(condition);
        MergeOutcome::Applied
    }
}

impl<'a> IntoIterator for &'a ConditionSet {
    type Item = &'a Condition;
    type IntoIter = std::slice::Iter<'a, Condition>;

    fn into_iter(self) -> Self::IntoIter {
        self.conditions.iter()
    }
}
