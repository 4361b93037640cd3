//! Label constants and selector construction.
//!
//! Every object the orchestrator creates or looks up is labeled with the
//! standard recommended keys plus a restore-name key of our own, so that
//! bounded selector lookups (store pods, store volumes, restore jobs)
//! stay cheap and unambiguous.

use std::collections::BTreeMap;

/// Recommended label key naming the higher-level application instance.
pub const INSTANCE_LABEL_KEY: &str = "app.kubernetes.io/instance";

/// Recommended label key naming the component within the instance.
pub const COMPONENT_LABEL_KEY: &str = "app.kubernetes.io/component";

/// Recommended label key naming the managing controller.
pub const MANAGED_BY_LABEL_KEY: &str = "app.kubernetes.io/managed-by";

/// Label key carrying the restore request name on objects it owns.
pub const RESTORE_LABEL_KEY: &str = "rewind.dev/restore-name";

/// Value of [`MANAGED_BY_LABEL_KEY`] for objects this operator manages.
pub const MANAGED_BY_VALUE: &str = "rewind-operator";

/// Component value for storage-role (tikv) members.
pub const TIKV_COMPONENT: &str = "tikv";

/// Component value for restore jobs and their pods.
pub const RESTORE_COMPONENT: &str = "restore";

/// Annotation marking a cluster's store volumes as remapped and ready.
///
/// The value is the `namespace/name` identity of the restore that did the
/// remapping, which is what makes the marker safe to check across
/// reconciliation restarts.
pub const TIKV_VOLUMES_READY_ANNOTATION: &str = "rewind.dev/tikv-volumes-ready";

/// Builder for label maps and selectors.
#[derive(Debug, Clone, Default)]
pub struct Labels(BTreeMap<String, String>);

impl Labels {
    /// Creates a label set carrying only the managed-by marker.
    #[must_use]
    pub fn new() -> Self {
        let mut map = BTreeMap::new();
        map.insert(MANAGED_BY_LABEL_KEY.to_string(), MANAGED_BY_VALUE.to_string());
        Self(map)
    }

    /// Sets the instance label.
    #[must_use]
    pub fn instance(mut self, name: impl Into<String>) -> Self {
        self.0.insert(INSTANCE_LABEL_KEY.to_string(), name.into());
        self
    }

    /// Marks the storage-role component.
    #[must_use]
    pub fn tikv(mut self) -> Self {
        self.0
            .insert(COMPONENT_LABEL_KEY.to_string(), TIKV_COMPONENT.to_string());
        self
    }

    /// Marks the restore-job component.
    #[must_use]
    pub fn restore_job(mut self) -> Self {
        self.0
            .insert(COMPONENT_LABEL_KEY.to_string(), RESTORE_COMPONENT.to_string());
        self
    }

    /// Attaches the restore request name.
    #[must_use]
    pub fn restore(mut self, name: impl Into<String>) -> Self {
        self.0.insert(RESTORE_LABEL_KEY.to_string(), name.into());
        self
    }

    /// Returns the labels as a match-labels selector.
    ///
    /// The managed-by marker is not part of selectors: store pods and
    /// volumes are managed by the cluster's own controller, not by us.
    #[must_use]
    pub fn selector(mut self) -> BTreeMap<String, String> {
        self.0.remove(MANAGED_BY_LABEL_KEY);
        self.0
    }

    /// Returns the label map itself.
    #[must_use]
    pub fn into_map(self) -> BTreeMap<String, String> {
        self.0
    }
}

/// Returns `true` if `labels` matches every key/value pair in `selector`.
#[must_use]
pub fn matches(labels: &BTreeMap<String, String>, selector: &BTreeMap<String, String>) -> bool {
    selector
        .iter()
        .all(|(k, v)| labels.get(k).is_some_and(|have| have == v))
}
