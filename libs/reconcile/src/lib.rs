//! Reconciliation loop primitives.
//!
//! This library provides the pieces every operator controller shares:
//!
//! - **Object keys**: the `(namespace, name)` identity a reconciler works on.
//! - **Actions**: what a reconciliation pass asks for next, either "run again
//!   after D" or "wait for the next change".
//! - **Controller workers**: a loop that drives one [`Reconciler`] from change
//!   events and timed requeues.
//! - **Tag diffing**: the symmetric set difference used by discovery.
//!
//! # Invariants
//!
//! - A worker reconciles at most one key at a time, so no two passes for the
//!   same object ever overlap within one controller
//! - Decisions are recomputed from absolute state every pass; a requeue
//!   carries no memory of the previous pass
//! - The latest decision for a key replaces any earlier pending requeue

mod diff;
mod worker;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use diff::TagDiff;
pub use worker::{ControllerWorker, Reconciler, RequeueQueue, WorkerStats};

/// Identity of a namespaced object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// What the reconciler wants to happen after a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Reconcile the same key again after the given delay.
    Requeue(Duration),

    /// Do nothing until the object changes.
    AwaitChange,
}

impl Action {
    pub fn requeue(after: Duration) -> Self {
        Self::Requeue(after)
    }

    pub fn await_change() -> Self {
        Self::AwaitChange
    }

    /// Returns the requeue delay, if any.
    pub fn requeue_after(&self) -> Option<Duration> {
        match self {
            Self::Requeue(after) => Some(*after),
            Self::AwaitChange => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_display() {
        let key = ObjectKey::new("default", "analytics");
        assert_eq!(key.to_string(), "default/analytics");
    }

    #[test]
    fn test_action_requeue_after() {
        assert_eq!(
            Action::requeue(Duration::from_secs(15)).requeue_after(),
            Some(Duration::from_secs(15))
        );
        assert_eq!(Action::await_change().requeue_after(), None);
    }

    #[test]
    fn test_object_key_json_shape() {
        let key = ObjectKey::new("team-a", "gpu");
        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(json, serde_json::json!({"namespace": "team-a", "name": "gpu"}));
    }
}
