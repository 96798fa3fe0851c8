//! Store error types.

use rbo_reconcile::ObjectKey;
use thiserror::Error;

/// Declarative store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The object does not exist (or vanished between list and get).
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: ObjectKey },

    /// Create collided with an existing name.
    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: &'static str, key: ObjectKey },

    /// The object cannot be stored as given.
    #[error("invalid {kind}: {message}")]
    Invalid { kind: &'static str, message: String },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}
