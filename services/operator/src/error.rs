//! Reconciliation error taxonomy.

use std::time::Duration;

use thiserror::Error;

use crate::cloud::CloudError;
use crate::notify::NotifyError;
use crate::store::StoreError;

/// Result type for reconciliation passes.
pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A timestamp or schedule in an object could not be parsed.
    #[error("cannot parse {field} '{value}': {reason}")]
    Parse {
        field: &'static str,
        value: String,
        reason: String,
    },

    /// The group's lease is held by someone else.
    #[error("locked by {holder} until {until}")]
    Locked { holder: String, until: String },

    #[error("provider error: {0}")]
    Provider(String),

    /// Needs operator correction; never retried on a timer.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("notification error: {0}")]
    Notify(#[from] NotifyError),
}

impl ReconcileError {
    pub fn parse(field: &'static str, value: &str, reason: impl ToString) -> Self {
        Self::Parse {
            field,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Delay before retrying after this error, `None` to wait for a change.
    ///
    /// `steady` is the controller's normal cadence and `backoff` its retry
    /// delay after transient failures.
    pub fn retry_after(&self, steady: Duration, backoff: Duration) -> Option<Duration> {
        match self {
            Self::Configuration(_) => None,
            Self::Locked { .. } => Some(steady),
            Self::Store(e) if e.is_not_found() => None,
            Self::Store(_) | Self::Provider(_) | Self::Notify(_) | Self::Parse { .. } => {
                Some(backoff)
            }
        }
    }
}

impl From<CloudError> for ReconcileError {
    fn from(e: CloudError) -> Self {
        if e.is_configuration() {
            return Self::Configuration(e.to_string());
        }

        match e {
            CloudError::Locked { holder, until, .. } => Self::Locked { holder, until },
            other => Self::Provider(other.to_string()),
        }
    }
}
