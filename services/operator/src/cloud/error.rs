//! Cloud abstraction error types.

use thiserror::Error;

use super::registry::ProviderKind;

/// Result type for provider operations.
pub type CloudResult<T> = Result<T, CloudError>;

#[derive(Debug, Error)]
pub enum CloudError {
    /// The group's lease belongs to someone else and has not expired.
    #[error("resource {tag} is locked by {holder}; the lock expires at {until}")]
    Locked {
        tag: String,
        holder: String,
        until: String,
    },

    /// Provider API or network failure.
    #[error("provider API error: {0}")]
    Api(String),

    /// The type discriminator names no known backend.
    #[error("unknown resource type '{0}'")]
    UnknownType(String),

    /// The backend exists but no client was registered for it.
    #[error("no client registered for resource type '{0}'")]
    Unconfigured(ProviderKind),
}

impl CloudError {
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked { .. })
    }

    /// Errors that need operator correction rather than a retry.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::UnknownType(_) | Self::Unconfigured(_))
    }
}
