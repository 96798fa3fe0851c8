//! Error types for uid parsing.

use thiserror::Error;

/// Errors that can occur when parsing a uid.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    /// The uid string is empty.
    #[error("uid cannot be empty")]
    Empty,

    /// The uid has the wrong prefix.
    #[error("invalid uid prefix: expected '{expected}', got '{actual}'")]
    InvalidPrefix {
        expected: &'static str,
        actual: String,
    },

    /// The uid is missing the underscore separator.
    #[error("uid missing underscore separator")]
    MissingSeparator,

    /// The ULID portion of the uid is invalid.
    #[error("invalid ULID: {0}")]
    InvalidUlid(String),
}
