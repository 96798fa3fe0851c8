//! # rbo-id
//!
//! Typed identifiers for objects held by the resource booking operator.
//!
//! ## Design Principles
//!
//! - Object names are user-controlled; uids are store-generated and immutable
//! - All uids have a canonical string representation with strict parsing
//! - A Resource's uid doubles as its lease holder identity on provider tags,
//!   so the string form must survive a roundtrip through a tag value
//!
//! ## ID Format
//!
//! All uids use a prefixed format: `{prefix}_{ulid}`, for example
//! `uid_01HV4Z2WQXKJNM8GPQY6VBKC3D`.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
