//! Lease record carried on provider tags.
//!
//! A lease is two tags written on every member of a group: the holder id and
//! the absolute expiry. The check-then-act protocol is:
//!
//! - no lease, or a lease without an expiry: anyone may act
//! - holder equals the caller: the caller may act
//! - expiry in the past: anyone may act and the lease is overwritten
//!
//! Members are tagged one API call at a time with no compare-and-swap, so two
//! holders starting the same group in the same instant both pass the check and
//! the last tag write wins.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::error::{CloudError, CloudResult};
use crate::api::{format_timestamp, parse_timestamp};

/// Tag key holding the lease holder id.
pub const HOLDER_TAG: &str = "resource-booking/locked-by";

/// Tag key holding the lease expiry (RFC 3339).
pub const EXPIRY_TAG: &str = "resource-booking/locked-until";

/// Lease expiry as read from a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseExpiry {
    At(DateTime<Utc>),

    /// The tag holds something that is not a timestamp. Treated as held.
    Unparsable(String),
}

impl std::fmt::Display for LeaseExpiry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::At(at) => f.write_str(&format_timestamp(*at)),
            Self::Unparsable(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub holder: String,
    pub expiry: Option<LeaseExpiry>,
}

impl Lease {
    pub fn new(holder: impl Into<String>, until: DateTime<Utc>) -> Self {
        Self {
            holder: holder.into(),
            expiry: Some(LeaseExpiry::At(until)),
        }
    }

    /// Read a lease from one member's tags.
    pub fn from_tags(tags: &BTreeMap<String, String>) -> Option<Self> {
        let holder = tags.get(HOLDER_TAG).filter(|h| !h.is_empty())?;
        let expiry = tags
            .get(EXPIRY_TAG)
            .filter(|raw| !raw.is_empty())
            .map(|raw| match parse_timestamp(raw) {
                Ok(at) => LeaseExpiry::At(at),
                Err(_) => LeaseExpiry::Unparsable(raw.clone()),
            });

        Some(Self {
            holder: holder.clone(),
            expiry,
        })
    }

    /// Read the group lease: the first member carrying a holder tag wins.
    ///
    /// Members that disagree are not reconciled.
    pub fn from_members<'a, I>(members: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a BTreeMap<String, String>>,
    {
        members.into_iter().find_map(Self::from_tags)
    }

    /// Whether the lease still excludes other holders at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match &self.expiry {
            None => false,
            Some(LeaseExpiry::At(until)) => now < *until,
            Some(LeaseExpiry::Unparsable(_)) => true,
        }
    }

    pub fn permits(&self, uid: &str, now: DateTime<Utc>) -> bool {
        self.holder == uid || !self.is_active(now)
    }

    pub fn until(&self) -> Option<String> {
        self.expiry.as_ref().map(ToString::to_string)
    }

    /// Tags to write for this lease.
    pub fn to_tags(&self) -> Vec<(String, String)> {
        let mut tags = vec![(HOLDER_TAG.to_string(), self.holder.clone())];
        if let Some(expiry) = &self.expiry {
            tags.push((EXPIRY_TAG.to_string(), expiry.to_string()));
        }
        tags
    }
}

/// Check whether `uid` may start or stop the group tagged `tag`.
pub fn authorize(lease: Option<&Lease>, tag: &str, uid: &str, now: DateTime<Utc>) -> CloudResult<()> {
    match lease {
        Some(lease) if !lease.permits(uid, now) => Err(CloudError::Locked {
            tag: tag.to_string(),
            holder: lease.holder.clone(),
            until: lease.until().unwrap_or_default(),
        }),
        _ => Ok(()),
    }
}
