//! Object metadata and the generic object envelope.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use rbo_id::ObjectUid;
use rbo_reconcile::ObjectKey;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Metadata shared by every stored object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,

    /// Assigned by the store on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<ObjectUid>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    /// Bumped by the store on every write.
    #[serde(default)]
    pub resource_version: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(self.namespace.clone(), self.name.clone())
    }
}

/// A kind of object: the spec type plus its status type.
pub trait Kind:
    std::fmt::Debug + Clone + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Kind name, unique across the object model.
    const KIND: &'static str;

    type Status: std::fmt::Debug
        + Clone
        + Default
        + Send
        + Sync
        + Serialize
        + DeserializeOwned
        + 'static;
}

/// A stored object of kind `K`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound(serialize = "K: Kind", deserialize = "K: Kind"))]
pub struct Object<K: Kind> {
    pub meta: ObjectMeta,
    pub spec: K,
    #[serde(default)]
    pub status: K::Status,
}

impl<K: Kind> Object<K> {
    /// A new, not yet stored object with default status.
    pub fn new(meta: ObjectMeta, spec: K) -> Self {
        Self {
            meta,
            spec,
            status: K::Status::default(),
        }
    }

    pub fn key(&self) -> ObjectKey {
        self.meta.key()
    }
}

/// Parse an RFC 3339 timestamp into UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(value).map(|t| t.with_timezone(&Utc))
}

/// Canonical timestamp form written into specs, statuses and lease tags.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_roundtrip_is_canonical() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let s = format_timestamp(at);
        assert_eq!(s, "2026-03-01T09:30:00Z");
        assert_eq!(parse_timestamp(&s).unwrap(), at);
    }

    #[test]
    fn test_parse_timestamp_normalizes_offset() {
        let parsed = parse_timestamp("2026-03-01T11:30:00+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("tomorrow").is_err());
    }
}
