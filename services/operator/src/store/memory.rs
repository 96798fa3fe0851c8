//! In-memory store.
//!
//! Objects are held as JSON per kind, the way an API server would hold them,
//! so typed reads go through the same serde path as a real store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use rbo_id::ObjectUid;
use rbo_reconcile::ObjectKey;
use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use super::{Store, StoreError, StoreResult};
use crate::api::{Kind, Object, ObjectMeta};

#[derive(Debug, Clone)]
struct StoredObject {
    meta: ObjectMeta,
    spec: Value,
    status: Value,
}

impl StoredObject {
    fn decode<K: Kind>(&self) -> StoreResult<Object<K>> {
        Ok(Object {
            meta: self.meta.clone(),
            spec: serde_json::from_value(self.spec.clone())?,
            status: serde_json::from_value(self.status.clone())?,
        })
    }
}

#[derive(Debug, Default)]
struct Inner {
    objects: HashMap<&'static str, BTreeMap<ObjectKey, StoredObject>>,
    watchers: HashMap<&'static str, Vec<mpsc::UnboundedSender<ObjectKey>>>,
    last_version: u64,
}

impl Inner {
    fn next_version(&mut self) -> u64 {
        self.last_version += 1;
        self.last_version
    }

    fn notify(&mut self, kind: &'static str, key: &ObjectKey) {
        if let Some(watchers) = self.watchers.get_mut(kind) {
            watchers.retain(|tx| tx.send(key.clone()).is_ok());
        }
    }

    fn stored_mut<K: Kind>(&mut self, key: &ObjectKey) -> StoreResult<&mut StoredObject> {
        self.objects
            .get_mut(K::KIND)
            .and_then(|objects| objects.get_mut(key))
            .ok_or_else(|| StoreError::NotFound {
                kind: K::KIND,
                key: key.clone(),
            })
    }
}

/// Store backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects of kind `K`.
    pub async fn count<K: Kind>(&self) -> usize {
        let inner = self.inner.read().await;
        inner.objects.get(K::KIND).map_or(0, BTreeMap::len)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get<K: Kind>(&self, key: &ObjectKey) -> StoreResult<Object<K>> {
        let inner = self.inner.read().await;
        inner
            .objects
            .get(K::KIND)
            .and_then(|objects| objects.get(key))
            .ok_or_else(|| StoreError::NotFound {
                kind: K::KIND,
                key: key.clone(),
            })?
            .decode()
    }

    async fn list<K: Kind>(&self, namespace: Option<&str>) -> StoreResult<Vec<Object<K>>> {
        let inner = self.inner.read().await;
        let Some(objects) = inner.objects.get(K::KIND) else {
            return Ok(Vec::new());
        };

        objects
            .iter()
            .filter(|(key, _)| namespace.is_none_or(|ns| key.namespace == ns))
            .map(|(_, stored)| stored.decode())
            .collect()
    }

    async fn list_by_field<K: Kind>(
        &self,
        namespace: Option<&str>,
        field: &str,
        value: &str,
    ) -> StoreResult<Vec<Object<K>>> {
        let inner = self.inner.read().await;
        let Some(objects) = inner.objects.get(K::KIND) else {
            return Ok(Vec::new());
        };

        objects
            .iter()
            .filter(|(key, stored)| {
                namespace.is_none_or(|ns| key.namespace == ns)
                    && stored.spec.get(field).and_then(Value::as_str) == Some(value)
            })
            .map(|(_, stored)| stored.decode())
            .collect()
    }

    async fn create<K: Kind>(&self, object: Object<K>) -> StoreResult<Object<K>> {
        if object.meta.name.is_empty() || object.meta.namespace.is_empty() {
            return Err(StoreError::Invalid {
                kind: K::KIND,
                message: "name and namespace are required".to_string(),
            });
        }

        let key = object.key();
        let spec = serde_json::to_value(&object.spec)?;
        let status = serde_json::to_value(&object.status)?;

        let mut inner = self.inner.write().await;
        if inner
            .objects
            .get(K::KIND)
            .is_some_and(|objects| objects.contains_key(&key))
        {
            return Err(StoreError::AlreadyExists {
                kind: K::KIND,
                key,
            });
        }

        let mut meta = object.meta;
        meta.uid = Some(ObjectUid::new());
        meta.resource_version = inner.next_version();
        meta.created_at = Some(Utc::now());

        let stored = StoredObject { meta, spec, status };
        let created = stored.decode()?;
        inner
            .objects
            .entry(K::KIND)
            .or_default()
            .insert(key.clone(), stored);
        inner.notify(K::KIND, &key);

        debug!(kind = K::KIND, key = %key, "Object created");
        Ok(created)
    }

    async fn update<K: Kind>(&self, object: &Object<K>) -> StoreResult<Object<K>> {
        let key = object.key();
        let spec = serde_json::to_value(&object.spec)?;

        let mut inner = self.inner.write().await;
        let version = inner.next_version();
        let stored = inner.stored_mut::<K>(&key)?;

        let spec_changed = stored.spec != spec;
        stored.spec = spec;
        stored.meta.labels = object.meta.labels.clone();
        stored.meta.resource_version = version;
        let updated = stored.decode()?;

        if spec_changed {
            inner.notify(K::KIND, &key);
        }

        debug!(kind = K::KIND, key = %key, spec_changed, "Object updated");
        Ok(updated)
    }

    async fn update_status<K: Kind>(&self, object: &Object<K>) -> StoreResult<Object<K>> {
        let key = object.key();
        let status = serde_json::to_value(&object.status)?;

        let mut inner = self.inner.write().await;
        let version = inner.next_version();
        let stored = inner.stored_mut::<K>(&key)?;
        stored.status = status;
        stored.meta.resource_version = version;

        stored.decode()
    }

    async fn watch<K: Kind>(&self) -> mpsc::UnboundedReceiver<ObjectKey> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.write().await;
        inner.watchers.entry(K::KIND).or_default().push(tx);
        rx
    }
}
