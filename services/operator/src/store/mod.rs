//! Declarative store collaborator.
//!
//! The operator never owns persistence; it talks to a store that offers typed
//! get/list/create/update on namespaced objects, a field index for lookups,
//! and a change stream per kind. [`MemoryStore`] is the in-process
//! implementation used by tests and development mode.

mod error;
mod memory;

use async_trait::async_trait;
use rbo_reconcile::ObjectKey;
use tokio::sync::mpsc;

use crate::api::{Kind, Object};

pub use error::StoreError;
pub use memory::MemoryStore;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Fetch one object.
    async fn get<K: Kind>(&self, key: &ObjectKey) -> StoreResult<Object<K>>;

    /// List objects of a kind, optionally restricted to one namespace.
    async fn list<K: Kind>(&self, namespace: Option<&str>) -> StoreResult<Vec<Object<K>>>;

    /// List objects whose top-level spec `field` equals `value`, optionally
    /// restricted to one namespace.
    async fn list_by_field<K: Kind>(
        &self,
        namespace: Option<&str>,
        field: &str,
        value: &str,
    ) -> StoreResult<Vec<Object<K>>>;

    /// Create an object. Fails with `AlreadyExists` instead of overwriting.
    async fn create<K: Kind>(&self, object: Object<K>) -> StoreResult<Object<K>>;

    /// Replace spec and labels, leaving status untouched.
    async fn update<K: Kind>(&self, object: &Object<K>) -> StoreResult<Object<K>>;

    /// Replace status only.
    async fn update_status<K: Kind>(&self, object: &Object<K>) -> StoreResult<Object<K>>;

    /// Subscribe to keys of created objects and spec changes of kind `K`.
    async fn watch<K: Kind>(&self) -> mpsc::UnboundedReceiver<ObjectKey>;
}
