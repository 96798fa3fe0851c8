//! Startup manifest for development runs.
//!
//! A seed file describes objects to load into the in-memory store and
//! instances to place in the fake providers:
//!
//! ```json
//! {
//!   "monitors": [{"name": "ec2", "spec": {"type": "ec2"}}],
//!   "bookings": [{"name": "b1", "spec": {"start_at": "...", "end_at": "...",
//!                 "resource_name": "analytics", "user_id": "alice"}}],
//!   "compute": [{"id": "i-1", "state": "stopped",
//!                "tags": {"resource-booking/application": "analytics"}}]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::info;

use crate::api::{
    BookingSchedulerSpec, BookingSpec, Kind, Object, ObjectMeta, ResourceMonitorSpec, ResourceSpec,
};
use crate::cloud::{InMemoryCompute, InMemoryDatabase, InstanceState, DB_STOPPED};
use crate::store::Store;

#[derive(Debug, Deserialize)]
#[serde(bound = "K: DeserializeOwned")]
pub struct SeedObject<K> {
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub spec: K,
}

impl<K: Kind> SeedObject<K> {
    fn into_object(self, default_namespace: &str) -> Object<K> {
        let namespace = self
            .namespace
            .unwrap_or_else(|| default_namespace.to_string());
        let mut meta = ObjectMeta::new(namespace, self.name);
        meta.labels = self.labels;
        Object::new(meta, self.spec)
    }
}

#[derive(Debug, Deserialize)]
pub struct SeedInstance {
    pub id: String,
    pub state: InstanceState,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

fn default_db_status() -> String {
    DB_STOPPED.to_string()
}

#[derive(Debug, Deserialize)]
pub struct SeedDatabase {
    pub identifier: String,
    #[serde(default = "default_db_status")]
    pub status: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Seed {
    pub resources: Vec<SeedObject<ResourceSpec>>,
    pub monitors: Vec<SeedObject<ResourceMonitorSpec>>,
    pub bookings: Vec<SeedObject<BookingSpec>>,
    pub schedulers: Vec<SeedObject<BookingSchedulerSpec>>,
    pub compute: Vec<SeedInstance>,
    pub databases: Vec<SeedDatabase>,
}

impl Seed {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read seed file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse seed file {}", path.display()))
    }

    /// Load every object and instance. Returns the number of objects created.
    pub async fn apply<S: Store>(
        self,
        store: &S,
        namespace: &str,
        compute: &InMemoryCompute,
        database: &InMemoryDatabase,
    ) -> Result<usize> {
        for instance in &self.compute {
            let tags: Vec<(&str, &str)> = instance
                .tags
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            compute.add_instance(&instance.id, instance.state, &tags);
        }

        for db in &self.databases {
            let tags: Vec<(&str, &str)> = db
                .tags
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str()))
                .collect();
            database.add_instance(&db.identifier, &db.status, &tags);
        }

        let mut created = 0;
        created += create_all(store, namespace, self.resources).await?;
        created += create_all(store, namespace, self.monitors).await?;
        created += create_all(store, namespace, self.bookings).await?;
        created += create_all(store, namespace, self.schedulers).await?;

        info!(
            objects = created,
            compute_instances = self.compute.len(),
            databases = self.databases.len(),
            "Seed applied"
        );
        Ok(created)
    }
}

async fn create_all<K: Kind, S: Store>(
    store: &S,
    namespace: &str,
    objects: Vec<SeedObject<K>>,
) -> Result<usize> {
    let count = objects.len();
    for object in objects {
        let object = object.into_object(namespace);
        let key = object.key();
        store
            .create(object)
            .await
            .with_context(|| format!("failed to seed {} {key}", K::KIND))?;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use rbo_reconcile::ObjectKey;

    use super::*;
    use crate::store::MemoryStore;

    const MANIFEST: &str = r#"{
        "monitors": [{"name": "ec2", "spec": {"type": "ec2"}}],
        "resources": [{"name": "analytics", "namespace": "team", "spec": {"tag": "analytics"}}],
        "compute": [
            {"id": "i-1", "state": "running", "tags": {"resource-booking/application": "analytics"}}
        ],
        "databases": [{"identifier": "db-1"}]
    }"#;

    #[tokio::test]
    async fn test_seed_file_loads_objects_and_instances() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();

        let seed = Seed::from_file(file.path()).unwrap();
        let store = MemoryStore::new();
        let compute = InMemoryCompute::new();
        let database = InMemoryDatabase::new();

        let created = seed.apply(&store, "default", &compute, &database).await.unwrap();

        assert_eq!(created, 2);
        store
            .get::<ResourceMonitorSpec>(&ObjectKey::new("default", "ec2"))
            .await
            .unwrap();
        let resource = store
            .get::<ResourceSpec>(&ObjectKey::new("team", "analytics"))
            .await
            .unwrap();
        assert_eq!(resource.spec.provider, "ec2");
        assert_eq!(compute.instance("i-1").unwrap().state, InstanceState::Running);
        assert_eq!(database.instance("db-1").unwrap().status, DB_STOPPED);
    }

    #[test]
    fn test_unreadable_seed_names_the_file() {
        let err = Seed::from_file(Path::new("/nonexistent/seed.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/seed.json"));
    }
}
