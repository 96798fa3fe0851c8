//! In-memory provider clients for tests and local runs.
//!
//! Start and stop take effect immediately. Both fakes can be told to fail
//! every call, and count the mutating calls they receive.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use super::compute::{ComputeApi, ComputeInstance, InstanceState};
use super::database::{DatabaseApi, DbInstance, DB_AVAILABLE, DB_STOPPED};
use super::{CloudError, CloudResult, MANAGED_TAG, MANAGED_VALUE, MEMBERSHIP_TAG};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn to_tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn group_tags(tag: &str, managed: bool) -> BTreeMap<String, String> {
    let mut tags = to_tags(&[(MEMBERSHIP_TAG, tag)]);
    if managed {
        tags.insert(MANAGED_TAG.to_string(), MANAGED_VALUE.to_string());
    }
    tags
}

/// Mutating-call counters.
#[derive(Debug, Default)]
pub struct CallCounts {
    starts: AtomicU64,
    stops: AtomicU64,
}

impl CallCounts {
    pub fn starts(&self) -> u64 {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> u64 {
        self.stops.load(Ordering::SeqCst)
    }
}

/// Fake compute provider.
#[derive(Debug, Default)]
pub struct InMemoryCompute {
    instances: Mutex<BTreeMap<String, ComputeInstance>>,
    failure: Mutex<Option<String>>,
    calls: CallCounts,
}

impl InMemoryCompute {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_instance(&self, id: &str, state: InstanceState, tags: &[(&str, &str)]) {
        self.insert(id, state, to_tags(tags));
    }

    /// Add `count` stopped members named `{tag}-{n}`.
    pub fn add_group(&self, tag: &str, count: usize, managed: bool) {
        for n in 0..count {
            self.insert(&format!("{tag}-{n}"), InstanceState::Stopped, group_tags(tag, managed));
        }
    }

    fn insert(&self, id: &str, state: InstanceState, tags: BTreeMap<String, String>) {
        lock(&self.instances).insert(
            id.to_string(),
            ComputeInstance {
                id: id.to_string(),
                state,
                tags,
            },
        );
    }

    pub fn instance(&self, id: &str) -> Option<ComputeInstance> {
        lock(&self.instances).get(id).cloned()
    }

    pub fn set_state(&self, id: &str, state: InstanceState) {
        if let Some(instance) = lock(&self.instances).get_mut(id) {
            instance.state = state;
        }
    }

    /// Fail every following call with `message`.
    pub fn fail_with(&self, message: &str) {
        *lock(&self.failure) = Some(message.to_string());
    }

    pub fn clear_failure(&self) {
        *lock(&self.failure) = None;
    }

    pub fn calls(&self) -> &CallCounts {
        &self.calls
    }

    fn check(&self) -> CloudResult<()> {
        match lock(&self.failure).as_ref() {
            Some(message) => Err(CloudError::Api(message.clone())),
            None => Ok(()),
        }
    }

    fn apply(&self, ids: &[String], mut f: impl FnMut(&mut ComputeInstance)) -> CloudResult<()> {
        let mut instances = lock(&self.instances);
        for id in ids {
            let instance = instances
                .get_mut(id)
                .ok_or_else(|| CloudError::Api(format!("instance {id} not found")))?;
            f(instance);
        }
        Ok(())
    }
}

#[async_trait]
impl ComputeApi for InMemoryCompute {
    async fn describe_instances(&self, key: &str, value: &str) -> CloudResult<Vec<ComputeInstance>> {
        self.check()?;
        Ok(lock(&self.instances)
            .values()
            .filter(|i| i.tags.get(key).map(String::as_str) == Some(value))
            .cloned()
            .collect())
    }

    async fn describe_instance_status(
        &self,
        ids: &[String],
    ) -> CloudResult<Vec<(String, InstanceState)>> {
        self.check()?;
        let instances = lock(&self.instances);
        Ok(ids
            .iter()
            .filter_map(|id| instances.get(id).map(|i| (id.clone(), i.state)))
            .collect())
    }

    async fn start_instances(&self, ids: &[String]) -> CloudResult<()> {
        self.check()?;
        self.calls.starts.fetch_add(1, Ordering::SeqCst);
        debug!(count = ids.len(), "Fake compute start");
        self.apply(ids, |i| i.state = InstanceState::Running)
    }

    async fn stop_instances(&self, ids: &[String]) -> CloudResult<()> {
        self.check()?;
        self.calls.stops.fetch_add(1, Ordering::SeqCst);
        debug!(count = ids.len(), "Fake compute stop");
        self.apply(ids, |i| i.state = InstanceState::Stopped)
    }

    async fn create_tags(&self, ids: &[String], tags: &[(String, String)]) -> CloudResult<()> {
        self.check()?;
        self.apply(ids, |i| i.tags.extend(tags.iter().cloned()))
    }

    async fn delete_tags(&self, ids: &[String], keys: &[&str]) -> CloudResult<()> {
        self.check()?;
        self.apply(ids, |i| {
            for key in keys {
                i.tags.remove(*key);
            }
        })
    }
}

#[derive(Debug, Clone)]
struct StoredDb {
    instance: DbInstance,
    tags: BTreeMap<String, String>,
}

/// Fake managed-database provider.
#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    instances: Mutex<BTreeMap<String, StoredDb>>,
    failure: Mutex<Option<String>>,
    calls: CallCounts,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_instance(&self, identifier: &str, status: &str, tags: &[(&str, &str)]) {
        self.insert(identifier, status, to_tags(tags));
    }

    /// Add `count` stopped members named `{tag}-{n}`.
    pub fn add_group(&self, tag: &str, count: usize, managed: bool) {
        for n in 0..count {
            self.insert(&format!("{tag}-{n}"), DB_STOPPED, group_tags(tag, managed));
        }
    }

    fn insert(&self, identifier: &str, status: &str, tags: BTreeMap<String, String>) {
        let instance = DbInstance {
            identifier: identifier.to_string(),
            arn: format!("arn:db:{identifier}"),
            status: status.to_string(),
        };
        lock(&self.instances).insert(identifier.to_string(), StoredDb { instance, tags });
    }

    pub fn instance(&self, identifier: &str) -> Option<DbInstance> {
        lock(&self.instances)
            .get(identifier)
            .map(|db| db.instance.clone())
    }

    pub fn tags(&self, identifier: &str) -> BTreeMap<String, String> {
        lock(&self.instances)
            .get(identifier)
            .map(|db| db.tags.clone())
            .unwrap_or_default()
    }

    pub fn set_status(&self, identifier: &str, status: &str) {
        if let Some(db) = lock(&self.instances).get_mut(identifier) {
            db.instance.status = status.to_string();
        }
    }

    pub fn fail_with(&self, message: &str) {
        *lock(&self.failure) = Some(message.to_string());
    }

    pub fn clear_failure(&self) {
        *lock(&self.failure) = None;
    }

    pub fn calls(&self) -> &CallCounts {
        &self.calls
    }

    fn check(&self) -> CloudResult<()> {
        match lock(&self.failure).as_ref() {
            Some(message) => Err(CloudError::Api(message.clone())),
            None => Ok(()),
        }
    }

    fn transition(&self, identifier: &str, from: &str, to: &str) -> CloudResult<()> {
        let mut instances = lock(&self.instances);
        let db = instances
            .get_mut(identifier)
            .ok_or_else(|| CloudError::Api(format!("DB instance {identifier} not found")))?;
        if db.instance.status != from {
            return Err(CloudError::Api(format!(
                "InvalidDBInstanceState: {identifier} is {}",
                db.instance.status
            )));
        }
        db.instance.status = to.to_string();
        Ok(())
    }

    fn by_arn<R>(&self, arn: &str, f: impl FnOnce(&mut StoredDb) -> R) -> CloudResult<R> {
        lock(&self.instances)
            .values_mut()
            .find(|db| db.instance.arn == arn)
            .map(f)
            .ok_or_else(|| CloudError::Api(format!("resource {arn} not found")))
    }
}

#[async_trait]
impl DatabaseApi for InMemoryDatabase {
    async fn describe_db_instances(&self) -> CloudResult<Vec<DbInstance>> {
        self.check()?;
        Ok(lock(&self.instances)
            .values()
            .map(|db| db.instance.clone())
            .collect())
    }

    async fn list_tags(&self, arn: &str) -> CloudResult<BTreeMap<String, String>> {
        self.check()?;
        self.by_arn(arn, |db| db.tags.clone())
    }

    async fn start_db_instance(&self, identifier: &str) -> CloudResult<()> {
        self.check()?;
        self.calls.starts.fetch_add(1, Ordering::SeqCst);
        self.transition(identifier, DB_STOPPED, DB_AVAILABLE)
    }

    async fn stop_db_instance(&self, identifier: &str) -> CloudResult<()> {
        self.check()?;
        self.calls.stops.fetch_add(1, Ordering::SeqCst);
        self.transition(identifier, DB_AVAILABLE, DB_STOPPED)
    }

    async fn add_tags(&self, arn: &str, tags: &[(String, String)]) -> CloudResult<()> {
        self.check()?;
        self.by_arn(arn, |db| db.tags.extend(tags.iter().cloned()))
    }

    async fn remove_tags(&self, arn: &str, keys: &[&str]) -> CloudResult<()> {
        self.check()?;
        self.by_arn(arn, |db| {
            for key in keys {
                db.tags.remove(*key);
            }
        })
    }
}
