//! Managed-database backend (database instances grouped by tag).
//!
//! The database API has no tag filter on describe, so every call lists all
//! instances and reads their tags one ARN at a time.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use super::lease::{authorize, Lease, EXPIRY_TAG, HOLDER_TAG};
use super::{
    CloudResource, CloudResult, Discovery, ResourceSummary, MANAGED_TAG, MANAGED_VALUE,
    MEMBERSHIP_TAG,
};
use crate::clock::Clock;

/// Status string of a database that is up and serving.
pub const DB_AVAILABLE: &str = "available";

/// Status string of a stopped database.
pub const DB_STOPPED: &str = "stopped";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbInstance {
    pub identifier: String,
    pub arn: String,
    pub status: String,
}

/// Managed-database provider client.
#[async_trait]
pub trait DatabaseApi: Send + Sync {
    async fn describe_db_instances(&self) -> CloudResult<Vec<DbInstance>>;

    async fn list_tags(&self, arn: &str) -> CloudResult<BTreeMap<String, String>>;

    async fn start_db_instance(&self, identifier: &str) -> CloudResult<()>;

    async fn stop_db_instance(&self, identifier: &str) -> CloudResult<()>;

    async fn add_tags(&self, arn: &str, tags: &[(String, String)]) -> CloudResult<()>;

    async fn remove_tags(&self, arn: &str, keys: &[&str]) -> CloudResult<()>;
}

async fn tagged_instances(
    client: &dyn DatabaseApi,
) -> CloudResult<Vec<(DbInstance, BTreeMap<String, String>)>> {
    let mut tagged = Vec::new();
    for instance in client.describe_db_instances().await? {
        let tags = client.list_tags(&instance.arn).await?;
        tagged.push((instance, tags));
    }
    Ok(tagged)
}

/// Databases sharing one membership tag.
pub struct ManagedDatabase {
    client: Arc<dyn DatabaseApi>,
    clock: Arc<dyn Clock>,
    tag: String,
}

impl ManagedDatabase {
    pub fn new(client: Arc<dyn DatabaseApi>, clock: Arc<dyn Clock>, tag: impl Into<String>) -> Self {
        Self {
            client,
            clock,
            tag: tag.into(),
        }
    }

    async fn members(&self) -> CloudResult<(Vec<DbInstance>, Option<Lease>)> {
        let members: Vec<_> = tagged_instances(self.client.as_ref())
            .await?
            .into_iter()
            .filter(|(_, tags)| tags.get(MEMBERSHIP_TAG) == Some(&self.tag))
            .collect();

        let lease = Lease::from_members(members.iter().map(|(_, tags)| tags));
        Ok((members.into_iter().map(|(i, _)| i).collect(), lease))
    }
}

#[async_trait]
impl CloudResource for ManagedDatabase {
    fn tag(&self) -> &str {
        &self.tag
    }

    #[instrument(skip(self), fields(tag = %self.tag))]
    async fn start(&self, holder: &str, until: DateTime<Utc>) -> CloudResult<()> {
        let (instances, lease) = self.members().await?;
        if instances.is_empty() {
            debug!("Group has no members, nothing to start");
            return Ok(());
        }

        authorize(lease.as_ref(), &self.tag, holder, self.clock.now())?;

        let mut started = 0;
        for instance in instances.iter().filter(|i| i.status == DB_STOPPED) {
            self.client.start_db_instance(&instance.identifier).await?;
            started += 1;
        }

        let tags = Lease::new(holder, until).to_tags();
        for instance in &instances {
            self.client.add_tags(&instance.arn, &tags).await?;
        }

        info!(instances = instances.len(), started, "Started database group");
        Ok(())
    }

    #[instrument(skip(self), fields(tag = %self.tag))]
    async fn stop(&self, holder: &str) -> CloudResult<()> {
        let (instances, lease) = self.members().await?;
        if instances.is_empty() {
            debug!("Group has no members, nothing to stop");
            return Ok(());
        }

        authorize(lease.as_ref(), &self.tag, holder, self.clock.now())?;

        let mut stopped = 0;
        for instance in instances.iter().filter(|i| i.status == DB_AVAILABLE) {
            self.client.stop_db_instance(&instance.identifier).await?;
            stopped += 1;
        }

        for instance in &instances {
            self.client
                .remove_tags(&instance.arn, &[HOLDER_TAG, EXPIRY_TAG])
                .await?;
        }

        info!(instances = instances.len(), stopped, "Stopped database group");
        Ok(())
    }

    async fn status(&self) -> CloudResult<ResourceSummary> {
        let (instances, lease) = self.members().await?;
        let running = instances.iter().filter(|i| i.status == DB_AVAILABLE).count();

        Ok(ResourceSummary {
            available: instances.len() as u32,
            running: running as u32,
            lease,
        })
    }
}

/// Discovers database groups through the managed marker tag.
pub struct DatabaseDiscovery {
    client: Arc<dyn DatabaseApi>,
}

impl DatabaseDiscovery {
    pub fn new(client: Arc<dyn DatabaseApi>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Discovery for DatabaseDiscovery {
    async fn managed_groups(&self) -> CloudResult<BTreeSet<String>> {
        Ok(tagged_instances(self.client.as_ref())
            .await?
            .into_iter()
            .filter(|(_, tags)| tags.get(MANAGED_TAG).map(String::as_str) == Some(MANAGED_VALUE))
            .filter_map(|(_, mut tags)| tags.remove(MEMBERSHIP_TAG))
            .collect())
    }
}
