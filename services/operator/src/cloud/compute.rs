//! Compute-group backend (instance fleets grouped by tag).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::lease::{authorize, Lease, EXPIRY_TAG, HOLDER_TAG};
use super::{
    CloudResource, CloudResult, Discovery, ResourceSummary, MANAGED_TAG, MANAGED_VALUE,
    MEMBERSHIP_TAG,
};
use crate::clock::Clock;

/// Instance lifecycle state as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeInstance {
    pub id: String,
    pub state: InstanceState,
    pub tags: BTreeMap<String, String>,
}

/// Compute provider client.
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Instances carrying tag `key=value`.
    async fn describe_instances(&self, key: &str, value: &str) -> CloudResult<Vec<ComputeInstance>>;

    /// Current state of the given instances.
    async fn describe_instance_status(&self, ids: &[String])
        -> CloudResult<Vec<(String, InstanceState)>>;

    async fn start_instances(&self, ids: &[String]) -> CloudResult<()>;

    async fn stop_instances(&self, ids: &[String]) -> CloudResult<()>;

    async fn create_tags(&self, ids: &[String], tags: &[(String, String)]) -> CloudResult<()>;

    async fn delete_tags(&self, ids: &[String], keys: &[&str]) -> CloudResult<()>;
}

struct Members {
    ids: Vec<String>,
    lease: Option<Lease>,
}

/// A compute group addressed by its membership tag.
pub struct ComputeGroup {
    client: Arc<dyn ComputeApi>,
    clock: Arc<dyn Clock>,
    tag: String,
}

impl ComputeGroup {
    pub fn new(client: Arc<dyn ComputeApi>, clock: Arc<dyn Clock>, tag: impl Into<String>) -> Self {
        Self {
            client,
            clock,
            tag: tag.into(),
        }
    }

    async fn members(&self) -> CloudResult<Members> {
        let instances = self.client.describe_instances(MEMBERSHIP_TAG, &self.tag).await?;
        let lease = Lease::from_members(instances.iter().map(|i| &i.tags));
        let ids = instances.into_iter().map(|i| i.id).collect();
        Ok(Members { ids, lease })
    }
}

#[async_trait]
impl CloudResource for ComputeGroup {
    fn tag(&self) -> &str {
        &self.tag
    }

    #[instrument(skip(self), fields(tag = %self.tag))]
    async fn start(&self, holder: &str, until: DateTime<Utc>) -> CloudResult<()> {
        let members = self.members().await?;
        if members.ids.is_empty() {
            debug!("Group has no members, nothing to start");
            return Ok(());
        }

        authorize(members.lease.as_ref(), &self.tag, holder, self.clock.now())?;

        self.client.start_instances(&members.ids).await?;
        self.client
            .create_tags(&members.ids, &Lease::new(holder, until).to_tags())
            .await?;

        info!(instances = members.ids.len(), "Started compute group");
        Ok(())
    }

    #[instrument(skip(self), fields(tag = %self.tag))]
    async fn stop(&self, holder: &str) -> CloudResult<()> {
        let members = self.members().await?;
        if members.ids.is_empty() {
            debug!("Group has no members, nothing to stop");
            return Ok(());
        }

        authorize(members.lease.as_ref(), &self.tag, holder, self.clock.now())?;

        self.client.stop_instances(&members.ids).await?;
        self.client
            .delete_tags(&members.ids, &[HOLDER_TAG, EXPIRY_TAG])
            .await?;

        info!(instances = members.ids.len(), "Stopped compute group");
        Ok(())
    }

    async fn status(&self) -> CloudResult<ResourceSummary> {
        let members = self.members().await?;

        // An empty id list would make the provider describe every instance.
        if members.ids.is_empty() {
            return Ok(ResourceSummary::default());
        }

        let statuses = self.client.describe_instance_status(&members.ids).await?;
        let running = statuses
            .iter()
            .filter(|(_, state)| *state == InstanceState::Running)
            .count();

        Ok(ResourceSummary {
            available: statuses.len() as u32,
            running: running as u32,
            lease: members.lease,
        })
    }
}

/// Discovers compute groups through the managed marker tag.
pub struct ComputeDiscovery {
    client: Arc<dyn ComputeApi>,
}

impl ComputeDiscovery {
    pub fn new(client: Arc<dyn ComputeApi>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Discovery for ComputeDiscovery {
    async fn managed_groups(&self) -> CloudResult<BTreeSet<String>> {
        let instances = self
            .client
            .describe_instances(MANAGED_TAG, MANAGED_VALUE)
            .await?;

        Ok(instances
            .into_iter()
            .filter_map(|mut i| i.tags.remove(MEMBERSHIP_TAG))
            .collect())
    }
}
