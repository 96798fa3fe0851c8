//! Cloud resource abstraction.
//!
//! A resource group is the set of provider instances sharing one membership
//! tag value. Every backend offers the same capability:
//!
//! - `start(holder, until)`: start all members and take the lease
//! - `stop(holder)`: stop all members and release the lease
//! - `status()`: count members and running members, and read the lease
//!
//! `status()` is advisory and never touches the lease. Backends receive their
//! provider client and clock explicitly through [`ProviderRegistry`], so tests
//! and tenants can each use their own credentials.

mod compute;
mod database;
mod error;
mod lease;
mod memory;
mod registry;

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use compute::{ComputeApi, ComputeDiscovery, ComputeGroup, ComputeInstance, InstanceState};
pub use database::{
    DatabaseApi, DatabaseDiscovery, DbInstance, ManagedDatabase, DB_AVAILABLE, DB_STOPPED,
};
pub use error::{CloudError, CloudResult};
pub use lease::{authorize, Lease, LeaseExpiry, EXPIRY_TAG, HOLDER_TAG};
pub use memory::{CallCounts, InMemoryCompute, InMemoryDatabase};
pub use registry::{ProviderClient, ProviderKind, ProviderRegistry};

/// Tag key whose value names the group an instance belongs to.
pub const MEMBERSHIP_TAG: &str = "resource-booking/application";

/// Tag key marking an instance for discovery.
pub const MANAGED_TAG: &str = "resource-booking/managed";

/// Value of [`MANAGED_TAG`] on managed instances.
pub const MANAGED_VALUE: &str = "true";

/// Provider view of one group.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceSummary {
    pub available: u32,
    pub running: u32,
    pub lease: Option<Lease>,
}

/// Start/stop/status over one provider resource group.
#[async_trait]
pub trait CloudResource: Send + Sync {
    /// Membership tag value of the group.
    fn tag(&self) -> &str;

    async fn start(&self, holder: &str, until: DateTime<Utc>) -> CloudResult<()>;

    async fn stop(&self, holder: &str) -> CloudResult<()>;

    async fn status(&self) -> CloudResult<ResourceSummary>;
}

/// Enumerates the groups a provider marks as managed.
#[async_trait]
pub trait Discovery: Send + Sync {
    /// Distinct membership tag values among managed instances.
    async fn managed_groups(&self) -> CloudResult<BTreeSet<String>>;
}
