//! Maps a Resource's type discriminator to a configured backend.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use super::compute::{ComputeApi, ComputeDiscovery, ComputeGroup};
use super::database::{DatabaseApi, DatabaseDiscovery, ManagedDatabase};
use super::{CloudError, CloudResource, CloudResult, Discovery};
use crate::clock::Clock;

/// Backend selected by a Resource's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    /// Instance fleet (`ec2`).
    Compute,
    /// Managed database instances (`rds`).
    ManagedDatabase,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compute => "ec2",
            Self::ManagedDatabase => "rds",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = CloudError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ec2" => Ok(Self::Compute),
            "rds" => Ok(Self::ManagedDatabase),
            other => Err(CloudError::UnknownType(other.to_string())),
        }
    }
}

/// A provider client, one variant per backend.
#[derive(Clone)]
pub enum ProviderClient {
    Compute(Arc<dyn ComputeApi>),
    Database(Arc<dyn DatabaseApi>),
}

impl ProviderClient {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Compute(_) => ProviderKind::Compute,
            Self::Database(_) => ProviderKind::ManagedDatabase,
        }
    }
}

/// Provider clients available to the controllers.
#[derive(Clone)]
pub struct ProviderRegistry {
    clients: HashMap<ProviderKind, ProviderClient>,
    clock: Arc<dyn Clock>,
}

impl ProviderRegistry {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clients: HashMap::new(),
            clock,
        }
    }

    pub fn with_compute(mut self, client: Arc<dyn ComputeApi>) -> Self {
        self.register(ProviderClient::Compute(client));
        self
    }

    pub fn with_database(mut self, client: Arc<dyn DatabaseApi>) -> Self {
        self.register(ProviderClient::Database(client));
        self
    }

    /// Register `client`, replacing any earlier client of the same kind.
    pub fn register(&mut self, client: ProviderClient) {
        self.clients.insert(client.kind(), client);
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    fn client(&self, provider: &str) -> CloudResult<&ProviderClient> {
        let kind: ProviderKind = provider.parse()?;
        self.clients.get(&kind).ok_or(CloudError::Unconfigured(kind))
    }

    /// Backend for the group tagged `tag` of type `provider`.
    pub fn resource(&self, provider: &str, tag: &str) -> CloudResult<Box<dyn CloudResource>> {
        let clock = Arc::clone(&self.clock);
        Ok(match self.client(provider)? {
            ProviderClient::Compute(api) => Box::new(ComputeGroup::new(Arc::clone(api), clock, tag)),
            ProviderClient::Database(api) => {
                Box::new(ManagedDatabase::new(Arc::clone(api), clock, tag))
            }
        })
    }

    /// Discovery for type `provider`.
    pub fn discovery(&self, provider: &str) -> CloudResult<Box<dyn Discovery>> {
        Ok(match self.client(provider)? {
            ProviderClient::Compute(api) => Box::new(ComputeDiscovery::new(Arc::clone(api))),
            ProviderClient::Database(api) => Box::new(DatabaseDiscovery::new(Arc::clone(api))),
        })
    }
}
