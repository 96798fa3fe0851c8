//! Resource reconciler.
//!
//! Observes the provider group behind a Resource, records what it sees, and
//! starts or stops the group to match the booking fields. The Resource's uid
//! is its lease holder identity, so a group started through one Resource
//! object cannot be stopped through another while the lease runs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rbo_reconcile::{Action, ObjectKey, Reconciler};
use tracing::{debug, info, instrument, warn};

use super::{fetch, retry};
use crate::api::{parse_timestamp, Resource, ResourcePhase, ResourceSpec, ResourceStatus};
use crate::cloud::{CloudResource, ProviderRegistry, ResourceSummary};
use crate::clock::Clock;
use crate::error::{ReconcileError, ReconcileResult};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct ResourceConfig {
    /// Requeue interval after a successful pass.
    pub requeue: Duration,

    /// Retry delay after a provider failure.
    pub backoff: Duration,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            requeue: Duration::from_secs(15),
            backoff: Duration::from_secs(60),
        }
    }
}

/// What the booking fields ask for at a given instant.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Intent {
    Booked(DateTime<Utc>),
    Free,
    /// The fields cannot be read; leave the group as it is.
    Unknown,
}

impl Intent {
    fn of(spec: &ResourceSpec, now: DateTime<Utc>) -> Self {
        let raw = match (&spec.booked_by, &spec.booked_until) {
            (None, _) => return Self::Free,
            (Some(_), None) => return Self::Unknown,
            (Some(_), Some(raw)) => raw,
        };

        match parse_timestamp(raw) {
            Ok(until) if until > now => Self::Booked(until),
            Ok(_) => Self::Free,
            Err(e) => {
                warn!(booked_until = %raw, error = %e, "Unreadable booked_until");
                Self::Unknown
            }
        }
    }
}

pub struct ResourceController<S: Store> {
    store: Arc<S>,
    registry: ProviderRegistry,
    clock: Arc<dyn Clock>,
    config: ResourceConfig,
}

impl<S: Store> ResourceController<S> {
    pub fn new(store: Arc<S>, registry: ProviderRegistry, config: ResourceConfig) -> Self {
        Self {
            store,
            clock: registry.clock(),
            registry,
            config,
        }
    }

    fn holder(resource: &Resource) -> String {
        resource
            .meta
            .uid
            .as_ref()
            .map_or_else(|| resource.key().to_string(), ToString::to_string)
    }

    /// Start or stop the group if the booking fields disagree with it.
    ///
    /// Returns whether a provider call was made.
    async fn converge(
        &self,
        backend: &dyn CloudResource,
        holder: &str,
        intent: &Intent,
        phase: ResourcePhase,
    ) -> ReconcileResult<bool> {
        match intent {
            Intent::Booked(until) if phase != ResourcePhase::Running => {
                backend.start(holder, *until).await?;
                Ok(true)
            }
            Intent::Free if phase != ResourcePhase::Stopped => {
                backend.stop(holder).await?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record(&self, resource: &mut Resource, summary: &ResourceSummary) -> ReconcileResult<()> {
        let status = ResourceStatus {
            instances: summary.available,
            running: summary.running,
            status: ResourcePhase::derive(summary.available, summary.running),
            locked_by: summary.lease.as_ref().map(|l| l.holder.clone()),
            locked_until: summary.lease.as_ref().and_then(|l| l.until()),
        };

        if status != resource.status {
            debug!(status = %status.status, running = status.running, "Resource status changed");
            resource.status = status;
            self.store.update_status(resource).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<S: Store> Reconciler for ResourceController<S> {
    type Error = ReconcileError;

    fn name(&self) -> &'static str {
        "resource"
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn reconcile(&self, key: &ObjectKey) -> ReconcileResult<Action> {
        let Some(mut resource) = fetch::<ResourceSpec, _>(self.store.as_ref(), key).await? else {
            debug!("Resource not found, ignoring");
            return Ok(Action::await_change());
        };

        let backend = self
            .registry
            .resource(&resource.spec.provider, &resource.spec.tag)?;
        let summary = backend.status().await?;
        let phase = ResourcePhase::derive(summary.available, summary.running);
        let intent = Intent::of(&resource.spec, self.clock.now());
        let holder = Self::holder(&resource);

        match self.converge(backend.as_ref(), &holder, &intent, phase).await {
            Ok(false) => self.record(&mut resource, &summary).await?,
            Ok(true) => {
                info!(tag = %resource.spec.tag, ?intent, from = %phase, "Resource converged");
                let summary = backend.status().await?;
                self.record(&mut resource, &summary).await?;
            }
            Err(e @ ReconcileError::Locked { .. }) => {
                // The observed state is still worth recording.
                self.record(&mut resource, &summary).await?;
                return Err(e);
            }
            Err(e) => return Err(e),
        }

        Ok(Action::requeue(self.config.requeue))
    }

    fn error_policy(&self, _key: &ObjectKey, error: &ReconcileError) -> Action {
        retry(error, self.config.requeue, self.config.backoff)
    }
}
