//! Resource monitor (discovery) reconciler.
//!
//! Diffs the groups a provider marks as managed against the stored Resources
//! and creates a Resource for every group the store does not know. Stored
//! Resources whose group disappeared are reported but kept.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rbo_reconcile::{Action, ObjectKey, Reconciler, TagDiff};
use tracing::{debug, info, instrument, warn};

use super::{fetch, retry};
use crate::api::{format_timestamp, ObjectMeta, Resource, ResourceMonitorSpec, ResourceSpec};
use crate::cloud::ProviderRegistry;
use crate::clock::Clock;
use crate::error::{ReconcileError, ReconcileResult};
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Polling interval between discovery passes.
    pub interval: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(120),
        }
    }
}

pub struct MonitorController<S: Store> {
    store: Arc<S>,
    registry: ProviderRegistry,
    clock: Arc<dyn Clock>,
    config: MonitorConfig,
}

impl<S: Store> MonitorController<S> {
    pub fn new(store: Arc<S>, registry: ProviderRegistry, config: MonitorConfig) -> Self {
        Self {
            store,
            clock: registry.clock(),
            registry,
            config,
        }
    }
}

#[async_trait]
impl<S: Store> Reconciler for MonitorController<S> {
    type Error = ReconcileError;

    fn name(&self) -> &'static str {
        "resource-monitor"
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn reconcile(&self, key: &ObjectKey) -> ReconcileResult<Action> {
        let Some(mut monitor) = fetch::<ResourceMonitorSpec, _>(self.store.as_ref(), key).await?
        else {
            debug!("Resource monitor not found, ignoring");
            return Ok(Action::await_change());
        };

        let provider = monitor.spec.provider.clone();
        let observed = self.registry.discovery(&provider)?.managed_groups().await?;
        let stored = self
            .store
            .list::<ResourceSpec>(None)
            .await?
            .into_iter()
            .map(|r| r.spec.tag);
        let diff = TagDiff::between(observed.iter().cloned(), stored);

        let mut created = 0;
        for tag in &diff.only_observed {
            let resource = Resource::new(
                ObjectMeta::new(monitor.meta.namespace.clone(), tag.clone()),
                ResourceSpec::new(tag.clone(), provider.clone()),
            );

            match self.store.create(resource).await {
                Ok(_) => {
                    info!(tag = %tag, provider = %provider, "Discovered resource");
                    created += 1;
                }
                Err(e) if e.is_already_exists() => {
                    debug!(tag = %tag, "Resource created concurrently, skipping");
                }
                Err(e) => warn!(tag = %tag, error = %e, "Failed to create discovered resource"),
            }
        }

        if !diff.only_stored.is_empty() {
            debug!(
                missing = ?diff.only_stored,
                "Stored resources not reported by provider"
            );
        }

        info!(
            provider = %provider,
            observed = observed.len(),
            created,
            "Discovery pass complete"
        );

        monitor.status.last_scanned_at = Some(format_timestamp(self.clock.now()));
        monitor.status.discovered = observed.len() as u32;
        self.store.update_status(&monitor).await?;

        Ok(Action::requeue(self.config.interval))
    }

    fn error_policy(&self, _key: &ObjectKey, error: &ReconcileError) -> Action {
        retry(error, self.config.interval, self.config.interval)
    }
}
