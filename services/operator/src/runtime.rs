//! Wires the controllers to the store and runs them until shutdown.

use std::sync::Arc;

use rbo_reconcile::{ControllerWorker, Reconciler, WorkerStats};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::api::{BookingSchedulerSpec, BookingSpec, Kind, ResourceMonitorSpec, ResourceSpec};
use crate::cloud::ProviderRegistry;
use crate::controllers::{
    BookingConfig, BookingController, BookingSchedulerController, MonitorConfig,
    MonitorController, ResourceConfig, ResourceController, SchedulerConfig,
};
use crate::notify::Dispatcher;
use crate::store::{Store, StoreResult};

/// Intervals for every controller.
#[derive(Debug, Clone, Default)]
pub struct ControllerSettings {
    pub booking: BookingConfig,
    pub resource: ResourceConfig,
    pub monitor: MonitorConfig,
    pub scheduler: SchedulerConfig,
}

/// A running controller.
pub struct ControllerHandle {
    pub name: &'static str,
    pub handle: JoinHandle<WorkerStats>,
}

/// The four controllers sharing one store, provider registry and dispatcher.
pub struct Operator<S: Store> {
    store: Arc<S>,
    registry: ProviderRegistry,
    dispatcher: Dispatcher,
    settings: ControllerSettings,
}

impl<S: Store> Operator<S> {
    pub fn new(
        store: Arc<S>,
        registry: ProviderRegistry,
        dispatcher: Dispatcher,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            store,
            registry,
            dispatcher,
            settings,
        }
    }

    /// Spawn one worker per controller.
    ///
    /// Each worker subscribes to its kind before listing it, so objects
    /// created in between are seen at least once.
    pub async fn spawn(self, shutdown: watch::Receiver<bool>) -> StoreResult<Vec<ControllerHandle>> {
        let clock = self.registry.clock();
        let settings = self.settings;

        let handles = vec![
            spawn_worker::<BookingSpec, _, _>(
                &self.store,
                BookingController::new(
                    Arc::clone(&self.store),
                    Arc::clone(&clock),
                    self.dispatcher,
                    settings.booking,
                ),
                shutdown.clone(),
            )
            .await?,
            spawn_worker::<ResourceSpec, _, _>(
                &self.store,
                ResourceController::new(
                    Arc::clone(&self.store),
                    self.registry.clone(),
                    settings.resource,
                ),
                shutdown.clone(),
            )
            .await?,
            spawn_worker::<ResourceMonitorSpec, _, _>(
                &self.store,
                MonitorController::new(
                    Arc::clone(&self.store),
                    self.registry.clone(),
                    settings.monitor,
                ),
                shutdown.clone(),
            )
            .await?,
            spawn_worker::<BookingSchedulerSpec, _, _>(
                &self.store,
                BookingSchedulerController::new(
                    Arc::clone(&self.store),
                    clock,
                    settings.scheduler,
                ),
                shutdown,
            )
            .await?,
        ];

        info!(controllers = handles.len(), "Controllers started");
        Ok(handles)
    }
}

async fn spawn_worker<K, S, R>(
    store: &Arc<S>,
    reconciler: R,
    shutdown: watch::Receiver<bool>,
) -> StoreResult<ControllerHandle>
where
    K: Kind,
    S: Store,
    R: Reconciler,
{
    let name = reconciler.name();
    let events = store.watch::<K>().await;
    let initial = store
        .list::<K>(None)
        .await?
        .into_iter()
        .map(|object| object.key())
        .collect();

    let handle = tokio::spawn(ControllerWorker::new(reconciler).run(initial, events, shutdown));
    Ok(ControllerHandle { name, handle })
}
