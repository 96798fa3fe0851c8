//! The operator's reconcilers.
//!
//! Each controller implements [`rbo_reconcile::Reconciler`] for one kind and
//! is driven by its own [`rbo_reconcile::ControllerWorker`]. Every pass reads
//! the object fresh, recomputes its decisions from absolute time, and asks
//! for a timed requeue or waits for the next change.

mod booking;
mod monitor;
mod resource;
mod scheduler;

use std::time::Duration;

use rbo_reconcile::{Action, ObjectKey};

use crate::api::{Kind, Object};
use crate::error::{ReconcileError, ReconcileResult};
use crate::store::Store;

pub use booking::{BookingConfig, BookingController};
pub use monitor::{MonitorConfig, MonitorController};
pub use resource::{ResourceConfig, ResourceController};
pub use scheduler::{booking_name, BookingSchedulerController, SchedulerConfig};

/// Fetch the object behind `key`, or `None` if it is gone.
async fn fetch<K: Kind, S: Store>(store: &S, key: &ObjectKey) -> ReconcileResult<Option<Object<K>>> {
    match store.get::<K>(key).await {
        Ok(object) => Ok(Some(object)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Map a failed pass onto the worker's next action.
fn retry(error: &ReconcileError, steady: Duration, backoff: Duration) -> Action {
    error
        .retry_after(steady, backoff)
        .map_or(Action::AwaitChange, Action::Requeue)
}
