//! Booking reconciler.
//!
//! Drives a booking through `SCHEDULED -> IN_PROGRESS -> FINISHED` from its
//! absolute window and propagates the reservation onto the target Resource:
//!
//! - `IN_PROGRESS`: `booked_by = user_id`, `booked_until = end_at`
//! - `FINISHED`: both fields cleared, if this booking still owns them
//!
//! Ownership is recorded on the Resource under [`BOOKING_LABEL`], so a booking
//! whose window was edited after the claim still releases what it booked.
//!
//! Close to the end of the window the configured notifications are sent once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rbo_reconcile::{Action, ObjectKey, Reconciler};
use tracing::{debug, info, instrument, warn};

use super::{fetch, retry};
use crate::api::{
    format_timestamp, parse_timestamp, Booking, BookingPhase, BookingSpec, Resource, ResourceSpec,
    BOOKING_LABEL,
};
use crate::clock::Clock;
use crate::error::{ReconcileError, ReconcileResult};
use crate::notify::Dispatcher;
use crate::store::Store;

#[derive(Debug, Clone)]
pub struct BookingConfig {
    /// Requeue interval while the booking is not finished.
    pub requeue: Duration,

    /// Notifications go out once the remaining time drops below this.
    pub lookahead: chrono::Duration,

    /// Retry delay after a failed pass.
    pub backoff: Duration,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            requeue: Duration::from_secs(60),
            lookahead: chrono::Duration::minutes(20),
            backoff: Duration::from_secs(60),
        }
    }
}

pub struct BookingController<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    dispatcher: Dispatcher,
    config: BookingConfig,
}

impl<S: Store> BookingController<S> {
    pub fn new(
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        dispatcher: Dispatcher,
        config: BookingConfig,
    ) -> Self {
        Self {
            store,
            clock,
            dispatcher,
            config,
        }
    }

    fn window(spec: &BookingSpec) -> ReconcileResult<(DateTime<Utc>, DateTime<Utc>)> {
        let start = parse_timestamp(&spec.start_at)
            .map_err(|e| ReconcileError::parse("start_at", &spec.start_at, e))?;
        let end = parse_timestamp(&spec.end_at)
            .map_err(|e| ReconcileError::parse("end_at", &spec.end_at, e))?;
        Ok((start, end))
    }

    /// Point every Resource tagged `resource_name` at this booking.
    async fn claim(&self, booking: &Booking, end: DateTime<Utc>) -> ReconcileResult<()> {
        let until = format_timestamp(end);
        let resources = self.resources(booking).await?;
        if resources.is_empty() {
            warn!(booking = %booking.meta.name, resource = %booking.spec.resource_name, "Target resource not found");
        }

        let owner = booking.key().to_string();
        for mut resource in resources {
            if resource.spec.booked_by.as_deref() == Some(booking.spec.user_id.as_str())
                && resource.spec.booked_until.as_deref() == Some(until.as_str())
                && resource.meta.labels.get(BOOKING_LABEL) == Some(&owner)
            {
                continue;
            }

            if let Some(previous) = &resource.spec.booked_by {
                if previous != &booking.spec.user_id {
                    warn!(
                        resource = %resource.meta.name,
                        previous = %previous,
                        user = %booking.spec.user_id,
                        "Resource booked by another user, overwriting"
                    );
                }
            }

            resource.spec.booked_by = Some(booking.spec.user_id.clone());
            resource.spec.booked_until = Some(until.clone());
            resource.meta.labels.insert(BOOKING_LABEL.to_string(), owner.clone());
            self.store.update(&resource).await?;
            info!(resource = %resource.meta.name, until = %until, "Resource booked");
        }

        Ok(())
    }

    /// Clear the booking fields this booking wrote.
    ///
    /// A Resource labelled with another booking is left alone. Without a
    /// label, the fields must still match this booking's user and end.
    async fn release(&self, booking: &Booking, end: DateTime<Utc>) -> ReconcileResult<()> {
        let until = format_timestamp(end);
        let owner = booking.key().to_string();

        for mut resource in self.resources(booking).await? {
            let owned = match resource.meta.labels.get(BOOKING_LABEL) {
                Some(label) => label == &owner,
                None => {
                    resource.spec.booked_by.as_deref() == Some(booking.spec.user_id.as_str())
                        && resource.spec.booked_until.as_deref() == Some(until.as_str())
                }
            };
            if !owned {
                continue;
            }

            resource.spec.booked_by = None;
            resource.spec.booked_until = None;
            resource.meta.labels.remove(BOOKING_LABEL);
            self.store.update(&resource).await?;
            info!(resource = %resource.meta.name, "Resource released");
        }

        Ok(())
    }

    /// Resources carrying the booked tag, in any namespace.
    async fn resources(&self, booking: &Booking) -> ReconcileResult<Vec<Resource>> {
        Ok(self
            .store
            .list_by_field::<ResourceSpec>(None, "tag", &booking.spec.resource_name)
            .await?)
    }

    fn notice_due(&self, booking: &Booking, phase: BookingPhase, end: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        phase == BookingPhase::InProgress
            && !booking.status.notification_sent
            && !booking.spec.notifications.is_empty()
            && end - now < self.config.lookahead
    }
}

#[async_trait]
impl<S: Store> Reconciler for BookingController<S> {
    type Error = ReconcileError;

    fn name(&self) -> &'static str {
        "booking"
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn reconcile(&self, key: &ObjectKey) -> ReconcileResult<Action> {
        let Some(mut booking) = fetch::<BookingSpec, _>(self.store.as_ref(), key).await? else {
            debug!("Booking not found, ignoring");
            return Ok(Action::await_change());
        };

        let (start, end) = match Self::window(&booking.spec) {
            Ok(window) => window,
            Err(e) => {
                // Leave the booking and its resource as they are.
                warn!(error = %e, "Booking has an unreadable window");
                return Ok(Action::requeue(self.config.requeue));
            }
        };

        let now = self.clock.now();
        let phase = booking.status.status.advance(BookingPhase::at(start, end, now));

        match phase {
            BookingPhase::Scheduled => {}
            BookingPhase::InProgress => self.claim(&booking, end).await?,
            BookingPhase::Finished => self.release(&booking, end).await?,
        }

        let mut status = booking.status.clone();
        status.status = phase;

        if self.notice_due(&booking, phase, end, now) {
            match self.dispatcher.dispatch(&booking).await {
                Ok(sent) => {
                    info!(sent, "Expiry notice sent");
                    status.notification_sent = true;
                }
                Err(e) => warn!(error = %e, "Expiry notice failed, retrying next pass"),
            }
        }

        if status != booking.status {
            debug!(from = %booking.status.status, to = %status.status, "Booking status changed");
            booking.status = status;
            self.store.update_status(&booking).await?;
        }

        if phase.is_terminal() {
            Ok(Action::await_change())
        } else {
            Ok(Action::requeue(self.config.requeue))
        }
    }

    fn error_policy(&self, _key: &ObjectKey, error: &ReconcileError) -> Action {
        retry(error, self.config.requeue, self.config.backoff)
    }
}
