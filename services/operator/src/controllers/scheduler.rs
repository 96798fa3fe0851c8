//! Booking scheduler reconciler.
//!
//! Fires on a cron schedule and materializes one Booking per firing from the
//! scheduler's template. Booking names are derived from the template and the
//! booking start, so a repeated firing collides on name in the store instead
//! of creating a duplicate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use croner::Cron;
use rbo_reconcile::{Action, ObjectKey, Reconciler};
use tracing::{debug, info, instrument, warn};

use super::{fetch, retry};
use crate::api::{
    format_timestamp, parse_timestamp, Booking, BookingScheduler, BookingSchedulerSpec,
    BookingSpec, ObjectMeta,
};
use crate::clock::Clock;
use crate::error::{ReconcileError, ReconcileResult};
use crate::store::Store;

/// Booking length when the template names no duration, in minutes.
const DEFAULT_DURATION_MINUTES: u32 = 60;

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Retry delay after a failed pass.
    pub backoff: Duration,

    /// Lower bound on the requeue delay.
    pub min_requeue: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(60),
            min_requeue: Duration::from_secs(1),
        }
    }
}

/// Parse a standard five-field cron expression.
fn parse_schedule(expr: &str) -> ReconcileResult<Cron> {
    Cron::new(expr)
        .parse()
        .map_err(|e| ReconcileError::Configuration(format!("invalid schedule '{expr}': {e}")))
}

fn parse_time_of_day(field: &'static str, value: &str) -> ReconcileResult<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M").map_err(|e| {
        ReconcileError::Configuration(format!("invalid {field} '{value}', expected HH:MM: {e}"))
    })
}

fn parse_fixed(field: &'static str, value: &str) -> ReconcileResult<DateTime<Utc>> {
    parse_timestamp(value)
        .map_err(|e| ReconcileError::Configuration(format!("invalid {field} '{value}': {e}")))
}

/// Booking window the template yields when fired at `now`.
///
/// - daily window: today's `start_time..end_time`, wrapping past midnight
///   when the end is not after the start; a wrapped window that began
///   yesterday and is still open is used instead of tonight's
/// - fixed window: `start_at..end_at` as given
/// - otherwise: `now..now + duration`
fn window(
    spec: &BookingSchedulerSpec,
    now: DateTime<Utc>,
) -> ReconcileResult<(DateTime<Utc>, DateTime<Utc>)> {
    if let (Some(start_time), Some(end_time)) = (&spec.start_time, &spec.end_time) {
        let today = now.date_naive();
        let start = today
            .and_time(parse_time_of_day("start_time", start_time)?)
            .and_utc();
        let mut end = today
            .and_time(parse_time_of_day("end_time", end_time)?)
            .and_utc();
        if end <= start {
            let day = chrono::Duration::days(1);
            end += day;
            if now < end - day {
                return Ok((start - day, end - day));
            }
        }
        return Ok((start, end));
    }

    if let (Some(start_at), Some(end_at)) = (&spec.start_at, &spec.end_at) {
        return Ok((parse_fixed("start_at", start_at)?, parse_fixed("end_at", end_at)?));
    }

    let minutes = spec.duration.unwrap_or(DEFAULT_DURATION_MINUTES);
    Ok((now, now + chrono::Duration::minutes(i64::from(minutes))))
}

/// Deterministic name of the booking starting at `start`.
pub fn booking_name(user_id: &str, resource_name: &str, start: DateTime<Utc>) -> String {
    format!("{user_id}-{resource_name}-{}", start.timestamp())
}

/// Build the booking `scheduler` materializes when fired at `now`.
fn materialize(scheduler: &BookingScheduler, now: DateTime<Utc>) -> ReconcileResult<Booking> {
    let spec = &scheduler.spec;
    let (start, end) = window(spec, now)?;

    Ok(Booking::new(
        ObjectMeta::new(
            scheduler.meta.namespace.clone(),
            booking_name(&spec.user_id, &spec.resource_name, start),
        ),
        BookingSpec {
            start_at: format_timestamp(start),
            end_at: format_timestamp(end),
            resource_name: spec.resource_name.clone(),
            user_id: spec.user_id.clone(),
            notifications: spec.notifications.clone(),
        },
    ))
}

pub struct BookingSchedulerController<S: Store> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: SchedulerConfig,
}

impl<S: Store> BookingSchedulerController<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: SchedulerConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Whether the recorded next firing has arrived.
    fn is_due(next: Option<&str>, now: DateTime<Utc>) -> bool {
        let Some(raw) = next else {
            return true;
        };

        match parse_timestamp(raw) {
            Ok(next) => next <= now,
            Err(e) => {
                warn!(next = %raw, error = %e, "Unreadable status.next, firing now");
                true
            }
        }
    }

    async fn create(&self, booking: Booking) -> ReconcileResult<()> {
        let key = booking.key();
        match self.store.create(booking).await {
            Ok(_) => {
                info!(booking = %key, "Created scheduled booking");
                Ok(())
            }
            Err(e) if e.is_already_exists() => {
                debug!(booking = %key, "Booking already materialized");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl<S: Store> Reconciler for BookingSchedulerController<S> {
    type Error = ReconcileError;

    fn name(&self) -> &'static str {
        "booking-scheduler"
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn reconcile(&self, key: &ObjectKey) -> ReconcileResult<Action> {
        let Some(mut scheduler) =
            fetch::<BookingSchedulerSpec, _>(self.store.as_ref(), key).await?
        else {
            debug!("Booking scheduler not found, ignoring");
            return Ok(Action::await_change());
        };

        let now = self.clock.now();
        let next = parse_schedule(&scheduler.spec.schedule)?
            .find_next_occurrence(&now, false)
            .map_err(|e| ReconcileError::Configuration(format!("schedule never fires: {e}")))?;

        if Self::is_due(scheduler.status.next.as_deref(), now) {
            self.create(materialize(&scheduler, now)?).await?;
        }

        let next_at = format_timestamp(next);
        if scheduler.status.next.as_deref() != Some(next_at.as_str()) {
            debug!(next = %next_at, "Next firing");
            scheduler.status.next = Some(next_at);
            self.store.update_status(&scheduler).await?;
        }

        let wait = (next - now).to_std().unwrap_or_default();
        Ok(Action::requeue(wait.max(self.config.min_requeue)))
    }

    fn error_policy(&self, _key: &ObjectKey, error: &ReconcileError) -> Action {
        retry(error, self.config.backoff, self.config.backoff)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use rstest::rstest;

    use super::*;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 7, h, m, 0).unwrap()
    }

    fn template() -> BookingSchedulerSpec {
        BookingSchedulerSpec {
            schedule: "0 9 * * *".into(),
            resource_name: "analytics".into(),
            user_id: "alice".into(),
            ..Default::default()
        }
    }

    #[rstest]
    #[case("09:00", "17:30", at(9, 0), at(17, 30))]
    #[case("22:00", "02:00", at(22, 0), at(2, 0) + chrono::Duration::days(1))]
    #[case("08:00", "08:00", at(8, 0), at(8, 0) + chrono::Duration::days(1))]
    fn test_daily_window(
        #[case] start_time: &str,
        #[case] end_time: &str,
        #[case] start: DateTime<Utc>,
        #[case] end: DateTime<Utc>,
    ) {
        let spec = BookingSchedulerSpec {
            start_time: Some(start_time.into()),
            end_time: Some(end_time.into()),
            ..template()
        };
        assert_eq!(window(&spec, at(12, 0)).unwrap(), (start, end));
    }

    #[rstest]
    #[case(at(1, 0), at(22, 0) - chrono::Duration::days(1), at(2, 0))]
    #[case(at(2, 0), at(22, 0), at(2, 0) + chrono::Duration::days(1))]
    #[case(at(23, 0), at(22, 0), at(2, 0) + chrono::Duration::days(1))]
    fn test_overnight_window_after_midnight(
        #[case] now: DateTime<Utc>,
        #[case] start: DateTime<Utc>,
        #[case] end: DateTime<Utc>,
    ) {
        let spec = BookingSchedulerSpec {
            start_time: Some("22:00".into()),
            end_time: Some("02:00".into()),
            ..template()
        };
        assert_eq!(window(&spec, now).unwrap(), (start, end));
    }

    #[test]
    fn test_daily_window_rejects_bad_time() {
        let spec = BookingSchedulerSpec {
            start_time: Some("9am".into()),
            end_time: Some("17:00".into()),
            ..template()
        };
        assert!(matches!(
            window(&spec, at(12, 0)),
            Err(ReconcileError::Configuration(_))
        ));
    }

    #[test]
    fn test_fixed_window_and_duration_fallback() {
        let fixed = BookingSchedulerSpec {
            start_at: Some("2026-05-01T10:00:00Z".into()),
            end_at: Some("2026-05-01T11:00:00Z".into()),
            ..template()
        };
        let (start, end) = window(&fixed, at(12, 0)).unwrap();
        assert_eq!(format_timestamp(start), "2026-05-01T10:00:00Z");
        assert_eq!(format_timestamp(end), "2026-05-01T11:00:00Z");

        let cron = BookingSchedulerSpec {
            duration: Some(90),
            ..template()
        };
        assert_eq!(
            window(&cron, at(12, 0)).unwrap(),
            (at(12, 0), at(13, 30))
        );
        assert_eq!(
            window(&template(), at(12, 0)).unwrap(),
            (at(12, 0), at(13, 0))
        );
    }

    #[test]
    fn test_booking_name_is_deterministic() {
        let scheduler = BookingScheduler::new(ObjectMeta::new("team", "nightly"), template());
        let booking = materialize(&scheduler, at(9, 0)).unwrap();

        assert_eq!(booking.meta.name, format!("alice-analytics-{}", at(9, 0).timestamp()));
        assert_eq!(booking.meta.namespace, "team");
        assert_eq!(booking.spec.end_at, "2026-04-07T10:00:00Z");
    }

    #[rstest]
    #[case(None, true)]
    #[case(Some("2026-04-07T11:59:59Z"), true)]
    #[case(Some("2026-04-07T12:00:00Z"), true)]
    #[case(Some("2026-04-07T12:00:01Z"), false)]
    #[case(Some("garbage"), true)]
    fn test_is_due(#[case] next: Option<&str>, #[case] expected: bool) {
        assert_eq!(
            BookingSchedulerController::<crate::store::MemoryStore>::is_due(next, at(12, 0)),
            expected
        );
    }

    #[test]
    fn test_invalid_schedule_is_configuration_error() {
        assert!(matches!(
            parse_schedule("every tuesday"),
            Err(ReconcileError::Configuration(_))
        ));
        assert!(parse_schedule("*/5 * * * *").is_ok());
    }
}
