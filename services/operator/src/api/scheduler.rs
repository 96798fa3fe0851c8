//! BookingScheduler: a recurring template that materializes Bookings.

use serde::{Deserialize, Serialize};

use super::booking::Notification;
use super::meta::{Kind, Object};

pub type BookingScheduler = Object<BookingSchedulerSpec>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSchedulerSpec {
    /// Standard five-field cron expression deciding when to fire.
    pub schedule: String,

    /// Booking length in minutes for bookings that start when fired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,

    /// Daily window start, `HH:MM` UTC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,

    /// Daily window end, `HH:MM` UTC.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,

    /// Fixed window start (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_at: Option<String>,

    /// Fixed window end (RFC 3339).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_at: Option<String>,

    pub resource_name: String,
    pub user_id: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notifications: Vec<Notification>,
}

impl Kind for BookingSchedulerSpec {
    const KIND: &'static str = "BookingScheduler";
    type Status = BookingSchedulerStatus;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSchedulerStatus {
    /// Next fire instant (RFC 3339). Empty until the first pass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}
