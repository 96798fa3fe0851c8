//! Booking: a reservation of one resource group for an absolute window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::meta::{Kind, Object};

pub type Booking = Object<BookingSpec>;

/// A notification channel attached to a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Channel discriminator, e.g. `email`.
    #[serde(rename = "type")]
    pub channel: String,

    pub recipient: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSpec {
    pub start_at: String,
    pub end_at: String,

    /// Tag of the Resource this booking reserves.
    pub resource_name: String,
    pub user_id: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notifications: Vec<Notification>,
}

impl Kind for BookingSpec {
    const KIND: &'static str = "Booking";
    type Status = BookingStatus;
}

/// Lifecycle phase. The ordering is the only legal direction of travel.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingPhase {
    #[default]
    Scheduled,
    InProgress,
    Finished,
}

impl BookingPhase {
    /// Phase of the window `[start, end)` at `now`.
    pub fn at(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if now >= end {
            Self::Finished
        } else if now >= start {
            Self::InProgress
        } else {
            Self::Scheduled
        }
    }

    /// Combine a recomputed phase with the stored one without ever going back.
    pub fn advance(self, observed: Self) -> Self {
        self.max(observed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

impl std::fmt::Display for BookingPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Scheduled => "SCHEDULED",
            Self::InProgress => "IN_PROGRESS",
            Self::Finished => "FINISHED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingStatus {
    #[serde(default)]
    pub status: BookingPhase,

    /// Sticky: once set, the pre-expiry notice is never sent again.
    #[serde(default)]
    pub notification_sent: bool,
}
