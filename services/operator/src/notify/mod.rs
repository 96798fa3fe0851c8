//! Booking notifications.
//!
//! A [`NotificationChannel`] turns a booking and one configured target into a
//! ready-to-send [`Notifier`]. The [`Dispatcher`] picks the channel by the
//! target's `type` discriminator.

mod email;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::api::{Booking, Notification};

pub use email::{EmailChannel, EmailMessage, LogTransport, MailTransport, SmtpConfig};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("invalid recipient '{0}'")]
    InvalidRecipient(String),

    #[error("transport error: {0}")]
    Transport(String),

    /// Some targets of a booking could not be notified.
    #[error("{failed} of {attempted} notifications failed: {first}")]
    Partial {
        failed: usize,
        attempted: usize,
        first: Box<NotifyError>,
    },
}

/// A prepared notification.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self) -> Result<(), NotifyError>;
}

/// Builds notifiers for one channel type.
pub trait NotificationChannel: Send + Sync {
    fn prepare(&self, booking: &Booking, target: &Notification) -> Box<dyn Notifier>;
}

/// Routes a booking's notification targets to their channels.
#[derive(Clone, Default)]
pub struct Dispatcher {
    channels: HashMap<String, Arc<dyn NotificationChannel>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(
        mut self,
        channel_type: impl Into<String>,
        channel: Arc<dyn NotificationChannel>,
    ) -> Self {
        self.channels.insert(channel_type.into(), channel);
        self
    }

    /// Send every notification configured on `booking`.
    ///
    /// Targets of an unknown type are skipped. Returns the number of
    /// notifications sent, or an error if any known target failed.
    pub async fn dispatch(&self, booking: &Booking) -> Result<usize, NotifyError> {
        let mut attempted = 0;
        let mut errors = Vec::new();

        for target in &booking.spec.notifications {
            let Some(channel) = self.channels.get(&target.channel) else {
                warn!(
                    booking = %booking.meta.name,
                    channel = %target.channel,
                    "Unknown notification type, skipping"
                );
                continue;
            };

            attempted += 1;
            match channel.prepare(booking, target).send().await {
                Ok(()) => debug!(booking = %booking.meta.name, channel = %target.channel, "Notification sent"),
                Err(e) => errors.push(e),
            }
        }

        if errors.is_empty() {
            return Ok(attempted);
        }

        let failed = errors.len();
        let first = errors.swap_remove(0);
        Err(NotifyError::Partial {
            failed,
            attempted,
            first: Box::new(first),
        })
    }
}
