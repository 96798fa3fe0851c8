//! Configuration for the operator.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::controllers::{BookingConfig, MonitorConfig, ResourceConfig, SchedulerConfig};
use crate::notify::SmtpConfig;

/// Operator configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Log level used when `RUST_LOG` is not set.
    pub log_level: String,

    /// Namespace for seeded objects that do not name one.
    pub namespace: String,

    /// Optional JSON manifest loaded at startup.
    pub seed_file: Option<PathBuf>,

    /// Booking requeue interval in seconds.
    pub booking_requeue_secs: u64,

    /// Resource steady-state requeue interval in seconds.
    pub resource_requeue_secs: u64,

    /// Resource retry delay after provider failures, in seconds.
    pub resource_backoff_secs: u64,

    /// Discovery polling interval in seconds.
    pub monitor_interval_secs: u64,

    pub smtp: SmtpConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let secs = |name: &str, default: u64| -> Result<u64> {
            let Some(raw) = lookup(name) else {
                return Ok(default);
            };
            let value: u64 = raw
                .trim()
                .parse()
                .with_context(|| format!("{name} must be a number of seconds, got '{raw}'"))?;
            if value == 0 {
                bail!("{name} must be greater than zero");
            }
            Ok(value)
        };

        let log_level = lookup("RBO_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let namespace = lookup("RBO_NAMESPACE")
            .filter(|ns| !ns.is_empty())
            .unwrap_or_else(|| "default".to_string());

        let seed_file = lookup("RBO_SEED_FILE")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            log_level,
            namespace,
            seed_file,
            booking_requeue_secs: secs("RBO_BOOKING_REQUEUE_SECS", 60)?,
            resource_requeue_secs: secs("RBO_RESOURCE_REQUEUE_SECS", 15)?,
            resource_backoff_secs: secs("RBO_RESOURCE_BACKOFF_SECS", 60)?,
            monitor_interval_secs: secs("RBO_MONITOR_INTERVAL_SECS", 120)?,
            smtp: SmtpConfig::from_lookup(&lookup),
        })
    }

    pub fn booking(&self) -> BookingConfig {
        BookingConfig {
            requeue: Duration::from_secs(self.booking_requeue_secs),
            ..BookingConfig::default()
        }
    }

    pub fn resource(&self) -> ResourceConfig {
        ResourceConfig {
            requeue: Duration::from_secs(self.resource_requeue_secs),
            backoff: Duration::from_secs(self.resource_backoff_secs),
        }
    }

    pub fn monitor(&self) -> MonitorConfig {
        MonitorConfig {
            interval: Duration::from_secs(self.monitor_interval_secs),
        }
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig::default()
    }
}
