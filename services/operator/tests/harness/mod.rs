//! Shared fixtures for operator integration tests.
//!
//! Every fixture runs against the in-memory store, the fake providers and a
//! manual clock, so tests drive reconciliation passes by hand.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rbo_operator::api::{
    format_timestamp, Booking, BookingSpec, Notification, Object, ObjectMeta, Resource,
    ResourceSpec,
};
use rbo_operator::clock::{Clock, ManualClock};
use rbo_operator::cloud::{InMemoryCompute, InMemoryDatabase, ProviderRegistry};
use rbo_operator::controllers::{
    BookingConfig, BookingController, BookingSchedulerController, MonitorConfig,
    MonitorController, ResourceConfig, ResourceController, SchedulerConfig,
};
use rbo_operator::notify::{
    Dispatcher, EmailChannel, EmailMessage, MailTransport, NotifyError, SmtpConfig,
};
use rbo_operator::store::{MemoryStore, Store};
use rbo_reconcile::ObjectKey;

pub const NS: &str = "default";

/// Records delivered mail instead of sending it.
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<EmailMessage>>,
    failing: AtomicBool,
}

impl Outbox {
    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn messages(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl MailTransport for Outbox {
    async fn deliver(&self, _smtp: &SmtpConfig, message: &EmailMessage) -> Result<(), NotifyError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(NotifyError::Transport("connection refused".into()));
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }
}

pub fn email(recipient: &str) -> Notification {
    Notification {
        channel: "email".into(),
        recipient: recipient.into(),
    }
}

pub struct TestEnv {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub compute: Arc<InMemoryCompute>,
    pub database: Arc<InMemoryDatabase>,
    pub registry: ProviderRegistry,
    pub outbox: Arc<Outbox>,
}

impl TestEnv {
    /// Fresh environment with the clock at 2026-06-01T09:00:00Z.
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap(),
        ));
        let compute = Arc::new(InMemoryCompute::new());
        let database = Arc::new(InMemoryDatabase::new());
        let registry = ProviderRegistry::new(clock.clone())
            .with_compute(compute.clone())
            .with_database(database.clone());

        Self {
            store: Arc::new(MemoryStore::new()),
            clock,
            compute,
            database,
            registry,
            outbox: Arc::new(Outbox::default()),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    pub fn dispatcher(&self) -> Dispatcher {
        let smtp = SmtpConfig {
            host: "localhost".into(),
            port: 25,
            username: String::new(),
            password: String::new(),
            sender: "bookings@example.com".into(),
        };
        Dispatcher::new().with_channel("email", Arc::new(EmailChannel::new(smtp, self.outbox.clone())))
    }

    pub fn booking_controller(&self) -> BookingController<MemoryStore> {
        BookingController::new(
            self.store.clone(),
            self.clock.clone(),
            self.dispatcher(),
            BookingConfig::default(),
        )
    }

    pub fn resource_controller(&self) -> ResourceController<MemoryStore> {
        ResourceController::new(
            self.store.clone(),
            self.registry.clone(),
            ResourceConfig::default(),
        )
    }

    pub fn monitor_controller(&self) -> MonitorController<MemoryStore> {
        MonitorController::new(
            self.store.clone(),
            self.registry.clone(),
            MonitorConfig::default(),
        )
    }

    pub fn scheduler_controller(&self) -> BookingSchedulerController<MemoryStore> {
        BookingSchedulerController::new(
            self.store.clone(),
            self.clock.clone(),
            SchedulerConfig::default(),
        )
    }

    /// Store a Resource named after its tag.
    pub async fn add_resource(&self, tag: &str, provider: &str) -> Resource {
        self.store
            .create(Object::new(
                ObjectMeta::new(NS, tag),
                ResourceSpec::new(tag, provider),
            ))
            .await
            .unwrap()
    }

    pub async fn add_booking(
        &self,
        name: &str,
        resource: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        notifications: Vec<Notification>,
    ) -> Booking {
        self.store
            .create(Object::new(
                ObjectMeta::new(NS, name),
                BookingSpec {
                    start_at: format_timestamp(start),
                    end_at: format_timestamp(end),
                    resource_name: resource.into(),
                    user_id: "alice".into(),
                    notifications,
                },
            ))
            .await
            .unwrap()
    }

    pub async fn resource(&self, name: &str) -> Resource {
        self.store
            .get::<ResourceSpec>(&ObjectKey::new(NS, name))
            .await
            .unwrap()
    }

    pub async fn booking(&self, name: &str) -> Booking {
        self.store
            .get::<BookingSpec>(&ObjectKey::new(NS, name))
            .await
            .unwrap()
    }
}
