//! Controller worker that drives a single reconciler.
//!
//! The worker:
//! - Reconciles every key handed to it at startup
//! - Reconciles a key whenever a change event for it arrives
//! - Re-runs keys whose requested requeue delay has elapsed
//! - Stops when the shutdown signal flips to `true`

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{Action, ObjectKey};

/// A reconciler for one object kind.
#[async_trait]
pub trait Reconciler: Send + Sync + 'static {
    /// Error returned by a failed pass.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Controller name used in logs.
    fn name(&self) -> &'static str;

    /// Run one reconciliation pass for `key`.
    async fn reconcile(&self, key: &ObjectKey) -> Result<Action, Self::Error>;

    /// Decide what to do after a failed pass.
    fn error_policy(&self, key: &ObjectKey, error: &Self::Error) -> Action;
}

/// Pending timed requeues, one deadline per key.
#[derive(Debug, Default)]
pub struct RequeueQueue {
    due: HashMap<ObjectKey, Instant>,
}

impl RequeueQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `key` at `at`, replacing any earlier decision for it.
    pub fn schedule(&mut self, key: ObjectKey, at: Instant) {
        self.due.insert(key, at);
    }

    pub fn remove(&mut self, key: &ObjectKey) {
        self.due.remove(key);
    }

    pub fn len(&self) -> usize {
        self.due.len()
    }

    pub fn is_empty(&self) -> bool {
        self.due.is_empty()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.due.values().min().copied()
    }

    /// Remove and return every key due at or before `now`, earliest first.
    pub fn pop_due(&mut self, now: Instant) -> Vec<ObjectKey> {
        let mut ready: Vec<(Instant, ObjectKey)> = self
            .due
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(key, at)| (*at, key.clone()))
            .collect();
        ready.sort();

        for (_, key) in &ready {
            self.due.remove(key);
        }

        ready.into_iter().map(|(_, key)| key).collect()
    }
}

/// Counters reported when a worker exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub passes: u64,
    pub failures: u64,
}

/// Runs one reconciler until shutdown.
pub struct ControllerWorker<R: Reconciler> {
    reconciler: R,
    queue: RequeueQueue,
    stats: WorkerStats,
}

impl<R: Reconciler> ControllerWorker<R> {
    pub fn new(reconciler: R) -> Self {
        Self {
            reconciler,
            queue: RequeueQueue::new(),
            stats: WorkerStats::default(),
        }
    }

    /// Run until `shutdown` carries `true` (or its sender goes away).
    ///
    /// `initial` keys are reconciled first; after that the worker reacts to
    /// `events` and to its own requeue deadlines.
    pub async fn run(
        mut self,
        initial: Vec<ObjectKey>,
        mut events: mpsc::UnboundedReceiver<ObjectKey>,
        mut shutdown: watch::Receiver<bool>,
    ) -> WorkerStats {
        let name = self.reconciler.name();
        info!(
            controller = name,
            initial_keys = initial.len(),
            "Starting controller worker"
        );

        let now = Instant::now();
        for key in initial {
            self.queue.schedule(key, now);
        }

        let mut events_open = true;

        loop {
            let deadline = self.queue.next_deadline();

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(controller = name, "Controller worker shutting down");
                        break;
                    }
                }
                event = events.recv(), if events_open => {
                    match event {
                        Some(key) => self.process(key).await,
                        None => {
                            debug!(controller = name, "Event stream closed, continuing on timers");
                            events_open = false;
                        }
                    }
                }
                _ = sleep_until_deadline(deadline), if deadline.is_some() => {
                    for key in self.queue.pop_due(Instant::now()) {
                        self.process(key).await;
                    }
                }
            }
        }

        self.stats
    }

    /// Run a single pass for `key` and record the follow-up.
    async fn process(&mut self, key: ObjectKey) {
        let name = self.reconciler.name();
        self.queue.remove(&key);
        self.stats.passes += 1;

        let action = match self.reconciler.reconcile(&key).await {
            Ok(action) => action,
            Err(e) => {
                self.stats.failures += 1;
                warn!(controller = name, key = %key, error = %e, "Reconciliation failed");
                self.reconciler.error_policy(&key, &e)
            }
        };

        match action {
            Action::Requeue(after) => {
                debug!(controller = name, key = %key, requeue_ms = after.as_millis() as u64, "Requeue");
                self.queue.schedule(key, Instant::now() + after);
            }
            Action::AwaitChange => {
                debug!(controller = name, key = %key, "Waiting for next change");
            }
        }
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => tokio::time::sleep(Duration::from_secs(3600)).await,
    }
}
