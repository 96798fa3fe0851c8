//! Resource booking operator
//!
//! Runs the booking, resource, discovery and scheduler controllers against
//! an in-process store and provider clients, optionally seeded from a JSON
//! manifest.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rbo_operator::clock::SystemClock;
use rbo_operator::cloud::{InMemoryCompute, InMemoryDatabase, ProviderRegistry};
use rbo_operator::config::Config;
use rbo_operator::notify::{Dispatcher, EmailChannel, LogTransport};
use rbo_operator::runtime::{ControllerSettings, Operator};
use rbo_operator::seed::Seed;
use rbo_operator::store::MemoryStore;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How long workers get to finish their current pass on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(
        namespace = %config.namespace,
        seed_file = ?config.seed_file,
        "Starting resource booking operator"
    );

    let store = Arc::new(MemoryStore::new());
    let compute = Arc::new(InMemoryCompute::new());
    let database = Arc::new(InMemoryDatabase::new());

    if let Some(path) = &config.seed_file {
        Seed::from_file(path)?
            .apply(store.as_ref(), &config.namespace, &compute, &database)
            .await?;
    }

    let registry = ProviderRegistry::new(Arc::new(SystemClock))
        .with_compute(compute)
        .with_database(database);

    let lookahead_minutes = config.booking().lookahead.num_minutes();
    let dispatcher = Dispatcher::new().with_channel(
        "email",
        Arc::new(
            EmailChannel::new(config.smtp.clone(), Arc::new(LogTransport))
                .with_lead_minutes(lookahead_minutes),
        ),
    );

    let settings = ControllerSettings {
        booking: config.booking(),
        resource: config.resource(),
        monitor: config.monitor(),
        scheduler: config.scheduler(),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let controllers = Operator::new(Arc::clone(&store), registry, dispatcher, settings)
        .spawn(shutdown_rx)
        .await?;

    tokio::signal::ctrl_c().await?;
    info!("Received shutdown signal");
    let _ = shutdown_tx.send(true);

    let names: Vec<_> = controllers.iter().map(|c| c.name).collect();
    let joined = tokio::time::timeout(
        SHUTDOWN_GRACE,
        futures_util::future::join_all(controllers.into_iter().map(|c| c.handle)),
    )
    .await;

    match joined {
        Ok(results) => {
            for (name, result) in names.into_iter().zip(results) {
                match result {
                    Ok(stats) => info!(
                        controller = name,
                        passes = stats.passes,
                        failures = stats.failures,
                        "Controller stopped"
                    ),
                    Err(e) => error!(controller = name, error = %e, "Controller task panicked"),
                }
            }
        }
        Err(_) => warn!(
            grace_secs = SHUTDOWN_GRACE.as_secs(),
            "Controllers did not stop in time"
        ),
    }

    info!("Operator shutdown complete");
    Ok(())
}
