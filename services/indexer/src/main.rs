//! DataONE event indexer
//!
//! Subscribes to the data store's AMQP exchange and records file-access
//! events under the curated repository in the DataONE event log.
//!
//! ## Architecture
//!
//! - **Supervisor**: Keeps the queue subscription alive, retrying with backoff
//! - **Dispatch loop**: Decodes, filters and records deliveries, then settles them
//! - **Recorder**: Runs the handler for a routing key inside a database transaction

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, Instrument};

use dataone_indexer::{
    broker::RetrySchedule,
    config::{Cli, Config},
    db::Database,
    dispatch::Dispatcher,
    handlers::HandlerRegistry,
    recorder::EventRecorder,
    supervisor::ConnectionSupervisor,
    telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    telemetry::init(&config.log_level);

    run(cli, config).instrument(telemetry::service_span()).await
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    info!("Starting DataONE event indexer");
    info!(
        config_file = %cli.config.display(),
        repository_root = %config.repository_root,
        node_id = %config.node_id,
        exchange = %config.amqp.exchange,
        queue = %config.amqp.queue,
        "Configuration loaded"
    );

    // Connect to database
    let db = match Database::connect(&config.database).await {
        Ok(db) => {
            info!("Database connection established");
            db
        }
        Err(e) => {
            error!(error = %e, "Failed to connect to database");
            return Err(e.into());
        }
    };

    if config.migrate {
        if let Err(e) = db.run_migrations().await {
            error!(error = %e, "Failed to run migrations");
            return Err(e.into());
        }
    }

    // Build the handler chain
    let registry = HandlerRegistry::build(&config.key_names, &config.node_id);
    info!(handled_routing_keys = ?registry.routing_keys(), "Event handlers registered");
    let recorder = EventRecorder::new(db.event_log(), registry);
    let dispatcher = Dispatcher::new(recorder, config.repository_root.clone());

    // Subscribe to the queue
    let (mut supervisor, mut events) =
        ConnectionSupervisor::new(config.amqp.clone(), RetrySchedule::default());
    if let Err(e) = supervisor.connect().await {
        error!(error = %e, "Unable to establish the AMQP subscription");
        return Err(e.into());
    }

    info!("Waiting for incoming AMQP messages");

    let outcome = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            Ok(())
        }
        result = dispatcher.run(&mut supervisor, &mut events) => result,
    };

    supervisor.shutdown().await;

    if let Err(e) = outcome {
        error!(error = %e, "Dispatch loop stopped, exiting");
        return Err(e.into());
    }

    info!("DataONE event indexer shutdown complete");
    Ok(())
}
