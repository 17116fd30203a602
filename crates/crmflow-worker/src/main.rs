use std::sync::Arc;

use anyhow::{Context, Result};
use crmflow_core::{CampaignService, Channels, EngineConfig, LoggingChannel, WorkflowEngine};
use crmflow_storage::{create_db_store, Database};
use crmflow_worker::{DuePoller, WorkerConfig};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crmflow_worker=debug,crmflow_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("crmflow-worker starting...");

    let config = WorkerConfig::from_env()?;
    let db = Database::from_url(&config.database_url, config.max_connections)
        .await
        .context("Failed to connect to database")?;
    if config.run_migrations {
        db.migrate().await.context("Failed to run migrations")?;
        tracing::info!("Migrations applied");
    }

    let store = Arc::new(create_db_store(db));
    let channel = Arc::new(LoggingChannel);
    let channels = Channels::new(channel.clone(), channel);
    let engine_config = EngineConfig::from_env();

    let engine = Arc::new(
        WorkflowEngine::new(store.clone(), channels.clone()).with_config(engine_config.clone()),
    );
    let campaigns = Arc::new(CampaignService::new(store, channels).with_config(engine_config));

    tracing::info!(
        worker_id = %config.worker_id,
        batch_size = config.poller.batch_size,
        "Starting due-work worker"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = DuePoller::new(engine, campaigns, config.poller, shutdown_rx);
    let handle = tokio::spawn(poller.run());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received shutdown signal");
    let _ = shutdown_tx.send(true);
    handle.await.context("Poller task panicked")?;

    tracing::info!("Worker shutdown complete");
    Ok(())
}
