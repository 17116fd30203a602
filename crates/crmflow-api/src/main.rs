// crmflow API server
// Decision: DATABASE_URL selects PostgreSQL; without it the server runs on the in-memory store
// Decision: In memory mode the due-work poller runs in-process so delayed steps still fire

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{header, Method};
use crmflow_api::{router, ApiConfig, ApiDoc, AppState};
use crmflow_core::{Channels, EngineConfig, InMemoryStore, LoggingChannel, Store};
use crmflow_storage::{create_db_store, Database};
use crmflow_worker::{DuePoller, PollerConfig};
use tokio::sync::watch;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crmflow_api=debug,crmflow_core=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("crmflow-api starting...");

    let config = ApiConfig::from_env();

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let db = Database::from_url(url, config.max_connections)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Connected to database");
            if config.run_migrations {
                db.migrate().await.context("Failed to run migrations")?;
                tracing::info!("Migrations applied");
            }
            Arc::new(create_db_store(db))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store (data is lost on restart)");
            Arc::new(InMemoryStore::new())
        }
    };

    let channel = Arc::new(LoggingChannel);
    let state = AppState::new(
        store,
        Channels::new(channel.clone(), channel),
        EngineConfig::from_env(),
        config.storage_mode(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller_handle = if config.run_poller {
        tracing::info!("Running due-work poller in-process");
        let poller = DuePoller::new(
            state.engine.clone(),
            state.campaigns.clone(),
            PollerConfig::from_env(),
            shutdown_rx,
        );
        Some(tokio::spawn(poller.run()))
    } else {
        None
    };

    if !config.api_prefix.is_empty() {
        tracing::info!(prefix = %config.api_prefix, "API prefix configured");
    }

    let app = router(state, &config.api_prefix)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()));

    // Only needed when the UI is served from a different origin than the API
    let app = if config.cors_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
        app
    } else {
        tracing::info!(origins = ?config.cors_origins, "CORS origins configured");
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(config.cors_origins.clone()))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::PATCH,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::ACCEPT,
                    header::ORIGIN,
                    header::HeaderName::from_static("x-user-id"),
                ]),
        )
    };

    let app = app.layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Received shutdown signal");
        })
        .await
        .context("Server error")?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = poller_handle {
        handle.await.context("Poller task panicked")?;
    }

    tracing::info!("API shutdown complete");
    Ok(())
}
