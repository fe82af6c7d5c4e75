use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::{config::Config, handlers, ingest::IngestSink, signals::shutdown_signal, store::Database};

/// Time allowed for the ingestion writer to drain after the listener stops
const INGEST_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub config: Arc<Config>,
    pub ingest: IngestSink,
}

/// Start the API server
///
/// Connects the store (running migrations), spawns the ingestion writer,
/// serves until SIGTERM/SIGINT, then drains queued ingestion batches.
pub async fn start_server(config: Config) -> Result<()> {
    info!(database = %config.database.url, "Connecting to database");
    let db = Database::connect(&config.database)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    let (ingest, writer_handle) = IngestSink::spawn(db.clone(), config.ingest);
    info!(
        buffer_size = config.ingest.buffer_size,
        batch_size = config.ingest.batch_size,
        "Ingestion writer started"
    );

    let addr = SocketAddr::from((config.server.host.parse::<std::net::IpAddr>()?, config.server.port));

    let state = AppState {
        db: db.clone(),
        config: Arc::new(config),
        ingest,
    };
    let app = create_router(state);

    info!("Starting API analytics server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            info!("Shutdown signal received, draining connections...");
        })
        .await?;

    // The router, and with it every sink clone, is gone; the writer flushes and exits
    match tokio::time::timeout(INGEST_DRAIN_TIMEOUT, writer_handle).await {
        Ok(Ok(())) => info!("Ingestion queue drained"),
        Ok(Err(e)) => tracing::error!(error = %e, "Ingestion writer task failed"),
        Err(_) => tracing::warn!("Timed out draining ingestion queue"),
    }

    db.close().await;
    info!("Server stopped gracefully");

    Ok(())
}

/// Build the router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/generate-api-key", get(handlers::accounts::generate_api_key))
        .route("/user-id/:api_key", get(handlers::accounts::get_user_id))
        .route("/delete/:api_key", get(handlers::accounts::delete_account))
        .route("/requests/:user_id", get(handlers::data::get_user_requests))
        .route("/data", get(handlers::data::get_data))
        .route("/monitor/add", post(handlers::monitors::add_monitor))
        .route("/monitor/delete", post(handlers::monitors::delete_monitor))
        .route("/monitor/pings/:user_id", get(handlers::monitors::get_pings))
        .route("/monitors/:user_id", get(handlers::monitors::list_monitors))
        .route("/log-request", post(handlers::ingest::log_requests))
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
