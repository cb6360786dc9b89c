//! shelfmark-web - Reading history service
//!
//! Serves the import API and runs the background import worker: CSV
//! uploads become queued jobs, the worker turns them into library
//! records against the external catalog, and clients follow progress
//! over SSE.

use anyhow::Result;
use shelfmark_common::config::TomlConfig;
use shelfmark_web::catalog::{CatalogCache, CatalogClient};
use shelfmark_web::importer::ImportWorker;
use shelfmark_web::AppState;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    info!("Starting shelfmark-web");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = Arc::new(TomlConfig::load()?);
    info!("Database: {}", config.database.path.display());

    let db_pool = shelfmark_web::db::init_database_pool(&config.database.path).await?;
    info!("Database connection established");

    let catalog = Arc::new(CatalogClient::new(&config.catalog)?);
    let cache = Arc::new(CatalogCache::new(db_pool.clone(), config.catalog.cache_ttl()));

    let state = AppState::new(db_pool.clone(), catalog.clone(), cache.clone(), config.clone());
    let shutdown = state.shutdown.clone();

    // One worker per process; imports are fully serialized
    let worker = ImportWorker::new(
        db_pool,
        catalog,
        cache,
        config.import.clone(),
        shutdown.clone(),
    );
    let worker_handle = tokio::spawn(worker.run());

    let app = shelfmark_web::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    // Stop the worker; an in-flight job is released back to the queue
    shutdown.cancel();
    let _ = worker_handle.await;
    info!("Shutdown complete");

    Ok(())
}
