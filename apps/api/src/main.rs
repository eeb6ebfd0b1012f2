//! Splice Server - Main entry point

use std::sync::Arc;

use anyhow::{Context, Result};

use splice_api::config::{DatastoreBackend, ServerConfig};
use splice_api::{server, AppState};
use splice_db::{DataStore, MemoryStore, PgStore};

#[tokio::main]
async fn main() {
    // Load environment variables before anything reads them
    dotenvy::dotenv().ok();
    if let Err(e) = splice_common::init_tracing() {
        eprintln!("splice-server: {e}");
        std::process::exit(1);
    }

    if let Err(e) = run().await {
        tracing::error!("startup failed: {e:#}");
        eprintln!("splice-server: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = ServerConfig::from_env().context("invalid configuration")?;

    let store: Arc<dyn DataStore> = match config.datastore {
        DatastoreBackend::Memory => {
            tracing::info!("using in-memory datastore");
            Arc::new(MemoryStore::new())
        }
        DatastoreBackend::Postgres => {
            let url = config
                .database_url
                .clone()
                .context("DATABASE_URL is required for the postgres datastore")?;
            let store = PgStore::connect(&url)
                .await
                .context("failed to connect to postgres")?;
            store.migrate().await.context("schema migration failed")?;
            tracing::info!("using postgres datastore");
            Arc::new(store)
        }
    };

    let port = config.port;
    let state = AppState::new(config, store);
    let handle = server::start(state, port).await?;
    tracing::info!(
        "Swagger UI available at http://localhost:{}/swagger-ui/",
        handle.addr().port()
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("shutting down");
    handle.stop().await
}
