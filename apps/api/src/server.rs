//! Server lifecycle
//!
//! Explicit start/stop around the axum listener. Restart is stop, wait for
//! the port to come free, then start again.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::openapi::ApiDoc;
use crate::routes;
use crate::state::AppState;

const PORT_FREE_RETRIES: u32 = 50;
const PORT_FREE_DELAY: Duration = Duration::from_millis(100);

/// A running server instance
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl ServerHandle {
    /// Address the server is listening on
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Signal shutdown and wait for in-flight requests to drain
    pub async fn stop(self) -> Result<()> {
        // The receiver is gone only if the server already exited
        let _ = self.shutdown.send(());
        self.task.await.context("server task panicked")??;
        Ok(())
    }
}

/// Build the full application router
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::api_routes(state))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind the listener and start serving
pub async fn start(state: AppState, port: u16) -> Result<ServerHandle> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let addr = listener.local_addr().context("listener has no address")?;

    let (shutdown, rx) = oneshot::channel::<()>();
    let app = app(state);
    let task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await
    });

    tracing::info!("listening on {addr}");
    Ok(ServerHandle {
        addr,
        shutdown,
        task,
    })
}

/// Stop a running server, wait for its port to come free, start again
pub async fn restart(handle: ServerHandle, state: AppState) -> Result<ServerHandle> {
    let port = handle.addr().port();
    handle.stop().await?;

    for _ in 0..PORT_FREE_RETRIES {
        match TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port))).await {
            Ok(probe) => {
                drop(probe);
                return start(state, port).await;
            }
            Err(_) => tokio::time::sleep(PORT_FREE_DELAY).await,
        }
    }
    anyhow::bail!("port {port} did not come free after shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatastoreBackend, ServerConfig};
    use splice_db::MemoryStore;
    use std::sync::Arc;

    fn state() -> AppState {
        AppState::new(
            ServerConfig {
                port: 0,
                datastore: DatastoreBackend::Memory,
                database_url: None,
                auth_token: "sk-test".to_string(),
            },
            Arc::new(MemoryStore::new()),
        )
    }

    #[tokio::test]
    async fn test_start_stop_and_restart() {
        let handle = start(state(), 0).await.unwrap();
        let addr = handle.addr();
        assert_ne!(addr.port(), 0);

        let handle = restart(handle, state()).await.unwrap();
        assert_eq!(handle.addr().port(), addr.port());
        handle.stop().await.unwrap();
    }
}
