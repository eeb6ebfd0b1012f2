//! Shared application state

use std::sync::Arc;

use splice_db::DataStore;
use splice_engine::{LogHub, ResponseCache, SampleCache, SchemaService, WorkflowExecutor};

use crate::config::ServerConfig;

/// Everything the route handlers need, cheap to clone
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub store: Arc<dyn DataStore>,
    pub executor: Arc<WorkflowExecutor>,
    pub schemas: Arc<SchemaService>,
    pub samples: Arc<SampleCache>,
    pub logs: Arc<LogHub>,
}

impl AppState {
    /// Wire up the engine around a store backend
    pub fn new(config: ServerConfig, store: Arc<dyn DataStore>) -> Self {
        let schemas = Arc::new(SchemaService::new());
        let samples = Arc::new(SampleCache::new());
        let logs = Arc::new(LogHub::new());
        let cache = Arc::new(ResponseCache::new());

        let executor = Arc::new(WorkflowExecutor::new(
            Arc::clone(&store),
            cache,
            Arc::clone(&schemas),
            Arc::clone(&logs),
            Arc::clone(&samples),
        ));

        Self {
            config: Arc::new(config),
            store,
            executor,
            schemas,
            samples,
            logs,
        }
    }
}
