//! Splice API - HTTP surface for the workflow engine
//!
//! This crate provides the Axum-based RPC surface for Splice:
//! - Config and run lifecycle endpoints (workflows, APIs, runs, tenant)
//! - Workflow execution
//! - WebSocket streaming of execution logs
//! - Bearer-token authentication producing a tenant scope

pub mod config;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod server;
pub mod state;
pub mod ws;

pub use config::ServerConfig;
pub use error::ApiError;
pub use state::AppState;
