//! Shared utilities for Splice services

pub mod env;
pub mod telemetry;

pub use env::{optional_var, required_var, EnvError};
pub use telemetry::{init_tracing, LogFormat};
