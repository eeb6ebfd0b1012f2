//! Telemetry and logging initialization
//!
//! Filtering comes from RUST_LOG; the output format comes from
//! `SPLICE_LOG_FORMAT` and is validated like every other startup variable,
//! so a typo fails startup with a diagnostic naming the variable instead of
//! silently falling back.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::env::{optional_var, EnvError};

/// Without RUST_LOG, keep the engine's step/run events visible while the
/// dependency stack stays at info.
const DEFAULT_FILTER: &str = "info,splice_engine=debug";

/// Output format for log events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for interactive use
    Pretty,
    /// One JSON object per event, for log shippers
    Json,
}

impl LogFormat {
    /// Read `SPLICE_LOG_FORMAT` (`pretty` | `json`, default `pretty`)
    pub fn from_env() -> Result<Self, EnvError> {
        Self::parse(optional_var("SPLICE_LOG_FORMAT").as_deref())
    }

    fn parse(raw: Option<&str>) -> Result<Self, EnvError> {
        match raw {
            None | Some("pretty") => Ok(Self::Pretty),
            Some("json") => Ok(Self::Json),
            Some(other) => Err(EnvError::Invalid {
                name: "SPLICE_LOG_FORMAT",
                value: other.to_string(),
                reason: "expected 'pretty' or 'json'".to_string(),
            }),
        }
    }
}

/// Initialize tracing/logging for the application
pub fn init_tracing() -> Result<(), EnvError> {
    let format = LogFormat::from_env()?;
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
    Ok(())
}
