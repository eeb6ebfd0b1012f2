//! Server configuration from the environment
//!
//! Required variables fail startup with a diagnostic naming the variable;
//! the process exits non-zero.

use splice_common::{optional_var, required_var, EnvError};

/// Which persistence backend to run against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatastoreBackend {
    Memory,
    Postgres,
}

/// Runtime configuration for the API server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listener port (`SPLICE_PORT`, default 3000)
    pub port: u16,
    /// Persistence backend (`SPLICE_DATASTORE`: `memory` | `postgres`)
    pub datastore: DatastoreBackend,
    /// Connection string, required when the backend is postgres
    /// (`DATABASE_URL`)
    pub database_url: Option<String>,
    /// Static bearer token every request must present
    /// (`SPLICE_AUTH_TOKEN`)
    pub auth_token: String,
}

impl ServerConfig {
    /// Load configuration from the environment
    pub fn from_env() -> Result<Self, EnvError> {
        let port = match optional_var("SPLICE_PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| EnvError::Invalid {
                name: "SPLICE_PORT",
                value: raw,
                reason: "expected a port number".to_string(),
            })?,
            None => 3000,
        };

        let datastore = match optional_var("SPLICE_DATASTORE").as_deref() {
            None | Some("memory") => DatastoreBackend::Memory,
            Some("postgres") => DatastoreBackend::Postgres,
            Some(other) => {
                return Err(EnvError::Invalid {
                    name: "SPLICE_DATASTORE",
                    value: other.to_string(),
                    reason: "expected 'memory' or 'postgres'".to_string(),
                });
            }
        };

        let database_url = optional_var("DATABASE_URL");
        if datastore == DatastoreBackend::Postgres && database_url.is_none() {
            return Err(EnvError::Missing("DATABASE_URL"));
        }

        let auth_token = required_var("SPLICE_AUTH_TOKEN")?;

        Ok(Self {
            port,
            datastore,
            database_url,
            auth_token,
        })
    }
}
