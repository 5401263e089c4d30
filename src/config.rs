//! Runtime configuration.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::catalog::{PgConnector, DEFAULT_DATABASE};
use crate::user::UserLookup;

/// Runtime configuration data.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// The logging config, which uses `tracing_subscriber::EnvFilter` directives.
    #[serde(default = "Config::default_rust_log")]
    pub rust_log: String,

    /// The coordinator's data directory, whose `postgresql.conf` holds the coordinator's port.
    pub coordinator_data_directory: String,
    /// The host of the coordinator.
    #[serde(default = "Config::default_pghost")]
    pub pghost: String,
    /// The database to connect to.
    #[serde(default = "Config::default_pgdatabase")]
    pub pgdatabase: String,
    /// The user to connect as, defaulting to the current OS user.
    #[serde(default)]
    pub pguser: Option<String>,
    /// Connect in utility mode.
    #[serde(default)]
    pub utility_mode: bool,
}

impl Config {
    /// Create a new config instance from the runtime environment.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Result<Self> {
        let config: Config = envy::from_env().context("error building config from env")?;
        Ok(config)
    }

    /// The log filter described by `rust_log`.
    pub fn log_filter(&self) -> Result<EnvFilter> {
        EnvFilter::try_new(&self.rust_log).context("error parsing RUST_LOG directives")
    }

    /// Build the coordinator connection parameters described by this config.
    pub fn connector(&self, users: &impl UserLookup) -> Result<PgConnector> {
        let user = match &self.pguser {
            Some(user) => user.clone(),
            None => users.username().context("error resolving the user to connect as")?,
        };
        let connector = PgConnector::for_coordinator(&self.coordinator_data_directory, &self.pghost, &self.pgdatabase, &user)
            .context("error reading the coordinator port")?
            .utility(self.utility_mode);
        Ok(connector)
    }

    fn default_rust_log() -> String {
        "info".into()
    }

    fn default_pghost() -> String {
        "localhost".into()
    }

    fn default_pgdatabase() -> String {
        DEFAULT_DATABASE.into()
    }
}
