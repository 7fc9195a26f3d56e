use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::DashboardError;
use crate::loader::DataSource;
use crate::loader::postgres::{PgSettings, PostgresSource};

/// SEO ranking dashboard server.
///
/// Secrets are usually supplied through the environment rather than flags.
#[derive(Parser, Debug, Clone)]
#[command(name = "seo-dashboard", version, about)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "DASHBOARD_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Shared password protecting the dashboard
    #[arg(long, env = "DASHBOARD_PASS", hide_env_values = true)]
    pub dashboard_pass: String,

    /// Database host
    #[arg(long, env = "DB_HOST")]
    pub db_host: Option<String>,

    /// Database port
    #[arg(long, env = "DB_PORT", default_value_t = 5432)]
    pub db_port: u16,

    /// Database user
    #[arg(long, env = "DB_USER")]
    pub db_user: Option<String>,

    /// Database password
    #[arg(long, env = "DB_PASS", hide_env_values = true)]
    pub db_pass: Option<String>,

    /// Database name
    #[arg(long, env = "DB_NAME")]
    pub db_name: Option<String>,

    /// Table holding the ranking history
    #[arg(long, env = "DB_TABLE", default_value = "rankings_historico")]
    pub table: String,

    /// Read rankings from a CSV export instead of the database
    #[arg(long, env = "DASHBOARD_CSV")]
    pub csv: Option<PathBuf>,

    /// Seconds a loaded table is served before it is reloaded
    #[arg(long, env = "CACHE_TTL_SECS", default_value_t = 600)]
    pub cache_ttl_secs: u64,
}

impl Config {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// The data source described by the flags; CSV wins over the database
    ///
    /// # Errors
    /// * Returns an error if neither a CSV path nor the full set of database
    ///   settings is present
    pub fn data_source(&self) -> Result<DataSource, DashboardError> {
        if let Some(path) = &self.csv {
            return Ok(DataSource::Csv(path.clone()));
        }

        let missing: Vec<&str> = [
            ("DB_HOST", self.db_host.is_none()),
            ("DB_USER", self.db_user.is_none()),
            ("DB_PASS", self.db_pass.is_none()),
            ("DB_NAME", self.db_name.is_none()),
        ]
        .iter()
        .filter(|(_, absent)| *absent)
        .map(|(name, _)| *name)
        .collect();
        if !missing.is_empty() {
            return Err(DashboardError::Config(format!(
                "missing database settings: {}",
                missing.join(", ")
            )));
        }

        let settings = PgSettings {
            host: self.db_host.clone().unwrap_or_default(),
            port: self.db_port,
            user: self.db_user.clone().unwrap_or_default(),
            password: self.db_pass.clone().unwrap_or_default(),
            database: self.db_name.clone().unwrap_or_default(),
            table: self.table.clone(),
        };
        Ok(DataSource::Postgres(PostgresSource::new(settings)?))
    }
}
