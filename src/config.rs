//! Configuration management for dsr-query.
//!
//! Handles loading configuration from TOML files and environment variables
//! for the relational store and the SQL generation service.

use crate::db::DatabaseBackend;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

/// Default ceiling for one store round-trip (10 minutes).
pub const DEFAULT_STORE_TIMEOUT_SECS: u64 = 600;

/// Default ceiling for one generation request.
pub const DEFAULT_GENERATOR_TIMEOUT_SECS: u64 = 120;

/// Default SQLAI v2 endpoint.
pub const DEFAULT_SQLAI_API_URL: &str = "https://api.sqlai.ai/api/public/v2";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Relational store settings.
    #[serde(default)]
    pub database: StoreConfig,

    /// SQL generation service settings.
    #[serde(default)]
    pub generator: GeneratorConfig,
}

/// Relational store configuration.
///
/// Either `url` is set, or the individual fields describe a MySQL server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Full connection string (`mysql://...` or `sqlite://...`); wins over the fields below.
    pub url: Option<String>,

    /// Backend used when no `url` is given.
    #[serde(default)]
    pub backend: DatabaseBackend,

    /// Database host.
    pub host: Option<String>,

    /// Database port.
    pub port: Option<u16>,

    /// Database name (or file path for SQLite).
    pub database: Option<String>,

    /// Database user.
    pub user: Option<String>,

    /// Database password (prefer `MYSQL_PASSWORD`).
    #[serde(skip_serializing)]
    pub password: Option<String>,

    /// Ceiling for one store round-trip, in seconds.
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,

    /// Upper bound on pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_store_timeout() -> u64 {
    DEFAULT_STORE_TIMEOUT_SECS
}

fn default_max_connections() -> u32 {
    5
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            backend: DatabaseBackend::default(),
            host: None,
            port: None,
            database: None,
            user: None,
            password: None,
            timeout_secs: default_store_timeout(),
            max_connections: default_max_connections(),
        }
    }
}

impl StoreConfig {
    /// Creates a store config from a connection string.
    ///
    /// Accepted schemes: `mysql`, `mariadb`, `sqlite`.
    pub fn from_connection_string(conn_str: &str) -> Result<Self> {
        let backend = backend_from_url(conn_str)?;
        Ok(Self {
            url: Some(conn_str.to_string()),
            backend,
            ..Default::default()
        })
    }

    /// Returns the backend, taking the URL scheme over the `backend` field.
    pub fn backend(&self) -> Result<DatabaseBackend> {
        match &self.url {
            Some(url) => backend_from_url(url),
            None => Ok(self.backend),
        }
    }

    /// Returns the per-round-trip timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Converts the config to a connection string.
    pub fn to_connection_string(&self) -> Result<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }

        let database = self
            .database
            .as_deref()
            .ok_or_else(|| AppError::config("Database name is required"))?;

        match self.backend {
            DatabaseBackend::Sqlite => Ok(format!("sqlite://{database}?mode=rwc")),
            DatabaseBackend::MySql => {
                let host = self.host.as_deref().unwrap_or("localhost");
                let port = self.port.unwrap_or(3306);
                let mut url = Url::parse(&format!("mysql://{host}:{port}/{database}"))
                    .map_err(|e| AppError::config(format!("Invalid connection settings: {e}")))?;

                if let Some(user) = &self.user {
                    url.set_username(user)
                        .map_err(|_| AppError::config("Invalid database user"))?;
                    if let Some(password) = &self.password {
                        url.set_password(Some(password))
                            .map_err(|_| AppError::config("Invalid database password"))?;
                    }
                }

                Ok(url.to_string())
            }
        }
    }

    /// Applies environment variables as defaults.
    ///
    /// `DATABASE_URL` is used only when neither a URL nor a host is configured;
    /// `MYSQL_HOST`, `MYSQL_PORT`, `MYSQL_USER`, `MYSQL_PASSWORD` and
    /// `MYSQL_DATABASE` fill the individual fields.
    pub fn apply_env_defaults(&mut self) {
        if self.url.is_none() && self.host.is_none() {
            self.url = std::env::var("DATABASE_URL").ok().filter(|v| !v.is_empty());
        }
        if self.host.is_none() {
            self.host = std::env::var("MYSQL_HOST").ok();
        }
        if self.port.is_none() {
            if let Ok(port_str) = std::env::var("MYSQL_PORT") {
                if let Ok(port) = port_str.parse() {
                    self.port = Some(port);
                }
            }
        }
        if self.database.is_none() {
            self.database = std::env::var("MYSQL_DATABASE").ok();
        }
        if self.user.is_none() {
            self.user = std::env::var("MYSQL_USER").ok();
        }
        if self.password.is_none() {
            self.password = std::env::var("MYSQL_PASSWORD").ok();
        }
    }

    /// Returns a display-safe string (no password) for logs.
    pub fn display_string(&self) -> String {
        if let Some(url) = &self.url {
            return match Url::parse(url) {
                Ok(mut parsed) => {
                    if parsed.password().is_some() {
                        let _ = parsed.set_password(Some("***"));
                    }
                    parsed.to_string()
                }
                Err(_) => "<invalid url>".to_string(),
            };
        }
        let host = self.host.as_deref().unwrap_or("localhost");
        let database = self.database.as_deref().unwrap_or("unknown");
        match self.backend {
            DatabaseBackend::MySql => {
                format!("{database} @ {host}:{}", self.port.unwrap_or(3306))
            }
            DatabaseBackend::Sqlite => format!("sqlite file {database}"),
        }
    }
}

fn backend_from_url(conn_str: &str) -> Result<DatabaseBackend> {
    let url = Url::parse(conn_str)
        .map_err(|e| AppError::config(format!("Invalid connection string: {e}")))?;

    DatabaseBackend::parse(url.scheme()).ok_or_else(|| {
        AppError::config(format!(
            "Invalid scheme '{}'. Expected 'mysql' or 'sqlite'",
            url.scheme()
        ))
    })
}

/// SQL generation service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// API key (prefer `SQLAI_API_KEY`; never written back out).
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Endpoint of the generation service.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// SQL dialect requested from the service.
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Ceiling for one generation request, in seconds.
    #[serde(default = "default_generator_timeout")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    DEFAULT_SQLAI_API_URL.to_string()
}

fn default_engine() -> String {
    "mysql".to_string()
}

fn default_generator_timeout() -> u64 {
    DEFAULT_GENERATOR_TIMEOUT_SECS
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            engine: default_engine(),
            timeout_secs: default_generator_timeout(),
        }
    }
}

impl GeneratorConfig {
    /// Applies `SQLAI_API_KEY` and `SQLAI_API_URL` as defaults.
    pub fn apply_env_defaults(&mut self) {
        if self.api_key.is_none() {
            self.api_key = std::env::var("SQLAI_API_KEY").ok();
        }
        if self.api_url == DEFAULT_SQLAI_API_URL {
            if let Ok(url) = std::env::var("SQLAI_API_URL") {
                if !url.is_empty() {
                    self.api_url = url;
                }
            }
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dsr-query")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            AppError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Fills unset values from the environment.
    pub fn apply_env_defaults(&mut self) {
        self.database.apply_env_defaults();
        self.generator.apply_env_defaults();
    }
}
