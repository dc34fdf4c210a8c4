//! Database layer for dsr-query.
//!
//! Provides a trait-based interface over the relational store so the
//! execution gateway can run against MySQL, SQLite or an in-memory mock
//! interchangeably.

mod driver;
mod gateway;
mod mock;
mod mysql;
pub mod schema;
mod sqlite;
mod types;

pub use gateway::{
    ExecutionGateway, Session, DEFAULT_CHUNK_SIZE, MULTIPLE_STATEMENTS_MESSAGE, NOT_READY_MESSAGE,
};
pub use mock::{MockStore, MockStoreHandle};
pub use mysql::MySqlStore;
pub use sqlite::SqliteStore;
pub use types::{QueryResult, Row, Value};

use std::sync::Arc;

use crate::config::StoreConfig;
use crate::error::Result;
use async_trait::async_trait;

/// Error text for statements that run but produce no result set.
pub const NO_RESULT_SET: &str = "Query did not return any result set.";

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    MySql,
    Sqlite,
}

impl DatabaseBackend {
    /// Returns the backend as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    /// Parses a backend from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Returns the default port for this backend, if it uses one.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::MySql => Some(3306),
            Self::Sqlite => None,
        }
    }

    /// Returns the URL scheme for this backend.
    pub fn url_scheme(&self) -> &'static str {
        match self {
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }
}

impl std::fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Creates a store for the backend named in the configuration.
///
/// Pools are created lazily: an unreachable server is not an error here, it
/// shows up in the gateway's readiness probe instead. The pools belong to the
/// current Tokio runtime, so this must be called from inside one.
pub fn connect(config: &StoreConfig) -> Result<Arc<dyn Store>> {
    match config.backend()? {
        DatabaseBackend::MySql => Ok(Arc::new(MySqlStore::connect_lazy(config)?)),
        DatabaseBackend::Sqlite => Ok(Arc::new(SqliteStore::connect_lazy(config)?)),
    }
}

/// A relational store the gateway can check connections out of.
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns which backend this store talks to.
    fn backend(&self) -> DatabaseBackend;

    /// Checks that a connection can be opened and used.
    async fn probe(&self) -> Result<()>;

    /// Creates `dsr_table` if it does not exist.
    async fn ensure_table(&self) -> Result<()>;

    /// Checks a connection out for one unit of work.
    async fn checkout(&self) -> Result<Box<dyn StoreConnection>>;

    /// Closes the store and every pooled connection.
    async fn close(&self);
}

/// A connection checked out of a [`Store`].
#[async_trait]
pub trait StoreConnection: Send {
    /// Runs a parameterless statement and returns its headers and rows.
    ///
    /// `sql` holds exactly one statement. Fails if it produces no result set.
    async fn fetch(&mut self, sql: &str) -> Result<QueryResult>;

    /// Inserts `rows` with `template` inside one transaction and commits it.
    ///
    /// On failure the transaction is rolled back and the store error returned.
    /// Returns the number of rows the store reports as inserted.
    async fn insert_chunk(&mut self, template: &str, rows: &[Row]) -> Result<u64>;

    /// Hands the connection back, closing it if it may be unhealthy.
    async fn release(self: Box<Self>) -> Result<()>;
}
