//! SQLite store implementation.
//!
//! Used for local development and for the test suite; values are mapped by
//! the runtime storage class of each cell.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{
    Sqlite, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::{Connection as _, Executor as _, Row as _, Statement as _, TypeInfo as _, ValueRef as _};
use tracing::debug;

use super::driver::{bind_value, column_names, track};
use super::{
    schema, DatabaseBackend, QueryResult, Row, Store, StoreConnection, Value, NO_RESULT_SET,
};
use crate::config::StoreConfig;
use crate::error::{AppError, Result};

/// SQLite-backed store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Builds a lazily-connecting pool; the file is created on first use.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect_lazy(config: &StoreConfig) -> Result<Self> {
        let url = config.to_connection_string()?;
        let options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| AppError::config(format!("Invalid database path: {e}")))?
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(Duration::from_secs(10))
            .connect_lazy_with(options);

        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Sqlite
    }

    async fn probe(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::connection(e.to_string()))?;
        Ok(())
    }

    async fn ensure_table(&self) -> Result<()> {
        let ddl = schema::create_table_sql(DatabaseBackend::Sqlite);
        sqlx::query(&ddl)
            .execute(&self.pool)
            .await
            .map_err(map_error)?;
        Ok(())
    }

    async fn checkout(&self) -> Result<Box<dyn StoreConnection>> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| AppError::connection(e.to_string()))?;
        Ok(Box::new(SqliteStoreConnection { conn, broken: false }))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

struct SqliteStoreConnection {
    conn: PoolConnection<Sqlite>,
    broken: bool,
}

#[async_trait]
impl StoreConnection for SqliteStoreConnection {
    async fn fetch(&mut self, sql: &str) -> Result<QueryResult> {
        let fetched = sqlx::query(sql).fetch_all(&mut *self.conn).await;
        let rows = fetched.map_err(|e| track(&mut self.broken, map_error(e)))?;

        let headers = match rows.first() {
            Some(first) => column_names(first.columns()),
            None => {
                let prepared = (&mut *self.conn).prepare(sql).await;
                let statement = prepared.map_err(|e| track(&mut self.broken, map_error(e)))?;
                column_names(statement.columns())
            }
        };

        if headers.is_empty() {
            return Err(AppError::execution(NO_RESULT_SET));
        }

        QueryResult::with_data(headers, rows.iter().map(convert_row).collect())
    }

    async fn insert_chunk(&mut self, template: &str, rows: &[Row]) -> Result<u64> {
        let begun = self.conn.begin().await;
        let mut tx = begun.map_err(|e| track(&mut self.broken, map_error(e)))?;

        let mut inserted = 0;
        for row in rows {
            let query = row.iter().fold(sqlx::query::<Sqlite>(template), bind_value);
            match query.execute(&mut *tx).await {
                Ok(done) => inserted += done.rows_affected(),
                Err(e) => {
                    if let Err(rollback) = tx.rollback().await {
                        debug!("Rollback failed: {}", rollback);
                    }
                    return Err(track(&mut self.broken, map_error(e)));
                }
            }
        }

        let committed = tx.commit().await;
        committed.map_err(|e| track(&mut self.broken, map_error(e)))?;
        Ok(inserted)
    }

    async fn release(self: Box<Self>) -> Result<()> {
        if self.broken {
            self.conn
                .close()
                .await
                .map_err(|e| AppError::connection(e.to_string()))?;
        }
        Ok(())
    }
}

fn convert_row(row: &SqliteRow) -> Row {
    (0..row.columns().len())
        .map(|i| convert_value(row, i))
        .collect()
}

fn decode<'r, T>(row: &'r SqliteRow, index: usize) -> Option<T>
where
    T: sqlx::Decode<'r, Sqlite>,
{
    row.try_get_unchecked::<Option<T>, _>(index).ok().flatten()
}

fn convert_value(row: &SqliteRow, index: usize) -> Value {
    let Ok(raw) = row.try_get_raw(index) else {
        return Value::Null;
    };
    if raw.is_null() {
        return Value::Null;
    }
    let storage = raw.type_info().name().to_string();

    let converted = match storage.as_str() {
        "INTEGER" | "BOOLEAN" => decode::<i64>(row, index).map(Value::Int),
        "REAL" | "NUMERIC" => decode::<f64>(row, index).map(Value::Float),
        "BLOB" => decode::<Vec<u8>>(row, index).map(Value::Bytes),
        _ => None,
    };

    converted
        .or_else(|| decode::<String>(row, index).map(Value::String))
        .unwrap_or(Value::Null)
}

fn map_error(error: sqlx::Error) -> AppError {
    match &error {
        sqlx::Error::Database(db) => AppError::execution(db.message()),
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => AppError::connection(error.to_string()),
        _ => AppError::execution(error.to_string()),
    }
}
