//! MySQL store implementation.
//!
//! Statements run as prepared statements, so the server refuses text that
//! holds more than one.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use sqlx::mysql::{
    MySql, MySqlConnectOptions, MySqlDatabaseError, MySqlPool, MySqlPoolOptions, MySqlRow,
};
use sqlx::pool::PoolConnection;
use sqlx::{
    Column as _, Connection as _, Executor as _, Row as _, Statement as _, TypeInfo as _,
    ValueRef as _,
};
use tracing::debug;

use super::driver::{bind_value, column_names, track};
use super::{
    schema, DatabaseBackend, QueryResult, Row, Store, StoreConnection, Value, NO_RESULT_SET,
};
use crate::config::StoreConfig;
use crate::error::{AppError, Result};

/// How long a checkout may wait for a pooled connection.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

/// MySQL-backed store.
#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    /// Builds a lazily-connecting pool. No network I/O happens here, but the
    /// pool spawns onto the current Tokio runtime, so one must be running.
    pub fn connect_lazy(config: &StoreConfig) -> Result<Self> {
        let url = config.to_connection_string()?;
        let options = MySqlConnectOptions::from_str(&url)
            .map_err(|e| AppError::config(format!("Invalid MySQL connection string: {e}")))?;

        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_lazy_with(options);

        Ok(Self { pool })
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for MySqlStore {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::MySql
    }

    async fn probe(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::connection(driver_message(&e)))?;
        Ok(())
    }

    async fn ensure_table(&self) -> Result<()> {
        let ddl = schema::create_table_sql(DatabaseBackend::MySql);
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
            .map_err(|e| AppError::connection(driver_message(&e)))?;
        Ok(Box::new(MySqlStoreConnection { conn, broken: false }))
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

struct MySqlStoreConnection {
    conn: PoolConnection<MySql>,
    broken: bool,
}

#[async_trait]
impl StoreConnection for MySqlStoreConnection {
    async fn fetch(&mut self, sql: &str) -> Result<QueryResult> {
        let fetched = sqlx::query(sql).fetch_all(&mut *self.conn).await;
        let rows = fetched.map_err(|e| track(&mut self.broken, map_error(e)))?;

        // An empty result still has headers; ask the server to describe it.
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
            let query = row.iter().fold(sqlx::query::<MySql>(template), bind_value);
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
                .map_err(|e| AppError::connection(driver_message(&e)))?;
        }
        Ok(())
    }
}

fn convert_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

fn decode<'r, T>(row: &'r MySqlRow, index: usize) -> Option<T>
where
    T: sqlx::Decode<'r, MySql>,
{
    row.try_get_unchecked::<Option<T>, _>(index).ok().flatten()
}

/// Converts one column of a row, keyed on the server-reported type name.
fn convert_value(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    let is_null = row
        .try_get_raw(index)
        .map(|raw| raw.is_null())
        .unwrap_or(true);
    if is_null {
        return Value::Null;
    }

    let upper = type_name.to_ascii_uppercase();
    let converted = match upper.as_str() {
        "BOOLEAN" => decode::<bool>(row, index).map(Value::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            decode::<i64>(row, index).map(Value::Int)
        }
        t if t.ends_with("UNSIGNED") => decode::<u64>(row, index).map(unsigned_value),
        "YEAR" => decode::<u16>(row, index).map(|y| Value::Int(i64::from(y))),
        "FLOAT" => decode::<f32>(row, index).map(|v| Value::Float(f64::from(v))),
        "DOUBLE" => decode::<f64>(row, index).map(Value::Float),
        "DECIMAL" => decode::<String>(row, index).map(decimal_value),
        "DATE" => decode::<NaiveDate>(row, index).map(|d| Value::String(d.to_string())),
        "DATETIME" | "TIMESTAMP" => {
            decode::<NaiveDateTime>(row, index).map(|dt| Value::String(dt.to_string()))
        }
        "TIME" => decode::<NaiveTime>(row, index)
            .map(time_of_day_micros)
            .or_else(|| decode::<String>(row, index).and_then(|s| parse_time(&s)))
            .map(|micros| Value::Interval { micros }),
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" | "BIT"
        | "GEOMETRY" => decode::<Vec<u8>>(row, index).map(Value::Bytes),
        _ => None,
    };

    // Zero dates and other values chrono rejects keep their server text.
    converted
        .or_else(|| decode::<String>(row, index).map(Value::String))
        .unwrap_or(Value::Null)
}

fn unsigned_value(v: u64) -> Value {
    i64::try_from(v)
        .map(Value::Int)
        .unwrap_or(Value::Float(v as f64))
}

fn decimal_value(text: String) -> Value {
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() => Value::Float(v),
        _ => Value::String(text),
    }
}

fn time_of_day_micros(t: NaiveTime) -> i64 {
    i64::from(t.num_seconds_from_midnight()) * 1_000_000 + i64::from(t.nanosecond() / 1_000)
}

/// Parses MySQL `TIME` text (`[-]H+:MM:SS[.f+]`) into microseconds.
fn parse_time(text: &str) -> Option<i64> {
    let (negative, body) = match text.trim().strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.trim()),
    };

    let mut parts = body.splitn(3, ':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds_text = parts.next()?;

    let (whole, frac) = match seconds_text.split_once('.') {
        Some((w, f)) => (w, f),
        None => (seconds_text, ""),
    };
    let seconds: i64 = whole.parse().ok()?;
    if minutes >= 60 || seconds >= 60 || frac.len() > 6 {
        return None;
    }
    let micros_frac: i64 = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<6}").parse().ok()?
    };

    let total = ((hours * 60 + minutes) * 60 + seconds) * 1_000_000 + micros_frac;
    Some(if negative { -total } else { total })
}

/// Renders a driver error the way the MySQL client library prints it.
fn driver_message(error: &sqlx::Error) -> String {
    match error {
        sqlx::Error::Database(db) => match db.try_downcast_ref::<MySqlDatabaseError>() {
            Some(my) => match my.code() {
                Some(state) => format!("{} ({}): {}", my.number(), state, my.message()),
                None => format!("{}: {}", my.number(), my.message()),
            },
            None => db.message().to_string(),
        },
        other => other.to_string(),
    }
}

fn map_error(error: sqlx::Error) -> AppError {
    match &error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => AppError::connection(driver_message(&error)),
        _ => AppError::execution(driver_message(&error)),
    }
}
