//! Execution gateway: connection lifecycle and normalized execution.
//!
//! The gateway owns a [`Store`] and hands out [`Session`]s. A session is a
//! small state machine over one checked-out connection:
//! `Closed -> Open (acquire) -> Closed (release)`. Concurrent requests each
//! use their own session, so no connection handle is ever shared.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{connect, schema, QueryResult, Row, Store, StoreConnection};
use crate::config::StoreConfig;
use crate::error::{AppError, Result};
use crate::safety::single_statement;

/// Rejection text for text holding more than one statement.
pub const MULTIPLE_STATEMENTS_MESSAGE: &str = "Only one statement may be executed at a time.";

/// Rows per committed chunk when the caller does not choose.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Reported for any work requested while the startup probe had failed.
pub const NOT_READY_MESSAGE: &str = "DB not ready. Check the logs for startup connection errors.";

/// Owns the store, its readiness flag and the per-round-trip timeout.
pub struct ExecutionGateway {
    store: Arc<dyn Store>,
    ready: bool,
    timeout: Duration,
}

impl ExecutionGateway {
    /// Opens the configured store, bootstraps `dsr_table` and probes connectivity.
    ///
    /// Only a malformed configuration is an error; an unreachable server yields
    /// a gateway whose [`is_ready`](Self::is_ready) is false.
    pub async fn open(config: &StoreConfig) -> Result<Self> {
        info!("Opening store: {}", config.display_string());
        let store = connect(config)?;
        Ok(Self::with_store(store, config.timeout()).await)
    }

    /// Builds a gateway over an existing store, running the table bootstrap
    /// and the one-shot readiness probe.
    pub async fn with_store(store: Arc<dyn Store>, timeout: Duration) -> Self {
        let backend = store.backend();

        match bounded(timeout, "Creating dsr_table", store.ensure_table()).await {
            Ok(()) => info!(%backend, "dsr_table verified/created"),
            Err(e) => warn!(%backend, "Failed to create dsr_table: {}", e),
        }

        let ready = match bounded(timeout, "Readiness probe", store.probe()).await {
            Ok(()) => {
                info!(%backend, "Store connection OK");
                true
            }
            Err(e) => {
                warn!(%backend, "Store connection FAILED: {}", e);
                false
            }
        };

        Self {
            store,
            ready,
            timeout,
        }
    }

    /// Returns the result of the startup readiness probe.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Returns the per-round-trip timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns a new, closed session.
    pub fn session(&self) -> Session {
        Session {
            store: Arc::clone(&self.store),
            conn: None,
            timeout: self.timeout,
        }
    }

    /// Runs `sql` in a scoped session: acquire, execute, release.
    pub async fn execute(&self, sql: &str) -> Result<QueryResult> {
        let mut session = self.session();
        session.acquire().await?;
        let result = session.execute(sql).await;
        session.release().await;
        result
    }

    /// Inserts `rows` in committed chunks inside a scoped session.
    pub async fn insert_batch(&self, template: &str, rows: &[Row], chunk_size: usize) -> Result<u64> {
        let mut session = self.session();
        session.acquire().await?;
        let result = session.insert_batch(template, rows, chunk_size).await;
        session.release().await;
        result
    }

    /// Re-runs the idempotent table bootstrap.
    pub async fn ensure_table(&self) -> Result<()> {
        bounded(self.timeout, "Creating dsr_table", self.store.ensure_table()).await
    }

    /// Inserts full `dsr_table` rows using the standard template.
    pub async fn insert_records(&self, rows: &[Row]) -> Result<u64> {
        self.insert_batch(&schema::insert_sql(), rows, DEFAULT_CHUNK_SIZE)
            .await
    }

    /// Closes the underlying store.
    pub async fn close(&self) {
        self.store.close().await;
    }
}

/// One unit of work against the store.
///
/// Dropping an open session returns its connection to the pool without the
/// health check [`release`](Self::release) performs.
pub struct Session {
    store: Arc<dyn Store>,
    conn: Option<Box<dyn StoreConnection>>,
    timeout: Duration,
}

impl Session {
    /// Returns true between a successful `acquire` and the next `release`.
    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Checks a connection out of the store. No-op if already open.
    pub async fn acquire(&mut self) -> Result<()> {
        if self.conn.is_some() {
            return Ok(());
        }
        let conn = bounded(self.timeout, "Acquiring a connection", self.store.checkout()).await?;
        self.conn = Some(conn);
        debug!("Session opened");
        Ok(())
    }

    /// Releases the connection. Close-time errors are logged and swallowed.
    pub async fn release(&mut self) {
        if let Some(conn) = self.conn.take() {
            if let Err(e) = conn.release().await {
                warn!("Ignoring error while releasing connection: {}", e);
            }
            debug!("Session closed");
        }
    }

    /// Executes one read statement and returns headers and rows.
    ///
    /// A trailing terminator is dropped; text with a second statement is
    /// refused before it reaches the store.
    pub async fn execute(&mut self, sql: &str) -> Result<QueryResult> {
        let timeout = self.timeout;
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| AppError::not_ready("Database connection is not open."))?;

        let sql = single_statement(sql)
            .ok_or_else(|| AppError::execution(MULTIPLE_STATEMENTS_MESSAGE))?;
        if sql.is_empty() {
            return Err(AppError::execution("Empty SQL query provided."));
        }

        let start = Instant::now();
        let result = bounded(timeout, "Query", conn.fetch(sql)).await?;
        let elapsed = start.elapsed();

        debug!(
            rows = result.row_count(),
            columns = result.headers.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Query executed"
        );

        Ok(result.with_execution_time(elapsed))
    }

    /// Inserts rows in chunks of `chunk_size`, committing after each chunk.
    ///
    /// If a chunk fails, the error carries the number of rows in the chunks
    /// committed before it; those rows stay in the table.
    pub async fn insert_batch(
        &mut self,
        template: &str,
        rows: &[Row],
        chunk_size: usize,
    ) -> Result<u64> {
        let timeout = self.timeout;
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| AppError::not_ready("Database connection is not open."))?;

        if chunk_size == 0 {
            return Err(AppError::internal("Chunk size must be greater than zero"));
        }
        if template.trim().is_empty() {
            return Err(AppError::execution("Empty insert statement provided."));
        }

        let mut committed = 0u64;
        for (index, chunk) in rows.chunks(chunk_size).enumerate() {
            match bounded(timeout, "Insert chunk", conn.insert_chunk(template, chunk)).await {
                Ok(inserted) => {
                    committed += inserted;
                    debug!(chunk = index + 1, inserted, committed, "Chunk committed");
                }
                Err(e) => {
                    warn!(
                        chunk = index + 1,
                        committed, "Chunk failed and was rolled back: {}", e
                    );
                    return Err(AppError::batch_insert(committed, e));
                }
            }
        }

        info!(rows = committed, "Batch insert complete");
        Ok(committed)
    }
}

/// Applies the gateway timeout to a store future.
async fn bounded<T>(
    limit: Duration,
    what: &str,
    fut: impl std::future::Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        AppError::timeout(format!("{what} timed out after {} seconds", limit.as_secs()))
    })?
}
