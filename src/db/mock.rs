//! Mock store for testing.
//!
//! Provides an in-memory [`Store`] with scripted responses and call counters
//! so the gateway and pipeline can be tested without a database server.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{DatabaseBackend, QueryResult, Row, Store, StoreConnection, Value};
use crate::error::{AppError, Result};

#[derive(Default)]
struct Counters {
    ensure_table: AtomicUsize,
    probes: AtomicUsize,
    checkouts: AtomicUsize,
    releases: AtomicUsize,
    fetches: AtomicUsize,
    chunks: AtomicUsize,
    inserted_rows: AtomicU64,
    last_sql: Mutex<Option<String>>,
}

struct Script {
    response: std::result::Result<QueryResult, String>,
    reachable: bool,
    failing_release: bool,
    fail_insert_chunk: Option<usize>,
}

/// A store that answers every `fetch` with the same scripted response.
#[derive(Clone)]
pub struct MockStore {
    script: Arc<Script>,
    counters: Arc<Counters>,
}

/// Read-only view of a [`MockStore`]'s call counters.
#[derive(Clone)]
pub struct MockStoreHandle {
    counters: Arc<Counters>,
}

impl MockStore {
    /// Creates a reachable store returning a one-row sample result.
    pub fn new() -> Self {
        let sample = QueryResult {
            headers: vec!["station_name".to_string(), "total".to_string()],
            rows: vec![vec![Value::from("Panaji"), Value::Int(12)]],
            ..Default::default()
        };
        Self {
            script: Arc::new(Script {
                response: Ok(sample),
                reachable: true,
                failing_release: false,
                fail_insert_chunk: None,
            }),
            counters: Arc::new(Counters::default()),
        }
    }

    fn edit(mut self, f: impl FnOnce(&mut Script)) -> Self {
        let mut script = Script {
            response: self.script.response.clone(),
            reachable: self.script.reachable,
            failing_release: self.script.failing_release,
            fail_insert_chunk: self.script.fail_insert_chunk,
        };
        f(&mut script);
        self.script = Arc::new(script);
        self
    }

    /// Returns `result` from every fetch.
    pub fn with_result(self, result: QueryResult) -> Self {
        self.edit(|s| s.response = Ok(result))
    }

    /// Fails every fetch with an execution error carrying `message`.
    pub fn with_error(self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.edit(|s| s.response = Err(message))
    }

    /// Makes the probe, bootstrap and checkout fail with a connection error.
    pub fn unreachable(self) -> Self {
        self.edit(|s| s.reachable = false)
    }

    /// Makes connection release report an error.
    pub fn failing_release(self) -> Self {
        self.edit(|s| s.failing_release = true)
    }

    /// Fails the `n`th inserted chunk (1-based) and every one after it.
    pub fn fail_insert_chunk(self, n: usize) -> Self {
        self.edit(|s| s.fail_insert_chunk = Some(n))
    }

    /// Returns a handle for inspecting call counts.
    pub fn handle(&self) -> MockStoreHandle {
        MockStoreHandle {
            counters: Arc::clone(&self.counters),
        }
    }

    /// Splits into the store and its counter handle.
    pub fn into_parts(self) -> (Self, MockStoreHandle) {
        let handle = self.handle();
        (self, handle)
    }

    fn refuse(&self) -> Result<()> {
        if self.script.reachable {
            Ok(())
        } else {
            Err(AppError::connection(
                "Can't connect to MySQL server on 'localhost:3306' (111)",
            ))
        }
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockStoreHandle {
    pub fn ensure_table_calls(&self) -> usize {
        self.counters.ensure_table.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.counters.probes.load(Ordering::SeqCst)
    }

    pub fn checkouts(&self) -> usize {
        self.counters.checkouts.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.counters.releases.load(Ordering::SeqCst)
    }

    pub fn fetches(&self) -> usize {
        self.counters.fetches.load(Ordering::SeqCst)
    }

    pub fn inserted_rows(&self) -> u64 {
        self.counters.inserted_rows.load(Ordering::SeqCst)
    }

    /// The SQL text of the most recent fetch.
    pub fn last_sql(&self) -> Option<String> {
        self.counters
            .last_sql
            .lock()
            .ok()
            .and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl Store for MockStore {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::MySql
    }

    async fn probe(&self) -> Result<()> {
        self.counters.probes.fetch_add(1, Ordering::SeqCst);
        self.refuse()
    }

    async fn ensure_table(&self) -> Result<()> {
        self.counters.ensure_table.fetch_add(1, Ordering::SeqCst);
        self.refuse()
    }

    async fn checkout(&self) -> Result<Box<dyn StoreConnection>> {
        self.refuse()?;
        self.counters.checkouts.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockConnection {
            store: self.clone(),
        }))
    }

    async fn close(&self) {}
}

struct MockConnection {
    store: MockStore,
}

#[async_trait]
impl StoreConnection for MockConnection {
    async fn fetch(&mut self, sql: &str) -> Result<QueryResult> {
        let counters = &self.store.counters;
        counters.fetches.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = counters.last_sql.lock() {
            *last = Some(sql.to_string());
        }

        match &self.store.script.response {
            Ok(result) => Ok(result.clone()),
            Err(message) => Err(AppError::execution(message.clone())),
        }
    }

    async fn insert_chunk(&mut self, _template: &str, rows: &[Row]) -> Result<u64> {
        let counters = &self.store.counters;
        let chunk = counters.chunks.fetch_add(1, Ordering::SeqCst) + 1;
        if matches!(self.store.script.fail_insert_chunk, Some(n) if chunk >= n) {
            return Err(AppError::execution(format!(
                "Column cannot be null (chunk {chunk})"
            )));
        }
        counters
            .inserted_rows
            .fetch_add(rows.len() as u64, Ordering::SeqCst);
        Ok(rows.len() as u64)
    }

    async fn release(self: Box<Self>) -> Result<()> {
        self.store.counters.releases.fetch_add(1, Ordering::SeqCst);
        if self.store.script.failing_release {
            return Err(AppError::connection("Lost connection during close"));
        }
        Ok(())
    }
}
