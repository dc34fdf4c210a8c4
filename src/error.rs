//! Error types for dsr-query.
//!
//! Defines the main error enum used throughout the crate. Failures of the
//! SQL generation service have their own value type in [`crate::generator`].

use thiserror::Error;

/// Main error type for dsr-query operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Store connection errors (host unreachable, pool exhausted, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// The store was not reachable at startup, or a session was used before
    /// a connection was acquired.
    #[error("Database not ready: {0}")]
    NotReady(String),

    /// The store rejected or failed an otherwise well-formed statement.
    /// The driver message is kept verbatim.
    #[error("Execution failed: {0}")]
    Execution(String),

    /// A store round-trip exceeded its time budget.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// A statement violated the read-only contract.
    #[error("Rejected: {0}")]
    Safety(String),

    /// Spreadsheet export failed.
    #[error("Export failed: {0}")]
    Export(String),

    /// Configuration errors (invalid config file, bad connection string, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),

    /// A chunked insert stopped part-way. `committed` counts rows in chunks
    /// that were fully committed before the failure.
    #[error("Batch insert stopped after {committed} committed rows: {source}")]
    BatchInsert {
        committed: u64,
        #[source]
        source: Box<AppError>,
    },
}

impl AppError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a not-ready error with the given message.
    pub fn not_ready(msg: impl Into<String>) -> Self {
        Self::NotReady(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates a timeout error with the given message.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Creates a safety rejection with the given reason.
    pub fn safety(msg: impl Into<String>) -> Self {
        Self::Safety(msg.into())
    }

    /// Creates an export error with the given message.
    pub fn export(msg: impl Into<String>) -> Self {
        Self::Export(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Wraps a store error raised while inserting a chunk.
    pub fn batch_insert(committed: u64, source: AppError) -> Self {
        Self::BatchInsert {
            committed,
            source: Box::new(source),
        }
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::NotReady(_) => "Not Ready",
            Self::Execution(_) => "Execution Error",
            Self::Timeout(_) => "Timeout",
            Self::Safety(_) => "Security Error",
            Self::Export(_) => "Export Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
            Self::BatchInsert { .. } => "Batch Insert Error",
        }
    }

    /// Returns true if the caller may reasonably try the same request again.
    ///
    /// Nothing in the crate retries on its own; this only classifies.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Connection(_) => true,
            Self::BatchInsert { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Returns the message without the category prefix.
    pub fn detail(&self) -> String {
        match self {
            Self::Connection(m)
            | Self::NotReady(m)
            | Self::Execution(m)
            | Self::Timeout(m)
            | Self::Safety(m)
            | Self::Export(m)
            | Self::Config(m)
            | Self::Internal(m) => m.clone(),
            Self::BatchInsert { source, .. } => source.detail(),
        }
    }
}

/// Result type alias using AppError.
pub type Result<T> = std::result::Result<T, AppError>;
