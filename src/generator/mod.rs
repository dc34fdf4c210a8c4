//! Natural-language to SQL generation.
//!
//! The pipeline talks to a [`SqlGenerator`]; which implementation sits behind
//! it (the live SQLAI client or the missing-credentials stand-in) is decided
//! once at startup by [`factory::create_generator`].

pub mod factory;
mod missing_key;
mod mock;
mod sqlai;

pub use factory::{create_generator, ActiveGenerator, PROVIDER_ACTIVE, PROVIDER_KEY_MISSING};
pub use missing_key::MissingCredentialsGenerator;
pub use mock::MockSqlGenerator;
pub use sqlai::{classify_http_failure, extract_sql, SqlAiClient, PLACEHOLDER_API_KEY};

use async_trait::async_trait;
use std::fmt;

/// Prefix the generation service uses for failure payloads, and that rendered
/// generation failures carry.
pub const ERROR_MARKER: &str = "ERROR";

/// Turns a question plus a schema description into one SQL statement.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    /// Generates SQL for `question`. Expected failures come back as
    /// [`GenerationError`] values, never panics.
    async fn generate(&self, question: &str, schema: &str) -> GenerationResult;
}

/// Result of one generation call.
pub type GenerationResult = std::result::Result<String, GenerationError>;

/// What went wrong while generating SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    /// No usable API key was configured.
    MissingCredentials,
    /// The service rejected the key (HTTP 401).
    Authentication,
    /// Any other non-success HTTP status.
    Http { status: u16 },
    /// The request never got an HTTP response.
    Network,
    /// The request exceeded the generator timeout.
    Timeout,
    /// The response body was not JSON.
    MalformedResponse,
    /// The JSON had no usable `query`/`sql` field.
    MissingField,
    /// The service answered with its own marker-prefixed failure text.
    Upstream,
}

impl GenerationErrorKind {
    /// Short label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "missing_credentials",
            Self::Authentication => "authentication",
            Self::Http { .. } => "http",
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::MalformedResponse => "malformed_response",
            Self::MissingField => "missing_field",
            Self::Upstream => "upstream",
        }
    }
}

/// A failed generation call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct GenerationError {
    pub kind: GenerationErrorKind,
    pub message: String,
}

impl GenerationError {
    pub fn new(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Returns true if the same request might succeed later.
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            GenerationErrorKind::Timeout | GenerationErrorKind::Network => true,
            GenerationErrorKind::Http { status } => status == 429 || status >= 500,
            _ => false,
        }
    }

    /// The marker-prefixed text shown to users.
    pub fn rendered(&self) -> String {
        format!("{ERROR_MARKER}: {}", self.message)
    }
}

impl fmt::Display for GenerationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http { status } => write!(f, "http {status}"),
            other => f.write_str(other.as_str()),
        }
    }
}
