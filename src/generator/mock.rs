//! Scripted generator for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::{GenerationError, GenerationErrorKind, GenerationResult, SqlGenerator};

/// Returns canned SQL (or a canned error) and counts how often it was asked.
///
/// Responses are matched by case-insensitive substring of the question; the
/// first matching pattern wins, otherwise the default response is used.
#[derive(Debug, Clone)]
pub struct MockSqlGenerator {
    responses: Vec<(String, GenerationResult)>,
    default: GenerationResult,
    calls: Arc<AtomicUsize>,
}

impl MockSqlGenerator {
    /// Answers every question with `SELECT * FROM dsr_table LIMIT 10`.
    pub fn new() -> Self {
        Self::returning("SELECT * FROM dsr_table LIMIT 10")
    }

    /// Answers every question with `sql`.
    pub fn returning(sql: impl Into<String>) -> Self {
        Self {
            responses: Vec::new(),
            default: Ok(sql.into()),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fails every question with the given error.
    pub fn failing(kind: GenerationErrorKind, message: impl Into<String>) -> Self {
        Self {
            responses: Vec::new(),
            default: Err(GenerationError::new(kind, message)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Answers questions containing `pattern` with `sql`.
    pub fn with_response(mut self, pattern: impl Into<String>, sql: impl Into<String>) -> Self {
        self.responses
            .push((pattern.into().to_lowercase(), Ok(sql.into())));
        self
    }

    /// Number of `generate` calls so far, across clones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Shared call counter, for when the generator itself is moved away.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl Default for MockSqlGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SqlGenerator for MockSqlGenerator {
    async fn generate(&self, question: &str, _schema: &str) -> GenerationResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let question = question.to_lowercase();
        self.responses
            .iter()
            .find(|(pattern, _)| question.contains(pattern.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.default.clone())
    }
}
