//! Pipeline outcomes and the response envelope they render to.

use serde::{Deserialize, Serialize};

use crate::db::QueryResult;
use crate::export::normalize_row;
use crate::generator::GenerationError;

/// Header of the synthetic column carrying a generation failure.
pub const HEADER_GENERATION: &str = "AI Generation Error";
/// Header of the synthetic column carrying a safety rejection.
pub const HEADER_SECURITY: &str = "Security Error";
/// Header of the synthetic column carrying an execution failure.
pub const HEADER_EXECUTION: &str = "DB Execution Error";
/// Header of the synthetic column carrying a readiness failure.
pub const HEADER_CONNECTION: &str = "DB Connection Error";

/// What one pipeline invocation ended with. Exactly one per call.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Success { sql: String, result: QueryResult },
    GenerationError(GenerationError),
    SafetyRejected { sql: String, reason: String },
    ExecutionError { sql: String, message: String },
    NotReady { reason: String },
}

impl PipelineOutcome {
    /// Envelope status for this outcome.
    pub fn status(&self) -> Status {
        match self {
            Self::Success { .. } => Status::Success,
            Self::GenerationError(_) => Status::ApiError,
            Self::SafetyRejected { .. } => Status::SecurityError,
            Self::ExecutionError { .. } => Status::DbError,
            Self::NotReady { .. } => Status::DbNotReady,
        }
    }

    /// The generated statement, if generation got that far.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Success { sql, .. }
            | Self::SafetyRejected { sql, .. }
            | Self::ExecutionError { sql, .. } => Some(sql),
            Self::GenerationError(_) | Self::NotReady { .. } => None,
        }
    }
}

/// An outcome plus the aggregate-intent presentation hint.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    pub outcome: PipelineOutcome,
    pub aggregate_intent: bool,
}

impl PipelineReport {
    pub fn status(&self) -> Status {
        self.outcome.status()
    }

    /// Renders the report for transport.
    ///
    /// The generated SQL is only disclosed when the aggregate hint is set.
    pub fn into_envelope(self, provider_name: &str) -> ResponseEnvelope {
        let aggregate = self.aggregate_intent;
        let disclosed = move |sql: String| aggregate.then_some(sql);

        match self.outcome {
            PipelineOutcome::Success { sql, result } => {
                ResponseEnvelope::success(disclosed(sql), &result, provider_name)
            }
            PipelineOutcome::GenerationError(err) => ResponseEnvelope::failure(
                Status::ApiError,
                None,
                HEADER_GENERATION,
                err.rendered(),
                provider_name,
            ),
            PipelineOutcome::SafetyRejected { sql, reason } => ResponseEnvelope::failure(
                Status::SecurityError,
                disclosed(sql),
                HEADER_SECURITY,
                format!("Generated SQL was rejected: {reason}"),
                provider_name,
            ),
            PipelineOutcome::ExecutionError { sql, message } => ResponseEnvelope::failure(
                Status::DbError,
                disclosed(sql),
                HEADER_EXECUTION,
                format!("Execution Failed: {message}"),
                provider_name,
            ),
            PipelineOutcome::NotReady { reason } => ResponseEnvelope::failure(
                Status::DbNotReady,
                None,
                HEADER_CONNECTION,
                reason,
                provider_name,
            ),
        }
    }
}

/// Envelope status tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Success,
    ApiError,
    SecurityError,
    DbError,
    DbNotReady,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::ApiError => "API_ERROR",
            Self::SecurityError => "SECURITY_ERROR",
            Self::DbError => "DB_ERROR",
            Self::DbNotReady => "DB_NOT_READY",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform response returned for every question, whatever stage failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_sql: Option<String>,
    pub headers: Vec<String>,
    pub results: Vec<Vec<serde_json::Value>>,
    pub provider_name: String,
}

impl ResponseEnvelope {
    /// A successful envelope carrying the transport-normalized rows.
    pub fn success(generated_sql: Option<String>, result: &QueryResult, provider_name: &str) -> Self {
        Self {
            status: Status::Success,
            generated_sql,
            headers: result.headers.clone(),
            results: result.rows.iter().map(|row| normalize_row(row)).collect(),
            provider_name: provider_name.to_string(),
        }
    }

    /// A failure envelope: one synthetic column, one row, holding `message`.
    pub fn failure(
        status: Status,
        generated_sql: Option<String>,
        header: &str,
        message: impl Into<String>,
        provider_name: &str,
    ) -> Self {
        Self {
            status,
            generated_sql,
            headers: vec![header.to_string()],
            results: vec![vec![serde_json::Value::String(message.into())]],
            provider_name: provider_name.to_string(),
        }
    }

    /// The message of a failure envelope.
    pub fn error_message(&self) -> Option<&str> {
        if self.status == Status::Success {
            return None;
        }
        self.results.first()?.first()?.as_str()
    }
}
