//! Question answering: generate, validate, execute.
//!
//! Stages run strictly in order and stop at the first failure; every exit
//! folds into one [`PipelineOutcome`].

mod outcome;

pub use outcome::{
    PipelineOutcome, PipelineReport, ResponseEnvelope, Status, HEADER_CONNECTION,
    HEADER_EXECUTION, HEADER_GENERATION, HEADER_SECURITY,
};

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::db::schema::{self, DIAGNOSTIC_QUERY};
use crate::db::{ExecutionGateway, NOT_READY_MESSAGE};
use crate::error::Result;
use crate::export::{self, ExportPayload};
use crate::generator::{
    create_generator, ActiveGenerator, GenerationError, GenerationErrorKind,
};
use crate::safety::{self, Classification, READ_ONLY_REASON};

/// Wires the gateway and the generator together for one process.
pub struct Pipeline {
    gateway: ExecutionGateway,
    generator: ActiveGenerator,
    schema: String,
    generation_timeout: Duration,
}

/// Builds the process context in dependency order: gateway (table bootstrap
/// and readiness probe), then generator (with fallback), then pipeline.
pub async fn bootstrap(config: &Config) -> Result<Pipeline> {
    let gateway = ExecutionGateway::open(&config.database).await?;
    let generator = create_generator(&config.generator);
    info!(
        ready = gateway.is_ready(),
        provider = %generator.provider_name,
        "Pipeline ready"
    );
    Ok(Pipeline::new(gateway, generator)
        .with_generation_timeout(Duration::from_secs(config.generator.timeout_secs)))
}

impl Pipeline {
    pub fn new(gateway: ExecutionGateway, generator: ActiveGenerator) -> Self {
        Self {
            gateway,
            generator,
            schema: schema::schema_description(),
            generation_timeout: Duration::from_secs(crate::config::DEFAULT_GENERATOR_TIMEOUT_SECS),
        }
    }

    /// Replaces the schema description sent to the generator.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    /// Sets the ceiling for one generation call.
    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    pub fn gateway(&self) -> &ExecutionGateway {
        &self.gateway
    }

    /// Display label of the active generator.
    pub fn provider_name(&self) -> &str {
        &self.generator.provider_name
    }

    /// Answers one question.
    pub async fn run(&self, question: &str) -> PipelineReport {
        let question_hint = safety::question_has_aggregate_intent(question);

        if !self.gateway.is_ready() {
            warn!("Store not ready; skipping generation");
            return PipelineReport {
                outcome: PipelineOutcome::NotReady {
                    reason: NOT_READY_MESSAGE.to_string(),
                },
                aggregate_intent: question_hint,
            };
        }

        let sql = match self.generate(question).await {
            Ok(sql) => sql,
            Err(err) => {
                return PipelineReport {
                    outcome: PipelineOutcome::GenerationError(err),
                    aggregate_intent: question_hint,
                }
            }
        };

        let classification = Classification::of(&sql);
        let aggregate_intent = classification.aggregate || question_hint;
        debug!(%classification, question_hint, "Classified generated SQL");

        if !classification.safe {
            warn!(sql = %sql, "Rejected generated SQL");
            return PipelineReport {
                outcome: PipelineOutcome::SafetyRejected {
                    sql,
                    reason: READ_ONLY_REASON.to_string(),
                },
                aggregate_intent,
            };
        }

        let outcome = match self.gateway.execute(&sql).await {
            Ok(result) => {
                info!(
                    rows = result.row_count(),
                    columns = result.headers.len(),
                    elapsed_ms = result.execution_time.as_millis() as u64,
                    "Query answered"
                );
                PipelineOutcome::Success { sql, result }
            }
            Err(e) => {
                warn!(category = e.category(), "Execution failed: {}", e);
                PipelineOutcome::ExecutionError {
                    sql,
                    message: e.detail(),
                }
            }
        };

        PipelineReport {
            outcome,
            aggregate_intent,
        }
    }

    /// Answers one question and renders the envelope.
    pub async fn answer(&self, question: &str) -> ResponseEnvelope {
        self.run(question).await.into_envelope(self.provider_name())
    }

    /// Runs the fixed diagnostic query straight through the gateway.
    pub async fn diagnostic(&self) -> ResponseEnvelope {
        let sql = Some(DIAGNOSTIC_QUERY.to_string());
        let provider = self.provider_name();

        if !self.gateway.is_ready() {
            return ResponseEnvelope::failure(
                Status::DbNotReady,
                sql,
                HEADER_CONNECTION,
                NOT_READY_MESSAGE,
                provider,
            );
        }

        match self.gateway.execute(DIAGNOSTIC_QUERY).await {
            Ok(result) => ResponseEnvelope::success(sql, &result, provider),
            Err(e) => ResponseEnvelope::failure(
                Status::DbError,
                sql,
                HEADER_EXECUTION,
                format!("TEST FAILED: {}: {}", e.category(), e.detail()),
                provider,
            ),
        }
    }

    /// Re-validates client-supplied SQL and renders its result as `.xlsx`.
    pub async fn export(&self, sql: &str) -> Result<ExportPayload> {
        export::export_query(&self.gateway, sql).await
    }

    /// Closes the store.
    pub async fn shutdown(&self) {
        self.gateway.close().await;
    }

    async fn generate(&self, question: &str) -> std::result::Result<String, GenerationError> {
        let start = Instant::now();
        let call = self.generator.generator.generate(question, &self.schema);

        let result = match tokio::time::timeout(self.generation_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::new(
                GenerationErrorKind::Timeout,
                format!(
                    "SQL generation timed out after {} seconds",
                    self.generation_timeout.as_secs()
                ),
            )),
        };

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => info!(elapsed_ms, "SQL generated"),
            Err(e) => warn!(elapsed_ms, kind = %e.kind, retryable = e.is_retryable(), "SQL generation failed: {}", e),
        }
        result
    }
}
