//! End-to-end question answering with a scripted generator.

use std::sync::Arc;
use std::time::Duration;

use dsr_query::db::{
    ExecutionGateway, MockStore, Value, MULTIPLE_STATEMENTS_MESSAGE, NOT_READY_MESSAGE,
};
use dsr_query::generator::{
    ActiveGenerator, GenerationErrorKind, MockSqlGenerator, PROVIDER_KEY_MISSING,
};
use dsr_query::pipeline::{
    Pipeline, PipelineOutcome, Status, HEADER_CONNECTION, HEADER_EXECUTION, HEADER_GENERATION,
    HEADER_SECURITY,
};
use dsr_query::safety::READ_ONLY_REASON;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::tempdir;

use super::common::{sample_records, sqlite_gateway};

const FIRES_2020: &str = "SELECT COUNT(*) AS total_fires FROM dsr_table \
                          WHERE call_category = 'Fire related' AND numerical_year = 2020";

fn scripted(generator: MockSqlGenerator) -> ActiveGenerator {
    ActiveGenerator::new(Arc::new(generator), "Scripted")
}

async fn mock_pipeline(store: MockStore, generator: MockSqlGenerator) -> Pipeline {
    let gateway = ExecutionGateway::with_store(Arc::new(store), Duration::from_secs(5)).await;
    Pipeline::new(gateway, scripted(generator))
}

#[tokio::test]
async fn test_aggregate_question_over_sqlite() {
    let dir = tempdir().unwrap();
    let (gateway, _pool) = sqlite_gateway(&dir).await;
    gateway.insert_records(&sample_records()).await.unwrap();

    let generator = MockSqlGenerator::new().with_response("fires in 2020", FIRES_2020);
    let pipeline = Pipeline::new(gateway, scripted(generator));

    let envelope = pipeline.answer("total number of fires in 2020").await;

    assert_eq!(envelope.status, Status::Success);
    assert_eq!(envelope.generated_sql.as_deref(), Some(FIRES_2020));
    assert_eq!(envelope.headers, vec!["total_fires"]);
    assert_eq!(envelope.results, vec![vec![json!(2)]]);
    assert_eq!(envelope.provider_name, "Scripted");
}

#[tokio::test]
async fn test_listing_question_hides_generated_sql() {
    let dir = tempdir().unwrap();
    let (gateway, _pool) = sqlite_gateway(&dir).await;
    gateway.insert_records(&sample_records()).await.unwrap();

    let generator = MockSqlGenerator::returning(
        "SELECT station_name FROM dsr_table WHERE numerical_year = 2021",
    );
    let pipeline = Pipeline::new(gateway, scripted(generator));

    let envelope = pipeline.answer("list stations in 2021").await;
    assert_eq!(envelope.status, Status::Success);
    assert_eq!(envelope.generated_sql, None);
    assert_eq!(envelope.results, vec![vec![json!("Vasco")]]);

    let body = serde_json::to_value(&envelope).unwrap();
    assert!(body.get("generated_sql").is_none());
}

#[tokio::test]
async fn test_empty_result_keeps_headers() {
    let dir = tempdir().unwrap();
    let (gateway, _pool) = sqlite_gateway(&dir).await;

    let generator = MockSqlGenerator::returning("SELECT station_name, zone FROM dsr_table");
    let pipeline = Pipeline::new(gateway, scripted(generator));

    let envelope = pipeline.answer("show stations").await;
    assert_eq!(envelope.status, Status::Success);
    assert_eq!(envelope.headers, vec!["station_name", "zone"]);
    assert!(envelope.results.is_empty());
}

#[tokio::test]
async fn test_generation_failure_skips_the_store() {
    let (store, handle) = MockStore::new().into_parts();
    let generator = MockSqlGenerator::failing(
        GenerationErrorKind::Authentication,
        "SQLAI Authentication Failed (401). Check your API Key's validity and subscription status.",
    );
    let pipeline = mock_pipeline(store, generator).await;

    let envelope = pipeline.answer("total number of fires in 2020").await;

    assert_eq!(envelope.status, Status::ApiError);
    assert_eq!(envelope.headers, vec![HEADER_GENERATION]);
    assert_eq!(
        envelope.error_message(),
        Some("ERROR: SQLAI Authentication Failed (401). Check your API Key's validity and subscription status.")
    );
    assert_eq!(handle.fetches(), 0);
}

#[tokio::test]
async fn test_write_statement_is_rejected_before_execution() {
    let (store, handle) = MockStore::new().into_parts();
    let pipeline = mock_pipeline(store, MockSqlGenerator::returning("DELETE FROM dsr_table")).await;

    let report = pipeline.run("remove everything").await;
    match &report.outcome {
        PipelineOutcome::SafetyRejected { sql, reason } => {
            assert_eq!(sql, "DELETE FROM dsr_table");
            assert_eq!(reason, READ_ONLY_REASON);
        }
        other => panic!("Expected a safety rejection, got {other:?}"),
    }

    let envelope = report.into_envelope("Scripted");
    assert_eq!(envelope.status, Status::SecurityError);
    assert_eq!(envelope.headers, vec![HEADER_SECURITY]);
    assert_eq!(
        envelope.error_message(),
        Some("Generated SQL was rejected: only read statements permitted")
    );
    assert_eq!(handle.fetches(), 0);
    assert_eq!(handle.checkouts(), 0);
}

#[tokio::test]
async fn test_not_ready_store_skips_the_generator() {
    let generator = MockSqlGenerator::new();
    let calls = generator.call_counter();
    let pipeline = mock_pipeline(MockStore::new().unreachable(), generator).await;

    let envelope = pipeline.answer("how many fires").await;

    assert_eq!(envelope.status, Status::DbNotReady);
    assert_eq!(envelope.headers, vec![HEADER_CONNECTION]);
    assert_eq!(envelope.error_message(), Some(NOT_READY_MESSAGE));
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_execution_error_carries_store_text() {
    let store = MockStore::new().with_error("1054 (42S22): Unknown column 'fires' in 'field list'");
    let pipeline = mock_pipeline(store, MockSqlGenerator::returning("SELECT fires FROM dsr_table")).await;

    let envelope = pipeline.answer("count fires").await;

    assert_eq!(envelope.status, Status::DbError);
    assert_eq!(envelope.headers, vec![HEADER_EXECUTION]);
    assert_eq!(
        envelope.error_message(),
        Some("Execution Failed: 1054 (42S22): Unknown column 'fires' in 'field list'")
    );
    assert_eq!(envelope.generated_sql.as_deref(), Some("SELECT fires FROM dsr_table"));
}

#[tokio::test]
async fn test_chained_delete_is_not_executed() {
    let dir = tempdir().unwrap();
    let (gateway, _pool) = sqlite_gateway(&dir).await;
    gateway.insert_records(&sample_records()).await.unwrap();

    let generator =
        MockSqlGenerator::returning("SELECT COUNT(*) FROM dsr_table; DELETE FROM dsr_table");
    let pipeline = Pipeline::new(gateway, scripted(generator));

    let envelope = pipeline.answer("how many calls").await;
    assert_eq!(envelope.status, Status::DbError);
    assert_eq!(envelope.headers, vec![HEADER_EXECUTION]);
    assert_eq!(
        envelope.error_message(),
        Some(format!("Execution Failed: {MULTIPLE_STATEMENTS_MESSAGE}").as_str())
    );

    let remaining = pipeline
        .gateway()
        .execute("SELECT COUNT(*) FROM dsr_table")
        .await
        .unwrap();
    assert_eq!(remaining.rows[0][0], Value::Int(5));
}

#[tokio::test]
async fn test_diagnostic_over_sqlite() {
    let dir = tempdir().unwrap();
    let (gateway, _pool) = sqlite_gateway(&dir).await;
    gateway.insert_records(&sample_records()).await.unwrap();

    let generator = MockSqlGenerator::new();
    let calls = generator.call_counter();
    let pipeline = Pipeline::new(gateway, scripted(generator));

    let envelope = pipeline.diagnostic().await;
    assert_eq!(envelope.status, Status::Success);
    assert_eq!(
        envelope.generated_sql.as_deref(),
        Some("SELECT * FROM dsr_table LIMIT 50")
    );
    assert_eq!(envelope.results.len(), 5);
    assert_eq!(envelope.headers.len(), 42);
    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_bootstrap_without_key_uses_fallback() {
    let dir = tempdir().unwrap();
    let mut config = dsr_query::config::Config::default();
    config.database = super::common::sqlite_config(&dir, "boot.db");
    config.generator.api_key = None;

    let pipeline = dsr_query::pipeline::bootstrap(&config).await.unwrap();
    assert!(pipeline.gateway().is_ready());
    assert_eq!(pipeline.provider_name(), PROVIDER_KEY_MISSING);

    let envelope = pipeline.answer("total number of fires in 2020").await;
    assert_eq!(envelope.status, Status::ApiError);
    assert!(envelope
        .error_message()
        .unwrap()
        .starts_with("ERROR: SQLAI API key not found/invalid."));
    pipeline.shutdown().await;
}
