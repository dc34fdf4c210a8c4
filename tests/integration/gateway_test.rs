//! Execution gateway tests against a temporary SQLite store.

use dsr_query::db::schema::insert_sql;
use dsr_query::db::{ExecutionGateway, Value, MULTIPLE_STATEMENTS_MESSAGE, NO_RESULT_SET};
use dsr_query::error::AppError;
use pretty_assertions::assert_eq;
use tempfile::tempdir;

use super::common::{record, sample_records, sqlite_config, sqlite_gateway};

async fn count_rows(gateway: &ExecutionGateway, sql: &str) -> i64 {
    let result = gateway.execute(sql).await.unwrap();
    match result.rows[0][0] {
        Value::Int(n) => n,
        ref other => panic!("Expected an integer count, got {other:?}"),
    }
}

#[tokio::test]
async fn test_open_creates_table_and_is_ready() {
    let dir = tempdir().unwrap();
    let gateway = ExecutionGateway::open(&sqlite_config(&dir, "open.db"))
        .await
        .unwrap();

    assert!(gateway.is_ready());
    assert!(dir.path().join("open.db").exists());
    assert_eq!(count_rows(&gateway, "SELECT COUNT(*) FROM dsr_table").await, 0);
    gateway.close().await;
}

#[tokio::test]
async fn test_ensure_table_is_idempotent() {
    let dir = tempdir().unwrap();
    let (gateway, _pool) = sqlite_gateway(&dir).await;

    gateway.insert_records(&sample_records()).await.unwrap();
    let before = gateway.execute("PRAGMA table_info(dsr_table)").await.unwrap();
    assert_eq!(before.row_count(), 42);

    gateway.ensure_table().await.unwrap();
    gateway.ensure_table().await.unwrap();

    let after = gateway.execute("PRAGMA table_info(dsr_table)").await.unwrap();
    assert_eq!(after.headers, before.headers);
    assert_eq!(after.rows, before.rows);
    assert_eq!(count_rows(&gateway, "SELECT COUNT(*) FROM dsr_table").await, 5);
}

#[tokio::test]
async fn test_unopenable_store_is_not_ready() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("missing").join("nested").join("dsr.db");
    let config = dsr_query::config::StoreConfig::from_connection_string(&format!(
        "sqlite://{}",
        path.display()
    ))
    .unwrap();

    let gateway = ExecutionGateway::open(&config).await.unwrap();
    assert!(!gateway.is_ready());
}

#[tokio::test]
async fn test_insert_records_round_trip() {
    let dir = tempdir().unwrap();
    let (gateway, _pool) = sqlite_gateway(&dir).await;

    let inserted = gateway.insert_records(&sample_records()).await.unwrap();
    assert_eq!(inserted, 5);

    let result = gateway
        .execute(
            "SELECT station_name, numerical_year FROM dsr_table \
             WHERE call_category = 'Fire related' ORDER BY numerical_year, station_name",
        )
        .await
        .unwrap();

    assert_eq!(result.headers, vec!["station_name", "numerical_year"]);
    assert_eq!(
        result.rows,
        vec![
            vec![Value::from("Mapusa"), Value::Int(2019)],
            vec![Value::from("Margao"), Value::Int(2020)],
            vec![Value::from("Panaji"), Value::Int(2020)],
            vec![Value::from("Vasco"), Value::Int(2021)],
        ]
    );
}

#[tokio::test]
async fn test_insert_batch_chunk_sizes() {
    let rows = sample_records();

    // Smaller than the batch, an exact divisor, and larger than the batch.
    for chunk_size in [2, 5, 100] {
        let dir = tempdir().unwrap();
        let (gateway, _pool) = sqlite_gateway(&dir).await;

        let inserted = gateway
            .insert_batch(&insert_sql(), &rows, chunk_size)
            .await
            .unwrap();
        assert_eq!(inserted, 5, "chunk size {chunk_size}");

        let stored = gateway
            .execute("SELECT * FROM dsr_table ORDER BY rowid")
            .await
            .unwrap();
        assert_eq!(stored.rows, rows, "chunk size {chunk_size}");
        gateway.close().await;
    }
}

#[tokio::test]
async fn test_insert_batch_keeps_committed_chunks_on_failure() {
    let dir = tempdir().unwrap();
    let (gateway, pool) = sqlite_gateway(&dir).await;

    sqlx::query("CREATE TABLE strict_rows (id INTEGER NOT NULL, label TEXT NOT NULL)")
        .execute(&pool)
        .await
        .unwrap();

    let rows: Vec<_> = (0..7)
        .map(|i| {
            let label = if i == 4 {
                Value::Null
            } else {
                Value::from(format!("row-{i}"))
            };
            vec![Value::Int(i), label]
        })
        .collect();

    let err = gateway
        .insert_batch("INSERT INTO strict_rows (id, label) VALUES (?, ?)", &rows, 2)
        .await
        .unwrap_err();

    match err {
        AppError::BatchInsert { committed, source } => {
            assert_eq!(committed, 4);
            assert!(source.to_string().contains("NOT NULL"), "{source}");
        }
        other => panic!("Expected BatchInsert, got {other:?}"),
    }

    assert_eq!(count_rows(&gateway, "SELECT COUNT(*) FROM strict_rows").await, 4);
    assert_eq!(
        count_rows(&gateway, "SELECT MAX(id) FROM strict_rows").await,
        3
    );
}

#[tokio::test]
async fn test_chained_statements_are_refused() {
    let dir = tempdir().unwrap();
    let (gateway, _pool) = sqlite_gateway(&dir).await;
    gateway.insert_records(&sample_records()).await.unwrap();

    for sql in [
        "SELECT 1; DELETE FROM dsr_table",
        "SELECT COUNT(*) FROM dsr_table;\nDELETE FROM dsr_table;",
    ] {
        let err = gateway.execute(sql).await.unwrap_err();
        assert!(matches!(err, AppError::Execution(_)), "{sql}");
        assert_eq!(err.detail(), MULTIPLE_STATEMENTS_MESSAGE);
    }

    assert_eq!(count_rows(&gateway, "SELECT COUNT(*) FROM dsr_table").await, 5);
    assert_eq!(count_rows(&gateway, "SELECT COUNT(*) FROM dsr_table;").await, 5);
}

#[tokio::test]
async fn test_statement_without_result_set_fails() {
    let dir = tempdir().unwrap();
    let (gateway, _pool) = sqlite_gateway(&dir).await;

    let err = gateway
        .execute("UPDATE dsr_table SET zone = 'x'")
        .await
        .unwrap_err();
    assert_eq!(err.detail(), NO_RESULT_SET);
}

#[tokio::test]
async fn test_store_error_text_is_preserved() {
    let dir = tempdir().unwrap();
    let (gateway, _pool) = sqlite_gateway(&dir).await;

    let err = gateway
        .execute("SELECT no_such_column FROM dsr_table")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Execution(_)));
    assert!(err.detail().contains("no_such_column"), "{}", err.detail());
}

#[tokio::test]
async fn test_sessions_run_concurrently() {
    let dir = tempdir().unwrap();
    let (gateway, _pool) = sqlite_gateway(&dir).await;
    gateway.insert_records(&sample_records()).await.unwrap();

    let sql = "SELECT COUNT(*) FROM dsr_table";
    let (a, b, c) = tokio::join!(gateway.execute(sql), gateway.execute(sql), gateway.execute(sql));

    for result in [a, b, c] {
        assert_eq!(result.unwrap().rows[0][0], Value::Int(5));
    }
}

#[tokio::test]
async fn test_single_record_columns_align_with_schema() {
    let dir = tempdir().unwrap();
    let (gateway, _pool) = sqlite_gateway(&dir).await;
    gateway
        .insert_records(&[record("Ponda", "Rescue", 2022)])
        .await
        .unwrap();

    let result = gateway
        .execute("SELECT * FROM dsr_table LIMIT 50")
        .await
        .unwrap();
    assert_eq!(
        result.headers,
        dsr_query::db::schema::column_names()
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>()
    );
    assert_eq!(result.row_count(), 1);
}
