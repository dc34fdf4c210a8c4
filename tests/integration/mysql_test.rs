//! MySQL store tests.
//!
//! Set MYSQL_TEST_URL (e.g. `mysql://root:pw@localhost:3306/dsr_test`) to run them.

use dsr_query::config::StoreConfig;
use dsr_query::db::{ExecutionGateway, Value, MULTIPLE_STATEMENTS_MESSAGE};
use pretty_assertions::assert_eq;

use super::common::record;

async fn get_test_gateway() -> Option<ExecutionGateway> {
    let url = std::env::var("MYSQL_TEST_URL").ok()?;
    let config = StoreConfig::from_connection_string(&url).ok()?;
    let gateway = ExecutionGateway::open(&config).await.ok()?;
    gateway.is_ready().then_some(gateway)
}

fn unique_station() -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("test-station-{nanos}")
}

#[tokio::test]
async fn test_insert_and_aggregate() {
    let Some(gateway) = get_test_gateway().await else {
        eprintln!("Skipping test: MYSQL_TEST_URL not set");
        return;
    };

    let station = unique_station();
    let rows = vec![
        record(&station, "Fire related", 2020),
        record(&station, "Fire related", 2020),
        record(&station, "Rescue", 2021),
    ];
    assert_eq!(gateway.insert_records(&rows).await.unwrap(), 3);

    let result = gateway
        .execute(&format!(
            "SELECT COUNT(*) AS total, MAX(date_and_time) AS latest FROM dsr_table \
             WHERE station_name = '{station}' AND numerical_year = 2020"
        ))
        .await
        .unwrap();

    assert_eq!(result.headers, vec!["total", "latest"]);
    assert_eq!(result.rows[0][0], Value::Int(2));
    assert_eq!(result.rows[0][1], Value::from("2020-03-14 10:30:00"));
    gateway.close().await;
}

#[tokio::test]
async fn test_empty_result_keeps_headers() {
    let Some(gateway) = get_test_gateway().await else {
        eprintln!("Skipping test: MYSQL_TEST_URL not set");
        return;
    };

    let result = gateway
        .execute("SELECT station_name, zone FROM dsr_table WHERE 1 = 0")
        .await
        .unwrap();
    assert_eq!(result.headers, vec!["station_name", "zone"]);
    assert_eq!(result.row_count(), 0);
    gateway.close().await;
}

#[tokio::test]
async fn test_chained_delete_is_refused() {
    let Some(gateway) = get_test_gateway().await else {
        eprintln!("Skipping test: MYSQL_TEST_URL not set");
        return;
    };

    let station = unique_station();
    gateway
        .insert_records(&[record(&station, "Fire related", 2020)])
        .await
        .unwrap();

    let err = gateway
        .execute(&format!(
            "SELECT 1; DELETE FROM dsr_table WHERE station_name = '{station}'"
        ))
        .await
        .unwrap_err();
    assert_eq!(err.detail(), MULTIPLE_STATEMENTS_MESSAGE);

    let remaining = gateway
        .execute(&format!(
            "SELECT COUNT(*) FROM dsr_table WHERE station_name = '{station}'"
        ))
        .await
        .unwrap();
    assert_eq!(remaining.rows[0][0], Value::Int(1));
    gateway.close().await;
}

#[tokio::test]
async fn test_missing_table_error_text() {
    let Some(gateway) = get_test_gateway().await else {
        eprintln!("Skipping test: MYSQL_TEST_URL not set");
        return;
    };

    let err = gateway
        .execute("SELECT * FROM no_such_table_here")
        .await
        .unwrap_err();
    assert!(err.detail().starts_with("1146 (42S02):"), "{}", err.detail());
    gateway.close().await;
}
