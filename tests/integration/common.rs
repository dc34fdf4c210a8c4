//! Shared fixtures for the integration tests.

use std::io::{Cursor, Read};
use std::sync::Arc;
use std::time::Duration;

use dsr_query::config::StoreConfig;
use dsr_query::db::schema::{ColumnKind, COLUMNS};
use dsr_query::db::{ExecutionGateway, Row, SqliteStore, Value};
use regex::Regex;
use tempfile::TempDir;

/// A store config pointing at `name` inside `dir`.
pub fn sqlite_config(dir: &TempDir, name: &str) -> StoreConfig {
    let path = dir.path().join(name);
    StoreConfig::from_connection_string(&format!("sqlite://{}", path.display())).unwrap()
}

/// Opens a gateway over a fresh SQLite file; also returns the raw pool.
pub async fn sqlite_gateway(dir: &TempDir) -> (ExecutionGateway, sqlx::SqlitePool) {
    let store = SqliteStore::connect_lazy(&sqlite_config(dir, "dsr.db")).unwrap();
    let pool = store.pool().clone();
    let gateway = ExecutionGateway::with_store(Arc::new(store), Duration::from_secs(5)).await;
    (gateway, pool)
}

/// A full `dsr_table` row. Only a handful of columns carry data.
pub fn record(station: &str, category: &str, year: i64) -> Row {
    COLUMNS
        .iter()
        .map(|c| match (c.name, c.kind) {
            ("station_name", _) => Value::from(station),
            ("call_category", _) => Value::from(category),
            ("zone", _) => Value::from("1. North Zone"),
            ("numerical_year", _) => Value::Int(year),
            (_, ColumnKind::DateTime) => Value::from(format!("{year}-03-14 10:30:00")),
            _ => Value::Null,
        })
        .collect()
}

/// Rows used by the question-answering scenarios.
pub fn sample_records() -> Vec<Row> {
    vec![
        record("Panaji", "Fire related", 2020),
        record("Margao", "Fire related", 2020),
        record("Panaji", "Rescue", 2020),
        record("Vasco", "Fire related", 2021),
        record("Mapusa", "Fire related", 2019),
    ]
}

fn zip_entry(archive: &mut zip::ZipArchive<Cursor<&[u8]>>, name: &str) -> String {
    let mut text = String::new();
    archive
        .by_name(name)
        .unwrap()
        .read_to_string(&mut text)
        .unwrap();
    text
}

fn column_index(letters: &str) -> usize {
    letters
        .bytes()
        .fold(0, |acc, b| acc * 26 + usize::from(b - b'A') + 1)
        - 1
}

/// Reads the first worksheet of an `.xlsx` workbook back into a grid of
/// cell texts, resolving shared strings. Blank cells read as "".
pub fn read_first_sheet(bytes: &[u8]) -> Vec<Vec<String>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();

    let shared_xml = zip_entry(&mut archive, "xl/sharedStrings.xml");
    let shared: Vec<String> = Regex::new(r"<si><t[^>]*>([^<]*)</t></si>")
        .unwrap()
        .captures_iter(&shared_xml)
        .map(|c| c[1].to_string())
        .collect();

    let sheet_xml = zip_entry(&mut archive, "xl/worksheets/sheet1.xml");
    let cell = Regex::new(r#"<c r="([A-Z]+)(\d+)"([^>]*?)(?:/>|>(?:<v>([^<]*)</v>)?</c>)"#).unwrap();

    let mut grid: Vec<Vec<String>> = Vec::new();
    for c in cell.captures_iter(&sheet_xml) {
        let col = column_index(&c[1]);
        let row: usize = c[2].parse::<usize>().unwrap() - 1;
        let raw = c.get(4).map_or("", |m| m.as_str());
        let text = if c[3].contains(r#"t="s""#) {
            shared[raw.parse::<usize>().unwrap()].clone()
        } else {
            raw.to_string()
        };

        if grid.len() <= row {
            grid.resize(row + 1, Vec::new());
        }
        if grid[row].len() <= col {
            grid[row].resize(col + 1, String::new());
        }
        grid[row][col] = text;
    }
    grid
}
