//! Result serialization and spreadsheet export.

mod transport;
mod xlsx;

pub use transport::{normalize_row, normalize_value};
pub use xlsx::{write_workbook, SHEET_NAME};

use serde::Serialize;
use tracing::{info, warn};

use crate::db::{ExecutionGateway, NOT_READY_MESSAGE};
use crate::error::{AppError, Result};
use crate::safety::{is_safe_read_statement, READ_ONLY_REASON};

/// Content type of the exported workbook.
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Suggested download name of the exported workbook.
pub const EXPORT_FILENAME: &str = "query_results.xlsx";

/// A rendered spreadsheet ready to hand to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportPayload {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub filename: &'static str,
}

impl ExportPayload {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: XLSX_CONTENT_TYPE,
            filename: EXPORT_FILENAME,
        }
    }
}

/// Re-validates `sql`, runs it and renders the result as `.xlsx`.
pub async fn export_query(gateway: &ExecutionGateway, sql: &str) -> Result<ExportPayload> {
    if sql.trim().is_empty() {
        return Err(AppError::export("No SQL query provided for export."));
    }
    if !is_safe_read_statement(sql) {
        warn!(sql = %sql, "Rejected export SQL");
        return Err(AppError::safety(READ_ONLY_REASON));
    }
    if !gateway.is_ready() {
        return Err(AppError::not_ready(NOT_READY_MESSAGE));
    }

    let result = gateway.execute(sql).await?;
    let bytes = write_workbook(&result)?;
    info!(rows = result.row_count(), bytes = bytes.len(), "Export rendered");
    Ok(ExportPayload::new(bytes))
}
