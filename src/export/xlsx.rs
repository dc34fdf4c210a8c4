//! Single-sheet `.xlsx` rendering of a query result.

use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use serde_json::Value as Json;

use super::normalize_value;
use crate::db::QueryResult;
use crate::error::{AppError, Result};

/// Name of the only worksheet.
pub const SHEET_NAME: &str = "Query Results";

const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMNS: usize = 16_384;

/// Renders headers then rows, in their original order, into a workbook.
pub fn write_workbook(result: &QueryResult) -> Result<Vec<u8>> {
    // One row is taken by the header.
    if result.rows.len() >= MAX_ROWS {
        return Err(AppError::export(format!(
            "{} rows do not fit in one worksheet",
            result.rows.len()
        )));
    }
    if result.headers.len() > MAX_COLUMNS {
        return Err(AppError::export(format!(
            "{} columns do not fit in one worksheet",
            result.headers.len()
        )));
    }

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME).map_err(xlsx_error)?;

    let bold = Format::new().set_bold();
    for (col, header) in result.headers.iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, header, &bold)
            .map_err(xlsx_error)?;
    }

    for (index, row) in result.rows.iter().enumerate() {
        let row_num = (index + 1) as u32;
        for (col, value) in row.iter().enumerate() {
            write_cell(sheet, row_num, col as u16, &normalize_value(value))?;
        }
    }

    sheet.autofit();
    workbook.save_to_buffer().map_err(xlsx_error)
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, value: &Json) -> Result<()> {
    let written = match value {
        Json::Null => return Ok(()),
        Json::Bool(b) => sheet.write_boolean(row, col, *b),
        Json::Number(n) => match n.as_f64() {
            Some(f) => sheet.write_number(row, col, f),
            None => sheet.write_string(row, col, n.to_string()),
        },
        Json::String(s) => sheet.write_string(row, col, s),
        other => sheet.write_string(row, col, other.to_string()),
    };
    written.map(|_| ()).map_err(xlsx_error)
}

fn xlsx_error(e: XlsxError) -> AppError {
    AppError::export(format!("Failed to build spreadsheet: {e}"))
}
