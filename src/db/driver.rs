//! Pieces shared by the sqlx-backed stores.

use sqlx::query::Query;
use sqlx::{Column, Database, Encode, Type};

use super::Value;
use crate::error::AppError;

/// Binds one cell to the next `?` placeholder.
pub(super) fn bind_value<'q, DB>(
    query: Query<'q, DB, <DB as Database>::Arguments<'q>>,
    value: &Value,
) -> Query<'q, DB, <DB as Database>::Arguments<'q>>
where
    DB: Database,
    bool: Encode<'q, DB> + Type<DB>,
    i64: Encode<'q, DB> + Type<DB>,
    f64: Encode<'q, DB> + Type<DB>,
    String: Encode<'q, DB> + Type<DB>,
    Vec<u8>: Encode<'q, DB> + Type<DB>,
    Option<String>: Encode<'q, DB> + Type<DB>,
{
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::String(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
        Value::Interval { .. } => query.bind(value.to_display_string()),
    }
}

/// Flags the connection for closing on release when `error` means the link
/// itself may be unusable.
pub(super) fn track(broken: &mut bool, error: AppError) -> AppError {
    if matches!(error, AppError::Connection(_)) {
        *broken = true;
    }
    error
}

pub(super) fn column_names<C: Column>(columns: &[C]) -> Vec<String> {
    columns.iter().map(|c| c.name().to_string()).collect()
}
