//! Forward-only cursor over `rusqlite` rows.

use chrono::NaiveDate;
use rusqlite::types::ValueRef;
use rusqlite::Rows;

use crate::export::{ExportResult, Row, RowCursor, Value};
use crate::planner::OutputColumn;
use crate::schema::ColumnType;

use super::EngineError;

/// Converts SQLite storage classes into [`Value`]s of the plan's column
/// types. Dropping the cursor resets the underlying statement.
pub struct SqliteCursor<'stmt> {
    rows: Rows<'stmt>,
    columns: &'stmt [OutputColumn],
}

impl<'stmt> SqliteCursor<'stmt> {
    pub fn new(rows: Rows<'stmt>, columns: &'stmt [OutputColumn]) -> Self {
        Self { rows, columns }
    }
}

impl RowCursor for SqliteCursor<'_> {
    fn next_row(&mut self) -> ExportResult<Option<Row>> {
        let Some(row) = self.rows.next().map_err(EngineError::from)? else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(self.columns.len());
        for (i, column) in self.columns.iter().enumerate() {
            let raw = row.get_ref(i).map_err(EngineError::from)?;
            values.push(convert(raw, column)?);
        }
        Ok(Some(values))
    }
}

fn convert(raw: ValueRef<'_>, column: &OutputColumn) -> Result<Value, EngineError> {
    let value = match raw {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(n) => match column.column_type {
            ColumnType::Bool => Value::Bool(n != 0),
            ColumnType::Float => Value::Float(n as f64),
            ColumnType::Text => Value::Text(n.to_string()),
            _ => Value::Int(n),
        },
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => {
            let text = std::str::from_utf8(bytes).map_err(|e| EngineError::Decode {
                column: column.name.clone(),
                reason: e.to_string(),
            })?;
            match column.column_type {
                ColumnType::Date => Value::Date(parse_date(text).ok_or_else(|| EngineError::Decode {
                    column: column.name.clone(),
                    reason: format!("`{text}` is not an ISO date"),
                })?),
                _ => Value::Text(text.to_string()),
            }
        }
        ValueRef::Blob(bytes) => Value::Blob(bytes.to_vec()),
    };
    Ok(value)
}

/// `YYYY-MM-DD`, optionally followed by a time part.
fn parse_date(text: &str) -> Option<NaiveDate> {
    let day = text.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}
