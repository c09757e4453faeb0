//! Single-sheet workbook encoder.
//!
//! The workbook is assembled in memory and only serialized by `finish`, so
//! an error before that point leaves the sink untouched.

use std::io::Write;

use rust_xlsxwriter::{Workbook, Worksheet};

use crate::planner::OutputColumn;
use crate::schema::ColumnType;

use super::{decode_geometry, ExportError, ExportFormat, ExportResult, Row, RowEncoder, Value};

pub const SHEET_NAME: &str = "odapi_data";

pub struct SpreadsheetEncoder {
    sink: Box<dyn Write + Send>,
    sheet: Worksheet,
    max_rows: u64,
    geometry: Option<usize>,
    rows: u64,
}

impl SpreadsheetEncoder {
    pub fn new(sink: Box<dyn Write + Send>, max_rows: u64) -> Self {
        Self {
            sink,
            sheet: Worksheet::new(),
            max_rows,
            geometry: None,
            rows: 0,
        }
    }

    fn write_cell(&mut self, row: u32, col: u16, value: &Value) -> ExportResult<()> {
        if Some(col as usize) == self.geometry {
            if let Some(geometry) = decode_geometry(value, self.rows)? {
                self.sheet.write_string(row, col, geometry.to_wkt())?;
            }
            return Ok(());
        }
        match value {
            Value::Null => {}
            Value::Int(n) => {
                self.sheet.write_number(row, col, *n as f64)?;
            }
            Value::Float(f) if f.is_finite() => {
                self.sheet.write_number(row, col, *f)?;
            }
            Value::Float(_) => {}
            Value::Bool(b) => {
                self.sheet.write_boolean(row, col, *b)?;
            }
            other => {
                if let Some(text) = other.to_text() {
                    self.sheet.write_string(row, col, text)?;
                }
            }
        }
        Ok(())
    }
}

impl RowEncoder for SpreadsheetEncoder {
    fn begin(&mut self, columns: &[OutputColumn]) -> ExportResult<()> {
        self.sheet.set_name(SHEET_NAME)?;
        self.geometry = columns
            .iter()
            .position(|c| c.column_type == ColumnType::Geometry);
        for (i, column) in columns.iter().enumerate() {
            self.sheet.write_string(0, i as u16, &column.name)?;
        }
        Ok(())
    }

    fn write_row(&mut self, row: &Row) -> ExportResult<()> {
        if self.rows >= self.max_rows {
            return Err(ExportError::TooManyRows {
                format: ExportFormat::Spreadsheet,
                rows: self.rows + 1,
                limit: self.max_rows,
            });
        }
        // Row 0 holds the header.
        let index = (self.rows + 1) as u32;
        for (col, value) in row.iter().enumerate() {
            self.write_cell(index, col as u16, value)?;
        }
        self.rows += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> ExportResult<()> {
        let Self { mut sink, sheet, .. } = *self;
        let mut workbook = Workbook::new();
        workbook.push_worksheet(sheet);
        let bytes = workbook.save_to_buffer()?;
        sink.write_all(&bytes)?;
        sink.flush()?;
        Ok(())
    }
}
