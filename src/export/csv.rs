//! CSV encoder: one header row, geometry as WKT, NULL as an empty field.

use std::io::Write;

use ::csv::{Writer, WriterBuilder};

use crate::planner::OutputColumn;
use crate::schema::ColumnType;

use super::{decode_geometry, ExportResult, Row, RowEncoder, Value};

pub struct CsvEncoder {
    writer: Writer<Box<dyn Write + Send>>,
    geometry: Option<usize>,
    rows: u64,
    record: Vec<String>,
}

impl CsvEncoder {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            writer: WriterBuilder::new().has_headers(false).from_writer(sink),
            geometry: None,
            rows: 0,
            record: Vec::new(),
        }
    }

    fn field(&self, index: usize, value: &Value) -> ExportResult<String> {
        if Some(index) == self.geometry {
            return Ok(decode_geometry(value, self.rows)?
                .map(|g| g.to_wkt())
                .unwrap_or_default());
        }
        Ok(value.to_text().unwrap_or_default())
    }
}

impl RowEncoder for CsvEncoder {
    fn begin(&mut self, columns: &[OutputColumn]) -> ExportResult<()> {
        self.geometry = columns
            .iter()
            .position(|c| c.column_type == ColumnType::Geometry);
        self.writer.write_record(columns.iter().map(|c| c.name.as_str()))?;
        Ok(())
    }

    fn write_row(&mut self, row: &Row) -> ExportResult<()> {
        let mut record = std::mem::take(&mut self.record);
        record.clear();
        for (i, value) in row.iter().enumerate() {
            record.push(self.field(i, value)?);
        }
        self.writer.write_record(&record)?;
        self.record = record;
        self.rows += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> ExportResult<()> {
        self.writer.flush()?;
        Ok(())
    }
}
