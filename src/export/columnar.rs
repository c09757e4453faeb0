//! Parquet encoder.
//!
//! Rows are buffered into Arrow builders and written as one record batch
//! and one row group every `batch_size` rows, so bytes reach the sink while
//! the cursor is still open. Geometry cells are copied through as the WKB
//! the engine returned, described by GeoParquet `geo` file metadata.

use std::io::Write;
use std::sync::Arc;

use arrow_array::builder::{
    BinaryBuilder, BooleanBuilder, Date32Builder, Float64Builder, Int64Builder, StringBuilder,
};
use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use chrono::{Datelike, NaiveDate};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use serde_json::json;

use crate::geo::decode_hex;
use crate::planner::OutputColumn;
use crate::schema::ColumnType;

use super::{ExportError, ExportResult, Row, RowEncoder, Value};

/// Days between 0001-01-01 and 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

pub const GEO_METADATA_KEY: &str = "geo";

type Sink = Box<dyn Write + Send>;

pub struct ColumnarEncoder {
    sink: Option<Sink>,
    batch_size: usize,
    writer: Option<ArrowWriter<Sink>>,
    schema: SchemaRef,
    columns: Vec<OutputColumn>,
    builders: Vec<ColumnBuilder>,
    pending: usize,
    rows: u64,
}

impl ColumnarEncoder {
    pub fn new(sink: Sink, batch_size: usize) -> Self {
        Self {
            sink: Some(sink),
            batch_size: batch_size.max(1),
            writer: None,
            schema: Arc::new(Schema::empty()),
            columns: Vec::new(),
            builders: Vec::new(),
            pending: 0,
            rows: 0,
        }
    }

    fn writer(&mut self) -> ExportResult<&mut ArrowWriter<Sink>> {
        self.writer
            .as_mut()
            .ok_or_else(|| std::io::Error::other("columnar encoder used before begin").into())
    }

    fn flush_batch(&mut self) -> ExportResult<()> {
        if self.pending == 0 {
            return Ok(());
        }
        let arrays: Vec<ArrayRef> = self.builders.iter_mut().map(ColumnBuilder::finish).collect();
        let batch = RecordBatch::try_new(self.schema.clone(), arrays)?;
        let writer = self.writer()?;
        writer.write(&batch)?;
        // Close the row group now instead of at the writer's 1Mi-row default.
        writer.flush()?;
        self.pending = 0;
        Ok(())
    }
}

impl RowEncoder for ColumnarEncoder {
    fn begin(&mut self, columns: &[OutputColumn]) -> ExportResult<()> {
        let fields: Vec<Field> = columns
            .iter()
            .map(|c| Field::new(&c.name, data_type(c.column_type), true))
            .collect();
        self.schema = Arc::new(Schema::new(fields));
        self.columns = columns.to_vec();
        self.builders = columns
            .iter()
            .map(|c| ColumnBuilder::new(c.column_type, self.batch_size))
            .collect();

        let mut properties = WriterProperties::builder().set_compression(Compression::SNAPPY);
        if let Some(geometry) = columns.iter().find(|c| c.column_type == ColumnType::Geometry) {
            properties = properties.set_key_value_metadata(Some(vec![KeyValue::new(
                GEO_METADATA_KEY.to_string(),
                geo_metadata(&geometry.name),
            )]));
        }

        let sink = self
            .sink
            .take()
            .ok_or_else(|| std::io::Error::other("columnar encoder started twice"))?;
        self.writer = Some(ArrowWriter::try_new(
            sink,
            self.schema.clone(),
            Some(properties.build()),
        )?);
        Ok(())
    }

    fn write_row(&mut self, row: &Row) -> ExportResult<()> {
        for ((builder, column), value) in self.builders.iter_mut().zip(&self.columns).zip(row) {
            builder.append(value, &column.name, self.rows)?;
        }
        self.pending += 1;
        self.rows += 1;
        if self.pending >= self.batch_size {
            self.flush_batch()?;
        }
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> ExportResult<()> {
        self.flush_batch()?;
        let writer = self
            .writer
            .take()
            .ok_or_else(|| std::io::Error::other("columnar encoder used before begin"))?;
        // `close` flushes through to the sink and keeps its I/O errors intact.
        writer.close()?;
        Ok(())
    }
}

fn data_type(column_type: ColumnType) -> DataType {
    match column_type {
        ColumnType::Int => DataType::Int64,
        ColumnType::Float => DataType::Float64,
        ColumnType::Text => DataType::Utf8,
        ColumnType::Bool => DataType::Boolean,
        ColumnType::Date => DataType::Date32,
        ColumnType::Geometry => DataType::Binary,
    }
}

fn geo_metadata(column: &str) -> String {
    json!({
        "version": "1.0.0",
        "primary_column": column,
        "columns": {
            column: {"encoding": "WKB", "geometry_types": []}
        }
    })
    .to_string()
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

// =============================================================================
// Builders
// =============================================================================

enum ColumnBuilder {
    Int(Int64Builder),
    Float(Float64Builder),
    Text(StringBuilder),
    Bool(BooleanBuilder),
    Date(Date32Builder),
    Geometry(BinaryBuilder),
}

impl ColumnBuilder {
    fn new(column_type: ColumnType, capacity: usize) -> Self {
        match column_type {
            ColumnType::Int => ColumnBuilder::Int(Int64Builder::with_capacity(capacity)),
            ColumnType::Float => ColumnBuilder::Float(Float64Builder::with_capacity(capacity)),
            ColumnType::Text => ColumnBuilder::Text(StringBuilder::new()),
            ColumnType::Bool => ColumnBuilder::Bool(BooleanBuilder::with_capacity(capacity)),
            ColumnType::Date => ColumnBuilder::Date(Date32Builder::with_capacity(capacity)),
            ColumnType::Geometry => ColumnBuilder::Geometry(BinaryBuilder::new()),
        }
    }

    fn append(&mut self, value: &Value, column: &str, row: u64) -> ExportResult<()> {
        let mismatch = || ExportError::TypeMismatch {
            column: column.to_string(),
            value: format!("{value:?}"),
        };

        match self {
            ColumnBuilder::Int(b) => match value {
                Value::Null => b.append_null(),
                Value::Int(n) => b.append_value(*n),
                Value::Bool(v) => b.append_value(i64::from(*v)),
                _ => return Err(mismatch()),
            },
            ColumnBuilder::Float(b) => match value {
                Value::Null => b.append_null(),
                other => b.append_value(other.as_f64().ok_or_else(mismatch)?),
            },
            ColumnBuilder::Text(b) => b.append_option(value.to_text()),
            ColumnBuilder::Bool(b) => match value {
                Value::Null => b.append_null(),
                Value::Bool(v) => b.append_value(*v),
                Value::Int(n) => b.append_value(*n != 0),
                _ => return Err(mismatch()),
            },
            ColumnBuilder::Date(b) => match value {
                Value::Null => b.append_null(),
                Value::Date(d) => b.append_value(days_since_epoch(*d)),
                Value::Text(s) => {
                    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| mismatch())?;
                    b.append_value(days_since_epoch(date));
                }
                _ => return Err(mismatch()),
            },
            ColumnBuilder::Geometry(b) => match value {
                Value::Null => b.append_null(),
                Value::Blob(wkb) => b.append_value(wkb),
                Value::Text(hex) => {
                    let wkb = decode_hex(hex).map_err(|source| ExportError::Geometry { row, source })?;
                    b.append_value(wkb);
                }
                _ => return Err(mismatch()),
            },
        }
        Ok(())
    }

    fn finish(&mut self) -> ArrayRef {
        match self {
            ColumnBuilder::Int(b) => Arc::new(b.finish()),
            ColumnBuilder::Float(b) => Arc::new(b.finish()),
            ColumnBuilder::Text(b) => Arc::new(b.finish()),
            ColumnBuilder::Bool(b) => Arc::new(b.finish()),
            ColumnBuilder::Date(b) => Arc::new(b.finish()),
            ColumnBuilder::Geometry(b) => Arc::new(b.finish()),
        }
    }
}
