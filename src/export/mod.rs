//! Result exporter.
//!
//! ```text
//! CompiledPlan ──▶ RowCursor ──▶ Exporter ──▶ RowEncoder ──▶ sink
//!                  (engine)     (states)     (format table)  (Write)
//! ```
//!
//! Every encoder consumes the same row shape: the plan's ordered output
//! columns with geometry, when present, last. Encoders are single-pass and
//! never seek.

pub mod columnar;
pub mod csv;
pub mod format;
pub mod geojson;
pub mod sink;
pub mod spreadsheet;
pub mod state;
pub mod value;

pub use format::{ExportFormat, FormatSpec};
pub use sink::ChannelWriter;
pub use state::{ExportOutcome, ExportState, Exporter};
pub use value::{Row, Value};

use thiserror::Error;

use crate::engine::EngineError;
use crate::geo::{Geometry, WkbError};
use crate::planner::OutputColumn;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("{format} export has {rows} rows, more than the limit of {limit}")]
    TooManyRows {
        format: ExportFormat,
        rows: u64,
        limit: u64,
    },

    #[error("invalid geometry in row {row}: {source}")]
    Geometry { row: u64, source: WkbError },

    #[error("row {row} has {found} values, expected {expected}")]
    RowShape {
        row: u64,
        expected: usize,
        found: usize,
    },

    #[error("column `{column}` cannot hold {value}")]
    TypeMismatch { column: String, value: String },

    #[error("illegal export transition {from:?} -> {to:?}")]
    Transition { from: ExportState, to: ExportState },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] ::csv::Error),

    #[error("spreadsheet encoding failed: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),

    #[error("Parquet encoding failed: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow_schema::ArrowError),
}

impl ExportError {
    /// The client went away; the sink refused further bytes.
    pub fn is_disconnect(&self) -> bool {
        match self {
            ExportError::Io(e) => is_broken_pipe(e),
            ExportError::Json(e) => e.io_error_kind() == Some(std::io::ErrorKind::BrokenPipe),
            ExportError::Csv(e) => matches!(e.kind(), ::csv::ErrorKind::Io(io) if is_broken_pipe(io)),
            ExportError::Spreadsheet(rust_xlsxwriter::XlsxError::IoError(e)) => is_broken_pipe(e),
            // The Parquet writer boxes sink errors.
            ExportError::Parquet(parquet::errors::ParquetError::External(e)) => e
                .downcast_ref::<std::io::Error>()
                .is_some_and(is_broken_pipe),
            _ => false,
        }
    }
}

fn is_broken_pipe(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::BrokenPipe
}

pub type ExportResult<T> = Result<T, ExportError>;

/// Single-pass consumer of result rows.
pub trait RowEncoder: Send {
    /// Called once before the first row.
    fn begin(&mut self, columns: &[OutputColumn]) -> ExportResult<()>;

    fn write_row(&mut self, row: &Row) -> ExportResult<()>;

    /// Completes the document and flushes the sink.
    fn finish(self: Box<Self>) -> ExportResult<()>;
}

/// Forward-only source of rows.
pub trait RowCursor {
    fn next_row(&mut self) -> ExportResult<Option<Row>>;
}

/// In-memory cursor.
#[derive(Debug, Default)]
pub struct VecCursor {
    rows: std::vec::IntoIter<Row>,
}

impl VecCursor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }
}

impl RowCursor for VecCursor {
    fn next_row(&mut self) -> ExportResult<Option<Row>> {
        Ok(self.rows.next())
    }
}

/// Cursor whose first row was already fetched.
///
/// Pulling the first row before any byte is written surfaces engine errors
/// while the export can still fail cleanly.
pub struct Prefetched<C> {
    first: Option<Row>,
    inner: C,
}

impl<C: RowCursor> Prefetched<C> {
    pub fn new(mut inner: C) -> ExportResult<Self> {
        let first = inner.next_row()?;
        Ok(Self { first, inner })
    }

    pub fn is_empty(&self) -> bool {
        self.first.is_none()
    }
}

impl<C: RowCursor> RowCursor for Prefetched<C> {
    fn next_row(&mut self) -> ExportResult<Option<Row>> {
        match self.first.take() {
            Some(row) => Ok(Some(row)),
            None => self.inner.next_row(),
        }
    }
}

/// Decode a geometry cell: WKB blob, hex-encoded WKB text or NULL.
pub(crate) fn decode_geometry(value: &Value, row: u64) -> ExportResult<Option<Geometry>> {
    let decoded = match value {
        Value::Null => return Ok(None),
        Value::Blob(bytes) => Geometry::from_wkb(bytes),
        Value::Text(hex) => Geometry::from_hex(hex),
        other => {
            return Err(ExportError::TypeMismatch {
                column: crate::geo::GEOMETRY_ALIAS.to_string(),
                value: format!("{other:?}"),
            })
        }
    };
    decoded
        .map(Some)
        .map_err(|source| ExportError::Geometry { row, source })
}

/// Check that `row` matches the column count.
pub(crate) fn check_shape(row: &Row, columns: usize, index: u64) -> ExportResult<()> {
    if row.len() == columns {
        Ok(())
    } else {
        Err(ExportError::RowShape {
            row: index,
            expected: columns,
            found: row.len(),
        })
    }
}
