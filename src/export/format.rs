//! Output formats and the encoder lookup table.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ExportSettings;
use crate::request::ParamError;

use super::columnar::ColumnarEncoder;
use super::csv::CsvEncoder;
use super::geojson::GeoJsonEncoder;
use super::spreadsheet::SpreadsheetEncoder;
use super::RowEncoder;

/// Builds an encoder writing to a sink.
pub type EncoderFactory = fn(Box<dyn Write + Send>, &ExportSettings) -> Box<dyn RowEncoder>;

/// Wire format of an export, decided once at the API boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExportFormat {
    #[default]
    #[serde(rename = "geojson")]
    GeoJson,
    #[serde(rename = "csv")]
    Csv,
    #[serde(rename = "spreadsheet", alias = "xlsx")]
    Spreadsheet,
    #[serde(rename = "binary-columnar", alias = "parquet")]
    Columnar,
}

/// Static description of one format.
pub struct FormatSpec {
    pub format: ExportFormat,
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub content_type: &'static str,
    pub file_name: &'static str,
    /// Whether the format has a hard row cap.
    pub capped: bool,
    pub encoder: EncoderFactory,
}

static FORMATS: [FormatSpec; 4] = [
    FormatSpec {
        format: ExportFormat::GeoJson,
        name: "geojson",
        aliases: &["json"],
        content_type: "application/geo+json",
        file_name: "odapi_data.geojson",
        capped: false,
        encoder: geojson_encoder,
    },
    FormatSpec {
        format: ExportFormat::Csv,
        name: "csv",
        aliases: &[],
        content_type: "text/csv",
        file_name: "odapi_data.csv",
        capped: false,
        encoder: csv_encoder,
    },
    FormatSpec {
        format: ExportFormat::Spreadsheet,
        name: "spreadsheet",
        aliases: &["xlsx", "excel"],
        content_type: "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        file_name: "odapi_data.xlsx",
        capped: true,
        encoder: spreadsheet_encoder,
    },
    FormatSpec {
        format: ExportFormat::Columnar,
        name: "binary-columnar",
        aliases: &["parquet", "columnar"],
        content_type: "application/octet-stream",
        file_name: "odapi_data.parquet",
        capped: false,
        encoder: columnar_encoder,
    },
];

fn geojson_encoder(sink: Box<dyn Write + Send>, _: &ExportSettings) -> Box<dyn RowEncoder> {
    Box::new(GeoJsonEncoder::new(sink))
}

fn csv_encoder(sink: Box<dyn Write + Send>, _: &ExportSettings) -> Box<dyn RowEncoder> {
    Box::new(CsvEncoder::new(sink))
}

fn spreadsheet_encoder(sink: Box<dyn Write + Send>, settings: &ExportSettings) -> Box<dyn RowEncoder> {
    Box::new(SpreadsheetEncoder::new(sink, settings.spreadsheet_max_rows))
}

fn columnar_encoder(sink: Box<dyn Write + Send>, settings: &ExportSettings) -> Box<dyn RowEncoder> {
    Box::new(ColumnarEncoder::new(sink, settings.columnar_batch_size))
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [
        ExportFormat::GeoJson,
        ExportFormat::Csv,
        ExportFormat::Spreadsheet,
        ExportFormat::Columnar,
    ];

    pub fn spec(self) -> &'static FormatSpec {
        // The table is indexed in declaration order.
        &FORMATS[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.spec().name
    }

    pub fn content_type(self) -> &'static str {
        self.spec().content_type
    }

    pub fn file_name(self) -> &'static str {
        self.spec().file_name
    }

    /// Hard row cap, if the format has one.
    pub fn row_cap(self, settings: &ExportSettings) -> Option<u64> {
        self.spec().capped.then_some(settings.spreadsheet_max_rows)
    }

    pub fn encoder(self, sink: Box<dyn Write + Send>, settings: &ExportSettings) -> Box<dyn RowEncoder> {
        (self.spec().encoder)(sink, settings)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExportFormat {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        FORMATS
            .iter()
            .find(|spec| spec.name == wanted || spec.aliases.contains(&wanted.as_str()))
            .map(|spec| spec.format)
            .ok_or_else(|| {
                ParamError::invalid(
                    "format",
                    format!("unknown format `{}` (expected geojson, csv, spreadsheet or binary-columnar)", s.trim()),
                )
            })
    }
}
