//! GeoJSON `FeatureCollection` encoder.
//!
//! The collection is streamed: the opening object is written by `begin`,
//! each feature is serialized as soon as its row arrives, and `finish`
//! closes the array.

use std::io::Write;

use serde_json::{Map, Value as JsonValue};

use crate::planner::OutputColumn;

use super::{decode_geometry, ExportResult, Row, RowEncoder};

const HEADER: &[u8] = br#"{"type":"FeatureCollection","features":["#;
const FOOTER: &[u8] = b"]}";

pub struct GeoJsonEncoder {
    sink: Box<dyn Write + Send>,
    names: Vec<String>,
    geometry: Option<usize>,
    rows: u64,
}

impl GeoJsonEncoder {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink,
            names: Vec::new(),
            geometry: None,
            rows: 0,
        }
    }
}

impl RowEncoder for GeoJsonEncoder {
    fn begin(&mut self, columns: &[OutputColumn]) -> ExportResult<()> {
        self.names = columns.iter().map(|c| c.name.clone()).collect();
        self.geometry = columns
            .last()
            .filter(|c| c.column_type == crate::schema::ColumnType::Geometry)
            .map(|_| columns.len() - 1);
        self.sink.write_all(HEADER)?;
        Ok(())
    }

    fn write_row(&mut self, row: &Row) -> ExportResult<()> {
        let geometry = match self.geometry {
            Some(index) => decode_geometry(&row[index], self.rows)?
                .map(|g| g.to_geojson())
                .unwrap_or(JsonValue::Null),
            None => JsonValue::Null,
        };

        let mut properties = Map::with_capacity(row.len());
        for (i, (name, value)) in self.names.iter().zip(row).enumerate() {
            if Some(i) != self.geometry {
                properties.insert(name.clone(), value.to_json());
            }
        }

        let mut feature = Map::with_capacity(3);
        feature.insert("type".into(), JsonValue::from("Feature"));
        feature.insert("geometry".into(), geometry);
        feature.insert("properties".into(), JsonValue::Object(properties));

        if self.rows > 0 {
            self.sink.write_all(b",")?;
        }
        serde_json::to_writer(&mut self.sink, &feature)?;
        self.rows += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> ExportResult<()> {
        self.sink.write_all(FOOTER)?;
        self.sink.flush()?;
        Ok(())
    }
}
