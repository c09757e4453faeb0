//! Geometry selector: picks the precomputed geometry column for a mode and
//! renders it as the trailing `geometry` output column.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::planner::plan::Projection;
use crate::schema::ColumnType;
use crate::sql::{func, table_col, Dialect, ExprExt, SqlDialect};

/// Canonical name of the geometry output column.
pub const GEOMETRY_ALIAS: &str = "geometry";

/// Which precomputed representation to attach to each row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryMode {
    /// Centroid point.
    Point,
    /// Full-resolution border.
    Border,
    #[serde(rename = "border_simplified_50m", alias = "border_simple_50m")]
    BorderSimplified50m,
    #[default]
    #[serde(rename = "border_simplified_100m", alias = "border_simple_100m")]
    BorderSimplified100m,
    #[serde(rename = "border_simplified_500m", alias = "border_simple_500m")]
    BorderSimplified500m,
}

/// Flavour of the dimension table the geometry is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeoTableKind {
    Latest,
    Historized,
}

impl GeometryMode {
    pub const ALL: [GeometryMode; 5] = [
        GeometryMode::Point,
        GeometryMode::Border,
        GeometryMode::BorderSimplified50m,
        GeometryMode::BorderSimplified100m,
        GeometryMode::BorderSimplified500m,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GeometryMode::Point => "point",
            GeometryMode::Border => "border",
            GeometryMode::BorderSimplified50m => "border_simplified_50m",
            GeometryMode::BorderSimplified100m => "border_simplified_100m",
            GeometryMode::BorderSimplified500m => "border_simplified_500m",
        }
    }

    /// Source column holding this representation.
    pub fn column(self, kind: GeoTableKind) -> &'static str {
        match (self, kind) {
            (GeometryMode::Point, _) => "geom_center",
            (GeometryMode::Border, GeoTableKind::Latest) => "geom_border",
            (GeometryMode::Border, GeoTableKind::Historized) => "geometry",
            (GeometryMode::BorderSimplified50m, _) => "geom_border_simple_50m",
            (GeometryMode::BorderSimplified100m, _) => "geom_border_simple_100m",
            (GeometryMode::BorderSimplified500m, _) => "geom_border_simple_500m",
        }
    }
}

impl fmt::Display for GeometryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeometryMode {
    type Err = crate::request::ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let normalized = normalized
            .replace("border_simple_", "border_simplified_")
            .replace("_meter", "m");
        GeometryMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == normalized)
            .ok_or_else(|| {
                crate::request::ParamError::invalid(
                    "geometryMode",
                    format!("unknown geometry mode `{}`", s.trim()),
                )
            })
    }
}

/// Select item for the geometry of `table_alias`, serialized to WKB and
/// aliased `geometry`. Callers append it last.
pub fn select_geometry(
    table_alias: &str,
    kind: GeoTableKind,
    mode: GeometryMode,
    dialect: Dialect,
) -> Projection {
    let column = table_col(table_alias, mode.column(kind));
    let expr = match dialect.geometry_to_wkb_function() {
        Some(name) => func(name, vec![column]),
        None => column,
    };
    Projection::new(expr.alias(GEOMETRY_ALIAS), ColumnType::Geometry)
}
