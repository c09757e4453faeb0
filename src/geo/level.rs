//! The three Swiss administrative levels and their dimension tables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::request::ParamError;
use crate::schema::registry::{
    BEZIRK_LATEST_TABLE, BEZIRK_TABLE, GEMEINDE_LATEST_TABLE, GEMEINDE_TABLE,
    KANTON_LATEST_TABLE, KANTON_TABLE,
};

/// Geographic level of a fact row (`geo_code`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GeoLevel {
    /// Politische Gemeinde.
    #[serde(rename = "polg", alias = "municipality")]
    Municipality,
    /// Bezirk.
    #[serde(rename = "bezk", alias = "district")]
    District,
    /// Kanton.
    #[serde(rename = "kant", alias = "canton")]
    Canton,
}

impl GeoLevel {
    pub const ALL: [GeoLevel; 3] = [GeoLevel::Municipality, GeoLevel::District, GeoLevel::Canton];

    /// Value stored in the fact table's `geo_code` column.
    pub fn code(self) -> &'static str {
        match self {
            GeoLevel::Municipality => "polg",
            GeoLevel::District => "bezk",
            GeoLevel::Canton => "kant",
        }
    }

    /// The next coarser level, if any.
    pub fn parent(self) -> Option<GeoLevel> {
        match self {
            GeoLevel::Municipality => Some(GeoLevel::District),
            GeoLevel::District => Some(GeoLevel::Canton),
            GeoLevel::Canton => None,
        }
    }

    /// This level followed by every coarser ancestor.
    pub fn with_ancestors(self) -> Vec<GeoLevel> {
        std::iter::successors(Some(self), |level| level.parent()).collect()
    }

    pub fn dimension(self) -> &'static GeoDimension {
        match self {
            GeoLevel::Municipality => &MUNICIPALITY,
            GeoLevel::District => &DISTRICT,
            GeoLevel::Canton => &CANTON,
        }
    }
}

impl fmt::Display for GeoLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for GeoLevel {
    type Err = ParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "polg" | "municipality" => Ok(GeoLevel::Municipality),
            "bezk" | "district" => Ok(GeoLevel::District),
            "kant" | "canton" => Ok(GeoLevel::Canton),
            other => Err(ParamError::invalid(
                "geoCode",
                format!("unknown geo level `{other}` (expected polg, bezk or kant)"),
            )),
        }
    }
}

/// Dimension tables and key columns of one level.
#[derive(Debug, PartialEq, Eq)]
pub struct GeoDimension {
    pub level: GeoLevel,
    /// Current boundaries.
    pub latest_table: &'static str,
    /// One row per entity and snapshot year.
    pub historized_table: &'static str,
    /// Alias used when the table is joined.
    pub alias: &'static str,
    pub id_column: &'static str,
    pub name_column: &'static str,
}

static MUNICIPALITY: GeoDimension = GeoDimension {
    level: GeoLevel::Municipality,
    latest_table: GEMEINDE_LATEST_TABLE,
    historized_table: GEMEINDE_TABLE,
    alias: "gemeinde",
    id_column: "gemeinde_bfs_id",
    name_column: "gemeinde_name",
};

static DISTRICT: GeoDimension = GeoDimension {
    level: GeoLevel::District,
    latest_table: BEZIRK_LATEST_TABLE,
    historized_table: BEZIRK_TABLE,
    alias: "bezirk",
    id_column: "bezirk_bfs_id",
    name_column: "bezirk_name",
};

static CANTON: GeoDimension = GeoDimension {
    level: GeoLevel::Canton,
    latest_table: KANTON_LATEST_TABLE,
    historized_table: KANTON_TABLE,
    alias: "kanton",
    id_column: "kanton_bfs_id",
    name_column: "kanton_name",
};
