//! Declarative description of the marts this crate reads.
//!
//! Every table is a name, a schema kind and an ordered list of column
//! descriptors. Descriptors are `Copy` values; tables never share or mutate
//! column objects.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::sql::TableRef;

// =============================================================================
// Table names
// =============================================================================

pub const FACT_TABLE: &str = "mart_ogd_api";
pub const AVAILABLE_INDICATOR_TABLE: &str = "mart_available_indicator";
pub const INDICATOR_TABLE: &str = "seed_indicator";
pub const SOURCE_TABLE: &str = "dim_source";
pub const GROUP_TABLE: &str = "dim_group";
pub const GROUP_VALUE_TABLE: &str = "dim_group_value";
pub const GEMEINDE_LATEST_TABLE: &str = "dim_gemeinde_latest";
pub const BEZIRK_LATEST_TABLE: &str = "dim_bezirk_latest";
pub const KANTON_LATEST_TABLE: &str = "dim_kanton_latest";
pub const GEMEINDE_TABLE: &str = "dim_gemeinde";
pub const BEZIRK_TABLE: &str = "dim_bezirk";
pub const KANTON_TABLE: &str = "dim_kanton";

/// Number of group dimensions on the fact table.
pub const GROUP_COUNT: usize = 4;

// =============================================================================
// Descriptors
// =============================================================================

/// Logical type of a column as the exporters see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    Float,
    Text,
    Bool,
    /// ISO calendar date.
    Date,
    /// Well-known binary.
    Geometry,
}

/// One column of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub column_type: ColumnType,
}

const fn column(name: &'static str, column_type: ColumnType) -> ColumnDef {
    ColumnDef { name, column_type }
}

/// Which deployment schema a table lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    /// Materialized marts and dimensions (`dbt_marts`).
    Marts,
    /// Seed tables (`dbt`).
    Seeds,
}

/// Schema qualifiers for a deployment. `None` leaves table names unqualified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaNames {
    pub marts: Option<String>,
    pub seeds: Option<String>,
}

impl SchemaNames {
    /// Qualifiers of the PostGIS deployment.
    pub fn postgis() -> Self {
        Self {
            marts: Some("dbt_marts".into()),
            seeds: Some("dbt".into()),
        }
    }

    pub fn for_kind(&self, kind: SchemaKind) -> Option<&str> {
        match kind {
            SchemaKind::Marts => self.marts.as_deref(),
            SchemaKind::Seeds => self.seeds.as_deref(),
        }
    }
}

/// A table and its ordered columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: &'static str,
    pub kind: SchemaKind,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    fn new(name: &'static str, kind: SchemaKind) -> Self {
        Self {
            name,
            kind,
            columns: Vec::new(),
        }
    }

    fn with_columns(mut self, columns: &[ColumnDef]) -> Self {
        self.columns.extend_from_slice(columns);
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Reference to this table, qualified for the deployment.
    pub fn table_ref(&self, schemas: &SchemaNames) -> TableRef {
        TableRef::new(self.name).with_schema(schemas.for_kind(self.kind))
    }
}

// =============================================================================
// Column sets
// =============================================================================

use ColumnType::{Bool, Date, Float, Geometry, Int, Text};

const FACT_COLUMNS: &[ColumnDef] = &[
    column("indicator_id", Int),
    column("geo_code", Text),
    column("geo_value", Int),
    column("knowledge_date_from", Date),
    column("knowledge_date_to", Date),
    column("period_type", Text),
    column("period_code", Text),
    column("period_ref_from", Date),
    column("period_ref", Date),
    column("group_1_id", Int),
    column("group_value_1_id", Int),
    column("_group_value_1_is_total", Bool),
    column("group_2_id", Int),
    column("group_value_2_id", Int),
    column("_group_value_2_is_total", Bool),
    column("group_3_id", Int),
    column("group_value_3_id", Int),
    column("_group_value_3_is_total", Bool),
    column("group_4_id", Int),
    column("group_value_4_id", Int),
    column("_group_value_4_is_total", Bool),
    column("indicator_value_numeric", Float),
    column("indicator_value_text", Text),
    column("source_id", Int),
];

const INDICATOR_META_COLUMNS: &[ColumnDef] = &[
    column("indicator_id", Int),
    column("indicator_name", Text),
    column("topic_1", Text),
    column("topic_2", Text),
    column("topic_3", Text),
    column("topic_4", Text),
    column("indicator_unit", Text),
    column("indicator_description", Text),
];

/// Precomputed geometries shared by the latest views.
const LATEST_GEOMETRY_COLUMNS: &[ColumnDef] = &[
    column("geom_border", Geometry),
    column("geom_border_simple_50m", Geometry),
    column("geom_border_simple_100m", Geometry),
    column("geom_border_simple_500m", Geometry),
    column("geom_center", Geometry),
];

/// Historized views keep the full border in `geometry`.
const HISTORIZED_GEOMETRY_COLUMNS: &[ColumnDef] = &[
    column("geometry", Geometry),
    column("geom_border_simple_50m", Geometry),
    column("geom_border_simple_100m", Geometry),
    column("geom_border_simple_500m", Geometry),
    column("geom_center", Geometry),
];

const SNAPSHOT_COLUMNS: &[ColumnDef] = &[
    column("snapshot_date", Date),
    column("snapshot_year", Int),
];

// =============================================================================
// Registry
// =============================================================================

static REGISTRY: Lazy<SchemaRegistry> = Lazy::new(SchemaRegistry::build);

/// Process-wide, read-only table catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaRegistry {
    tables: BTreeMap<&'static str, TableDef>,
}

impl SchemaRegistry {
    /// The registry, built on first access.
    pub fn global() -> &'static SchemaRegistry {
        &REGISTRY
    }

    fn build() -> Self {
        use SchemaKind::{Marts, Seeds};

        let defs = [
            TableDef::new(FACT_TABLE, Marts).with_columns(FACT_COLUMNS),
            TableDef::new(AVAILABLE_INDICATOR_TABLE, Marts)
                .with_columns(&INDICATOR_META_COLUMNS[..1])
                .with_columns(&[column("geo_code", Text)])
                .with_columns(&INDICATOR_META_COLUMNS[1..]),
            TableDef::new(INDICATOR_TABLE, Seeds).with_columns(INDICATOR_META_COLUMNS),
            TableDef::new(SOURCE_TABLE, Marts)
                .with_columns(&[column("id", Int), column("source", Text)]),
            TableDef::new(GROUP_TABLE, Marts)
                .with_columns(&[column("group_id", Int), column("group_name", Text)]),
            TableDef::new(GROUP_VALUE_TABLE, Marts).with_columns(&[
                column("group_value_id", Int),
                column("group_value_name", Text),
            ]),
            TableDef::new(GEMEINDE_LATEST_TABLE, Marts)
                .with_columns(&[
                    column("gemeinde_bfs_id", Int),
                    column("gemeinde_name", Text),
                    column("bezirk_bfs_id", Int),
                    column("kanton_bfs_id", Int),
                ])
                .with_columns(LATEST_GEOMETRY_COLUMNS),
            TableDef::new(BEZIRK_LATEST_TABLE, Marts)
                .with_columns(&[
                    column("bezirk_bfs_id", Int),
                    column("bezirk_name", Text),
                    column("kanton_bfs_id", Int),
                ])
                .with_columns(LATEST_GEOMETRY_COLUMNS),
            TableDef::new(KANTON_LATEST_TABLE, Marts)
                .with_columns(&[column("kanton_bfs_id", Int), column("kanton_name", Text)])
                .with_columns(LATEST_GEOMETRY_COLUMNS),
            TableDef::new(GEMEINDE_TABLE, Marts)
                .with_columns(SNAPSHOT_COLUMNS)
                .with_columns(&[
                    column("gemeinde_bfs_id", Int),
                    column("gemeinde_hist_bfs_id", Int),
                    column("gemeinde_name", Text),
                    column("bezirk_bfs_id", Int),
                    column("kanton_bfs_id", Int),
                ])
                .with_columns(HISTORIZED_GEOMETRY_COLUMNS),
            TableDef::new(BEZIRK_TABLE, Marts)
                .with_columns(SNAPSHOT_COLUMNS)
                .with_columns(&[
                    column("bezirk_bfs_id", Int),
                    column("bezirk_name", Text),
                    column("kanton_bfs_id", Int),
                ])
                .with_columns(HISTORIZED_GEOMETRY_COLUMNS),
            TableDef::new(KANTON_TABLE, Marts)
                .with_columns(SNAPSHOT_COLUMNS)
                .with_columns(&[
                    column("kanton_bfs_id", Int),
                    column("kanton_name", Text),
                    column("icc", Text),
                ])
                .with_columns(HISTORIZED_GEOMETRY_COLUMNS),
        ];

        Self {
            tables: defs.into_iter().map(|t| (t.name, t)).collect(),
        }
    }

    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.get(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableDef> {
        self.tables.values()
    }

    pub fn column_type(&self, table: &str, column: &str) -> Option<ColumnType> {
        self.table(table)?.column(column).map(|c| c.column_type)
    }
}
