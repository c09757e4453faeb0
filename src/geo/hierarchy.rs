//! Geo hierarchy resolver.
//!
//! Maps a level to the inner-join chain from the fact table up through
//! every coarser ancestor, plus the name columns those joins expose.

use crate::planner::plan::Projection;
use crate::schema::{ColumnType, SchemaKind, SchemaNames};
use crate::sql::{table_col, ExprExt, Join, JoinType, TableRef};

use super::level::GeoLevel;

/// Alias of the fact table in every compiled indicator query.
pub const FACT_ALIAS: &str = "fact";

/// One foreign-key hop in the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinStep {
    pub level: GeoLevel,
    pub table: &'static str,
    pub alias: &'static str,
    /// Already-joined side: (alias, column).
    pub from: (&'static str, &'static str),
    /// Key column on the joined dimension.
    pub to_column: &'static str,
}

impl JoinStep {
    pub fn to_join(&self, schemas: &SchemaNames) -> Join {
        let (from_alias, from_column) = self.from;
        Join {
            join_type: JoinType::Inner,
            table: TableRef::new(self.table)
                .with_schema(schemas.for_kind(SchemaKind::Marts))
                .with_alias(self.alias),
            on: table_col(from_alias, from_column).eq(table_col(self.alias, self.to_column)),
        }
    }
}

/// Ordered join chain for `level`: the level's own dimension first, then
/// each parent joined from its child.
pub fn join_chain(level: GeoLevel) -> Vec<JoinStep> {
    let mut steps = Vec::with_capacity(3);
    let mut from = (FACT_ALIAS, "geo_value");

    for current in level.with_ancestors() {
        let dim = current.dimension();
        steps.push(JoinStep {
            level: current,
            table: dim.latest_table,
            alias: dim.alias,
            from,
            to_column: dim.id_column,
        });
        if let Some(parent) = current.parent() {
            from = (dim.alias, parent.dimension().id_column);
        }
    }

    steps
}

/// Name columns for `level`: its own name as `geo_name`, then id and name of
/// every ancestor.
pub fn geo_meta_columns(level: GeoLevel) -> Vec<Projection> {
    let dim = level.dimension();
    let mut columns = vec![Projection::new(
        table_col(dim.alias, dim.name_column).alias("geo_name"),
        ColumnType::Text,
    )];

    for ancestor in level.with_ancestors().into_iter().skip(1) {
        let dim = ancestor.dimension();
        columns.push(Projection::new(
            table_col(dim.alias, dim.id_column).into(),
            ColumnType::Int,
        ));
        columns.push(Projection::new(
            table_col(dim.alias, dim.name_column).into(),
            ColumnType::Text,
        ));
    }

    columns
}
