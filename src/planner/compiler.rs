//! Query compiler for indicator and portrait exports.
//!
//! The compiled select list follows a fixed order: fact identity, period,
//! group labels, values and source, optional indicator metadata, optional
//! geo metadata, and finally `geometry`.

use tracing::debug;

use crate::geo::{geo_meta_columns, join_chain, select_geometry, GeoTableKind, FACT_ALIAS};
use crate::request::{ExportQuery, IndicatorQuery, Page};
use crate::schema::registry::{GROUP_TABLE, GROUP_VALUE_TABLE, INDICATOR_TABLE, SOURCE_TABLE};
use crate::schema::{ColumnType, SchemaNames, SchemaRegistry, TableDef, FACT_TABLE, GROUP_COUNT};
use crate::sql::{table_col, Dialect, ExprExt, OrderByExpr, Query};

use super::plan::{CompiledPlan, PlanKind, Projection};
use super::temporal::temporal_filter;
use super::{PlanError, PlanResult};

const SOURCE_ALIAS: &str = "src";
const INDICATOR_ALIAS: &str = "indicator";

const IDENTITY_COLUMNS: &[&str] = &[
    "indicator_id",
    "geo_code",
    "geo_value",
    "knowledge_date_from",
    "knowledge_date_to",
];

const PERIOD_COLUMNS: &[&str] = &["period_type", "period_code", "period_ref_from", "period_ref"];

const VALUE_COLUMNS: &[&str] = &["indicator_value_numeric", "indicator_value_text", "source_id"];

const INDICATOR_META_COLUMNS: &[&str] = &[
    "indicator_name",
    "topic_1",
    "topic_2",
    "topic_3",
    "topic_4",
    "indicator_unit",
    "indicator_description",
];

/// Target dialect and schema qualifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub dialect: Dialect,
    pub schemas: SchemaNames,
}

impl CompileOptions {
    pub fn new(dialect: Dialect, schemas: SchemaNames) -> Self {
        Self { dialect, schemas }
    }
}

/// Compiles validated requests into [`CompiledPlan`]s.
///
/// Holds no per-request state: compiling the same input twice yields equal
/// plans.
#[derive(Debug, Clone)]
pub struct QueryCompiler<'a> {
    registry: &'a SchemaRegistry,
    options: CompileOptions,
}

impl QueryCompiler<'static> {
    /// Compiler over the process-wide registry.
    pub fn global(options: CompileOptions) -> Self {
        Self::new(SchemaRegistry::global(), options)
    }
}

impl<'a> QueryCompiler<'a> {
    pub fn new(registry: &'a SchemaRegistry, options: CompileOptions) -> Self {
        Self { registry, options }
    }

    pub fn dialect(&self) -> Dialect {
        self.options.dialect
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Compile any export query.
    pub fn compile(&self, query: &ExportQuery) -> PlanResult<CompiledPlan> {
        let plan = match query {
            ExportQuery::Indicator(q) => self.compile_indicator(q),
            ExportQuery::LatestValues(q) => self.compile_latest_values(q),
            ExportQuery::Snapshot(q) => self.compile_snapshot(q),
        }?;
        debug!(kind = ?plan.kind, sql = %plan.sql(), "compiled plan");
        Ok(plan)
    }

    /// Indicator export, or a portrait when `indicator_id` is absent.
    pub fn compile_indicator(&self, q: &IndicatorQuery) -> PlanResult<CompiledPlan> {
        let kind = match q.indicator_id {
            Some(_) => PlanKind::Indicator,
            None => PlanKind::Portrait,
        };
        let fact = self.table(FACT_TABLE)?;
        let schemas = &self.options.schemas;

        let mut base = Query::new().from(fact.table_ref(schemas).with_alias(FACT_ALIAS));

        // Source and group labels.
        let source = self.table(SOURCE_TABLE)?;
        base = base.inner_join(
            source.table_ref(schemas).with_alias(SOURCE_ALIAS),
            table_col(FACT_ALIAS, "source_id").eq(table_col(SOURCE_ALIAS, "id")),
        );
        let group = self.table(GROUP_TABLE)?;
        let group_value = self.table(GROUP_VALUE_TABLE)?;
        for i in 1..=GROUP_COUNT {
            base = base.left_join(
                group.table_ref(schemas).with_alias(&group_alias(i)),
                table_col(FACT_ALIAS, &format!("group_{i}_id"))
                    .eq(table_col(&group_alias(i), "group_id")),
            );
        }
        for i in 1..=GROUP_COUNT {
            base = base.left_join(
                group_value.table_ref(schemas).with_alias(&group_value_alias(i)),
                table_col(FACT_ALIAS, &format!("group_value_{i}_id"))
                    .eq(table_col(&group_value_alias(i), "group_value_id")),
            );
        }

        // Indicator metadata.
        if q.join_indicator_meta {
            let indicator = self.table(INDICATOR_TABLE)?;
            base = base.inner_join(
                indicator.table_ref(schemas).with_alias(INDICATOR_ALIAS),
                table_col(FACT_ALIAS, "indicator_id").eq(table_col(INDICATOR_ALIAS, "indicator_id")),
            );
        }

        // Geo hierarchy, needed for the geometry even without geo metadata.
        for step in join_chain(q.geo_level) {
            let join = step.to_join(schemas);
            base = base.join(join.join_type, join.table, join.on);
        }

        base = self.apply_filters(base, q);
        base = base.order_by(fact_ordering());
        base = apply_page(base, q.page);

        let mut projections = Vec::new();
        projections.extend(self.fact_columns(fact, IDENTITY_COLUMNS)?);
        projections.extend(self.fact_columns(fact, PERIOD_COLUMNS)?);
        for i in 1..=GROUP_COUNT {
            projections.push(Projection::new(
                table_col(&group_alias(i), "group_name").alias(&format!("group_{i}_name")),
                ColumnType::Text,
            ));
            projections.push(Projection::new(
                table_col(&group_value_alias(i), "group_value_name")
                    .alias(&format!("group_{i}_value")),
                ColumnType::Text,
            ));
        }
        projections.extend(self.fact_columns(fact, VALUE_COLUMNS)?);
        projections.push(self.column(source, SOURCE_ALIAS, "source")?);

        if q.join_indicator_meta {
            let indicator = self.table(INDICATOR_TABLE)?;
            for name in INDICATOR_META_COLUMNS {
                projections.push(self.column(indicator, INDICATOR_ALIAS, name)?);
            }
        }
        if q.join_geo_meta {
            projections.extend(geo_meta_columns(q.geo_level));
        }
        projections.push(select_geometry(
            q.geo_level.dimension().alias,
            GeoTableKind::Latest,
            q.geometry_mode,
            self.options.dialect,
        ));

        CompiledPlan::assemble(kind, self.options.dialect, base, projections)
    }

    fn apply_filters(&self, mut base: Query, q: &IndicatorQuery) -> Query {
        if let Some(id) = q.indicator_id {
            base = base.filter(table_col(FACT_ALIAS, "indicator_id").eq(id));
        }
        base = base.filter(table_col(FACT_ALIAS, "geo_code").eq(q.geo_level.code()));
        if let Some(value) = q.geo_value {
            base = base.filter(table_col(FACT_ALIAS, "geo_value").eq(value));
        }
        for predicate in q.groups.predicates(FACT_ALIAS) {
            base = base.filter(predicate);
        }
        base = base.filter(temporal_filter(q.as_of, FACT_ALIAS));
        if let Some(period_ref) = q.period_ref {
            base = base.filter(table_col(FACT_ALIAS, "period_ref").eq(period_ref));
        }
        base
    }

    // =========================================================================
    // Registry lookups
    // =========================================================================

    pub(crate) fn table(&self, name: &str) -> PlanResult<&'a TableDef> {
        self.registry
            .table(name)
            .ok_or_else(|| PlanError::UnknownTable(name.to_string()))
    }

    /// `alias.column`, typed from the registry.
    pub(crate) fn column(&self, table: &TableDef, alias: &str, column: &str) -> PlanResult<Projection> {
        let def = table.column(column).ok_or_else(|| PlanError::UnknownColumn {
            table: table.name.to_string(),
            column: column.to_string(),
        })?;
        Ok(Projection::new(table_col(alias, def.name).into(), def.column_type))
    }

    fn fact_columns(&self, fact: &TableDef, names: &[&str]) -> PlanResult<Vec<Projection>> {
        names
            .iter()
            .map(|name| self.column(fact, FACT_ALIAS, name))
            .collect()
    }
}

fn group_alias(i: usize) -> String {
    format!("tbl_dim_group_{i}")
}

fn group_value_alias(i: usize) -> String {
    format!("tbl_dim_group_value_{i}")
}

/// Deterministic row order so that pages never overlap.
fn fact_ordering() -> Vec<OrderByExpr> {
    let mut order = vec![
        OrderByExpr::new(table_col(FACT_ALIAS, "indicator_id")),
        OrderByExpr::new(table_col(FACT_ALIAS, "geo_value")),
        OrderByExpr::new(table_col(FACT_ALIAS, "period_ref")),
    ];
    for i in 1..=GROUP_COUNT {
        order.push(OrderByExpr::new(table_col(
            FACT_ALIAS,
            &format!("group_value_{i}_id"),
        )));
    }
    order
}

pub(crate) fn apply_page(query: Query, page: Page) -> Query {
    query.paginate(page.limit, page.offset)
}
