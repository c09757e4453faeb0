//! Compiled plans: an immutable query plus its ordered output contract.

use serde::Serialize;

use crate::geo::GEOMETRY_ALIAS;
use crate::schema::ColumnType;
use crate::sql::{count_star, Cte, Dialect, ExprExt, Query, SelectExpr, TableRef};

use super::{PlanError, PlanResult};

/// Name of the CTE wrapping a plan for the row-count guard.
const COUNT_CTE: &str = "export_rows";

/// A select item together with the type the exporters should expect.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    pub item: SelectExpr,
    pub column_type: ColumnType,
}

impl Projection {
    pub fn new(item: SelectExpr, column_type: ColumnType) -> Self {
        Self { item, column_type }
    }
}

/// One column of the result set, as encoders see it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputColumn {
    pub name: String,
    pub column_type: ColumnType,
}

/// Which query family produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    /// Observations of one indicator.
    Indicator,
    /// Every indicator of one geo entity.
    Portrait,
    /// Most recent value per indicator and entity.
    LatestValues,
    /// Historized geo dimension for one year.
    GeoSnapshot,
    /// Available indicators for a level.
    Catalog,
}

/// Immutable, re-runnable result of compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPlan {
    pub kind: PlanKind,
    pub dialect: Dialect,
    pub query: Query,
    pub columns: Vec<OutputColumn>,
}

impl CompiledPlan {
    /// Attach `projections` as the select list of `base`.
    ///
    /// Every projection must have an output name, and a geometry column may
    /// only appear last.
    pub fn assemble(
        kind: PlanKind,
        dialect: Dialect,
        base: Query,
        projections: Vec<Projection>,
    ) -> PlanResult<Self> {
        let mut columns = Vec::with_capacity(projections.len());
        let mut select = Vec::with_capacity(projections.len());
        let last = projections.len().saturating_sub(1);

        for (i, projection) in projections.into_iter().enumerate() {
            let name = projection
                .item
                .output_name()
                .ok_or(PlanError::UnnamedColumn(i))?
                .to_string();
            if projection.column_type == ColumnType::Geometry && (i != last || name != GEOMETRY_ALIAS) {
                return Err(PlanError::GeometryNotLast(i));
            }
            columns.push(OutputColumn {
                name,
                column_type: projection.column_type,
            });
            select.push(projection.item);
        }

        Ok(Self {
            kind,
            dialect,
            query: base.select(select),
            columns,
        })
    }

    /// Rendered SQL for the plan's dialect.
    pub fn sql(&self) -> String {
        self.query.to_sql(self.dialect)
    }

    /// Position of the geometry column, always the last one when present.
    pub fn geometry_index(&self) -> Option<usize> {
        self.columns
            .last()
            .filter(|c| c.column_type == ColumnType::Geometry)
            .map(|_| self.columns.len() - 1)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// `SELECT COUNT(*)` over the plan, ignoring its ORDER BY.
    ///
    /// The plan's own CTEs are hoisted so the result never nests a WITH.
    pub fn count_query(&self) -> Query {
        let mut inner = self.query.clone();
        inner.order_by.clear();
        let hoisted = std::mem::take(&mut inner.with);

        let wrapped = hoisted
            .into_iter()
            .fold(Query::new(), |q, cte| q.with_cte(cte));
        wrapped
            .with_cte(Cte::new(COUNT_CTE, inner))
            .select(vec![count_star().alias("row_count")])
            .from(TableRef::new(COUNT_CTE))
    }

    pub fn count_sql(&self) -> String {
        self.count_query().to_sql(self.dialect)
    }
}
