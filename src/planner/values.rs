//! Latest value per indicator and geo entity.

use crate::geo::FACT_ALIAS;
use crate::request::LatestValuesQuery;
use crate::schema::FACT_TABLE;
use crate::sql::{
    col, row_number_over, table_col, Cte, ExprExt, OrderByExpr, Query, TableRef, WindowOrderBy,
};

use super::compiler::{apply_page, QueryCompiler};
use super::groups::GroupExpansion;
use super::plan::{CompiledPlan, PlanKind, Projection};
use super::temporal::temporal_filter;
use super::PlanResult;

const RANKED_CTE: &str = "ranked_values";
const RANK_COLUMN: &str = "value_rank";

const VALUE_COLUMNS: &[&str] = &[
    "indicator_id",
    "geo_value",
    "indicator_value_numeric",
    "source_id",
];

impl<'a> QueryCompiler<'a> {
    /// One row per `(indicator_id, geo_value)` holding the value with the
    /// most recent `period_ref_from`, totals only.
    pub fn compile_latest_values(&self, q: &LatestValuesQuery) -> PlanResult<CompiledPlan> {
        let fact = self.table(FACT_TABLE)?;

        let mut inner_select = Vec::with_capacity(VALUE_COLUMNS.len() + 1);
        let mut projections = Vec::with_capacity(VALUE_COLUMNS.len());
        for name in VALUE_COLUMNS {
            let column = self.column(fact, FACT_ALIAS, name)?;
            projections.push(Projection::new(
                table_col(RANKED_CTE, name).into(),
                column.column_type,
            ));
            inner_select.push(column.item);
        }
        inner_select.push(
            row_number_over(
                vec![
                    table_col(FACT_ALIAS, "indicator_id"),
                    table_col(FACT_ALIAS, "geo_value"),
                ],
                vec![WindowOrderBy::desc(table_col(FACT_ALIAS, "period_ref_from"))],
            )
            .alias(RANK_COLUMN),
        );

        let mut ranked = Query::new()
            .select(inner_select)
            .from(fact.table_ref(&self.options().schemas).with_alias(FACT_ALIAS))
            .filter(table_col(FACT_ALIAS, "geo_code").eq(q.geo_level.code()));
        for predicate in GroupExpansion::totals_only().predicates(FACT_ALIAS) {
            ranked = ranked.filter(predicate);
        }
        ranked = ranked.filter(temporal_filter(q.as_of, FACT_ALIAS));

        let base = Query::new()
            .with_cte(Cte::new(RANKED_CTE, ranked))
            .from(TableRef::new(RANKED_CTE))
            .filter(col(RANK_COLUMN).eq(1))
            .order_by(vec![
                OrderByExpr::new(table_col(RANKED_CTE, "indicator_id")),
                OrderByExpr::new(table_col(RANKED_CTE, "geo_value")),
            ]);
        let base = apply_page(base, q.page);

        CompiledPlan::assemble(PlanKind::LatestValues, self.dialect(), base, projections)
    }
}
