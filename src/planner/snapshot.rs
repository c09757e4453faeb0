//! Historized geo dimension for one snapshot year.

use crate::geo::{select_geometry, GeoLevel, GeoTableKind};
use crate::request::SnapshotQuery;
use crate::sql::{table_col, ExprExt, OrderByExpr, Query};

use super::compiler::{apply_page, QueryCompiler};
use super::plan::{CompiledPlan, PlanKind};
use super::PlanResult;

fn snapshot_columns(level: GeoLevel) -> &'static [&'static str] {
    match level {
        GeoLevel::Municipality => &[
            "snapshot_date",
            "gemeinde_bfs_id",
            "gemeinde_hist_bfs_id",
            "gemeinde_name",
            "bezirk_bfs_id",
            "kanton_bfs_id",
        ],
        GeoLevel::District => &["snapshot_date", "bezirk_bfs_id", "bezirk_name", "kanton_bfs_id"],
        GeoLevel::Canton => &["snapshot_date", "kanton_bfs_id", "kanton_name", "icc"],
    }
}

impl<'a> QueryCompiler<'a> {
    /// Entities of `level` as they were in `year`, geometry last.
    pub fn compile_snapshot(&self, q: &SnapshotQuery) -> PlanResult<CompiledPlan> {
        let dim = q.geo_level.dimension();
        let table = self.table(dim.historized_table)?;

        let mut projections = snapshot_columns(q.geo_level)
            .iter()
            .map(|name| self.column(table, dim.alias, name))
            .collect::<PlanResult<Vec<_>>>()?;
        projections.push(select_geometry(
            dim.alias,
            GeoTableKind::Historized,
            q.geometry_mode,
            self.dialect(),
        ));

        let base = Query::new()
            .from(table.table_ref(&self.options().schemas).with_alias(dim.alias))
            .filter(table_col(dim.alias, "snapshot_year").eq(q.year))
            .order_by(vec![OrderByExpr::new(table_col(dim.alias, dim.id_column))]);
        let base = apply_page(base, q.page);

        CompiledPlan::assemble(PlanKind::GeoSnapshot, self.dialect(), base, projections)
    }
}
