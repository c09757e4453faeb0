//! Available-indicator catalog and its text tree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::geo::GeoLevel;
use crate::schema::registry::AVAILABLE_INDICATOR_TABLE;
use crate::sql::{table_col, ExprExt, OrderByExpr, Query};

use super::compiler::QueryCompiler;
use super::plan::{CompiledPlan, PlanKind};
use super::PlanResult;

const CATALOG_ALIAS: &str = "available";

const CATALOG_COLUMNS: &[&str] = &[
    "indicator_id",
    "indicator_name",
    "topic_1",
    "topic_2",
    "topic_3",
    "topic_4",
    "indicator_unit",
    "indicator_description",
];

/// One available indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorInfo {
    pub indicator_id: i64,
    pub indicator_name: Option<String>,
    pub topic_1: Option<String>,
    pub topic_2: Option<String>,
    pub topic_3: Option<String>,
    pub topic_4: Option<String>,
    pub indicator_unit: Option<String>,
    pub indicator_description: Option<String>,
}

impl IndicatorInfo {
    /// Leaf label, e.g. `[#0042] Einwohner (Anzahl)`.
    pub fn label(&self) -> String {
        let name = self.indicator_name.as_deref().unwrap_or_default();
        match &self.indicator_unit {
            Some(unit) => format!("[#{:04}] {} ({})", self.indicator_id, name, unit),
            None => format!("[#{:04}] {}", self.indicator_id, name),
        }
    }

    fn topics(&self) -> impl Iterator<Item = &str> {
        [&self.topic_1, &self.topic_2, &self.topic_3, &self.topic_4]
            .into_iter()
            .filter_map(|t| t.as_deref())
    }
}

impl<'a> QueryCompiler<'a> {
    /// Indicators published for `level`, ordered by id.
    pub fn compile_catalog(&self, level: GeoLevel) -> PlanResult<CompiledPlan> {
        let table = self.table(AVAILABLE_INDICATOR_TABLE)?;
        let projections = CATALOG_COLUMNS
            .iter()
            .map(|name| self.column(table, CATALOG_ALIAS, name))
            .collect::<PlanResult<Vec<_>>>()?;

        let base = Query::new()
            .from(table.table_ref(&self.options().schemas).with_alias(CATALOG_ALIAS))
            .filter(table_col(CATALOG_ALIAS, "geo_code").eq(level.code()))
            .order_by(vec![OrderByExpr::new(table_col(CATALOG_ALIAS, "indicator_id"))]);

        CompiledPlan::assemble(PlanKind::Catalog, self.dialect(), base, projections)
    }
}

// =============================================================================
// Text tree
// =============================================================================

#[derive(Default)]
struct Node {
    children: BTreeMap<String, Node>,
}

impl Node {
    fn insert<'s>(&mut self, path: impl Iterator<Item = &'s str>, leaf: String) {
        let mut node = self;
        for segment in path {
            node = node.children.entry(segment.to_string()).or_default();
        }
        node.children.entry(leaf).or_default();
    }

    fn render(&self, prefix: &str, out: &mut String) {
        let count = self.children.len();
        for (i, (label, child)) in self.children.iter().enumerate() {
            let last = i + 1 == count;
            out.push_str(prefix);
            out.push_str(if last { "└─╼ " } else { "├─╼ " });
            out.push_str(label);
            out.push('\n');
            let extension = if last { "    " } else { "│   " };
            child.render(&format!("{prefix}{extension}"), out);
        }
    }
}

/// Render indicators as a topic tree, one line per node.
///
/// Topics nest `topic_1` to `topic_4`; missing levels are skipped, so an
/// indicator hangs under its deepest known topic.
pub fn render_tree(indicators: &[IndicatorInfo]) -> String {
    let mut root = Node::default();
    for info in indicators {
        root.insert(info.topics(), info.label());
    }

    let mut out = String::new();
    for (label, child) in &root.children {
        out.push_str("╙── ");
        out.push_str(label);
        out.push('\n');
        child.render("    ", &mut out);
    }
    out
}
