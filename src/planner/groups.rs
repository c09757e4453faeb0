//! Group expansion resolver.

use serde::{Deserialize, Serialize};

use crate::schema::GROUP_COUNT;
use crate::sql::{table_col, Expr, ExprExt};

/// Which group dimensions return their breakdown rows instead of the total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupExpansion {
    pub expand_all: bool,
    pub expand_group: [bool; GROUP_COUNT],
}

impl GroupExpansion {
    /// Every group restricted to its total row.
    pub fn totals_only() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            expand_all: true,
            ..Self::default()
        }
    }

    /// Expand only the 1-based group `index`.
    pub fn with_group(mut self, index: usize, expand: bool) -> Self {
        if (1..=GROUP_COUNT).contains(&index) {
            self.expand_group[index - 1] = expand;
        }
        self
    }

    /// Whether the 1-based group `index` is expanded.
    pub fn is_expanded(&self, index: usize) -> bool {
        self.expand_all || self.expand_group.get(index.wrapping_sub(1)).copied().unwrap_or(false)
    }

    /// Total-row predicates for each collapsed group, in group order.
    pub fn predicates(&self, table_alias: &str) -> Vec<Expr> {
        (1..=GROUP_COUNT)
            .filter(|&i| !self.is_expanded(i))
            .map(|i| table_col(table_alias, &is_total_column(i)).eq(true))
            .collect()
    }
}

pub fn is_total_column(index: usize) -> String {
    format!("_group_value_{index}_is_total")
}
