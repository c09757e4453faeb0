//! Bitemporal filter builder.
//!
//! Fact rows carry a half-open knowledge interval
//! `[knowledge_date_from, knowledge_date_to)`; an open upper bound marks the
//! currently valid version.

use chrono::NaiveDate;

use crate::sql::{paren, table_col, Expr, ExprExt};

pub const KNOWLEDGE_FROM: &str = "knowledge_date_from";
pub const KNOWLEDGE_TO: &str = "knowledge_date_to";

/// Validity predicate against `table_alias`.
///
/// With `as_of`, keeps the version whose interval contains the date (lower
/// bound inclusive, upper bound exclusive). Without it, keeps the version
/// that is still open.
pub fn temporal_filter(as_of: Option<NaiveDate>, table_alias: &str) -> Expr {
    let to = table_col(table_alias, KNOWLEDGE_TO);
    match as_of {
        None => to.is_null(),
        Some(date) => table_col(table_alias, KNOWLEDGE_FROM)
            .lte(date)
            .and(paren(to.clone().is_null().or(to.gt(date)))),
    }
}
