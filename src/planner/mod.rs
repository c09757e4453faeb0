//! Query planning: validated requests in, immutable [`CompiledPlan`]s out.
//!
//! - [`temporal`] - bitemporal validity predicate
//! - [`groups`] - group expansion predicates
//! - [`compiler`] - indicator and portrait exports
//! - [`values`], [`snapshot`], [`catalog`] - the remaining query families
//! - [`plan`] - the compiled plan and its output column contract

pub mod catalog;
pub mod compiler;
pub mod groups;
pub mod plan;
pub mod snapshot;
pub mod temporal;
pub mod values;

pub use catalog::{render_tree, IndicatorInfo};
pub use compiler::{CompileOptions, QueryCompiler};
pub use groups::GroupExpansion;
pub use plan::{CompiledPlan, OutputColumn, PlanKind, Projection};
pub use temporal::temporal_filter;

use thiserror::Error;

/// Errors that can occur during planning.
///
/// Every variant indicates a registry or compiler defect rather than bad
/// input; requests are validated before they reach the planner.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("table `{0}` is not in the schema registry")]
    UnknownTable(String),

    #[error("column `{column}` is not defined on `{table}`")]
    UnknownColumn { table: String, column: String },

    #[error("select item {0} has no output name")]
    UnnamedColumn(usize),

    #[error("geometry column at position {0} is not the last column")]
    GeometryNotLast(usize),
}

pub type PlanResult<T> = Result<T, PlanError>;
