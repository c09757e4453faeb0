//! SQL generation.
//!
//! A small type-safe builder that renders the compiled plans to
//! dialect-specific SQL:
//!
//! - [`query`] - SELECT query builder
//! - [`expr`] - expression AST and builder DSL
//! - [`token`] - token types for SQL generation
//! - [`dialect`] - SQLite, PostgreSQL and DuckDB renderings

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;

#[cfg(test)]
pub mod test_utils;

pub use dialect::{Dialect, SqlDialect};
pub use expr::{
    col, count_star, func, lit_bool, lit_date, lit_int, lit_str, paren,
    row_number_over, table_col, BinaryOperator, Expr, ExprExt, Literal, SortDir, WindowOrderBy,
};
pub use query::{Cte, Join, JoinType, LimitOffset, OrderByExpr, Query, SelectExpr, TableRef};
pub use token::{Token, TokenStream};
