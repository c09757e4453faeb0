//! SQL dialect definitions and formatting rules.
//!
//! Each dialect implements `SqlDialect` for the handful of syntax differences
//! the compilers run into:
//!
//! - Identifier quoting and string escaping
//! - Boolean and date literals
//! - Pagination (SQLite cannot emit OFFSET without LIMIT)
//! - Geometry serialization to well-known binary
//!
//! | Feature | PostgreSQL/PostGIS | DuckDB (spatial) | SQLite |
//! |---------|--------------------|------------------|--------|
//! | Date literal | `DATE '...'` | `DATE '...'` | `'...'` (ISO text) |
//! | WKB output | `ST_AsBinary` | `ST_AsWKB` | stored as WKB blob |
//! | OFFSET alone | yes | yes | needs `LIMIT -1` |
//! | Window functions | yes | yes | 3.25+ |

pub mod helpers;
mod duckdb;
mod postgres;
mod sqlite;

pub use duckdb::DuckDb;
pub use postgres::Postgres;
pub use sqlite::Sqlite;

use serde::{Deserialize, Serialize};

use super::token::TokenStream;

/// SQL dialect trait - defines how SQL constructs are rendered.
///
/// The default implementations follow ANSI SQL.
pub trait SqlDialect: std::fmt::Debug {
    /// Dialect name for display/logging.
    fn name(&self) -> &'static str;

    // =========================================================================
    // Identifier and Literal Quoting
    // =========================================================================

    fn quote_identifier(&self, ident: &str) -> String;

    /// Quote a string literal with `''` escaping.
    fn quote_string(&self, s: &str) -> String {
        helpers::quote_string_single(s)
    }

    fn format_bool(&self, b: bool) -> &'static str;

    /// Format an ISO date literal.
    fn format_date_literal(&self, date: &str) -> String {
        format!("DATE {}", helpers::quote_string_single(date))
    }

    // =========================================================================
    // Pagination
    // =========================================================================

    /// Emit LIMIT/OFFSET or equivalent pagination clause.
    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_standard(limit, offset)
    }

    // =========================================================================
    // Geometry
    // =========================================================================

    /// Function that turns a stored geometry into well-known binary.
    ///
    /// `None` means the column already holds WKB.
    fn geometry_to_wkb_function(&self) -> Option<&'static str> {
        None
    }
}

/// Supported SQL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Sqlite,
    Postgres,
    DuckDb,
}

impl Dialect {
    /// Get the dialect implementation.
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::Sqlite => &Sqlite,
            Dialect::Postgres => &Postgres,
            Dialect::DuckDb => &DuckDb,
        }
    }

    /// Parse a dialect name (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sqlite" => Some(Dialect::Sqlite),
            "postgres" | "postgresql" | "postgis" => Some(Dialect::Postgres),
            "duckdb" => Some(Dialect::DuckDb),
            _ => None,
        }
    }
}

// Implement SqlDialect for Dialect enum by delegating to concrete types
impl SqlDialect for Dialect {
    fn name(&self) -> &'static str {
        self.dialect().name()
    }

    fn quote_identifier(&self, ident: &str) -> String {
        self.dialect().quote_identifier(ident)
    }

    fn quote_string(&self, s: &str) -> String {
        self.dialect().quote_string(s)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        self.dialect().format_bool(b)
    }

    fn format_date_literal(&self, date: &str) -> String {
        self.dialect().format_date_literal(date)
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        self.dialect().emit_limit_offset(limit, offset)
    }

    fn geometry_to_wkb_function(&self) -> Option<&'static str> {
        self.dialect().geometry_to_wkb_function()
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dialect().name())
    }
}
