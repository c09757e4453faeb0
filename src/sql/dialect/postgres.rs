//! PostgreSQL dialect, as used by the PostGIS deployment of the marts.
//!
//! - ANSI identifier quoting (`"`)
//! - Native boolean and `DATE` literals
//! - Geometry columns are PostGIS `geometry`, serialized with `ST_AsBinary`

use super::helpers;
use super::SqlDialect;

/// PostgreSQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Postgres;

impl SqlDialect for Postgres {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn geometry_to_wkb_function(&self) -> Option<&'static str> {
        Some("ST_AsBinary")
    }
}
