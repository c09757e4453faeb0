//! SQLite dialect, the bundled execution engine.
//!
//! - Dates are ISO-8601 TEXT, so date literals are plain strings and
//!   compare lexicographically in calendar order
//! - Booleans are INTEGER 0/1; `true`/`false` keywords are accepted
//! - Geometry columns hold WKB blobs
//! - OFFSET is only legal after LIMIT

use super::helpers;
use super::SqlDialect;
use crate::sql::token::TokenStream;

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_literal(b)
    }

    fn format_date_literal(&self, date: &str) -> String {
        helpers::quote_string_single(date)
    }

    fn emit_limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> TokenStream {
        helpers::emit_limit_offset_limit_required(limit, offset)
    }
}
