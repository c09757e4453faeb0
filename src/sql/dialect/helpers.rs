//! Shared helper functions for SQL dialect implementations.

use super::super::token::{Token, TokenStream};

/// Quote identifier with double quotes (ANSI style).
/// Used by: Postgres, DuckDB, SQLite
pub fn quote_double(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote string with single quotes (standard SQL).
pub fn quote_string_single(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Format boolean as literal true/false.
pub fn format_bool_literal(b: bool) -> &'static str {
    if b {
        "true"
    } else {
        "false"
    }
}

fn count_literal(n: u64) -> Token {
    Token::LitInt(i64::try_from(n).unwrap_or(i64::MAX))
}

/// Emit `LIMIT n OFFSET m`, either part optional.
pub fn emit_limit_offset_standard(limit: Option<u64>, offset: Option<u64>) -> TokenStream {
    let mut ts = TokenStream::new();

    if let Some(lim) = limit {
        ts.push(Token::Limit).space().push(count_literal(lim));
    }

    if let Some(off) = offset {
        if limit.is_some() {
            ts.space();
        }
        ts.push(Token::Offset).space().push(count_literal(off));
    }

    ts
}

/// Emit pagination where OFFSET requires a LIMIT (`LIMIT -1` means unbounded).
pub fn emit_limit_offset_limit_required(limit: Option<u64>, offset: Option<u64>) -> TokenStream {
    match (limit, offset) {
        (None, Some(off)) => {
            let mut ts = TokenStream::new();
            ts.push(Token::Limit)
                .space()
                .push(Token::LitInt(-1))
                .space()
                .push(Token::Offset)
                .space()
                .push(count_literal(off));
            ts
        }
        _ => emit_limit_offset_standard(limit, offset),
    }
}
