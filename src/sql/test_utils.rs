//! Test utilities for SQL emission validation.
//!
//! Round-trips emitted SQL through sqlparser-rs to catch syntax errors.

use sqlparser::dialect::{DuckDbDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

use super::dialect::Dialect;

/// Validates that a SQL string is syntactically valid for the given dialect.
pub fn validate_sql(sql: &str, dialect: Dialect) -> Result<(), String> {
    let parser_dialect: Box<dyn sqlparser::dialect::Dialect> = match dialect {
        Dialect::Sqlite => Box::new(SQLiteDialect {}),
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
        Dialect::DuckDb => Box::new(DuckDbDialect {}),
    };

    Parser::parse_sql(&*parser_dialect, sql)
        .map(|_| ())
        .map_err(|e| format!("Invalid SQL for {:?}: {}\nSQL: {}", dialect, e, sql))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_valid_sql() {
        validate_sql("SELECT * FROM dim_kanton_latest", Dialect::Postgres).unwrap();
        validate_sql("SELECT * FROM dim_kanton_latest LIMIT -1 OFFSET 3", Dialect::Sqlite).unwrap();
    }

    #[test]
    fn test_validate_invalid_sql() {
        let result = validate_sql("SELEC * FORM dim_kanton_latest", Dialect::Postgres);
        assert!(result.is_err());
    }
}
