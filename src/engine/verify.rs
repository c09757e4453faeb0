//! Startup check of the database against the schema registry.

use rusqlite::Connection;
use tracing::{info, warn};

use crate::schema::{SchemaNames, SchemaRegistry, TableDef};
use crate::sql::{col, Dialect, Query};

use super::{EngineError, EngineResult};

impl SchemaRegistry {
    /// Prepare `SELECT <columns> FROM <table> LIMIT 0` for every table and
    /// report each missing table or column.
    pub fn verify(&self, conn: &Connection, schemas: &SchemaNames) -> EngineResult<()> {
        let mut issues = Vec::new();
        for table in self.tables() {
            if conn.prepare(&probe_sql(table, schemas)).is_ok() {
                continue;
            }
            issues.extend(describe_mismatch(conn, table, schemas)?);
        }

        if issues.is_empty() {
            info!(tables = self.tables().count(), "schema verified");
            Ok(())
        } else {
            for issue in &issues {
                warn!(%issue, "schema mismatch");
            }
            Err(EngineError::SchemaMismatch(issues))
        }
    }
}

fn probe_sql(table: &TableDef, schemas: &SchemaNames) -> String {
    Query::new()
        .select(table.columns.iter().map(|c| col(c.name)).collect())
        .from(table.table_ref(schemas))
        .paginate(Some(0), None)
        .to_sql(Dialect::Sqlite)
}

fn describe_mismatch(
    conn: &Connection,
    table: &TableDef,
    schemas: &SchemaNames,
) -> EngineResult<Vec<String>> {
    let schema = schemas.for_kind(table.kind).unwrap_or("main");
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1, ?2)")?;
    let present = stmt
        .query_map([table.name, schema], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    if present.is_empty() {
        return Ok(vec![format!("missing table `{}`", table.name)]);
    }
    let issues: Vec<String> = table
        .columns
        .iter()
        .filter(|c| !present.iter().any(|p| p.eq_ignore_ascii_case(c.name)))
        .map(|c| format!("missing column `{}.{}`", table.name, c.name))
        .collect();
    if issues.is_empty() {
        // Columns exist but the probe still failed.
        return Ok(vec![format!("table `{}` cannot be queried", table.name)]);
    }
    Ok(issues)
}
