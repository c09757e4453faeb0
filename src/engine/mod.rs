//! Relational engine access.
//!
//! The bundled engine is SQLite through `rusqlite`. Geometry is stored as
//! WKB blobs, dates as ISO text and booleans as 0/1 integers.
//!
//! - [`pool`] - bounded pool of read-only connections
//! - [`cursor`] - forward-only row cursor feeding the exporter
//! - [`verify`] - startup check of the database against the registry

pub mod cursor;
pub mod pool;
pub mod verify;

pub use cursor::SqliteCursor;
pub use pool::{ConnectionPool, PooledConnection};

use std::path::PathBuf;
use std::time::Duration;

use rusqlite::Connection;
use thiserror::Error;
use tracing::debug;

use crate::planner::{CompiledPlan, IndicatorInfo};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot open database {path}: {source}")]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("no database connection available within {0:?}")]
    PoolTimeout(Duration),

    #[error("connection pool is closed")]
    PoolClosed,

    #[error("database does not match the schema registry: {}", .0.join("; "))]
    SchemaMismatch(Vec<String>),

    #[error("cannot decode column `{column}`: {reason}")]
    Decode { column: String, reason: String },
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Run the plan's `COUNT(*)` wrapper.
pub fn count_rows(conn: &Connection, plan: &CompiledPlan) -> EngineResult<u64> {
    let sql = plan.count_sql();
    debug!(%sql, "row count");
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count.max(0) as u64)
}

/// Run a catalog plan and collect its records.
pub fn fetch_catalog(conn: &Connection, plan: &CompiledPlan) -> EngineResult<Vec<IndicatorInfo>> {
    let sql = plan.sql();
    debug!(%sql, "catalog");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok(IndicatorInfo {
            indicator_id: row.get("indicator_id")?,
            indicator_name: row.get("indicator_name")?,
            topic_1: row.get("topic_1")?,
            topic_2: row.get("topic_2")?,
            topic_3: row.get("topic_3")?,
            topic_4: row.get("topic_4")?,
            indicator_unit: row.get("indicator_unit")?,
            indicator_description: row.get("indicator_description")?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}
