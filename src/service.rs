//! Async export orchestration.
//!
//! ```text
//! params ─▶ validate ─▶ compile ─▶ acquire ─▶ spawn_blocking ───────────────┐
//!                                              │ BEGIN, count guard,        │
//!                                              │ first row                  │
//!                                  ready ◀─────┘                            │
//!                                                rows ─▶ encoder ─▶ mpsc ─▶ body
//! ```
//!
//! Everything that can fail before the first byte (validation, the row
//! guard, the query itself) fails `export` instead of the body stream.

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use rusqlite::Connection;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info_span, Instrument};
use uuid::Uuid;

use crate::config::{ExportSettings, Settings};
use crate::engine::{self, ConnectionPool, EngineError, PooledConnection, SqliteCursor};
use crate::error::{ErrorKind, ServiceError, ServiceResult};
use crate::export::{
    ChannelWriter, ExportError, ExportFormat, ExportOutcome, Exporter, Prefetched,
};
use crate::geo::GeoLevel;
use crate::planner::{CompileOptions, CompiledPlan, IndicatorInfo, QueryCompiler};
use crate::request::{ExportParams, ExportRequest, SnapshotParams, ValuesParams};
use crate::sql::Dialect;

/// Streamed response body.
pub type ExportBody = ReceiverStream<Result<Bytes, ServiceError>>;

/// A started export. Dropping it cancels the export.
pub struct ExportResponse {
    pub format: ExportFormat,
    pub content_type: &'static str,
    pub file_name: &'static str,
    pub body: ExportBody,
}

impl ExportResponse {
    /// Copy the body into `out`, returning the byte count.
    pub async fn write_to<W: AsyncWrite + Unpin>(mut self, out: &mut W) -> ServiceResult<u64> {
        let mut written = 0u64;
        while let Some(chunk) = self.body.next().await {
            let chunk = chunk?;
            out.write_all(&chunk).await.map_err(ExportError::from)?;
            written += chunk.len() as u64;
        }
        out.flush().await.map_err(ExportError::from)?;
        Ok(written)
    }

    /// Collect the whole body.
    pub async fn into_bytes(self) -> ServiceResult<Vec<u8>> {
        let mut out = Vec::new();
        self.write_to(&mut out).await?;
        Ok(out)
    }
}

type ReadySender = oneshot::Sender<ServiceResult<()>>;
type ChunkSender = mpsc::Sender<Result<Bytes, ServiceError>>;

/// Export entry point shared by all requests.
#[derive(Clone)]
pub struct ExportService {
    pool: ConnectionPool,
    compiler: QueryCompiler<'static>,
    settings: Arc<ExportSettings>,
}

impl ExportService {
    pub fn new(pool: ConnectionPool, options: CompileOptions, settings: ExportSettings) -> Self {
        Self {
            pool,
            compiler: QueryCompiler::global(options),
            settings: Arc::new(settings),
        }
    }

    /// Open the configured database. Plans always target SQLite here; the
    /// configured dialect only affects compile-only output.
    pub fn from_settings(settings: &Settings) -> ServiceResult<Self> {
        let pool = ConnectionPool::open(settings.database.resolved_path()?, &settings.pool)?;
        let options = CompileOptions::new(Dialect::Sqlite, settings.database.schema_names()?);
        Ok(Self::new(pool, options, settings.export.clone()))
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Check the database against the schema registry.
    pub async fn verify_schema(&self) -> ServiceResult<()> {
        let conn = self.pool.acquire().await?;
        let schemas = self.compiler.options().schemas.clone();
        tokio::task::spawn_blocking(move || {
            crate::schema::SchemaRegistry::global().verify(&conn, &schemas)
        })
        .await
        .map_err(|e| ServiceError::Task(e.to_string()))??;
        Ok(())
    }

    /// Indicator or portrait export.
    pub async fn export(&self, params: &ExportParams) -> ServiceResult<ExportResponse> {
        self.run(params.validate()?).await
    }

    /// Latest value per indicator and entity.
    pub async fn values(&self, params: &ValuesParams) -> ServiceResult<ExportResponse> {
        self.run(params.validate()?).await
    }

    /// Historized geo dimension for one year.
    pub async fn snapshot(&self, params: &SnapshotParams) -> ServiceResult<ExportResponse> {
        self.run(params.validate()?).await
    }

    /// Indicators available for `level`.
    pub async fn catalog(&self, level: GeoLevel) -> ServiceResult<Vec<IndicatorInfo>> {
        let plan = self.compiler.compile_catalog(level)?;
        let conn = self.pool.acquire().await?;
        let indicators = tokio::task::spawn_blocking(move || engine::fetch_catalog(&conn, &plan))
            .await
            .map_err(|e| ServiceError::Task(e.to_string()))??;
        Ok(indicators)
    }

    /// Start a validated export and wait until its first row is ready.
    pub async fn run(&self, request: ExportRequest) -> ServiceResult<ExportResponse> {
        let format = request.format;
        let span = info_span!(
            "export",
            request_id = %Uuid::new_v4(),
            query = request.query.name(),
            format = %format,
            level = %request.query.geo_level(),
        );

        let plan = self.compiler.compile(&request.query)?;
        let conn = self.pool.acquire().instrument(span.clone()).await?;

        let (ready_tx, ready_rx) = oneshot::channel();
        let (chunk_tx, chunk_rx) = mpsc::channel(self.settings.channel_capacity);
        let settings = self.settings.clone();
        tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            export_blocking(conn, &plan, format, &settings, ready_tx, chunk_tx);
        });

        match ready_rx.await {
            Ok(Ok(())) => Ok(ExportResponse {
                format,
                content_type: format.content_type(),
                file_name: format.file_name(),
                body: ReceiverStream::new(chunk_rx),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ServiceError::Task("export ended before its first row".into())),
        }
    }
}

/// Body of the blocking export task. Errors before readiness go to `ready`,
/// later ones become the final item of the body. The connection is back in
/// the pool before either is reported.
fn export_blocking(
    conn: PooledConnection,
    plan: &CompiledPlan,
    format: ExportFormat,
    settings: &ExportSettings,
    ready: ReadySender,
    chunks: ChunkSender,
) {
    let mut exporter = Exporter::new(plan, format, settings);
    let mut ready = Some(ready);

    let result = stream_rows(&conn, plan, settings, &mut exporter, &mut ready, &chunks);
    drop(conn);
    let Err(e) = result else {
        return;
    };
    exporter.mark_failed();

    match ready.take() {
        Some(ready) => {
            log_failure(&e);
            let _ = ready.send(Err(e));
        }
        None if e.kind() == ErrorKind::Cancelled => {
            debug!(rows = exporter.outcome().rows, "client disconnected");
        }
        None => {
            log_failure(&e);
            let _ = chunks.blocking_send(Err(e));
        }
    }
}

fn stream_rows(
    conn: &Connection,
    plan: &CompiledPlan,
    settings: &ExportSettings,
    exporter: &mut Exporter<'_>,
    ready: &mut Option<ReadySender>,
    chunks: &ChunkSender,
) -> ServiceResult<ExportOutcome> {
    exporter.begin_execution()?;

    // One snapshot for the guard and the rows.
    let txn = conn.unchecked_transaction().map_err(EngineError::from)?;
    if exporter.needs_row_count() {
        let rows = engine::count_rows(&txn, plan)?;
        exporter.check_row_count(rows)?;
    }

    let sql = plan.sql();
    debug!(%sql, "executing");
    let mut stmt = txn.prepare(&sql).map_err(EngineError::from)?;
    let rows = stmt.query([]).map_err(EngineError::from)?;
    let mut cursor = Prefetched::new(SqliteCursor::new(rows, &plan.columns))?;

    if let Some(ready) = ready.take() {
        // A dropped receiver shows up as a broken pipe on the first write.
        let _ = ready.send(Ok(()));
    }

    let sink = ChannelWriter::new(chunks.clone(), settings.chunk_size);
    Ok(exporter.stream(&mut cursor, Box::new(sink))?)
}

fn log_failure(e: &ServiceError) {
    match e.kind() {
        ErrorKind::EngineFailure => error!(error = %e, "export failed"),
        ErrorKind::ResourceLimitExceeded | ErrorKind::InvalidParameter => {
            debug!(error = %e, "export rejected")
        }
        _ => error!(error = %e, kind = ?e.kind(), "export failed"),
    }
}
