//! # odapi
//!
//! Query compilation and multi-format export of Swiss geo indicators.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │            Raw parameters (ExportParams, ...)            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [request]
//! ┌─────────────────────────────────────────────────────────┐
//! │          ExportRequest (typed query + format)            │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner + schema + geo]
//! ┌─────────────────────────────────────────────────────────┐
//! │      CompiledPlan (SQL + ordered output columns)         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [engine]
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Row cursor (SQLite)                      │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [export]
//! ┌─────────────────────────────────────────────────────────┐
//! │  GeoJSON / CSV / spreadsheet / Parquet byte stream       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! [`service::ExportService`] ties the stages together for async callers.

pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod geo;
pub mod planner;
pub mod request;
pub mod schema;
pub mod service;
pub mod sql;

pub use config::Settings;
pub use error::{ErrorKind, ServiceError, ServiceResult};
pub use export::ExportFormat;
pub use geo::{GeoLevel, GeometryMode};
pub use planner::{CompileOptions, CompiledPlan, QueryCompiler};
pub use request::{ExportParams, ExportRequest, SnapshotParams, ValuesParams};
pub use service::{ExportResponse, ExportService};
pub use sql::Dialect;
