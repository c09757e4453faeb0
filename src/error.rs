//! Crate-level error taxonomy.
//!
//! Each module has its own error enum; [`ServiceError`] gathers them at the
//! service boundary and classifies them into an [`ErrorKind`].

use serde::Serialize;
use thiserror::Error;

use crate::config::SettingsError;
use crate::engine::EngineError;
use crate::export::ExportError;
use crate::planner::PlanError;
use crate::request::ParamError;

/// Error taxonomy exposed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidParameter,
    ResourceLimitExceeded,
    EngineFailure,
    Cancelled,
    Internal,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Param(#[from] ParamError),

    #[error("query compilation failed: {0}")]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("export task failed: {0}")]
    Task(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Param(_) => ErrorKind::InvalidParameter,
            ServiceError::Engine(_) => ErrorKind::EngineFailure,
            ServiceError::Export(e) if e.is_disconnect() => ErrorKind::Cancelled,
            ServiceError::Export(ExportError::TooManyRows { .. }) => ErrorKind::ResourceLimitExceeded,
            ServiceError::Export(ExportError::Engine(_)) => ErrorKind::EngineFailure,
            ServiceError::Export(_)
            | ServiceError::Plan(_)
            | ServiceError::Settings(_)
            | ServiceError::Task(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status hint for the transport.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::InvalidParameter => 400,
            ErrorKind::ResourceLimitExceeded => 413,
            ErrorKind::EngineFailure => 503,
            ErrorKind::Cancelled => 499,
            ErrorKind::Internal => 500,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
