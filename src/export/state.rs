//! Per-export state machine.
//!
//! `Compiled → Executing → Streaming → Complete`, with `Failed` reachable
//! from every non-terminal state.

use std::io::Write;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::ExportSettings;
use crate::planner::CompiledPlan;

use super::{check_shape, ExportError, ExportFormat, ExportResult, RowCursor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportState {
    Compiled,
    Executing,
    Streaming,
    Complete,
    Failed,
}

impl ExportState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExportState::Complete | ExportState::Failed)
    }

    fn can_advance_to(self, next: ExportState) -> bool {
        use ExportState::*;
        matches!(
            (self, next),
            (Compiled, Executing) | (Executing, Streaming) | (Streaming, Complete)
        ) || (next == Failed && !self.is_terminal())
    }
}

/// How an export ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExportOutcome {
    pub state: ExportState,
    pub rows: u64,
}

/// Drives one compiled plan through an encoder.
pub struct Exporter<'a> {
    plan: &'a CompiledPlan,
    format: ExportFormat,
    settings: &'a ExportSettings,
    state: ExportState,
    rows: u64,
}

impl<'a> Exporter<'a> {
    pub fn new(plan: &'a CompiledPlan, format: ExportFormat, settings: &'a ExportSettings) -> Self {
        Self {
            plan,
            format,
            settings,
            state: ExportState::Compiled,
            rows: 0,
        }
    }

    pub fn state(&self) -> ExportState {
        self.state
    }

    pub fn format(&self) -> ExportFormat {
        self.format
    }

    pub fn outcome(&self) -> ExportOutcome {
        ExportOutcome {
            state: self.state,
            rows: self.rows,
        }
    }

    fn advance(&mut self, next: ExportState) -> ExportResult<()> {
        if !self.state.can_advance_to(next) {
            return Err(ExportError::Transition {
                from: self.state,
                to: next,
            });
        }
        debug!(from = ?self.state, to = ?next, "export state");
        self.state = next;
        Ok(())
    }

    /// Enter `Failed` unless already terminal.
    pub fn mark_failed(&mut self) {
        if !self.state.is_terminal() {
            debug!(from = ?self.state, to = ?ExportState::Failed, "export state");
            self.state = ExportState::Failed;
        }
    }

    /// Record a failure and pass the error through.
    pub fn fail(&mut self, error: ExportError) -> ExportError {
        self.mark_failed();
        error
    }

    /// The plan is about to be issued against the engine.
    pub fn begin_execution(&mut self) -> ExportResult<()> {
        self.advance(ExportState::Executing)
    }

    /// Whether a `COUNT(*)` is needed before streaming.
    ///
    /// Only capped formats need one, and not when the plan's own LIMIT
    /// already stays within the cap.
    pub fn needs_row_count(&self) -> bool {
        match self.format.row_cap(self.settings) {
            None => false,
            Some(cap) => !matches!(self.plan.query.limit(), Some(limit) if limit <= cap),
        }
    }

    /// Reject the export when `rows` exceeds the format's cap.
    pub fn check_row_count(&mut self, rows: u64) -> ExportResult<()> {
        if let Some(limit) = self.format.row_cap(self.settings) {
            if rows > limit {
                warn!(format = %self.format, rows, limit, "row guard rejected export");
                return Err(self.fail(ExportError::TooManyRows {
                    format: self.format,
                    rows,
                    limit,
                }));
            }
        }
        Ok(())
    }

    /// Stream every row of `cursor` into `sink`.
    pub fn stream(
        &mut self,
        cursor: &mut dyn RowCursor,
        sink: Box<dyn Write + Send>,
    ) -> ExportResult<ExportOutcome> {
        self.advance(ExportState::Streaming)?;
        let started = Instant::now();

        match self.pump(cursor, sink) {
            Ok(()) => {
                self.advance(ExportState::Complete)?;
                info!(
                    format = %self.format,
                    rows = self.rows,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "export complete"
                );
                Ok(self.outcome())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn pump(&mut self, cursor: &mut dyn RowCursor, sink: Box<dyn Write + Send>) -> ExportResult<()> {
        let columns = &self.plan.columns;
        let mut encoder = self.format.encoder(sink, self.settings);
        encoder.begin(columns)?;
        while let Some(row) = cursor.next_row()? {
            check_shape(&row, columns.len(), self.rows)?;
            encoder.write_row(&row)?;
            self.rows += 1;
        }
        encoder.finish()
    }
}
