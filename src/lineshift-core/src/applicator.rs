//! Batch application.
//!
//! Operations are applied one at a time, in order. Before each one the ledger
//! says how far its declared anchor has moved because of the operations
//! already applied; every line field of the operation is shifted by that
//! amount. After each primitive (insert or delete) its net effect is recorded
//! against the operation's *declared* anchor, so corrections always key off the
//! original frame.
//!
//! The first failing operation aborts the batch. Operations already applied
//! stay applied and are reported as such.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::buffer::{BufferId, BufferProvider};
use crate::config::{EditConfig, SaveMode};
use crate::error::{EditError, EditResult};
use crate::gate::{ApprovalGate, AutoApprove};
use crate::ledger::{DeltaLedger, LineDelta};
use crate::operation::{Batch, EditOperation, OperationKind, optional_line, required_line};
use crate::persist::Persistence;
use crate::session::EditSession;

/// Outcome of one operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationStatus {
    /// Applied to the buffer.
    Applied,
    /// Declined by the approval gate; nothing changed.
    Rejected,
    /// Failed and aborted the batch.
    Failed { error: EditError },
    /// Not attempted because an earlier operation failed.
    NotReached,
}

/// Report for a single operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationReport {
    /// Position in the batch (0-based).
    pub index: usize,
    pub kind: OperationKind,
    /// Resolved target buffer, when it got that far.
    pub buffer: Option<BufferId>,
    pub status: OperationStatus,
    /// Corrected 1-based line the operation took effect at.
    pub applied_line: Option<usize>,
    /// Deltas recorded for this operation, in order.
    pub deltas: Vec<LineDelta>,
}

impl OperationReport {
    fn new(index: usize, operation: &EditOperation, status: OperationStatus) -> Self {
        Self {
            index,
            kind: operation.kind(),
            buffer: operation.buffer(),
            status,
            applied_line: None,
            deltas: Vec::new(),
        }
    }

    /// Net line-count change of this operation.
    pub fn net_change(&self) -> isize {
        self.deltas.iter().map(|d| d.amount).sum()
    }
}

/// How a batch ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BatchOutcome {
    Completed,
    Aborted { index: usize, error: EditError },
}

/// Report of a whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub outcome: BatchOutcome,
    /// One report per operation of the batch, in batch order.
    pub operations: Vec<OperationReport>,
    /// Number of operations applied.
    pub applied: usize,
    /// Number of operations the gate declined.
    pub rejected: usize,
    /// Buffers saved after the batch.
    pub saved: Vec<BufferId>,
}

impl BatchResult {
    /// Whether every operation ran (applied or rejected).
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Completed)
    }

    /// The error that aborted the batch, if any.
    pub fn error(&self) -> Option<&EditError> {
        match &self.outcome {
            BatchOutcome::Aborted { error, .. } => Some(error),
            BatchOutcome::Completed => None,
        }
    }

    /// Net line-count change across the batch.
    pub fn net_change(&self) -> isize {
        self.operations.iter().map(OperationReport::net_change).sum()
    }

    /// Get a summary string.
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "Applied {} of {} operation(s) ({:+} line(s))",
            self.applied,
            self.operations.len(),
            self.net_change()
        );

        if self.rejected > 0 {
            summary.push_str(&format!(", {} rejected", self.rejected));
        }

        if let BatchOutcome::Aborted { index, error } = &self.outcome {
            summary.push_str(&format!("; aborted at operation {}: {error}", index + 1));
        }

        summary
    }
}

/// Applies batches of [`EditOperation`]s to buffers.
pub struct BatchApplicator {
    gate: Box<dyn ApprovalGate>,
    save_mode: SaveMode,
    persistence: Option<Box<dyn Persistence>>,
}

impl BatchApplicator {
    /// Approve everything, never save.
    pub fn new() -> Self {
        Self {
            gate: Box::new(AutoApprove),
            save_mode: SaveMode::Manual,
            persistence: None,
        }
    }

    /// Gate and save mode taken from configuration.
    pub fn from_config(config: &EditConfig) -> Self {
        Self::new()
            .with_gate(config.approval.clone())
            .with_save_mode(config.save_mode)
    }

    pub fn with_gate(mut self, gate: impl ApprovalGate + 'static) -> Self {
        self.gate = Box::new(gate);
        self
    }

    pub fn with_save_mode(mut self, mode: SaveMode) -> Self {
        self.save_mode = mode;
        self
    }

    pub fn with_persistence(mut self, persistence: impl Persistence + 'static) -> Self {
        self.persistence = Some(Box::new(persistence));
        self
    }

    pub fn save_mode(&self) -> SaveMode {
        self.save_mode
    }

    /// Apply `batch` to `buffer` in a fresh session.
    pub fn apply(
        &mut self,
        buffers: &mut dyn BufferProvider,
        buffer: BufferId,
        batch: &Batch,
    ) -> BatchResult {
        let mut session = EditSession::for_buffer(buffer);
        self.apply_in(buffers, &mut session, batch)
    }

    /// Apply `batch` within `session`.
    ///
    /// The session's ledger is cleared when the batch starts and again when it
    /// ends, whatever the outcome.
    pub fn apply_in(
        &mut self,
        buffers: &mut dyn BufferProvider,
        session: &mut EditSession,
        batch: &Batch,
    ) -> BatchResult {
        let span = info_span!("apply_batch", operations = batch.len());
        let _enter = span.enter();

        session.begin();
        let mut reports = Vec::with_capacity(batch.len());
        let mut touched = BTreeSet::new();
        let mut outcome = BatchOutcome::Completed;

        for (index, operation) in batch.iter().enumerate() {
            session.advance(index);
            match self.apply_one(buffers, session, index, operation) {
                Ok(report) => {
                    if let (OperationStatus::Applied, Some(buffer)) = (&report.status, report.buffer)
                    {
                        touched.insert(buffer);
                    }
                    reports.push(report);
                }
                Err(error) => {
                    warn!(
                        "Operation {} ({}) failed: {}",
                        index + 1,
                        operation.description(),
                        error
                    );
                    reports.push(OperationReport::new(
                        index,
                        operation,
                        OperationStatus::Failed {
                            error: error.clone(),
                        },
                    ));
                    outcome = BatchOutcome::Aborted { index, error };
                    break;
                }
            }
        }

        for (index, operation) in batch.iter().enumerate().skip(reports.len()) {
            reports.push(OperationReport::new(
                index,
                operation,
                OperationStatus::NotReached,
            ));
        }

        let saved = match &outcome {
            BatchOutcome::Completed => {
                session.complete();
                self.persist(&*buffers, &touched)
            }
            BatchOutcome::Aborted { index, error } => {
                session.abort(*index, error.clone());
                Vec::new()
            }
        };

        let result = BatchResult {
            applied: count_status(&reports, |s| matches!(s, OperationStatus::Applied)),
            rejected: count_status(&reports, |s| matches!(s, OperationStatus::Rejected)),
            outcome,
            operations: reports,
            saved,
        };
        info!("{}", result.summary());
        result
    }

    fn apply_one(
        &self,
        buffers: &mut dyn BufferProvider,
        session: &mut EditSession,
        index: usize,
        operation: &EditOperation,
    ) -> EditResult<OperationReport> {
        let buffer = operation
            .buffer()
            .or(session.default_buffer())
            .ok_or(EditError::MissingHandle)?;
        if !buffers.is_valid(buffer) {
            return Err(EditError::InvalidHandle { buffer });
        }

        let mut report = OperationReport::new(index, operation, OperationStatus::Applied);
        report.buffer = Some(buffer);

        if !self.gate.approve(buffer, operation) {
            warn!(
                "Operation {} ({}) rejected",
                index + 1,
                operation.description()
            );
            report.status = OperationStatus::Rejected;
            return Ok(report);
        }

        let mut edit = LineEdit {
            buffers,
            ledger: session.ledger_mut(),
            buffer,
        };

        // Coordinates are resolved before the first mutation so a bad field
        // never leaves an operation half applied.
        let steps = match operation {
            EditOperation::Add {
                replace_all: true,
                text,
                ..
            } => {
                let lines = text.to_lines();
                vec![edit.delete_all()?, edit.insert_at(0, 1, lines)?]
            }
            EditOperation::Add { line, text, .. } => {
                let anchor = required_line(line.as_ref(), "line")?;
                vec![edit.insert(anchor, text.to_lines())?]
            }
            EditOperation::Delete { all: true, .. } => vec![edit.delete_all()?],
            EditOperation::Delete {
                start_line,
                end_line,
                ..
            } => {
                let start = required_line(start_line.as_ref(), "start_line")?;
                let end = optional_line(end_line.as_ref(), "end_line")?.unwrap_or(start);
                vec![edit.delete(start, end)?]
            }
            EditOperation::Update {
                start_line,
                end_line,
                text,
                ..
            } => {
                let start = required_line(start_line.as_ref(), "start_line")?;
                let end = optional_line(end_line.as_ref(), "end_line")?.unwrap_or(start);
                let lines = text.to_lines();
                let removed = edit.delete(start, end)?;
                vec![removed, edit.insert(start, lines)?]
            }
        };

        report.applied_line = steps.first().map(|s| s.line);
        report.deltas = steps.into_iter().map(|s| s.delta).collect();
        Ok(report)
    }

    fn persist(&mut self, buffers: &dyn BufferProvider, touched: &BTreeSet<BufferId>) -> Vec<BufferId> {
        if self.save_mode != SaveMode::Auto {
            return Vec::new();
        }
        let Some(persistence) = self.persistence.as_mut() else {
            debug!("Auto save requested but no persistence is configured");
            return Vec::new();
        };

        let mut saved = Vec::new();
        for &buffer in touched {
            match persistence.save(buffers, buffer) {
                Ok(()) => saved.push(buffer),
                Err(e) => warn!("Failed to save buffer {}: {}", buffer, e),
            }
        }
        saved
    }
}

impl Default for BatchApplicator {
    fn default() -> Self {
        Self::new()
    }
}

fn count_status(reports: &[OperationReport], pred: impl Fn(&OperationStatus) -> bool) -> usize {
    reports.iter().filter(|r| pred(&r.status)).count()
}

/// One primitive that took effect.
struct Step {
    /// Corrected 1-based line.
    line: usize,
    delta: LineDelta,
}

/// Primitive edits against one buffer, recorded in the ledger.
struct LineEdit<'a> {
    buffers: &'a mut dyn BufferProvider,
    ledger: &'a mut DeltaLedger,
    buffer: BufferId,
}

impl LineEdit<'_> {
    /// Where original line `anchor` lives now.
    fn shift(&self, anchor: usize) -> isize {
        self.ledger.correction_for(self.buffer, anchor)
            + self.ledger.inserted_at(self.buffer, anchor) as isize
    }

    /// Saturates instead of wrapping; anything past the end is clamped or
    /// rejected by the caller.
    fn corrected(line: usize, shift: isize) -> usize {
        isize::try_from(line)
            .unwrap_or(isize::MAX)
            .saturating_add(shift)
            .max(1) as usize
    }

    /// Insert `lines` before original line `anchor`.
    fn insert(&mut self, anchor: usize, lines: Vec<String>) -> EditResult<Step> {
        let at = Self::corrected(anchor, self.shift(anchor));
        let line_count = self.buffers.line_count(self.buffer)?;
        let index = (at - 1).min(line_count);
        if index < at - 1 {
            warn!(
                "Insert at line {} clamped to end of buffer {} ({} lines)",
                at, self.buffer, line_count
            );
        }
        self.insert_at(index, anchor, lines)
    }

    /// Insert at a 0-based buffer index, recording the delta at `anchor`.
    fn insert_at(&mut self, index: usize, anchor: usize, lines: Vec<String>) -> EditResult<Step> {
        let count = lines.len();
        self.buffers.set_lines(self.buffer, index..index, lines)?;
        let delta = self.ledger.record_delta(self.buffer, anchor, count as isize);
        debug!(
            "Inserted {} line(s) at line {} of buffer {} (declared {})",
            count,
            index + 1,
            self.buffer,
            anchor
        );
        Ok(Step {
            line: index + 1,
            delta,
        })
    }

    /// Remove original lines `start..=end`.
    fn delete(&mut self, start: usize, end: usize) -> EditResult<Step> {
        let shift = self.shift(start);
        let first = Self::corrected(start, shift);
        let mut last = Self::corrected(end, shift);
        if last < first {
            warn!(
                "Delete range {}-{} is reversed after correction, deleting line {}",
                first, last, first
            );
            last = first;
        }

        let line_count = self.buffers.line_count(self.buffer)?;
        if first > line_count {
            return Err(EditError::OutOfRange {
                buffer: self.buffer,
                line: first,
                line_count,
            });
        }
        let last = last.min(line_count);

        self.buffers
            .set_lines(self.buffer, first - 1..last, Vec::new())?;
        let removed = last - first + 1;
        let delta = self
            .ledger
            .record_delta(self.buffer, start, -(removed as isize));
        debug!(
            "Deleted lines {}-{} of buffer {} (declared {}-{})",
            first, last, self.buffer, start, end
        );
        Ok(Step { line: first, delta })
    }

    /// Remove every line.
    fn delete_all(&mut self) -> EditResult<Step> {
        let line_count = self.buffers.line_count(self.buffer)?;
        self.buffers
            .set_lines(self.buffer, 0..line_count, Vec::new())?;
        let delta = self
            .ledger
            .record_delta(self.buffer, 1, -(line_count as isize));
        debug!("Cleared {} line(s) of buffer {}", line_count, self.buffer);
        Ok(Step { line: 1, delta })
    }
}
