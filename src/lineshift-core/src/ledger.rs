//! Net line-count changes recorded during one batch.
//!
//! Every operation in a batch names lines in the frame of the buffer as it was
//! before the batch started. The ledger remembers, per buffer, where each
//! applied primitive was anchored in that frame and how many lines it added or
//! removed, so later operations can be moved to where their target now lives.

use serde::{Deserialize, Serialize};

use crate::buffer::BufferId;

/// A net change of `amount` lines made by a primitive anchored at
/// `anchor_line` (original frame, 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineDelta {
    pub buffer: BufferId,
    pub anchor_line: usize,
    pub amount: isize,
}

/// Append-only log of [`LineDelta`]s.
#[derive(Debug, Clone, Default)]
pub struct DeltaLedger {
    deltas: Vec<LineDelta>,
}

impl DeltaLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a delta and return it.
    pub fn record_delta(&mut self, buffer: BufferId, anchor_line: usize, amount: isize) -> LineDelta {
        let delta = LineDelta {
            buffer,
            anchor_line,
            amount,
        };
        self.deltas.push(delta);
        delta
    }

    /// Net shift of original line `line` in `buffer`.
    ///
    /// Only deltas anchored strictly before `line` count: a change happens at
    /// its anchor and moves what follows, never what sits at the anchor.
    pub fn correction_for(&self, buffer: BufferId, line: usize) -> isize {
        self.for_buffer(buffer)
            .filter(|d| d.anchor_line < line)
            .map(|d| d.amount)
            .sum()
    }

    /// Lines inserted by earlier primitives anchored exactly at `line`.
    ///
    /// Two inserts declared at the same original line land one after the
    /// other in batch order; this is the extra shift that keeps them so.
    pub fn inserted_at(&self, buffer: BufferId, line: usize) -> usize {
        self.for_buffer(buffer)
            .filter(|d| d.anchor_line == line && d.amount > 0)
            .map(|d| d.amount.unsigned_abs())
            .sum()
    }

    /// Net change in line count of `buffer` so far.
    pub fn net_change(&self, buffer: BufferId) -> isize {
        self.for_buffer(buffer).map(|d| d.amount).sum()
    }

    /// Clear every entry, or only those of one buffer.
    pub fn reset(&mut self, buffer: Option<BufferId>) {
        match buffer {
            Some(buffer) => self.deltas.retain(|d| d.buffer != buffer),
            None => self.deltas.clear(),
        }
    }

    /// All recorded deltas, in recording order.
    pub fn deltas(&self) -> &[LineDelta] {
        &self.deltas
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    fn for_buffer(&self, buffer: BufferId) -> impl Iterator<Item = &LineDelta> {
        self.deltas.iter().filter(move |d| d.buffer == buffer)
    }
}
