//! Per-batch edit session.
//!
//! A session carries the ledger and the progress of exactly one batch. Hosts
//! keep one per buffer they let an issuer edit and hand it to the applicator
//! by reference.

use serde::Serialize;

use crate::buffer::BufferId;
use crate::error::EditError;
use crate::ledger::DeltaLedger;

/// Progress of the batch a session is running.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BatchState {
    #[default]
    Pending,
    Applying {
        index: usize,
    },
    Aborted {
        index: usize,
        reason: EditError,
    },
    Completed,
}

impl BatchState {
    /// Whether the batch has ended, successfully or not.
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Aborted { .. } | Self::Completed)
    }
}

/// Explicit state for one batch against one (default) buffer.
#[derive(Debug, Clone, Default)]
pub struct EditSession {
    default_buffer: Option<BufferId>,
    ledger: DeltaLedger,
    state: BatchState,
}

impl EditSession {
    /// Session whose operations must all name their buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Session whose operations default to `buffer`.
    pub fn for_buffer(buffer: BufferId) -> Self {
        Self {
            default_buffer: Some(buffer),
            ..Self::default()
        }
    }

    pub fn default_buffer(&self) -> Option<BufferId> {
        self.default_buffer
    }

    pub fn state(&self) -> &BatchState {
        &self.state
    }

    pub fn ledger(&self) -> &DeltaLedger {
        &self.ledger
    }

    pub(crate) fn ledger_mut(&mut self) -> &mut DeltaLedger {
        &mut self.ledger
    }

    /// The host closed `buffer`: drop what we know about it.
    pub fn buffer_closed(&mut self, buffer: BufferId) {
        self.ledger.reset(Some(buffer));
        if self.default_buffer == Some(buffer) {
            self.default_buffer = None;
        }
    }

    /// Start a batch with a fresh ledger scope.
    pub(crate) fn begin(&mut self) {
        self.ledger.reset(None);
        self.state = BatchState::Pending;
    }

    pub(crate) fn advance(&mut self, index: usize) {
        self.state = BatchState::Applying { index };
    }

    pub(crate) fn abort(&mut self, index: usize, reason: EditError) {
        self.ledger.reset(None);
        self.state = BatchState::Aborted { index, reason };
    }

    pub(crate) fn complete(&mut self) {
        self.ledger.reset(None);
        self.state = BatchState::Completed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_pending() {
        let session = EditSession::for_buffer(BufferId::new(4));
        assert_eq!(session.state(), &BatchState::Pending);
        assert_eq!(session.default_buffer(), Some(BufferId::new(4)));
        assert!(session.ledger().is_empty());
    }

    #[test]
    fn test_lifecycle_clears_ledger() {
        let buffer = BufferId::new(1);
        let mut session = EditSession::for_buffer(buffer);

        session.begin();
        session.advance(0);
        session.ledger_mut().record_delta(buffer, 1, 2);
        assert_eq!(session.state(), &BatchState::Applying { index: 0 });

        session.complete();
        assert!(session.ledger().is_empty());
        assert!(session.state().is_finished());
    }

    #[test]
    fn test_abort_records_reason() {
        let mut session = EditSession::new();
        session.begin();
        session.advance(2);
        session.abort(2, EditError::MissingHandle);

        assert_eq!(
            session.state(),
            &BatchState::Aborted {
                index: 2,
                reason: EditError::MissingHandle
            }
        );
    }

    #[test]
    fn test_buffer_closed_forgets_buffer() {
        let buffer = BufferId::new(1);
        let other = BufferId::new(2);
        let mut session = EditSession::for_buffer(buffer);
        session.ledger_mut().record_delta(buffer, 1, 1);
        session.ledger_mut().record_delta(other, 1, 1);

        session.buffer_closed(buffer);
        assert_eq!(session.default_buffer(), None);
        assert_eq!(session.ledger().len(), 1);
    }
}
