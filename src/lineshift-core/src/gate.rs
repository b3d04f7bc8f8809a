//! Approval gates.
//!
//! A gate sees each operation before it touches the buffer. A declined
//! operation is reported as rejected and skipped; the batch goes on.

use crate::buffer::BufferId;
use crate::config::{ApprovalConfig, ApprovalMode};
use crate::operation::EditOperation;

/// Synchronous approval predicate.
pub trait ApprovalGate {
    fn approve(&self, buffer: BufferId, operation: &EditOperation) -> bool;
}

/// Approves everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl ApprovalGate for AutoApprove {
    fn approve(&self, _buffer: BufferId, _operation: &EditOperation) -> bool {
        true
    }
}

impl<F> ApprovalGate for F
where
    F: Fn(BufferId, &EditOperation) -> bool,
{
    fn approve(&self, buffer: BufferId, operation: &EditOperation) -> bool {
        self(buffer, operation)
    }
}

impl ApprovalGate for ApprovalConfig {
    fn approve(&self, _buffer: BufferId, operation: &EditOperation) -> bool {
        match self.mode {
            ApprovalMode::Deny => false,
            ApprovalMode::Auto => !self.deny.contains(&operation.kind()),
        }
    }
}
