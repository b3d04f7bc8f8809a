//! Sequential multi-edit application for line-addressed buffers.
//!
//! Provides:
//! - A batch applicator for add/delete/update operations given in the
//!   buffer's original line numbers
//! - A per-batch delta ledger that keeps later operations pointed at the
//!   right lines as earlier ones grow or shrink the buffer
//! - Literal first-occurrence search and replace for files and buffers
//!
//! ```
//! use lineshift_core::{Batch, BatchApplicator, EditOperation, MemoryBuffers};
//!
//! let mut buffers = MemoryBuffers::new();
//! let id = buffers.open(["L1", "L2", "L3", "L4", "L5"]);
//!
//! let batch = Batch::from(vec![
//!     EditOperation::delete(2, 2),
//!     EditOperation::add(4, vec!["X"]),
//! ]);
//! let result = BatchApplicator::new().apply(&mut buffers, id, &batch);
//!
//! assert!(result.is_success());
//! assert_eq!(buffers.lines(id).unwrap(), ["L1", "L3", "X", "L4", "L5"]);
//! ```

pub mod applicator;
pub mod buffer;
pub mod config;
pub mod error;
pub mod gate;
pub mod ledger;
pub mod operation;
pub mod persist;
pub mod search_replace;
pub mod session;

pub use applicator::{BatchApplicator, BatchOutcome, BatchResult, OperationReport, OperationStatus};
pub use buffer::{BufferId, BufferProvider, MemoryBuffers, TextLayout, render_text};
pub use config::{ApprovalConfig, ApprovalMode, EditConfig, LoggingConfig, SaveMode};
pub use error::{
    BufferError, BufferResult, ConfigError, EditError, EditResult, PersistError,
    SearchReplaceError,
};
pub use gate::{ApprovalGate, AutoApprove};
pub use ledger::{DeltaLedger, LineDelta};
pub use operation::{Batch, EditOperation, InsertText, LineArg, OperationKind, split_lines};
pub use persist::{FilePersistence, Persistence};
pub use search_replace::{ReplaceOutcome, SearchReplace, replace_first};
pub use session::{BatchState, EditSession};
