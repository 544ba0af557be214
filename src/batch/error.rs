//! Batch-level error types.
//!
//! Task-local failures are not here: those are caught at the task boundary
//! and recorded on the task itself, so one bad document never stops the
//! batch. This enum covers conditions that prevent or abort the batch as
//! a whole.

use thiserror::Error;

use crate::export::ExportError;

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("no tasks to run")]
    NoTasks,

    #[error("no enabled rules in the rule set")]
    NoEnabledRules,

    #[error("export error: {0}")]
    Export(#[from] ExportError),

    #[error("task state lock poisoned")]
    LockPoisoned,
}
