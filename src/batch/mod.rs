//! Batch Task Manager — queues document×rule-set tasks, runs them on a
//! bounded worker pool, tracks per-task lifecycle state, fans out progress
//! and per-task events, and supports cooperative stop.
//!
//! Module layout:
//! - `types`: task state machine, events, options, statistics
//! - `error`: batch-level failures (task-local failures live on the task)
//! - `manager`: the worker pool itself

pub mod error;
pub mod manager;
pub mod types;

pub use error::BatchError;
pub use manager::TaskManager;
pub use types::{
    BatchConfig, BatchEvent, BatchOptions, BatchStatistics, ExtractionTask, TaskStatus,
    CANCEL_MESSAGE, FILE_NAME_COLUMN, FILE_PATH_COLUMN,
};
