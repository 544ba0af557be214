//! Core types for the batch pipeline: task lifecycle, batch events,
//! options, and statistics.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::rules::RuleValue;

/// Fixed message recorded on tasks short-circuited by a stop request.
pub const CANCEL_MESSAGE: &str = "task canceled before start";

/// Column injected for the source file name unless suppressed.
pub const FILE_NAME_COLUMN: &str = "file_name";
/// Column injected for the source file path unless suppressed.
pub const FILE_PATH_COLUMN: &str = "file_path";

// ═══════════════════════════════════════════
// Task lifecycle
// ═══════════════════════════════════════════

/// Task state machine: Pending → Processing → {Completed, Failed, Canceled}.
/// Terminal states are final; the manager never transitions out of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Canceled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One unit of batch work: applying the rule-set snapshot to one document.
/// Owned by the task manager for its lifetime; observers get clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionTask {
    pub file_path: PathBuf,
    pub file_name: String,
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Extracted values keyed by header name, in rule order.
    pub result_row: IndexMap<String, RuleValue>,
}

impl ExtractionTask {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let file_path = path.into();
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            file_path,
            file_name,
            status: TaskStatus::Pending,
            started_at: None,
            ended_at: None,
            error: None,
            result_row: IndexMap::new(),
        }
    }

    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
        self.status = TaskStatus::Processing;
    }

    pub fn complete(&mut self, row: IndexMap<String, RuleValue>) {
        self.ended_at = Some(Utc::now());
        self.status = TaskStatus::Completed;
        self.result_row = row;
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.ended_at = Some(Utc::now());
        self.status = TaskStatus::Failed;
        self.error = Some(error.into());
    }

    pub fn cancel(&mut self) {
        self.ended_at = Some(Utc::now());
        self.status = TaskStatus::Canceled;
        self.error = Some(CANCEL_MESSAGE.to_string());
    }

    /// Elapsed processing time; still ticking for in-flight tasks.
    pub fn duration(&self) -> chrono::Duration {
        match self.started_at {
            None => chrono::Duration::zero(),
            Some(start) => self.ended_at.unwrap_or_else(Utc::now) - start,
        }
    }
}

// ═══════════════════════════════════════════
// Batch events
// ═══════════════════════════════════════════

/// Events fanned out to subscribers while a batch runs. Progress counts are
/// monotone; the final `Progress` and the `Completed` event both report
/// `completed == total`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BatchEvent {
    Started {
        total: u32,
    },
    Progress {
        completed: u32,
        total: u32,
    },
    TaskCompleted {
        index: usize,
        file_name: String,
    },
    TaskFailed {
        index: usize,
        error: String,
    },
    Completed {
        completed: u32,
        total: u32,
        duration_ms: u64,
    },
    Failed {
        error: String,
    },
}

// ═══════════════════════════════════════════
// Options and configuration
// ═══════════════════════════════════════════

/// Per-run options.
#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Artifact target; `None` keeps results in memory only.
    pub output: Option<PathBuf>,
    /// Append to an existing artifact instead of replacing it.
    pub append: bool,
    /// Suppress the injected file_name/file_path columns.
    pub skip_file_info: bool,
}

/// Manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Upper bound on concurrently processing tasks.
    pub worker_count: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { worker_count: 4 }
    }
}

// ═══════════════════════════════════════════
// Statistics
// ═══════════════════════════════════════════

/// Per-status counts over the task list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchStatistics {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub canceled: usize,
    pub pending: usize,
    pub success_rate: f64,
}

impl BatchStatistics {
    pub fn from_tasks(tasks: &[ExtractionTask]) -> Self {
        let total = tasks.len();
        let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();
        let completed = count(TaskStatus::Completed);
        Self {
            total,
            completed,
            failed: count(TaskStatus::Failed),
            canceled: count(TaskStatus::Canceled),
            pending: count(TaskStatus::Pending),
            success_rate: if total > 0 {
                completed as f64 / total as f64
            } else {
                0.0
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip_strings() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Processing,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Canceled,
        ] {
            assert!(!status.as_str().is_empty());
        }
    }

    #[test]
    fn terminal_states() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Canceled.is_terminal());
    }

    #[test]
    fn task_lifecycle_transitions() {
        let mut task = ExtractionTask::new("/tmp/report.docx");
        assert_eq!(task.file_name, "report.docx");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.duration(), chrono::Duration::zero());

        task.start();
        assert_eq!(task.status, TaskStatus::Processing);
        assert!(task.started_at.is_some());

        task.complete(IndexMap::new());
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.ended_at.is_some());
    }

    #[test]
    fn cancel_records_fixed_message() {
        let mut task = ExtractionTask::new("/tmp/a.docx");
        task.cancel();
        assert_eq!(task.status, TaskStatus::Canceled);
        assert_eq!(task.error.as_deref(), Some(CANCEL_MESSAGE));
    }

    #[test]
    fn statistics_count_by_status() {
        let mut done = ExtractionTask::new("/tmp/a.docx");
        done.start();
        done.complete(IndexMap::new());
        let mut failed = ExtractionTask::new("/tmp/b.docx");
        failed.start();
        failed.fail("boom");
        let pending = ExtractionTask::new("/tmp/c.docx");

        let stats = BatchStatistics::from_tasks(&[done, failed, pending]);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.pending, 1);
        assert!((stats.success_rate - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn batch_event_serde_is_tagged() {
        let event = BatchEvent::Progress { completed: 2, total: 5 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Progress");
        assert_eq!(json["completed"], 2);
    }
}
