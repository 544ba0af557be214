//! TaskManager — runs document×rule-set tasks on a bounded worker pool.
//!
//! A fixed number of tokio workers drain the task list through an atomic
//! queue cursor. Each worker, per task: cancellation check, document load
//! and rule evaluation on the blocking pool, then a row commit to the
//! shared exporter behind a mutex (single-writer discipline — rows are
//! produced concurrently but written by one worker at a time).
//!
//! Cancellation is cooperative: `stop()` sets a shared flag, workers check
//! it before starting each new task and mark unstarted tasks canceled;
//! in-flight tasks finish naturally. `create_tasks` arms a fresh run, so a
//! stop requested before `start` cancels every task.
//!
//! Observers subscribe to an event channel rather than the manager itself;
//! progress counts are monotone and the final progress event always reports
//! `completed == total`, whatever mix of outcomes the tasks had.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use indexmap::IndexMap;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::error::BatchError;
use super::types::{
    BatchConfig, BatchEvent, BatchOptions, BatchStatistics, ExtractionTask, CANCEL_MESSAGE,
    FILE_NAME_COLUMN, FILE_PATH_COLUMN,
};
use crate::document::{load_document, DocumentError};
use crate::engine::apply_rule_set;
use crate::export::TabularExporter;
use crate::rules::{ExtractionRule, RuleValue};

type Listeners = Arc<Mutex<Vec<UnboundedSender<BatchEvent>>>>;

pub struct TaskManager {
    config: BatchConfig,
    rules: Arc<Vec<ExtractionRule>>,
    tasks: Arc<Mutex<Vec<ExtractionTask>>>,
    stop_flag: Arc<AtomicBool>,
    listeners: Listeners,
}

impl TaskManager {
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            rules: Arc::new(Vec::new()),
            tasks: Arc::new(Mutex::new(Vec::new())),
            stop_flag: Arc::new(AtomicBool::new(false)),
            listeners: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replace the task list with one pending task per path, snapshotting
    /// the rule set for the run, and re-arm the stop flag. Returns a
    /// snapshot of the created tasks.
    pub fn create_tasks(
        &mut self,
        paths: &[PathBuf],
        rules: &[ExtractionRule],
    ) -> Vec<ExtractionTask> {
        self.rules = Arc::new(rules.to_vec());
        self.stop_flag.store(false, Ordering::SeqCst);
        let tasks: Vec<ExtractionTask> = paths.iter().map(ExtractionTask::new).collect();
        if let Ok(mut current) = self.tasks.lock() {
            *current = tasks.clone();
        }
        tasks
    }

    /// Subscribe to batch events. Closed receivers are pruned on emit.
    pub fn subscribe(&self) -> UnboundedReceiver<BatchEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(sender);
        }
        receiver
    }

    /// Snapshot of the current task states.
    pub fn tasks(&self) -> Vec<ExtractionTask> {
        self.tasks.lock().map(|t| t.clone()).unwrap_or_default()
    }

    pub fn statistics(&self) -> BatchStatistics {
        self.tasks
            .lock()
            .map(|t| BatchStatistics::from_tasks(&t))
            .unwrap_or_else(|_| BatchStatistics::from_tasks(&[]))
    }

    /// `(terminal, total)` over the task list.
    pub fn progress(&self) -> (usize, usize) {
        self.tasks
            .lock()
            .map(|t| {
                let terminal = t.iter().filter(|task| task.status.is_terminal()).count();
                (terminal, t.len())
            })
            .unwrap_or((0, 0))
    }

    /// Request cooperative cancellation of the running batch.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        tracing::info!("batch stop requested");
    }

    /// Run the batch to completion. Progress and per-task events flow to
    /// subscribers while this future is pending; the returned statistics
    /// describe the terminal state of every task.
    pub async fn start(&self, options: BatchOptions) -> Result<BatchStatistics, BatchError> {
        let total = self
            .tasks
            .lock()
            .map_err(|_| BatchError::LockPoisoned)?
            .len();
        if total == 0 {
            emit_to(&self.listeners, BatchEvent::Failed {
                error: BatchError::NoTasks.to_string(),
            });
            return Err(BatchError::NoTasks);
        }
        if !self.rules.iter().any(|r| r.enabled) {
            emit_to(&self.listeners, BatchEvent::Failed {
                error: BatchError::NoEnabledRules.to_string(),
            });
            return Err(BatchError::NoEnabledRules);
        }

        let mut exporter = TabularExporter::new();
        if let Some(path) = &options.output {
            exporter.set_output(path, options.append);
        }
        let exporter = Arc::new(Mutex::new(exporter));

        let started = Instant::now();
        let worker_count = self.config.worker_count.clamp(1, total);
        tracing::info!(total, workers = worker_count, "batch started");
        emit_to(&self.listeners, BatchEvent::Started { total: total as u32 });
        emit_to(&self.listeners, BatchEvent::Progress { completed: 0, total: total as u32 });

        let shared = Arc::new(WorkerShared {
            tasks: self.tasks.clone(),
            rules: self.rules.clone(),
            options: options.clone(),
            exporter: exporter.clone(),
            listeners: self.listeners.clone(),
            stop: self.stop_flag.clone(),
            next: AtomicUsize::new(0),
            done: AtomicUsize::new(0),
            total,
        });

        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let shared = shared.clone();
            handles.push(tokio::spawn(run_worker(worker_id, shared)));
        }
        for handle in handles {
            let _ = handle.await;
        }

        if options.output.is_some() {
            let save_result = exporter
                .lock()
                .map_err(|_| BatchError::LockPoisoned)?
                .save();
            if let Err(e) = save_result {
                tracing::error!(error = %e, "artifact save failed; rows remain on the tasks");
                emit_to(&self.listeners, BatchEvent::Failed { error: e.to_string() });
                return Err(BatchError::Export(e));
            }
        }

        let stats = self.statistics();
        emit_to(&self.listeners, BatchEvent::Completed {
            completed: shared.done.load(Ordering::SeqCst) as u32,
            total: total as u32,
            duration_ms: started.elapsed().as_millis() as u64,
        });
        tracing::info!(
            completed = stats.completed,
            failed = stats.failed,
            canceled = stats.canceled,
            "batch finished"
        );
        Ok(stats)
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new(BatchConfig::default())
    }
}

struct WorkerShared {
    tasks: Arc<Mutex<Vec<ExtractionTask>>>,
    rules: Arc<Vec<ExtractionRule>>,
    options: BatchOptions,
    exporter: Arc<Mutex<TabularExporter>>,
    listeners: Listeners,
    stop: Arc<AtomicBool>,
    next: AtomicUsize,
    done: AtomicUsize,
    total: usize,
}

fn emit_to(listeners: &Listeners, event: BatchEvent) {
    if let Ok(mut senders) = listeners.lock() {
        senders.retain(|sender| sender.send(event.clone()).is_ok());
    }
}

async fn run_worker(worker_id: usize, shared: Arc<WorkerShared>) {
    loop {
        let index = shared.next.fetch_add(1, Ordering::SeqCst);
        if index >= shared.total {
            break;
        }
        run_task(&shared, index).await;
        bump_progress(&shared);
    }
    tracing::debug!(worker_id, "worker drained");
}

/// Count one more terminal task and emit the progress event. The counter
/// bump happens under the listener lock so concurrent workers cannot
/// deliver progress counts out of order.
fn bump_progress(shared: &WorkerShared) {
    match shared.listeners.lock() {
        Ok(mut senders) => {
            let completed = shared.done.fetch_add(1, Ordering::SeqCst) + 1;
            let event = BatchEvent::Progress {
                completed: completed as u32,
                total: shared.total as u32,
            };
            senders.retain(|sender| sender.send(event.clone()).is_ok());
        }
        Err(_) => {
            shared.done.fetch_add(1, Ordering::SeqCst);
        }
    }
}

async fn run_task(shared: &Arc<WorkerShared>, index: usize) {
    if shared.stop.load(Ordering::SeqCst) {
        if let Ok(mut tasks) = shared.tasks.lock() {
            tasks[index].cancel();
        }
        emit_to(&shared.listeners, BatchEvent::TaskFailed {
            index,
            error: CANCEL_MESSAGE.to_string(),
        });
        return;
    }

    let path = match shared.tasks.lock() {
        Ok(mut tasks) => {
            tasks[index].start();
            tasks[index].file_path.clone()
        }
        Err(_) => return,
    };

    let rules = shared.rules.clone();
    let skip_file_info = shared.options.skip_file_info;
    let blocking_path = path.clone();
    let outcome =
        tokio::task::spawn_blocking(move || build_row(&blocking_path, &rules, skip_file_info))
            .await;

    match outcome {
        Ok(Ok(row)) => {
            if let Ok(mut exporter) = shared.exporter.lock() {
                exporter.add_row(row.clone());
            }
            let file_name = match shared.tasks.lock() {
                Ok(mut tasks) => {
                    tasks[index].complete(row);
                    tasks[index].file_name.clone()
                }
                Err(_) => String::new(),
            };
            emit_to(&shared.listeners, BatchEvent::TaskCompleted { index, file_name });
        }
        Ok(Err(e)) => {
            let message = e.to_string();
            tracing::warn!(index, path = %path.display(), error = %message, "task failed");
            if let Ok(mut tasks) = shared.tasks.lock() {
                tasks[index].fail(message.as_str());
            }
            emit_to(&shared.listeners, BatchEvent::TaskFailed { index, error: message });
        }
        // A panic inside the blocking closure surfaces as a join error;
        // it must not take the worker pool down with it.
        Err(join_error) => {
            let message = format!("task panicked: {join_error}");
            tracing::error!(index, path = %path.display(), error = %message, "task panicked");
            if let Ok(mut tasks) = shared.tasks.lock() {
                tasks[index].fail(message.as_str());
            }
            emit_to(&shared.listeners, BatchEvent::TaskFailed { index, error: message });
        }
    }
}

/// One task's work: load the document, apply the rule set, and inject the
/// source-file columns unless suppressed. Runs on the blocking pool.
fn build_row(
    path: &Path,
    rules: &[ExtractionRule],
    skip_file_info: bool,
) -> Result<IndexMap<String, RuleValue>, DocumentError> {
    let tree = load_document(path)?;
    let mut row = apply_rule_set(&tree, rules);
    if !skip_file_info {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        row.insert(FILE_NAME_COLUMN.to_string(), RuleValue::Scalar(name));
        row.insert(
            FILE_PATH_COLUMN.to_string(),
            RuleValue::Scalar(path.display().to_string()),
        );
    }
    Ok(row)
}
