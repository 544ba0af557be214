//! docsift — rule-driven field extraction from Word documents into tabular
//! Excel artifacts.
//!
//! ## Pipeline
//! ```text
//! document (parse) → engine (evaluate rules) → batch (worker pool) → export (artifact)
//! ```
//!
//! The batch manager pulls documents, the document model parses each into
//! an immutable tree, the engine applies every enabled rule in rule-set
//! order, the results merge into one row per document, and the exporter
//! appends rows to an artifact whose schema grows as new field names are
//! observed. Windowing/UI concerns live outside this crate; collaborators
//! drive it through [`TaskManager`], [`load_document`], and the rule-set
//! functions re-exported below.

pub mod batch; // worker pool, task lifecycle, events, cancellation
pub mod document; // .docx parsing into an immutable tree
pub mod engine; // rule evaluation (pure, re-entrant)
pub mod export; // xlsx artifact with evolving schema
pub mod rules; // rule model, persistence, inference

pub use batch::{
    BatchConfig, BatchError, BatchEvent, BatchOptions, BatchStatistics, ExtractionTask,
    TaskManager, TaskStatus,
};
pub use document::{load_document, DocumentError, DocumentTree, Paragraph, TableData};
pub use engine::{apply_rule_set, evaluate};
pub use export::{ExportError, TabularExporter};
pub use rules::{
    export_csv, identify_data_type, infer_rule_from_text, list_rule_types, load_json, save_json,
    ExtractionRule, RuleSetError, RuleType, RuleValue,
};

use tracing_subscriber::EnvFilter;

/// Default log filter when RUST_LOG is unset.
const DEFAULT_LOG_FILTER: &str = "docsift=info";

/// Initialize tracing for binaries and harnesses embedding the crate.
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .try_init();
}
