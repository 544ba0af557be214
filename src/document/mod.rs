//! Document Model — parses a single `.docx` into an immutable tree of
//! paragraphs, tables, bookmarks, and core metadata.
//!
//! Pure and synchronous: a load either yields a complete `DocumentTree` or
//! an error, never a partial tree. Rule evaluation happens elsewhere.

pub mod docx;
pub mod types;

pub use docx::load_document;
pub use types::{DocumentTree, Paragraph, TableData, UNKNOWN_METADATA};

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("file does not exist: {0}")]
    NotFound(PathBuf),

    #[error("not a valid Word document: {0}")]
    InvalidArchive(String),

    #[error("document part missing: {0}")]
    MissingPart(String),

    #[error("document XML error: {0}")]
    Xml(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
