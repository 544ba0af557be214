//! Tabular Exporter — accumulates result rows into an xlsx artifact with a
//! schema that grows as new field names are observed.
//!
//! Scalars and lists stay inline on the primary sheet; table-shaped values
//! are routed to auxiliary sheets with a hyperlink back-reference in the
//! primary cell. In append mode the exporter adopts the headers and rows of
//! an existing artifact; an unreadable artifact falls back to a fresh one.

pub mod workbook;

pub use workbook::TabularExporter;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("no output file configured")]
    NoOutput,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("workbook error: {0}")]
    Workbook(String),
}

impl From<rust_xlsxwriter::XlsxError> for ExportError {
    fn from(e: rust_xlsxwriter::XlsxError) -> Self {
        Self::Workbook(e.to_string())
    }
}
