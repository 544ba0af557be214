//! In-memory representation of a parsed Word document.
//!
//! A `DocumentTree` is built once per load and never mutated afterwards.
//! Paragraph and table indices follow document order and stay stable for
//! the lifetime of the tree.

use serde::{Deserialize, Serialize};

/// Sentinel for metadata fields absent from the document properties part.
pub const UNKNOWN_METADATA: &str = "unknown";

/// A single top-level paragraph in document order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paragraph {
    pub index: usize,
    pub text: String,
    /// Paragraph style id from `w:pStyle` ("Normal" when unstyled).
    pub style_name: String,
}

/// One top-level table in document order. Rows may be jagged; a cell's text
/// joins the cell's paragraphs with newlines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableData {
    pub index: usize,
    pub cells: Vec<Vec<String>>,
}

impl TableData {
    pub fn row_count(&self) -> usize {
        self.cells.len()
    }

    /// Widest row. Rows are kept jagged as parsed.
    pub fn col_count(&self) -> usize {
        self.cells.iter().map(|row| row.len()).max().unwrap_or(0)
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.cells.get(row).and_then(|r| r.get(col)).map(String::as_str)
    }
}

/// Parsed, immutable view of one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentTree {
    pub title: String,
    pub author: String,
    pub created_at: String,
    pub modified_at: String,
    pub paragraphs: Vec<Paragraph>,
    pub tables: Vec<TableData>,
    /// Every `w:bookmarkStart` anchor name, in document order.
    pub bookmarks: Vec<String>,
}

impl DocumentTree {
    /// Tree with sentinel metadata and no content. The parser fills it in.
    pub(crate) fn empty() -> Self {
        Self {
            title: UNKNOWN_METADATA.to_string(),
            author: UNKNOWN_METADATA.to_string(),
            created_at: UNKNOWN_METADATA.to_string(),
            modified_at: UNKNOWN_METADATA.to_string(),
            paragraphs: Vec::new(),
            tables: Vec::new(),
            bookmarks: Vec::new(),
        }
    }

    /// All paragraph text joined with newlines. Regex rules match against
    /// this, so multi-line patterns can span paragraph boundaries.
    pub fn full_text(&self) -> String {
        self.paragraphs
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_bookmark(&self, name: &str) -> bool {
        self.bookmarks.iter().any(|b| b == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn col_count_uses_widest_row() {
        let table = TableData {
            index: 0,
            cells: vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["c".to_string(), "d".to_string(), "e".to_string()],
            ],
        };
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.col_count(), 3);
    }

    #[test]
    fn cell_lookup_is_bounds_safe() {
        let table = TableData {
            index: 0,
            cells: vec![vec!["x".to_string()]],
        };
        assert_eq!(table.cell(0, 0), Some("x"));
        assert_eq!(table.cell(0, 1), None);
        assert_eq!(table.cell(5, 0), None);
    }

    #[test]
    fn empty_tree_carries_unknown_metadata() {
        let tree = DocumentTree::empty();
        assert_eq!(tree.title, UNKNOWN_METADATA);
        assert_eq!(tree.author, UNKNOWN_METADATA);
        assert_eq!(tree.full_text(), "");
    }

    #[test]
    fn full_text_joins_with_newlines() {
        let mut tree = DocumentTree::empty();
        for (i, text) in ["one", "two"].iter().enumerate() {
            tree.paragraphs.push(Paragraph {
                index: i,
                text: text.to_string(),
                style_name: "Normal".to_string(),
            });
        }
        assert_eq!(tree.full_text(), "one\ntwo");
        assert!(!tree.has_bookmark("intro"));
    }
}
