//! `.docx` loader.
//!
//! A docx file is a ZIP container of WordprocessingML parts. Two parts
//! matter here: `word/document.xml` (body content) and `docProps/core.xml`
//! (title/author/created/modified metadata, optional).
//!
//! Parsing is a single streaming pass over the XML events. Top-level
//! paragraphs and tables land in the tree in document order; paragraphs
//! inside table cells belong to their cell (joined with newlines), and a
//! nested table flattens into the containing cell's text.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Reader;

use super::types::{DocumentTree, Paragraph, TableData};
use super::DocumentError;

/// Load and parse one document. Fatal conditions (missing file, not a ZIP,
/// missing body part) error out; everything recoverable is absorbed into
/// the tree.
pub fn load_document(path: &Path) -> Result<DocumentTree, DocumentError> {
    if !path.exists() {
        return Err(DocumentError::NotFound(path.to_path_buf()));
    }

    let file = File::open(path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| DocumentError::InvalidArchive(e.to_string()))?;

    let document_xml = read_part(&mut archive, "word/document.xml")?
        .ok_or_else(|| DocumentError::MissingPart("word/document.xml".to_string()))?;
    let core_xml = read_part(&mut archive, "docProps/core.xml")?;

    let mut tree = parse_document_xml(&document_xml)?;
    if let Some(core) = core_xml {
        apply_core_properties(&mut tree, &core)?;
    }

    tracing::debug!(
        path = %path.display(),
        paragraphs = tree.paragraphs.len(),
        tables = tree.tables.len(),
        bookmarks = tree.bookmarks.len(),
        "document loaded"
    );
    Ok(tree)
}

fn read_part(
    archive: &mut zip::ZipArchive<File>,
    name: &str,
) -> Result<Option<String>, DocumentError> {
    match archive.by_name(name) {
        Ok(mut part) => {
            let mut content = String::new();
            part.read_to_string(&mut content)?;
            Ok(Some(content))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(DocumentError::InvalidArchive(e.to_string())),
    }
}

#[derive(Default)]
struct CellBuilder {
    /// Finished paragraph texts of the cell, joined with `\n` at cell end.
    paragraphs: Vec<String>,
    current: String,
}

#[derive(Default)]
struct TableBuilder {
    rows: Vec<Vec<String>>,
    current_row: Option<Vec<String>>,
    current_cell: Option<CellBuilder>,
}

struct ParagraphBuilder {
    text: String,
    style: Option<String>,
}

/// Innermost open cell, if any. Nested tables stack, so the last builder
/// owns the cell that text currently flows into.
fn current_cell(stack: &mut [TableBuilder]) -> Option<&mut CellBuilder> {
    stack.last_mut().and_then(|tb| tb.current_cell.as_mut())
}

fn attr_value(element: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    for attr in element.attributes().flatten() {
        if attr.key.local_name().as_ref() == local {
            let decoded = std::str::from_utf8(&attr.value).ok()?;
            return quick_xml::escape::unescape(decoded)
                .ok()
                .map(|v| v.into_owned());
        }
    }
    None
}

/// Parse `word/document.xml`. Exposed to the crate so tests can exercise
/// the state machine without building ZIP containers.
pub(crate) fn parse_document_xml(xml: &str) -> Result<DocumentTree, DocumentError> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    let mut buf = Vec::new();

    let mut tree = DocumentTree::empty();
    let mut table_stack: Vec<TableBuilder> = Vec::new();
    let mut paragraph: Option<ParagraphBuilder> = None;
    let mut in_text_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"tbl" => table_stack.push(TableBuilder::default()),
                b"tr" => {
                    if let Some(tb) = table_stack.last_mut() {
                        tb.current_row = Some(Vec::new());
                    }
                }
                b"tc" => {
                    if let Some(tb) = table_stack.last_mut() {
                        tb.current_cell = Some(CellBuilder::default());
                    }
                }
                b"p" => {
                    if table_stack.is_empty() {
                        paragraph = Some(ParagraphBuilder {
                            text: String::new(),
                            style: None,
                        });
                    }
                }
                b"t" => in_text_run = true,
                other => handle_marker(other, e, &mut table_stack, &mut paragraph, &mut tree),
            },
            Ok(Event::Empty(ref e)) => {
                let local = e.local_name();
                handle_marker(local.as_ref(), e, &mut table_stack, &mut paragraph, &mut tree);
            }
            Ok(Event::Text(e)) => {
                if in_text_run {
                    let text = e
                        .unescape()
                        .map_err(|err| DocumentError::Xml(err.to_string()))?;
                    append_text(&mut table_stack, &mut paragraph, &text);
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"t" => in_text_run = false,
                b"p" => {
                    if let Some(cell) = current_cell(&mut table_stack) {
                        cell.paragraphs.push(std::mem::take(&mut cell.current));
                    } else if let Some(p) = paragraph.take() {
                        tree.paragraphs.push(Paragraph {
                            index: tree.paragraphs.len(),
                            text: p.text,
                            style_name: p.style.unwrap_or_else(|| "Normal".to_string()),
                        });
                    }
                }
                b"tc" => {
                    if let Some(tb) = table_stack.last_mut() {
                        if let Some(cell) = tb.current_cell.take() {
                            let text = cell.paragraphs.join("\n");
                            if let Some(row) = tb.current_row.as_mut() {
                                row.push(text);
                            }
                        }
                    }
                }
                b"tr" => {
                    if let Some(tb) = table_stack.last_mut() {
                        if let Some(row) = tb.current_row.take() {
                            tb.rows.push(row);
                        }
                    }
                }
                b"tbl" => {
                    if let Some(done) = table_stack.pop() {
                        if table_stack.is_empty() {
                            tree.tables.push(TableData {
                                index: tree.tables.len(),
                                cells: done.rows,
                            });
                        } else if let Some(cell) = current_cell(&mut table_stack) {
                            // Nested table: flatten into the parent cell.
                            let flat = done
                                .rows
                                .iter()
                                .map(|row| row.join("\t"))
                                .collect::<Vec<_>>()
                                .join("\n");
                            cell.paragraphs.push(flat);
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(DocumentError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(tree)
}

/// Self-closing content markers: paragraph style, bookmark anchors, and the
/// in-run tab/break elements that carry no text node of their own.
fn handle_marker(
    local: &[u8],
    element: &BytesStart<'_>,
    table_stack: &mut Vec<TableBuilder>,
    paragraph: &mut Option<ParagraphBuilder>,
    tree: &mut DocumentTree,
) {
    match local {
        b"pStyle" => {
            if let Some(p) = paragraph.as_mut() {
                if p.style.is_none() {
                    p.style = attr_value(element, b"val");
                }
            }
        }
        b"bookmarkStart" => {
            if let Some(name) = attr_value(element, b"name") {
                tree.bookmarks.push(name);
            }
        }
        b"tab" => append_text(table_stack, paragraph, "\t"),
        b"br" => append_text(table_stack, paragraph, "\n"),
        _ => {}
    }
}

fn append_text(
    table_stack: &mut [TableBuilder],
    paragraph: &mut Option<ParagraphBuilder>,
    text: &str,
) {
    if let Some(cell) = current_cell(table_stack) {
        cell.current.push_str(text);
    } else if let Some(p) = paragraph.as_mut() {
        p.text.push_str(text);
    }
}

/// Fill metadata from `docProps/core.xml`. Absent or empty elements keep
/// the "unknown" sentinel.
fn apply_core_properties(tree: &mut DocumentTree, xml: &str) -> Result<(), DocumentError> {
    #[derive(Clone, Copy)]
    enum MetaField {
        Title,
        Author,
        Created,
        Modified,
    }

    let mut reader = Reader::from_reader(xml.as_bytes());
    let mut buf = Vec::new();
    let mut current: Option<MetaField> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                current = match e.local_name().as_ref() {
                    b"title" => Some(MetaField::Title),
                    b"creator" => Some(MetaField::Author),
                    b"created" => Some(MetaField::Created),
                    b"modified" => Some(MetaField::Modified),
                    _ => None,
                };
            }
            Ok(Event::Text(e)) => {
                if let Some(field) = current {
                    let value = e
                        .unescape()
                        .map_err(|err| DocumentError::Xml(err.to_string()))?
                        .into_owned();
                    if !value.trim().is_empty() {
                        match field {
                            MetaField::Title => tree.title = value,
                            MetaField::Author => tree.author = value,
                            MetaField::Created => tree.created_at = value,
                            MetaField::Modified => tree.modified_at = value,
                        }
                    }
                }
            }
            Ok(Event::End(_)) => current = None,
            Ok(Event::Eof) => break,
            Err(e) => return Err(DocumentError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}
