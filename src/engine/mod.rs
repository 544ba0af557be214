//! Extraction Engine — evaluates rules against a parsed document tree.
//!
//! Evaluation is total: bounds violations, bad patterns, and unresolved
//! lookups come back as human-readable diagnostic values, never as errors
//! or panics. A malformed rule must not abort a multi-rule, multi-document
//! batch; only unrecoverable conditions (an unreadable file, a corrupt
//! container) surface as errors, and those belong to the loader.
//!
//! The engine is stateless and re-entrant; callers may evaluate against
//! independent trees concurrently.

use indexmap::IndexMap;
use regex::Regex;

use crate::document::DocumentTree;
use crate::rules::{ExtractionRule, RuleType, RuleValue};

/// Apply every enabled rule in rule-set order. The returned map holds one
/// entry per enabled rule, keyed by `header_name`, in rule order — column
/// order downstream depends on it.
pub fn apply_rule_set(
    tree: &DocumentTree,
    rules: &[ExtractionRule],
) -> IndexMap<String, RuleValue> {
    let mut row = IndexMap::new();
    for rule in rules.iter().filter(|r| r.enabled) {
        let value = evaluate(rule, tree);
        tracing::debug!(field = %rule.field_name, config = %rule.config_summary(), "rule evaluated");
        row.insert(rule.header_name.clone(), value);
    }
    row
}

/// Evaluate a single rule against the tree.
pub fn evaluate(rule: &ExtractionRule, tree: &DocumentTree) -> RuleValue {
    match rule.rule_type {
        RuleType::RegexMatch => extract_regex(rule, tree),
        RuleType::PositionRange => extract_position(rule, tree),
        RuleType::BookmarkLookup => extract_bookmark(rule, tree),
        RuleType::TableCell => extract_table_cell(rule, tree),
        RuleType::TableColumn => extract_table_column(rule, tree),
        RuleType::TableRow => extract_table_row(rule, tree),
        RuleType::TableFull => extract_table_full(rule, tree),
    }
}

/// Match against the newline-joined full paragraph text, so patterns can
/// span paragraph boundaries. `group` 0 is the whole match.
fn extract_regex(rule: &ExtractionRule, tree: &DocumentTree) -> RuleValue {
    let pattern = rule.config_str("pattern").unwrap_or("");
    let group = rule.config_usize("group", 0);

    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(e) => return RuleValue::Scalar(format!("regex pattern error: {e}")),
    };
    if group >= regex.captures_len() {
        return RuleValue::Scalar(format!(
            "regex group error: pattern has no capture group {group}"
        ));
    }

    let text = tree.full_text();
    let matches: Vec<String> = regex
        .captures_iter(&text)
        .map(|caps| caps.get(group).map(|m| m.as_str()).unwrap_or("").to_string())
        .collect();

    RuleValue::Scalar(matches.join("\n"))
}

/// Joined text of the paragraphs in `[start_index, end_index)`, clamped to
/// the document. A start past the last paragraph is an empty result, not
/// an error.
fn extract_position(rule: &ExtractionRule, tree: &DocumentTree) -> RuleValue {
    let start = rule.config_usize("start_index", 0);
    let end = rule
        .config_opt_usize("end_index")
        .unwrap_or(tree.paragraphs.len())
        .min(tree.paragraphs.len());

    if start >= tree.paragraphs.len() || end <= start {
        return RuleValue::Scalar(String::new());
    }

    let joined = tree.paragraphs[start..end]
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    RuleValue::Scalar(joined)
}

/// Bookmark content resolution is intentionally shallow: the loader records
/// anchor names, not their text ranges, so a known anchor yields placeholder
/// content and an unknown one a "not found" diagnostic.
fn extract_bookmark(rule: &ExtractionRule, tree: &DocumentTree) -> RuleValue {
    let name = rule.config_str("bookmark_name").unwrap_or("");
    if name.is_empty() {
        return RuleValue::Scalar("bookmark error: no bookmark name configured".to_string());
    }
    if tree.has_bookmark(name) {
        RuleValue::Scalar(format!("content of bookmark '{name}'"))
    } else {
        RuleValue::Scalar(format!("bookmark not found: {name}"))
    }
}

fn extract_table_cell(rule: &ExtractionRule, tree: &DocumentTree) -> RuleValue {
    let table_index = rule.config_usize("table_index", 0);
    let row_index = rule.config_usize("row_index", 0);
    let column_index = rule.config_usize("column_index", 0);

    let Some(table) = tree.tables.get(table_index) else {
        return RuleValue::Scalar(format!("table index out of range: {table_index}"));
    };
    let Some(row) = table.cells.get(row_index) else {
        return RuleValue::Scalar(format!("row index out of range: {row_index}"));
    };
    match row.get(column_index) {
        Some(cell) => RuleValue::Scalar(cell.clone()),
        None => RuleValue::Scalar(format!("column index out of range: {column_index}")),
    }
}

/// Column slice as a list; the exporter newline-joins it for flat display.
/// Row 0 is skipped when the table has a header row.
fn extract_table_column(rule: &ExtractionRule, tree: &DocumentTree) -> RuleValue {
    let table_index = rule.config_usize("table_index", 0);
    let column_index = rule.config_usize("column_index", 0);
    let has_header = rule.config_bool("has_header", true);

    let Some(table) = tree.tables.get(table_index) else {
        return RuleValue::Scalar(format!("table index out of range: {table_index}"));
    };
    if table.cells.is_empty() {
        return RuleValue::Scalar("table is empty".to_string());
    }
    if column_index >= table.cells[0].len() {
        return RuleValue::Scalar(format!("column index out of range: {column_index}"));
    }

    let start = if has_header { 1 } else { 0 };
    let items = table.cells[start..]
        .iter()
        .map(|row| row.get(column_index).cloned().unwrap_or_default())
        .collect();
    RuleValue::List(items)
}

/// Row slice, tab-joined into one scalar.
fn extract_table_row(rule: &ExtractionRule, tree: &DocumentTree) -> RuleValue {
    let table_index = rule.config_usize("table_index", 0);
    let row_index = rule.config_usize("row_index", 0);

    let Some(table) = tree.tables.get(table_index) else {
        return RuleValue::Scalar(format!("table index out of range: {table_index}"));
    };
    match table.cells.get(row_index) {
        Some(row) => RuleValue::Scalar(row.join("\t")),
        None => RuleValue::Scalar(format!("row index out of range: {row_index}")),
    }
}

/// Entire table. The `has_header` config key is a hint for the exporter;
/// the header row is not stripped here.
fn extract_table_full(rule: &ExtractionRule, tree: &DocumentTree) -> RuleValue {
    let table_index = rule.config_usize("table_index", 0);

    let Some(table) = tree.tables.get(table_index) else {
        return RuleValue::Scalar(format!("table index out of range: {table_index}"));
    };
    if table.cells.is_empty() {
        return RuleValue::Scalar("table is empty".to_string());
    }
    RuleValue::Table(table.cells.clone())
}
