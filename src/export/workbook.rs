//! Workbook assembly.
//!
//! Rows accumulate in memory and the artifact is written once at save time:
//! schema evolution (new columns appended on the right, earlier rows
//! back-filled empty) then costs nothing, and the writer side never has to
//! rewrite cells. Append mode reads the existing artifact up front (via
//! calamine) and carries its rows verbatim ahead of the new ones.

use std::path::{Path, PathBuf};

use calamine::Reader;
use indexmap::IndexMap;
use rust_xlsxwriter::{Format, FormatAlign, Url, Workbook};

use super::ExportError;
use crate::rules::RuleValue;

const PRIMARY_SHEET: &str = "Extracted Data";
/// xlsx caps worksheet names at 31 characters.
const MAX_SHEET_NAME: usize = 31;
/// Cosmetic cap on computed column widths.
const MAX_COLUMN_WIDTH: f64 = 80.0;

/// A table-shaped value bound for its own sheet.
struct AuxSheet {
    name: String,
    header: String,
    row_index: usize,
    cells: Vec<Vec<String>>,
}

#[derive(Default)]
pub struct TabularExporter {
    output: Option<PathBuf>,
    headers: Vec<String>,
    /// Rows carried over from an existing artifact in append mode.
    carried_rows: Vec<Vec<String>>,
    rows: Vec<IndexMap<String, RuleValue>>,
}

impl TabularExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the output target. With `append` set and a readable
    /// existing artifact, its first-row headers establish the initial
    /// schema and its data rows are retained ahead of new rows.
    pub fn set_output(&mut self, path: &Path, append: bool) {
        self.output = Some(path.to_path_buf());

        if append && path.exists() {
            match read_existing(path) {
                Ok((headers, rows)) => {
                    tracing::debug!(
                        path = %path.display(),
                        headers = headers.len(),
                        rows = rows.len(),
                        "appending to existing artifact"
                    );
                    self.headers = headers;
                    self.carried_rows = rows;
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "cannot open existing artifact, starting fresh"
                    );
                }
            }
        }
    }

    /// Append one result row. The first row's keys fix the initial column
    /// order; keys unseen so far extend the schema on the right.
    pub fn add_row(&mut self, row: IndexMap<String, RuleValue>) {
        for key in row.keys() {
            if !self.headers.iter().any(|h| h == key) {
                self.headers.push(key.clone());
            }
        }
        self.rows.push(row);
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn row_count(&self) -> usize {
        self.carried_rows.len() + self.rows.len()
    }

    /// Write the artifact: primary sheet plus one auxiliary sheet per
    /// table-shaped value. Column sizing happens here, once.
    pub fn save(&self) -> Result<(), ExportError> {
        let path = self.output.as_ref().ok_or(ExportError::NoOutput)?;
        let mut workbook = Workbook::new();

        // Auxiliary sheet names must be settled before the primary sheet is
        // written, since its cells hold back-references to them.
        let mut aux_sheets: Vec<AuxSheet> = Vec::new();
        let mut used_names = vec![PRIMARY_SHEET.to_string()];
        for (row_index, row) in self.rows.iter().enumerate() {
            for (header, value) in row {
                if let RuleValue::Table(cells) = value {
                    let name = unique_sheet_name(header, &used_names);
                    used_names.push(name.clone());
                    aux_sheets.push(AuxSheet {
                        name,
                        header: header.clone(),
                        row_index,
                        cells: cells.clone(),
                    });
                }
            }
        }

        let header_format = Format::new().set_bold().set_align(FormatAlign::Center);
        let bold = Format::new().set_bold();

        {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(PRIMARY_SHEET)?;

            let mut widths: Vec<usize> =
                self.headers.iter().map(|h| h.chars().count()).collect();

            for (col, header) in self.headers.iter().enumerate() {
                worksheet.write_string_with_format(0, col as u16, header.as_str(), &header_format)?;
            }

            let mut row_cursor: u32 = 1;
            for carried in &self.carried_rows {
                for (col, cell) in carried.iter().enumerate() {
                    if col >= self.headers.len() {
                        break;
                    }
                    worksheet.write_string(row_cursor, col as u16, cell.as_str())?;
                    track_width(&mut widths, col, cell);
                }
                row_cursor += 1;
            }

            for (row_index, row) in self.rows.iter().enumerate() {
                for (col, header) in self.headers.iter().enumerate() {
                    let Some(value) = row.get(header) else {
                        continue; // schema back-fill: cell stays empty
                    };
                    if value.is_table() {
                        let Some(aux) = aux_sheets
                            .iter()
                            .find(|a| a.row_index == row_index && &a.header == header)
                        else {
                            continue;
                        };
                        let text = format!("see sheet: {}", aux.name);
                        worksheet.write_url_with_text(
                            row_cursor,
                            col as u16,
                            Url::new(format!("internal:'{}'!A1", aux.name)),
                            text.as_str(),
                        )?;
                        track_width(&mut widths, col, &text);
                    } else {
                        let text = value.flat_text();
                        worksheet.write_string(row_cursor, col as u16, text.as_str())?;
                        track_width(&mut widths, col, &text);
                    }
                }
                row_cursor += 1;
            }

            apply_widths(worksheet, &widths)?;
        }

        for aux in &aux_sheets {
            let worksheet = workbook.add_worksheet();
            worksheet.set_name(aux.name.as_str())?;

            let mut widths: Vec<usize> = Vec::new();
            for (r, row) in aux.cells.iter().enumerate() {
                for (c, cell) in row.iter().enumerate() {
                    if r == 0 {
                        worksheet.write_string_with_format(r as u32, c as u16, cell.as_str(), &bold)?;
                    } else {
                        worksheet.write_string(r as u32, c as u16, cell.as_str())?;
                    }
                    if widths.len() <= c {
                        widths.resize(c + 1, 0);
                    }
                    track_width(&mut widths, c, cell);
                }
            }
            apply_widths(worksheet, &widths)?;
        }

        workbook.save(path)?;
        tracing::info!(
            path = %path.display(),
            rows = self.row_count(),
            sheets = 1 + aux_sheets.len(),
            "artifact saved"
        );
        Ok(())
    }
}

fn track_width(widths: &mut [usize], col: usize, text: &str) {
    let longest_line = text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
    if col < widths.len() && longest_line > widths[col] {
        widths[col] = longest_line;
    }
}

fn apply_widths(
    worksheet: &mut rust_xlsxwriter::Worksheet,
    widths: &[usize],
) -> Result<(), ExportError> {
    for (col, width) in widths.iter().enumerate() {
        worksheet.set_column_width(col as u16, (*width as f64 + 2.0).min(MAX_COLUMN_WIDTH))?;
    }
    Ok(())
}

/// Strip characters xlsx forbids in sheet names and truncate to the limit.
fn sanitize_sheet_name(header: &str) -> String {
    let cleaned: String = header
        .chars()
        .map(|c| match c {
            '[' | ']' | ':' | '*' | '?' | '/' | '\\' | '\'' => '_',
            other => other,
        })
        .collect();
    let name: String = cleaned.chars().take(MAX_SHEET_NAME).collect();
    if name.is_empty() {
        "Sheet".to_string()
    } else {
        name
    }
}

/// Sheet name for a header, uniquified against names already taken.
fn unique_sheet_name(header: &str, used: &[String]) -> String {
    let base = sanitize_sheet_name(header);
    if !used.iter().any(|n| n == &base) {
        return base;
    }
    let mut counter = 2;
    loop {
        let suffix = format!(" {counter}");
        let keep = MAX_SHEET_NAME.saturating_sub(suffix.chars().count());
        let trimmed: String = base.chars().take(keep).collect();
        let candidate = format!("{trimmed}{suffix}");
        if !used.iter().any(|n| n == &candidate) {
            return candidate;
        }
        counter += 1;
    }
}

fn read_existing(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>), ExportError> {
    let mut workbook =
        calamine::open_workbook_auto(path).map_err(|e| ExportError::Workbook(e.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ExportError::Workbook("artifact has no worksheets".to_string()))?
        .map_err(|e| ExportError::Workbook(e.to_string()))?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(first) => first
            .iter()
            .map(|cell| cell.to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        None => Vec::new(),
    };
    let carried: Vec<Vec<String>> = rows
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect();
    Ok((headers, carried))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, RuleValue)]) -> IndexMap<String, RuleValue> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    fn scalar(s: &str) -> RuleValue {
        RuleValue::Scalar(s.to_string())
    }

    fn read_sheet(path: &Path, index: usize) -> Vec<Vec<String>> {
        let mut workbook = calamine::open_workbook_auto(path).unwrap();
        let range = workbook.worksheet_range_at(index).unwrap().unwrap();
        range
            .rows()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    #[test]
    fn schema_grows_and_backfills() {
        let mut exporter = TabularExporter::new();
        exporter.add_row(row(&[("a", scalar("1"))]));
        exporter.add_row(row(&[("b", scalar("2"))]));

        assert_eq!(exporter.headers(), ["a".to_string(), "b".to_string()]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        exporter.set_output(&path, false);
        exporter.save().unwrap();

        let sheet = read_sheet(&path, 0);
        assert_eq!(sheet[0], vec!["a".to_string(), "b".to_string()]);
        // row 1 never saw header "b": back-filled empty
        assert_eq!(sheet[1][0], "1");
        assert_eq!(sheet[1].get(1).cloned().unwrap_or_default(), "");
        assert_eq!(sheet[2][1], "2");
    }

    #[test]
    fn list_values_newline_join_inline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        let mut exporter = TabularExporter::new();
        exporter.set_output(&path, false);
        exporter.add_row(row(&[(
            "col",
            RuleValue::List(vec!["x".to_string(), "y".to_string()]),
        )]));
        exporter.save().unwrap();

        let sheet = read_sheet(&path, 0);
        assert_eq!(sheet[1][0], "x\ny");
    }

    #[test]
    fn table_value_routes_to_auxiliary_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        let mut exporter = TabularExporter::new();
        exporter.set_output(&path, false);
        exporter.add_row(row(&[
            ("name", scalar("Alice")),
            (
                "inventory",
                RuleValue::Table(vec![
                    vec!["H1".to_string(), "H2".to_string()],
                    vec!["a".to_string(), "b".to_string()],
                ]),
            ),
        ]));
        exporter.save().unwrap();

        let mut workbook = calamine::open_workbook_auto(&path).unwrap();
        let names = workbook.sheet_names().to_vec();
        assert_eq!(names, vec!["Extracted Data".to_string(), "inventory".to_string()]);

        let primary = read_sheet(&path, 0);
        assert!(primary[1][1].contains("see sheet: inventory"));

        let aux = read_sheet(&path, 1);
        assert_eq!(aux[0], vec!["H1".to_string(), "H2".to_string()]);
        assert_eq!(aux[1], vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn append_mode_retains_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");

        let mut first = TabularExporter::new();
        first.set_output(&path, false);
        first.add_row(row(&[("a", scalar("old"))]));
        first.save().unwrap();

        let mut second = TabularExporter::new();
        second.set_output(&path, true);
        assert_eq!(second.headers(), ["a".to_string()]);
        second.add_row(row(&[("a", scalar("new"))]));
        second.save().unwrap();

        let sheet = read_sheet(&path, 0);
        assert_eq!(sheet.len(), 3);
        assert_eq!(sheet[1][0], "old");
        assert_eq!(sheet[2][0], "new");
    }

    #[test]
    fn append_mode_with_unreadable_artifact_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        std::fs::write(&path, b"not a workbook").unwrap();

        let mut exporter = TabularExporter::new();
        exporter.set_output(&path, true);
        assert!(exporter.headers().is_empty());
        exporter.add_row(row(&[("a", scalar("1"))]));
        exporter.save().unwrap();

        let sheet = read_sheet(&path, 0);
        assert_eq!(sheet.len(), 2);
    }

    #[test]
    fn save_without_output_is_an_error() {
        let exporter = TabularExporter::new();
        assert!(matches!(exporter.save(), Err(ExportError::NoOutput)));
    }

    #[test]
    fn sheet_names_truncate_and_uniquify() {
        let long = "a very long header name that exceeds the sheet limit";
        let first = unique_sheet_name(long, &[]);
        assert_eq!(first.chars().count(), 31);

        let second = unique_sheet_name(long, &[first.clone()]);
        assert_ne!(second, first);
        assert!(second.chars().count() <= 31);
        assert!(second.ends_with(" 2"));
    }

    #[test]
    fn sheet_names_replace_forbidden_characters() {
        assert_eq!(sanitize_sheet_name("a/b:c"), "a_b_c");
        assert_eq!(sanitize_sheet_name(""), "Sheet");
    }
}
