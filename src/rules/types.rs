//! Core types for the rule model: the seven extraction strategies, the
//! rule record itself, and the tagged result value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ═══════════════════════════════════════════
// Rule Type
// ═══════════════════════════════════════════

/// The seven extraction strategies. A closed sum: evaluation matches
/// exhaustively, so a new variant cannot be silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    RegexMatch,
    PositionRange,
    BookmarkLookup,
    TableCell,
    TableColumn,
    TableRow,
    TableFull,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RegexMatch => "regex_match",
            Self::PositionRange => "position_range",
            Self::BookmarkLookup => "bookmark_lookup",
            Self::TableCell => "table_cell",
            Self::TableColumn => "table_column",
            Self::TableRow => "table_row",
            Self::TableFull => "table_full",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "regex_match" => Some(Self::RegexMatch),
            "position_range" => Some(Self::PositionRange),
            "bookmark_lookup" => Some(Self::BookmarkLookup),
            "table_cell" => Some(Self::TableCell),
            "table_column" => Some(Self::TableColumn),
            "table_row" => Some(Self::TableRow),
            "table_full" => Some(Self::TableFull),
            _ => None,
        }
    }

    pub fn all() -> &'static [RuleType] {
        &[
            Self::RegexMatch,
            Self::PositionRange,
            Self::BookmarkLookup,
            Self::TableCell,
            Self::TableColumn,
            Self::TableRow,
            Self::TableFull,
        ]
    }

    /// Human label for list displays and the CSV export.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::RegexMatch => "Regular expression",
            Self::PositionRange => "Position range",
            Self::BookmarkLookup => "Bookmark",
            Self::TableCell => "Table cell",
            Self::TableColumn => "Table column",
            Self::TableRow => "Table row",
            Self::TableFull => "Full table",
        }
    }
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ═══════════════════════════════════════════
// Extraction Rule
// ═══════════════════════════════════════════

/// One user-defined extraction rule.
///
/// `config` keys are validated lazily: evaluation reads them through the
/// typed accessors below and falls back to documented defaults, so a rule
/// with missing or mistyped keys still evaluates (usually to an empty or
/// diagnostic value) instead of failing construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRule {
    pub id: Uuid,
    pub field_name: String,
    /// Column label in the export; defaults to `field_name`.
    pub header_name: String,
    pub rule_type: RuleType,
    pub enabled: bool,
    pub config: Map<String, Value>,
    pub description: String,
}

impl ExtractionRule {
    pub fn new(field_name: impl Into<String>, rule_type: RuleType, config: Map<String, Value>) -> Self {
        let field_name = field_name.into();
        Self {
            id: Uuid::new_v4(),
            header_name: field_name.clone(),
            field_name,
            rule_type,
            enabled: true,
            config,
            description: String::new(),
        }
    }

    /// Duplicate the rule under a fresh identity.
    pub fn clone_with_new_id(&self) -> Self {
        Self {
            id: Uuid::new_v4(),
            ..self.clone()
        }
    }

    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }

    pub fn config_usize(&self, key: &str, default: usize) -> usize {
        self.config
            .get(key)
            .and_then(Value::as_u64)
            .map(|v| v as usize)
            .unwrap_or(default)
    }

    /// Absent, negative, or mistyped values read as `None`.
    pub fn config_opt_usize(&self, key: &str) -> Option<usize> {
        self.config.get(key).and_then(Value::as_u64).map(|v| v as usize)
    }

    pub fn config_bool(&self, key: &str, default: bool) -> bool {
        self.config.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    /// One-line configuration summary (indices shown 1-based, the way the
    /// rule editor displays them).
    pub fn config_summary(&self) -> String {
        match self.rule_type {
            RuleType::RegexMatch => {
                format!("regex: {}", self.config_str("pattern").unwrap_or("unset"))
            }
            RuleType::PositionRange => {
                let start = self.config_usize("start_index", 0);
                match self.config_opt_usize("end_index") {
                    Some(end) => format!("paragraphs: {start}-{end}"),
                    None => format!("paragraphs: {start}-end"),
                }
            }
            RuleType::BookmarkLookup => {
                format!("bookmark: {}", self.config_str("bookmark_name").unwrap_or("unset"))
            }
            RuleType::TableCell => format!(
                "table {}, cell [{},{}]",
                self.config_usize("table_index", 0) + 1,
                self.config_usize("row_index", 0) + 1,
                self.config_usize("column_index", 0) + 1,
            ),
            RuleType::TableColumn => format!(
                "table {}, column {}",
                self.config_usize("table_index", 0) + 1,
                self.config_usize("column_index", 0) + 1,
            ),
            RuleType::TableRow => format!(
                "table {}, row {}",
                self.config_usize("table_index", 0) + 1,
                self.config_usize("row_index", 0) + 1,
            ),
            RuleType::TableFull => {
                let table = self.config_usize("table_index", 0) + 1;
                if self.config_bool("has_header", true) {
                    format!("table {table}, with header")
                } else {
                    format!("table {table}, no header")
                }
            }
        }
    }
}

impl std::fmt::Display for ExtractionRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.field_name, self.rule_type.display_name())
    }
}

// ═══════════════════════════════════════════
// Result Value
// ═══════════════════════════════════════════

/// Tagged output of evaluating one rule. The tag drives export routing:
/// scalars and lists stay inline, tables go to auxiliary sheets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RuleValue {
    Scalar(String),
    List(Vec<String>),
    Table(Vec<Vec<String>>),
}

impl RuleValue {
    /// Flat single-cell rendering: lists newline-join, tables render one
    /// tab-separated line per row.
    pub fn flat_text(&self) -> String {
        match self {
            Self::Scalar(s) => s.clone(),
            Self::List(items) => items.join("\n"),
            Self::Table(rows) => rows
                .iter()
                .map(|row| row.join("\t"))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn is_table(&self) -> bool {
        matches!(self, Self::Table(_))
    }
}
