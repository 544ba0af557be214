//! Rule inference from selected document text.
//!
//! Collaborating editors hand a snippet of selected text to these helpers
//! to pre-fill a rule: either a literal-match regex rule, or a typed guess
//! based on the shape of the text (id number, phone, email, date, amount).

use regex::Regex;
use serde_json::{Map, Value};

use super::types::{ExtractionRule, RuleType};

/// Build a literal-match regex rule from selected text. The text becomes a
/// single escaped capture group; the field name is a truncated prefix of
/// the selection. Empty selections yield nothing.
pub fn infer_rule_from_text(text: &str) -> Option<ExtractionRule> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let mut config = Map::new();
    config.insert(
        "pattern".to_string(),
        Value::String(format!("({})", regex::escape(text))),
    );
    Some(ExtractionRule::new(truncated_label(text), RuleType::RegexMatch, config))
}

/// Guess a field name, rule type, and config from the shape of selected
/// text. Falls back to a literal pattern named after the text itself.
pub fn identify_data_type(text: &str) -> (String, RuleType, Map<String, Value>) {
    let text = text.trim();

    // Shape patterns are compile-time constants; failure would be a bug.
    let shapes: [(&str, &str, &str); 5] = [
        ("id_number", r"^\d{17}[\dXx]$", r"(\d{17}[\dXx])"),
        ("phone", r"^1\d{10}$", r"(1\d{10})"),
        (
            "email",
            r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$",
            r"([a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+)",
        ),
        (
            "date",
            r"^\d{4}[-/]\d{1,2}[-/]\d{1,2}$",
            r"(\d{4}[-/]\d{1,2}[-/]\d{1,2})",
        ),
        ("amount", r"^\d+(\.\d+)?$", r"(\d+(?:\.\d+)?)"),
    ];

    for (name, shape, extraction) in shapes {
        if Regex::new(shape).unwrap().is_match(text) {
            let mut config = Map::new();
            config.insert("pattern".to_string(), Value::String(extraction.to_string()));
            return (name.to_string(), RuleType::RegexMatch, config);
        }
    }

    let mut config = Map::new();
    config.insert(
        "pattern".to_string(),
        Value::String(regex::escape(text)),
    );
    (truncated_label(text), RuleType::RegexMatch, config)
}

/// First ten characters of the text, with an ellipsis when truncated.
fn truncated_label(text: &str) -> String {
    let prefix: String = text.chars().take(10).collect();
    if text.chars().count() > 10 {
        format!("{prefix}...")
    } else {
        prefix
    }
}
