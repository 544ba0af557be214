//! Rule-set persistence.
//!
//! Primary format: a JSON array of flat rule records, order-significant
//! (rule order determines export column order). Loading tolerates unknown
//! rule-type discriminants by substituting `regex_match` and reporting a
//! warning instead of failing the whole file.
//!
//! Secondary format: a row-oriented CSV for human inspection. Write-only;
//! round-trip fidelity is only guaranteed for the JSON format.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use super::types::{ExtractionRule, RuleType};

#[derive(Error, Debug)]
pub enum RuleSetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("rule-set JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rule-set CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// On-disk record. `rule_type` stays a plain string here so an unknown
/// discriminant can fall back instead of poisoning the whole load.
#[derive(Deserialize)]
struct RawRule {
    #[serde(default)]
    id: Option<Uuid>,
    #[serde(default)]
    field_name: String,
    #[serde(default)]
    header_name: Option<String>,
    #[serde(default)]
    rule_type: Option<String>,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    config: Map<String, Value>,
    #[serde(default)]
    description: String,
}

fn default_enabled() -> bool {
    true
}

/// Save rules in the primary JSON format, preserving order and ids.
pub fn save_json(rules: &[ExtractionRule], path: &Path) -> Result<(), RuleSetError> {
    let json = serde_json::to_string_pretty(rules)?;
    fs::write(path, json)?;
    Ok(())
}

/// Load rules from the primary JSON format.
///
/// Returns the rules plus one warning per record whose discriminant was
/// unknown or missing (those records load as `RegexMatch`).
pub fn load_json(path: &Path) -> Result<(Vec<ExtractionRule>, Vec<String>), RuleSetError> {
    let content = fs::read_to_string(path)?;
    let raw: Vec<RawRule> = serde_json::from_str(&content)?;

    let mut warnings = Vec::new();
    let rules = raw
        .into_iter()
        .enumerate()
        .map(|(i, record)| {
            let rule_type = match record.rule_type.as_deref() {
                Some(s) => RuleType::from_str(s).unwrap_or_else(|| {
                    warnings.push(format!(
                        "rule {} ('{}'): unknown rule type '{}', defaulting to regex_match",
                        i, record.field_name, s
                    ));
                    RuleType::RegexMatch
                }),
                None => {
                    warnings.push(format!(
                        "rule {} ('{}'): missing rule type, defaulting to regex_match",
                        i, record.field_name
                    ));
                    RuleType::RegexMatch
                }
            };
            let header_name = record
                .header_name
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| record.field_name.clone());
            ExtractionRule {
                id: record.id.unwrap_or_else(Uuid::new_v4),
                field_name: record.field_name,
                header_name,
                rule_type,
                enabled: record.enabled,
                config: record.config,
                description: record.description,
            }
        })
        .collect();

    if !warnings.is_empty() {
        tracing::warn!(count = warnings.len(), path = %path.display(), "rule-set loaded with warnings");
    }
    Ok((rules, warnings))
}

/// Export rules as a row-oriented CSV. Not a supported load source.
pub fn export_csv(rules: &[ExtractionRule], path: &Path) -> Result<(), RuleSetError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "field_name",
        "header_name",
        "rule_type",
        "config",
        "enabled",
        "description",
    ])?;
    for rule in rules {
        let config = serde_json::to_string(&Value::Object(rule.config.clone()))?;
        writer.write_record([
            rule.field_name.as_str(),
            rule.header_name.as_str(),
            rule.rule_type.display_name(),
            config.as_str(),
            if rule.enabled { "yes" } else { "no" },
            rule.description.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_rules() -> Vec<ExtractionRule> {
        let mut regex_config = Map::new();
        regex_config.insert("pattern".to_string(), json!(r"ID: (\d+)"));
        regex_config.insert("group".to_string(), json!(1));
        let mut table_config = Map::new();
        table_config.insert("table_index".to_string(), json!(0));
        table_config.insert("has_header".to_string(), json!(false));

        let id_rule = ExtractionRule::new("id", RuleType::RegexMatch, regex_config);
        let mut table_rule = ExtractionRule::new("inventory", RuleType::TableFull, table_config);
        table_rule.header_name = "Inventory".to_string();
        table_rule.enabled = false;
        vec![id_rule, table_rule]
    }

    #[test]
    fn json_roundtrip_preserves_rules() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        let rules = sample_rules();

        save_json(&rules, &path).unwrap();
        let (loaded, warnings) = load_json(&path).unwrap();

        assert!(warnings.is_empty());
        assert_eq!(loaded.len(), rules.len());
        for (before, after) in rules.iter().zip(&loaded) {
            assert_eq!(after.id, before.id, "ids must survive the roundtrip");
            assert_eq!(after.field_name, before.field_name);
            assert_eq!(after.header_name, before.header_name);
            assert_eq!(after.rule_type, before.rule_type);
            assert_eq!(after.enabled, before.enabled);
            assert_eq!(after.config, before.config);
        }
    }

    #[test]
    fn unknown_rule_type_defaults_with_warning() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        fs::write(
            &path,
            r#"[{"field_name": "x", "rule_type": "xpath_query", "config": {}}]"#,
        )
        .unwrap();

        let (rules, warnings) = load_json(&path).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].rule_type, RuleType::RegexMatch);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("xpath_query"));
    }

    #[test]
    fn minimal_record_gets_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        fs::write(&path, r#"[{"field_name": "y", "rule_type": "table_row"}]"#).unwrap();

        let (rules, warnings) = load_json(&path).unwrap();
        assert!(warnings.is_empty());
        let rule = &rules[0];
        assert_eq!(rule.header_name, "y");
        assert!(rule.enabled);
        assert!(rule.config.is_empty());
        assert!(rule.description.is_empty());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_json(&path), Err(RuleSetError::Json(_))));
    }

    #[test]
    fn csv_export_contains_display_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rules.csv");
        export_csv(&sample_rules(), &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "field_name,header_name,rule_type,config,enabled,description"
        );
        let first = lines.next().unwrap();
        assert!(first.contains("Regular expression"));
        assert!(first.contains("yes"));
        let second = lines.next().unwrap();
        assert!(second.contains("Full table"));
        assert!(second.contains("no"));
    }
}
