//! Rule Model — the seven extraction strategies, rule records, rule-set
//! persistence, and rule inference from selected text.

pub mod infer;
pub mod ruleset;
pub mod types;

pub use infer::{identify_data_type, infer_rule_from_text};
pub use ruleset::{export_csv, load_json, save_json, RuleSetError};
pub use types::{ExtractionRule, RuleType, RuleValue};

/// The seven strategy discriminants, for collaborating editors.
pub fn list_rule_types() -> &'static [RuleType] {
    RuleType::all()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_all_seven_strategies() {
        assert_eq!(list_rule_types().len(), 7);
        assert!(list_rule_types().contains(&RuleType::BookmarkLookup));
    }
}
