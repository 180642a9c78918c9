//! Attribute validation of incoming records and method arguments

use std::collections::BTreeSet;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::warn;

use coalesce_core::ValidationRule;
use coalesce_model::{ClassViewModel, MethodViewModel};

use crate::db::Record;
use crate::results::ValidationIssue;

/// One `@`, neither first nor last
fn is_email(s: &str) -> bool {
    s.matches('@').count() == 1 && !s.starts_with('@') && !s.ends_with('@')
}

/// Absolute http, https or ftp address
fn is_url(s: &str) -> bool {
    let lower = s.to_ascii_lowercase();
    ["http://", "https://", "ftp://"]
        .iter()
        .any(|scheme| lower.starts_with(scheme) && lower.len() > scheme.len())
        && !s.contains(char::is_whitespace)
}

/// First failure of `rules` for one value
fn check(rules: &[ValidationRule], value: &Value, display_name: &str) -> Option<String> {
    for rule in rules {
        let ok = match rule {
            ValidationRule::Required => match value {
                Value::Null => false,
                Value::String(s) => !s.trim().is_empty(),
                _ => true,
            },
            _ if value.is_null() => true,
            ValidationRule::MinLength(min) => length(value).is_none_or(|len| len >= *min),
            ValidationRule::MaxLength(max) => length(value).is_none_or(|len| len <= *max),
            ValidationRule::Range { min, max } => value
                .as_f64()
                .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
                .is_none_or(|n| n >= *min && n <= *max),
            ValidationRule::Pattern { regex, .. } => match Regex::new(&format!("^(?:{})$", regex)) {
                Ok(re) => value.as_str().is_none_or(|s| re.is_match(s)),
                Err(e) => {
                    warn!(pattern = %regex, error = %e, "Invalid validation pattern");
                    true
                }
            },
            ValidationRule::Email => value.as_str().is_none_or(is_email),
            ValidationRule::Url => value.as_str().is_none_or(is_url),
        };
        if !ok {
            return Some(rule.error_message(display_name));
        }
    }
    None
}

fn length(value: &Value) -> Option<usize> {
    match value {
        Value::String(s) => Some(s.chars().count()),
        Value::Array(items) => Some(items.len()),
        _ => None,
    }
}

/// Validate a mapped record
///
/// On create every property is checked; on update only the changed ones.
pub fn validate_record(
    class: &ClassViewModel,
    record: &Record,
    changed: &BTreeSet<String>,
    is_create: bool,
) -> Vec<ValidationIssue> {
    class
        .properties
        .iter()
        .filter(|p| !p.validation.is_empty() && !p.is_navigation() && !p.is_primary_key())
        .filter(|p| is_create || changed.contains(&p.name))
        .filter_map(|p| {
            let value = record.get(&p.name).unwrap_or(&Value::Null);
            check(&p.validation, value, &p.display_name)
                .map(|issue| ValidationIssue::new(p.json_name.clone(), issue))
        })
        .collect()
}

/// Validate bound client arguments of a method
pub fn validate_arguments(method: &MethodViewModel, args: &Map<String, Value>) -> Vec<ValidationIssue> {
    method
        .client_parameters()
        .filter(|p| !p.validation.is_empty())
        .filter_map(|p| {
            let value = args.get(&p.name).unwrap_or(&Value::Null);
            check(&p.validation, value, &p.display_name)
                .map(|issue| ValidationIssue::new(p.json_name.clone(), issue))
        })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use coalesce_model::testing;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_required_and_max_length_on_create() {
        for fixture in testing::both() {
            let person = fixture.repo.require_class("Person").unwrap();
            let issues = validate_record(&person, &record(json!({"FirstName": " "})), &BTreeSet::new(), true);
            assert_eq!(issues, vec![ValidationIssue::new("firstName", "First Name is required.")]);

            let long = "x".repeat(76);
            let issues = validate_record(&person, &record(json!({"FirstName": long})), &BTreeSet::new(), true);
            assert_eq!(
                issues,
                vec![ValidationIssue::new("firstName", "First Name may not be more than 75 characters.")]
            );
        }
    }

    #[test]
    fn test_update_checks_only_changed() {
        let fixture = &testing::both()[0];
        let person = fixture.repo.require_class("Person").unwrap();
        let row = record(json!({"FirstName": null}));
        assert!(validate_record(&person, &row, &BTreeSet::new(), false).is_empty());
        let changed = BTreeSet::from(["FirstName".to_string()]);
        assert_eq!(validate_record(&person, &row, &changed, false).len(), 1);
    }

    #[test]
    fn test_range() {
        let fixture = &testing::both()[0];
        let complex = fixture.repo.require_class("ComplexModel").unwrap();
        let changed = BTreeSet::from(["RangeValue".to_string()]);
        let issues = validate_record(&complex, &record(json!({"RangeValue": 101})), &changed, false);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].property, "rangeValue");
        assert!(validate_record(&complex, &record(json!({"RangeValue": 50})), &changed, false).is_empty());
    }

    #[test]
    fn test_rule_checks() {
        let email = [ValidationRule::Email];
        assert!(check(&email, &json!("a@b.co"), "Email").is_none());
        assert!(check(&email, &json!("nope"), "Email").is_some());
        assert!(check(&email, &Value::Null, "Email").is_none());

        let pattern = [ValidationRule::Pattern {
            regex: "[A-Z]{3}".into(),
            message: String::new(),
        }];
        assert!(check(&pattern, &json!("ABC"), "Code").is_none());
        assert!(check(&pattern, &json!("ABCD"), "Code").is_some());

        let url = [ValidationRule::Url];
        assert!(check(&url, &json!("https://example.com/x"), "Site").is_none());
        assert!(check(&url, &json!("example.com"), "Site").is_some());
    }
}
