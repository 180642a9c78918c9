//! Conversions between raw request values and stored JSON values
//!
//! Records hold JSON values in a normalized form per type:
//!
//! ```text
//! string, TimeOnly, TimeSpan   String
//! bool                         Bool
//! numbers                      Number (integral types as i64)
//! enums                        Number (the member value)
//! DateTime, DateTimeOffset     String, RFC 3339
//! DateOnly                     String, YYYY-MM-DD
//! Guid                         String, lowercase hyphenated
//! ```

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, SecondsFormat, TimeZone, Utc};
use serde_json::{Number, Value};
use uuid::Uuid;

use coalesce_model::TypeViewModel;

/// Parse a raw string as a value of `ty` (nullable stripped)
pub fn parse_value(ty: &TypeViewModel, raw: &str) -> Option<Value> {
    let ty = ty.nullable_stripped();
    let raw = raw.trim();

    if ty.is_enum() {
        if let Ok(n) = raw.parse::<i64>() {
            return Some(Value::from(n));
        }
        return ty
            .enum_members()
            .into_iter()
            .find(|m| m.name.eq_ignore_ascii_case(raw))
            .map(|m| Value::from(m.value));
    }
    if ty.is_bool() {
        return match raw.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        };
    }
    if ty.is_number() {
        let integral = ty.primitive_kind().is_some_and(|k| k.is_integral());
        if integral {
            return raw.parse::<i64>().ok().map(Value::from);
        }
        return raw
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number);
    }
    if ty.is_date_only() {
        return parse_date(raw).map(|d| Value::String(d.format("%Y-%m-%d").to_string()));
    }
    if ty.is_date() {
        return parse_date_time(raw, &utc()).map(|d| Value::String(format_date_time(&d)));
    }
    if ty.is_guid() {
        return Uuid::parse_str(raw)
            .ok()
            .map(|g| Value::String(g.hyphenated().to_string()));
    }
    Some(Value::String(raw.to_string()))
}

/// Coerce an incoming JSON value into the stored form of `ty`
///
/// `None` means the value cannot represent `ty`.
pub fn coerce_value(ty: &TypeViewModel, value: &Value) -> Option<Value> {
    match value {
        Value::Null => ty.is_reference_or_nullable_value().then_some(Value::Null),
        Value::String(s) if ty.nullable_stripped().is_string() => Some(Value::String(s.clone())),
        Value::String(s) => {
            if s.is_empty() && ty.is_reference_or_nullable_value() {
                return Some(Value::Null);
            }
            parse_value(ty, s)
        }
        Value::Number(n) => {
            let stripped = ty.nullable_stripped();
            if stripped.is_string() {
                return Some(Value::String(n.to_string()));
            }
            if stripped.is_enum() || stripped.is_number() {
                return parse_value(&stripped, &n.to_string());
            }
            None
        }
        Value::Bool(b) => {
            let stripped = ty.nullable_stripped();
            if stripped.is_bool() {
                Some(Value::Bool(*b))
            } else if stripped.is_string() {
                Some(Value::String(b.to_string()))
            } else {
                None
            }
        }
        Value::Array(items) => {
            let element = ty.collection_element_type()?;
            items
                .iter()
                .map(|item| coerce_value(&element, item))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array)
        }
        Value::Object(_) => ty.is_poco().then(|| value.clone()),
    }
}

/// The stored value a new entity starts with when none is supplied
pub fn default_value(ty: &TypeViewModel) -> Value {
    if ty.is_reference_or_nullable_value() {
        return Value::Null;
    }
    if ty.is_bool() {
        Value::Bool(false)
    } else if ty.is_number() || ty.is_enum() {
        Value::from(0)
    } else if ty.is_guid() {
        Value::String(Uuid::nil().hyphenated().to_string())
    } else {
        Value::Null
    }
}

/// Keys that mean "not assigned yet"
pub fn is_unassigned_key(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || Uuid::parse_str(s).is_ok_and(|g| g.is_nil()),
        _ => false,
    }
}

/// Key equality across number and string representations
pub fn keys_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::String(x), Value::String(y)) => x.eq_ignore_ascii_case(y),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            s.trim().parse::<f64>().ok() == n.as_f64()
        }
        _ => a == b,
    }
}

/// Ordering used for sorting and range comparisons
///
/// Strings that both parse as dates compare as instants; other strings
/// compare case-insensitively.
pub fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Less),
        (_, Value::Null) => Some(Ordering::Greater),
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) => {
            if let (Ok(dx), Ok(dy)) = (
                DateTime::parse_from_rfc3339(x),
                DateTime::parse_from_rfc3339(y),
            ) {
                return Some(dx.cmp(&dy));
            }
            Some(x.to_lowercase().cmp(&y.to_lowercase()))
        }
        _ => None,
    }
}

/// Text for messages: strings unquoted, everything else as JSON
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "NULL".to_string(),
        other => other.to_string(),
    }
}

// ============================================================================
// Dates
// ============================================================================

pub fn utc() -> FixedOffset {
    Utc.fix()
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%m/%d/%Y"))
        .ok()
}

/// RFC 3339, or a local date/time interpreted in `zone`
pub fn parse_date_time(raw: &str, zone: &FixedOffset) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| parse_date(raw).and_then(|d| d.and_hms_opt(0, 0, 0)))?;
    zone.from_local_datetime(&naive).single()
}

pub fn format_date_time(value: &DateTime<FixedOffset>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// `[start, end)` of the calendar day in `zone`
pub fn day_bounds(date: NaiveDate, zone: &FixedOffset) -> Option<(String, String)> {
    let start = zone.from_local_datetime(&date.and_hms_opt(0, 0, 0)?).single()?;
    let end = zone
        .from_local_datetime(&date.succ_opt()?.and_hms_opt(0, 0, 0)?)
        .single()?;
    Some((format_date_time(&start), format_date_time(&end)))
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

    fn ty(class: &str, property: &str) -> TypeViewModel {
        testing::both()[0].property_type(class, property)
    }

    #[test]
    fn test_parse_typed_values() {
        assert_eq!(parse_value(&ty("ComplexModel", "NullableInt"), " 42 "), Some(json!(42)));
        assert_eq!(parse_value(&ty("ComplexModel", "NullableInt"), "4.5"), None);
        assert_eq!(parse_value(&ty("ComplexModel", "Bool"), "TRUE"), Some(json!(true)));
        assert_eq!(parse_value(&ty("ComplexModel", "Bool"), "yes"), None);
        assert_eq!(
            parse_value(&ty("ComplexModel", "DateOnly"), "2024-02-29"),
            Some(json!("2024-02-29"))
        );
        assert_eq!(
            parse_value(&ty("ComplexModel", "Guid"), "6B29FC40-CA47-1067-B31D-00DD010662DA"),
            Some(json!("6b29fc40-ca47-1067-b31d-00dd010662da"))
        );
    }

    #[test]
    fn test_parse_enum_by_name_or_value() {
        let status = ty("Case", "Status");
        assert_eq!(parse_value(&status, "resolved"), Some(json!(2)));
        assert_eq!(parse_value(&status, "99"), Some(json!(99)));
        assert_eq!(parse_value(&status, "Nope"), None);
    }

    #[test]
    fn test_coerce_respects_nullability() {
        assert_eq!(coerce_value(&ty("ComplexModel", "NullableInt"), &Value::Null), Some(Value::Null));
        assert_eq!(coerce_value(&ty("ComplexModel", "Bool"), &Value::Null), None);
        assert_eq!(coerce_value(&ty("ComplexModel", "String"), &json!(12)), Some(json!("12")));
        assert_eq!(coerce_value(&ty("ComplexModel", "NullableInt"), &json!("7")), Some(json!(7)));
        assert_eq!(
            coerce_value(&ty("ComplexModel", "StringList"), &json!(["a", "b"])),
            Some(json!(["a", "b"]))
        );
    }

    #[test]
    fn test_compare_dates_as_instants() {
        let a = json!("2024-01-01T10:00:00+02:00");
        let b = json!("2024-01-01T09:00:00Z");
        assert_eq!(compare_values(&a, &b), Some(Ordering::Less));
        assert_eq!(compare_values(&json!("apple"), &json!("Banana")), Some(Ordering::Less));
        assert_eq!(compare_values(&Value::Null, &json!(1)), Some(Ordering::Less));
    }

    #[test]
    fn test_keys_equal_across_representations() {
        assert!(keys_equal(&json!(5), &json!("5")));
        assert!(keys_equal(&json!(5), &json!(5.0)));
        assert!(!keys_equal(&json!(5), &json!(6)));
        assert!(is_unassigned_key(&json!(0)));
        assert!(!is_unassigned_key(&json!(3)));
    }

    #[test]
    fn test_day_bounds_in_zone() {
        let zone = FixedOffset::west_opt(5 * 3600).unwrap();
        let (start, end) = day_bounds(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), &zone).unwrap();
        assert_eq!(start, "2024-03-01T00:00:00-05:00");
        assert_eq!(end, "2024-03-02T00:00:00-05:00");
    }
}
