//! Normalized attribute data
//!
//! Both backends report attributes in this shape: a short name (namespace and
//! `Attribute` suffix stripped), positional arguments and named arguments.

use std::fmt;

use crate::type_view_model::TypeViewModel;

// ============================================================================
// AttributeValue
// ============================================================================

/// A constant attribute argument
#[derive(Clone)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// Enum member or other constant member access (`SearchMethods.Contains`)
    Enum { type_name: String, member: String },
    /// `typeof(X)`
    Type(TypeViewModel),
    Array(Vec<AttributeValue>),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::Int(i) => Some(*i),
            AttributeValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(i) => Some(*i as f64),
            AttributeValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Member name of an enum-valued argument
    pub fn as_enum_member(&self) -> Option<&str> {
        match self {
            AttributeValue::Enum { member, .. } => Some(member),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<&TypeViewModel> {
        match self {
            AttributeValue::Type(t) => Some(t),
            _ => None,
        }
    }

    /// Flatten string and string-array arguments
    pub fn strings(&self) -> Vec<String> {
        match self {
            AttributeValue::String(s) => vec![s.clone()],
            AttributeValue::Array(items) => items.iter().flat_map(|i| i.strings()).collect(),
            _ => Vec::new(),
        }
    }
}

impl fmt::Debug for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => write!(f, "null"),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Int(i) => write!(f, "{}", i),
            AttributeValue::Float(v) => write!(f, "{}", v),
            AttributeValue::String(s) => write!(f, "{:?}", s),
            AttributeValue::Enum { type_name, member } => write!(f, "{}.{}", type_name, member),
            AttributeValue::Type(t) => write!(f, "typeof({})", t.full_name()),
            AttributeValue::Array(items) => f.debug_list().entries(items).finish(),
        }
    }
}

// ============================================================================
// AttributeData
// ============================================================================

/// One attribute application
#[derive(Debug, Clone)]
pub struct AttributeData {
    /// Normalized short name (`ForeignKey`, not `ForeignKeyAttribute`)
    pub name: String,
    /// Positional constructor arguments
    pub args: Vec<AttributeValue>,
    /// Named property arguments, in declaration order
    pub named: Vec<(String, AttributeValue)>,
}

impl AttributeData {
    pub fn new(name: &str) -> Self {
        Self {
            name: Self::normalize_name(name),
            args: Vec::new(),
            named: Vec::new(),
        }
    }

    /// Strip namespace qualification and the `Attribute` suffix
    pub fn normalize_name(name: &str) -> String {
        let name = name.trim().trim_start_matches("global::");
        let short = name.rsplit('.').next().unwrap_or(name);
        match short.strip_suffix("Attribute") {
            Some(stripped) if !stripped.is_empty() => stripped.to_string(),
            _ => short.to_string(),
        }
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == Self::normalize_name(name)
    }

    pub fn arg(&self, index: usize) -> Option<&AttributeValue> {
        self.args.get(index)
    }

    /// Named argument, matched case-insensitively
    pub fn named(&self, key: &str) -> Option<&AttributeValue> {
        self.named
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    /// Named argument `key`, falling back to positional argument `index`
    pub fn value(&self, index: usize, key: &str) -> Option<&AttributeValue> {
        self.named(key).or_else(|| self.arg(index))
    }

    pub fn string(&self, index: usize, key: &str) -> Option<String> {
        self.value(index, key)
            .and_then(|v| v.as_str())
            .map(str::to_string)
    }
}

/// Lookup helpers over a list of attributes
pub trait AttributeSliceExt {
    fn attribute(&self, name: &str) -> Option<&AttributeData>;
    fn attributes_named(&self, name: &str) -> Vec<&AttributeData>;
    fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }
}

impl AttributeSliceExt for [AttributeData] {
    fn attribute(&self, name: &str) -> Option<&AttributeData> {
        let name = AttributeData::normalize_name(name);
        self.iter().find(|a| a.name == name)
    }

    fn attributes_named(&self, name: &str) -> Vec<&AttributeData> {
        let name = AttributeData::normalize_name(name);
        self.iter().filter(|a| a.name == name).collect()
    }
}

impl AttributeSliceExt for Vec<AttributeData> {
    fn attribute(&self, name: &str) -> Option<&AttributeData> {
        self.as_slice().attribute(name)
    }

    fn attributes_named(&self, name: &str) -> Vec<&AttributeData> {
        self.as_slice().attributes_named(name)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(AttributeData::normalize_name("KeyAttribute"), "Key");
        assert_eq!(
            AttributeData::normalize_name("System.ComponentModel.DataAnnotations.Key"),
            "Key"
        );
        assert_eq!(AttributeData::normalize_name("global::Foo.Attribute"), "Attribute");
        assert_eq!(AttributeData::normalize_name("Search"), "Search");
    }

    #[test]
    fn test_named_then_positional_lookup() {
        let mut attr = AttributeData::new("DefaultOrderBy");
        attr.args.push(AttributeValue::Int(2));
        assert_eq!(attr.value(0, "FieldOrder").and_then(|v| v.as_i64()), Some(2));

        attr.named
            .push(("fieldOrder".to_string(), AttributeValue::Int(5)));
        assert_eq!(attr.value(0, "FieldOrder").and_then(|v| v.as_i64()), Some(5));
    }

    #[test]
    fn test_slice_lookup() {
        let attrs = vec![AttributeData::new("KeyAttribute"), AttributeData::new("Search")];
        assert!(attrs.has_attribute("Key"));
        assert!(attrs.has_attribute("SearchAttribute"));
        assert!(!attrs.has_attribute("Hidden"));
    }

    #[test]
    fn test_value_strings_flatten_arrays() {
        let value = AttributeValue::Array(vec![
            AttributeValue::String("Admin".into()),
            AttributeValue::String("User".into()),
        ]);
        assert_eq!(value.strings(), vec!["Admin", "User"]);
    }
}
