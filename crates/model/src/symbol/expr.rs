//! Constant expressions in attribute arguments and parameter defaults

use super::text::{matching_close, split_top_level};
use super::type_syntax::TypeSyntax;

/// A constant expression as written in source
#[derive(Debug, Clone, PartialEq)]
pub enum ArgExpr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// `typeof(X)`
    TypeOf(TypeSyntax),
    /// `A.B.C`: an enum member or other constant member access
    Member { type_name: String, member: String },
    Array(Vec<ArgExpr>),
    /// Anything this reader does not evaluate (operators, casts, calls)
    Unsupported(String),
}

impl ArgExpr {
    pub fn parse(text: &str) -> ArgExpr {
        let s = text.trim();
        match s {
            "null" | "default" => return ArgExpr::Null,
            "true" => return ArgExpr::Bool(true),
            "false" => return ArgExpr::Bool(false),
            _ => {}
        }

        if let Some(value) = parse_string(s) {
            return ArgExpr::String(value);
        }
        if let Some(inner) = call_argument(s, "typeof") {
            return match TypeSyntax::parse(inner) {
                Some(ty) => ArgExpr::TypeOf(ty),
                None => ArgExpr::Unsupported(s.to_string()),
            };
        }
        if let Some(inner) = call_argument(s, "nameof") {
            let last = inner.rsplit('.').next().unwrap_or(inner).trim();
            return ArgExpr::String(last.to_string());
        }
        if let Some(number) = parse_number(s) {
            return number;
        }
        if s.starts_with("new") {
            if let Some(open) = s.find('{') {
                if let Some(close) = matching_close(s, open) {
                    let body = s[open + 1..close].trim();
                    if body.is_empty() {
                        return ArgExpr::Array(Vec::new());
                    }
                    return ArgExpr::Array(split_top_level(body, ',').into_iter().map(ArgExpr::parse).collect());
                }
            }
        }
        if is_member_access(s) {
            let s = s.strip_prefix("global::").unwrap_or(s);
            if let Some((type_name, member)) = s.rsplit_once('.') {
                return ArgExpr::Member {
                    type_name: type_name.to_string(),
                    member: member.to_string(),
                };
            }
        }
        ArgExpr::Unsupported(s.to_string())
    }
}

/// Inner text of `name(...)` when `s` is exactly that call
fn call_argument<'a>(s: &'a str, name: &str) -> Option<&'a str> {
    let rest = s.strip_prefix(name)?.trim_start();
    if !rest.starts_with('(') || !rest.ends_with(')') {
        return None;
    }
    let offset = s.len() - rest.len();
    let close = matching_close(s, offset)?;
    (close == s.len() - 1).then(|| &s[offset + 1..close])
}

fn is_member_access(s: &str) -> bool {
    let s = s.strip_prefix("global::").unwrap_or(s);
    s.contains('.')
        && s.split('.').all(|part| {
            !part.is_empty()
                && !part.starts_with(|c: char| c.is_ascii_digit())
                && part.chars().all(|c| c.is_alphanumeric() || c == '_')
        })
}

fn parse_string(s: &str) -> Option<String> {
    if let Some(body) = s.strip_prefix("@\"").and_then(|r| r.strip_suffix('"')) {
        return Some(body.replace("\"\"", "\""));
    }
    let body = s.strip_prefix('"')?.strip_suffix('"')?;
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    Some(out)
}

fn parse_number(s: &str) -> Option<ArgExpr> {
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, s),
    };
    if !digits.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let digits = digits.replace('_', "");

    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        let hex = hex.trim_end_matches(['u', 'U', 'l', 'L']);
        let value = i64::from_str_radix(hex, 16).ok()?;
        return Some(ArgExpr::Int(if negative { -value } else { value }));
    }

    let is_float = digits.contains('.')
        || digits.contains(['e', 'E'])
        || digits.ends_with(['f', 'F', 'd', 'D', 'm', 'M']);
    let trimmed = digits.trim_end_matches(['u', 'U', 'l', 'L', 'f', 'F', 'd', 'D', 'm', 'M']);
    if is_float {
        let value: f64 = trimmed.parse().ok()?;
        Some(ArgExpr::Float(if negative { -value } else { value }))
    } else {
        let value: i64 = trimmed.parse().ok()?;
        Some(ArgExpr::Int(if negative { -value } else { value }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literals() {
        assert_eq!(ArgExpr::parse("null"), ArgExpr::Null);
        assert_eq!(ArgExpr::parse(" true "), ArgExpr::Bool(true));
        assert_eq!(ArgExpr::parse("75"), ArgExpr::Int(75));
        assert_eq!(ArgExpr::parse("-1"), ArgExpr::Int(-1));
        assert_eq!(ArgExpr::parse("0x10"), ArgExpr::Int(16));
        assert_eq!(ArgExpr::parse("2.5"), ArgExpr::Float(2.5));
        assert_eq!(ArgExpr::parse("100d"), ArgExpr::Float(100.0));
    }

    #[test]
    fn test_strings() {
        assert_eq!(ArgExpr::parse(r#""Admin, User""#), ArgExpr::String("Admin, User".into()));
        assert_eq!(ArgExpr::parse(r#""a\"b""#), ArgExpr::String("a\"b".into()));
        assert_eq!(ArgExpr::parse(r#"@"^\d+$""#), ArgExpr::String(r"^\d+$".into()));
    }

    #[test]
    fn test_typeof_and_nameof() {
        assert_eq!(
            ArgExpr::parse("typeof(CaseRestriction)"),
            ArgExpr::TypeOf(TypeSyntax::parse("CaseRestriction").unwrap())
        );
        assert_eq!(ArgExpr::parse("nameof(Case.ReportedById)"), ArgExpr::String("ReportedById".into()));
    }

    #[test]
    fn test_member_access_and_arrays() {
        assert_eq!(
            ArgExpr::parse("SearchAttribute.SearchMethods.Contains"),
            ArgExpr::Member {
                type_name: "SearchAttribute.SearchMethods".into(),
                member: "Contains".into()
            }
        );
        assert_eq!(
            ArgExpr::parse(r#"new[] { "a", "b" }"#),
            ArgExpr::Array(vec![ArgExpr::String("a".into()), ArgExpr::String("b".into())])
        );
        assert!(matches!(ArgExpr::parse("A | B"), ArgExpr::Unsupported(_)));
    }
}
