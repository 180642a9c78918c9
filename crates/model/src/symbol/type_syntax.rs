//! Type references as written in source

use std::fmt;

/// An unbound type reference (`ICollection<bool?>`, `global::System.Guid`,
/// `byte[]`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSyntax {
    /// Simple or dotted name with optional generic arguments
    Named { name: String, args: Vec<TypeSyntax> },
    Nullable(Box<TypeSyntax>),
    Array(Box<TypeSyntax>),
}

impl TypeSyntax {
    /// Parse a type reference; returns `None` for anything that is not a
    /// plain, generic, nullable or array type (tuples, pointers, function
    /// pointers)
    pub fn parse(text: &str) -> Option<TypeSyntax> {
        let mut p = Parser {
            src: text.trim(),
            pos: 0,
        };
        let ty = p.parse()?;
        p.skip_ws();
        (p.pos == p.src.len()).then_some(ty)
    }

    /// Every simple name referenced, outermost first
    pub fn names(&self) -> Vec<&str> {
        match self {
            TypeSyntax::Named { name, args } => {
                let mut out = vec![name.as_str()];
                out.extend(args.iter().flat_map(|a| a.names()));
                out
            }
            TypeSyntax::Nullable(inner) | TypeSyntax::Array(inner) => inner.names(),
        }
    }
}

impl fmt::Display for TypeSyntax {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSyntax::Named { name, args } if args.is_empty() => write!(f, "{}", name),
            TypeSyntax::Named { name, args } => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}<{}>", name, args.join(", "))
            }
            TypeSyntax::Nullable(inner) => write!(f, "{}?", inner),
            TypeSyntax::Array(inner) => write!(f, "{}[]", inner),
        }
    }
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn skip_ws(&mut self) {
        let rest = &self.src[self.pos..];
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.src[self.pos..].starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn identifier(&mut self) -> Option<&str> {
        self.skip_ws();
        let rest = &self.src[self.pos..];
        let rest = rest.strip_prefix('@').unwrap_or(rest);
        let offset = self.src.len() - self.pos - rest.len();
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if len == 0 || rest.starts_with(|c: char| c.is_ascii_digit()) {
            return None;
        }
        let start = self.pos + offset;
        self.pos = start + len;
        Some(&self.src[start..start + len])
    }

    fn parse(&mut self) -> Option<TypeSyntax> {
        self.eat("global::");
        let mut name = self.identifier()?.to_string();
        while self.eat(".") {
            name.push('.');
            name.push_str(self.identifier()?);
        }

        let mut args = Vec::new();
        if self.eat("<") {
            loop {
                args.push(self.parse()?);
                if self.eat(",") {
                    continue;
                }
                if self.eat(">") {
                    break;
                }
                return None;
            }
        }

        let mut ty = TypeSyntax::Named { name, args };
        loop {
            if self.eat("?") {
                ty = TypeSyntax::Nullable(Box::new(ty));
            } else if self.eat("[") {
                if !self.eat("]") {
                    return None;
                }
                ty = TypeSyntax::Array(Box::new(ty));
            } else {
                return Some(ty);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str, args: Vec<TypeSyntax>) -> TypeSyntax {
        TypeSyntax::Named {
            name: name.to_string(),
            args,
        }
    }

    #[test]
    fn test_parse_generic_nullable() {
        assert_eq!(
            TypeSyntax::parse("ICollection<bool?>"),
            Some(named(
                "ICollection",
                vec![TypeSyntax::Nullable(Box::new(named("bool", vec![])))]
            ))
        );
    }

    #[test]
    fn test_parse_global_qualified_array() {
        let ty = TypeSyntax::parse("global::System.Byte[]").unwrap();
        assert_eq!(ty.to_string(), "System.Byte[]");
    }

    #[test]
    fn test_parse_nested_generics() {
        let ty = TypeSyntax::parse("Task<ItemResult<ICollection<Person>>>").unwrap();
        assert_eq!(ty.names(), vec!["Task", "ItemResult", "ICollection", "Person"]);
    }

    #[test]
    fn test_rejects_tuples_and_garbage() {
        assert_eq!(TypeSyntax::parse("(int, string)"), None);
        assert_eq!(TypeSyntax::parse("List<int"), None);
        assert_eq!(TypeSyntax::parse("int x"), None);
    }
}
