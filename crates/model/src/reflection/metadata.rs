//! Serializable description of compiled types
//!
//! An [`AssemblyMetadata`] document carries what a reflection dump of a
//! compiled assembly would: every declared type with its base type,
//! interfaces, attributes and public members. It round-trips through JSON and
//! can be built by hand with the `with_*` builders.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use coalesce_core::{CoalesceError, Persistable, PrimitiveKind, TypeKind};
use serde::{Deserialize, Serialize};

use crate::well_known::names;

// ============================================================================
// ClrType
// ============================================================================

/// A type reference inside metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ClrType {
    /// A named type, possibly a constructed generic
    Named {
        name: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        args: Vec<ClrType>,
    },
    Array { element: Box<ClrType> },
    /// A generic parameter of the declaring type (`T`)
    GenericParameter { name: String },
}

impl ClrType {
    pub fn named(name: impl Into<String>) -> Self {
        ClrType::Named {
            name: name.into(),
            args: Vec::new(),
        }
    }

    pub fn generic(name: impl Into<String>, args: Vec<ClrType>) -> Self {
        ClrType::Named {
            name: name.into(),
            args,
        }
    }

    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self::named(kind.full_name())
    }

    pub fn int() -> Self {
        Self::primitive(PrimitiveKind::Int32)
    }

    pub fn string() -> Self {
        Self::primitive(PrimitiveKind::String)
    }

    pub fn bool() -> Self {
        Self::primitive(PrimitiveKind::Boolean)
    }

    pub fn void() -> Self {
        Self::primitive(PrimitiveKind::Void)
    }

    pub fn nullable(inner: ClrType) -> Self {
        Self::generic(names::NULLABLE, vec![inner])
    }

    pub fn array(element: ClrType) -> Self {
        ClrType::Array {
            element: Box::new(element),
        }
    }

    pub fn collection(element: ClrType) -> Self {
        Self::generic(names::ICOLLECTION, vec![element])
    }

    pub fn list(element: ClrType) -> Self {
        Self::generic(names::LIST, vec![element])
    }

    pub fn task(result: ClrType) -> Self {
        Self::generic(names::TASK, vec![result])
    }

    pub fn item_result(inner: Option<ClrType>) -> Self {
        match inner {
            Some(inner) => Self::generic(names::ITEM_RESULT, vec![inner]),
            None => Self::named(names::ITEM_RESULT),
        }
    }

    pub fn list_result(inner: ClrType) -> Self {
        Self::generic(names::LIST_RESULT, vec![inner])
    }

    pub fn generic_parameter(name: impl Into<String>) -> Self {
        ClrType::GenericParameter { name: name.into() }
    }

    /// Replace generic parameters with the given arguments
    pub fn substitute(&self, params: &[String], args: &[ClrType]) -> ClrType {
        match self {
            ClrType::GenericParameter { name } => params
                .iter()
                .position(|p| p == name)
                .and_then(|i| args.get(i).cloned())
                .unwrap_or_else(|| self.clone()),
            ClrType::Named { name, args: inner } => ClrType::Named {
                name: name.clone(),
                args: inner.iter().map(|a| a.substitute(params, args)).collect(),
            },
            ClrType::Array { element } => ClrType::Array {
                element: Box::new(element.substitute(params, args)),
            },
        }
    }
}

impl fmt::Display for ClrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClrType::Named { name, args } if args.is_empty() => write!(f, "{}", name),
            ClrType::Named { name, args } => {
                write!(f, "{}<", name)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ">")
            }
            ClrType::Array { element } => write!(f, "{}[]", element),
            ClrType::GenericParameter { name } => write!(f, "{}", name),
        }
    }
}

/// Parses `System.Collections.Generic.ICollection<bool?>`-style names.
/// C# keywords map to their framework types and `T?` to `System.Nullable<T>`.
impl FromStr for ClrType {
    type Err = CoalesceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = ClrTypeParser { src: s, pos: 0 };
        let ty = parser.parse_type()?;
        parser.skip_ws();
        if parser.pos != s.len() {
            return Err(CoalesceError::parse(s, "unexpected trailing characters"));
        }
        Ok(ty)
    }
}

struct ClrTypeParser<'a> {
    src: &'a str,
    pos: usize,
}

impl ClrTypeParser<'_> {
    fn skip_ws(&mut self) {
        while self.src[self.pos..].starts_with(' ') {
            self.pos += 1;
        }
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

    fn parse_type(&mut self) -> Result<ClrType, CoalesceError> {
        self.skip_ws();
        let start = self.pos;
        let rest = &self.src[self.pos..];
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(CoalesceError::parse(self.src, "expected a type name"));
        }
        self.pos += len;
        let raw = &self.src[start..self.pos];
        let name = match PrimitiveKind::all().iter().find(|k| k.keyword() == Some(raw)) {
            Some(kind) => kind.full_name().to_string(),
            None => raw.to_string(),
        };

        let mut args = Vec::new();
        if self.eat("<") {
            loop {
                args.push(self.parse_type()?);
                if self.eat(",") {
                    continue;
                }
                if self.eat(">") {
                    break;
                }
                return Err(CoalesceError::parse(self.src, "unterminated generic argument list"));
            }
        }

        let mut ty = ClrType::Named { name, args };
        loop {
            if self.eat("?") {
                let is_reference = matches!(
                    &ty,
                    ClrType::Named { name, .. }
                        if PrimitiveKind::from_full_name(name).is_some_and(|k| !k.is_value_type())
                );
                if !is_reference {
                    ty = ClrType::nullable(ty);
                }
            } else if self.eat("[]") {
                ty = ClrType::array(ty);
            } else {
                break;
            }
        }
        Ok(ty)
    }
}

// ============================================================================
// Attributes
// ============================================================================

/// A constant attribute argument inside metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
pub enum AttributeArg {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    #[serde(rename_all = "camelCase")]
    Enum { type_name: String, member: String },
    Type(ClrType),
    Array(Vec<AttributeArg>),
}

impl AttributeArg {
    /// `SearchMethods.Contains`-style enum constant
    pub fn enum_member(type_name: &str, member: &str) -> Self {
        AttributeArg::Enum {
            type_name: type_name.to_string(),
            member: member.to_string(),
        }
    }

    /// `typeof(X)` with a type name parsed like [`ClrType::from_str`]
    pub fn type_of(name: &str) -> Self {
        AttributeArg::Type(name.parse().unwrap_or_else(|_| ClrType::named(name)))
    }
}

impl From<&str> for AttributeArg {
    fn from(value: &str) -> Self {
        AttributeArg::String(value.to_string())
    }
}

impl From<String> for AttributeArg {
    fn from(value: String) -> Self {
        AttributeArg::String(value)
    }
}

impl From<bool> for AttributeArg {
    fn from(value: bool) -> Self {
        AttributeArg::Bool(value)
    }
}

impl From<i64> for AttributeArg {
    fn from(value: i64) -> Self {
        AttributeArg::Int(value)
    }
}

impl From<i32> for AttributeArg {
    fn from(value: i32) -> Self {
        AttributeArg::Int(value as i64)
    }
}

impl From<f64> for AttributeArg {
    fn from(value: f64) -> Self {
        AttributeArg::Float(value)
    }
}

impl From<ClrType> for AttributeArg {
    fn from(value: ClrType) -> Self {
        AttributeArg::Type(value)
    }
}

/// One attribute application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<AttributeArg>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub named: BTreeMap<String, AttributeArg>,
}

impl AttributeMetadata {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            args: Vec::new(),
            named: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, value: impl Into<AttributeArg>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn named(mut self, key: &str, value: impl Into<AttributeArg>) -> Self {
        self.named.insert(key.to_string(), value.into());
        self
    }
}

// ============================================================================
// Members
// ============================================================================

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ClrType,
    #[serde(default = "yes")]
    pub has_getter: bool,
    #[serde(default = "yes")]
    pub has_setter: bool,
    #[serde(default)]
    pub is_init_only: bool,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeMetadata>,
}

impl PropertyMetadata {
    pub fn new(name: &str, ty: ClrType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            has_getter: true,
            has_setter: true,
            is_init_only: false,
            is_static: false,
            attributes: Vec::new(),
        }
    }

    /// No public setter
    pub fn read_only(mut self) -> Self {
        self.has_setter = false;
        self
    }

    /// Public `init` accessor
    pub fn init_only(mut self) -> Self {
        self.is_init_only = true;
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeMetadata) -> Self {
        self.attributes.push(attribute);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ClrType,
    #[serde(default)]
    pub is_out: bool,
    #[serde(default)]
    pub is_ref: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<AttributeArg>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeMetadata>,
}

impl ParameterMetadata {
    pub fn new(name: &str, ty: ClrType) -> Self {
        Self {
            name: name.to_string(),
            ty,
            is_out: false,
            is_ref: false,
            default_value: None,
            attributes: Vec::new(),
        }
    }

    pub fn out(mut self) -> Self {
        self.is_out = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<AttributeArg>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeMetadata) -> Self {
        self.attributes.push(attribute);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodMetadata {
    pub name: String,
    pub return_type: ClrType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterMetadata>,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeMetadata>,
}

impl MethodMetadata {
    pub fn new(name: &str, return_type: ClrType) -> Self {
        Self {
            name: name.to_string(),
            return_type,
            parameters: Vec::new(),
            is_static: false,
            attributes: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: ParameterMetadata) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeMetadata) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn into_static(mut self) -> Self {
        self.is_static = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumMemberMetadata {
    pub name: String,
    pub value: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeMetadata>,
}

// ============================================================================
// Types
// ============================================================================

/// One declared type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeMetadata {
    #[serde(default)]
    pub namespace: String,
    pub name: String,
    pub kind: TypeKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generic_parameters: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_type: Option<ClrType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interfaces: Vec<ClrType>,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeMetadata>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub properties: Vec<PropertyMetadata>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<MethodMetadata>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enum_members: Vec<EnumMemberMetadata>,
}

impl TypeMetadata {
    fn new(namespace: &str, name: &str, kind: TypeKind) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            kind,
            generic_parameters: Vec::new(),
            base_type: None,
            interfaces: Vec::new(),
            is_abstract: false,
            attributes: Vec::new(),
            properties: Vec::new(),
            methods: Vec::new(),
            enum_members: Vec::new(),
        }
    }

    pub fn class(namespace: &str, name: &str) -> Self {
        Self::new(namespace, name, TypeKind::Class)
    }

    pub fn interface(namespace: &str, name: &str) -> Self {
        Self::new(namespace, name, TypeKind::Interface)
    }

    pub fn enumeration(namespace: &str, name: &str) -> Self {
        Self::new(namespace, name, TypeKind::Enum)
    }

    pub fn structure(namespace: &str, name: &str) -> Self {
        Self::new(namespace, name, TypeKind::Struct)
    }

    /// `Namespace.Name`
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// A reference to this type, constructed with no generic arguments
    pub fn as_type(&self) -> ClrType {
        ClrType::named(self.full_name())
    }

    pub fn with_generic_parameter(mut self, name: &str) -> Self {
        self.generic_parameters.push(name.to_string());
        self
    }

    pub fn with_base(mut self, base: ClrType) -> Self {
        self.base_type = Some(base);
        self
    }

    pub fn with_interface(mut self, interface: ClrType) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeMetadata) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_property(mut self, property: PropertyMetadata) -> Self {
        self.properties.push(property);
        self
    }

    pub fn with_method(mut self, method: MethodMetadata) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_enum_member(mut self, name: &str, value: i64) -> Self {
        self.enum_members.push(EnumMemberMetadata {
            name: name.to_string(),
            value,
            attributes: Vec::new(),
        });
        self
    }

    pub fn into_abstract(mut self) -> Self {
        self.is_abstract = true;
        self
    }
}

// ============================================================================
// AssemblyMetadata
// ============================================================================

/// All types declared by one compiled assembly
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyMetadata {
    pub name: String,
    #[serde(default)]
    pub types: Vec<TypeMetadata>,
}

impl AssemblyMetadata {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            types: Vec::new(),
        }
    }

    pub fn with_type(mut self, ty: TypeMetadata) -> Self {
        self.types.push(ty);
        self
    }

    pub fn find(&self, full_name: &str) -> Option<&TypeMetadata> {
        self.types.iter().find(|t| t.full_name() == full_name)
    }
}

impl Persistable for AssemblyMetadata {}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_keywords_and_nullable() {
        let ty: ClrType = "System.Collections.Generic.ICollection<bool?>".parse().unwrap();
        assert_eq!(
            ty,
            ClrType::collection(ClrType::nullable(ClrType::bool()))
        );
        let arr: ClrType = "byte[]".parse().unwrap();
        assert_eq!(arr, ClrType::array(ClrType::named("System.Byte")));
        assert!("List<int".parse::<ClrType>().is_err());
    }

    #[test]
    fn test_substitute_generic_parameters() {
        let base = ClrType::generic(
            names::STANDARD_DATA_SOURCE,
            vec![ClrType::generic_parameter("T"), ClrType::named("Ctx")],
        );
        let bound = base.substitute(&["T".to_string()], &[ClrType::named("Person")]);
        assert_eq!(bound.to_string(), format!("{}<Person, Ctx>", names::STANDARD_DATA_SOURCE));
    }

    #[test]
    fn test_json_shape() {
        let assembly = AssemblyMetadata::new("MyProject").with_type(
            TypeMetadata::class("MyProject.Models", "Person")
                .with_property(
                    PropertyMetadata::new("PersonId", ClrType::int())
                        .with_attribute(AttributeMetadata::new("Key")),
                )
                .with_attribute(
                    AttributeMetadata::new("Read")
                        .arg(AttributeArg::enum_member("SecurityPermissionLevels", "AllowAll")),
                ),
        );
        let json = assembly.to_json().unwrap();
        assert!(json.contains("\"kind\": \"named\""));
        assert!(json.contains("\"typeName\": \"SecurityPermissionLevels\""));

        let back = AssemblyMetadata::from_json(&json).unwrap();
        assert_eq!(back, assembly);
        assert!(back.find("MyProject.Models.Person").is_some());
    }

    #[test]
    fn test_property_defaults_when_deserialized() {
        let json = r#"{"name":"X","type":{"kind":"named","name":"System.Int32"}}"#;
        let prop: PropertyMetadata = serde_json::from_str(json).unwrap();
        assert!(prop.has_getter && prop.has_setter);
        assert!(!prop.is_init_only);
    }
}
