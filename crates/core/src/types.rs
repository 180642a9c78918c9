//! Core types used throughout Coalesce
//!
//! This module contains the classification enums shared by the type model,
//! the generators and the runtime engine.

use serde::{Deserialize, Serialize};

// ============================================================================
// Type Kinds
// ============================================================================

/// Broad kind of a type, independent of the metadata backend it came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypeKind {
    Class,
    Struct,
    Interface,
    Enum,
    Array,
    TypeParameter,
    Void,
}

impl TypeKind {
    /// Value types are structs and enums (and `void`, which has no instances)
    pub fn is_value_type(&self) -> bool {
        matches!(self, TypeKind::Struct | TypeKind::Enum)
    }
}

// ============================================================================
// Primitive Types
// ============================================================================

/// The well-known framework types that the model treats as scalars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    String,
    Char,
    Boolean,
    Byte,
    SByte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    Decimal,
    Guid,
    DateTime,
    DateTimeOffset,
    DateOnly,
    TimeOnly,
    TimeSpan,
    Object,
    Void,
}

impl PrimitiveKind {
    /// All primitive kinds
    pub fn all() -> &'static [PrimitiveKind] {
        use PrimitiveKind::*;
        &[
            String, Char, Boolean, Byte, SByte, Int16, UInt16, Int32, UInt32, Int64, UInt64,
            Single, Double, Decimal, Guid, DateTime, DateTimeOffset, DateOnly, TimeOnly,
            TimeSpan, Object, Void,
        ]
    }

    /// Fully-qualified framework name (e.g. `System.Int32`)
    pub fn full_name(&self) -> &'static str {
        match self {
            PrimitiveKind::String => "System.String",
            PrimitiveKind::Char => "System.Char",
            PrimitiveKind::Boolean => "System.Boolean",
            PrimitiveKind::Byte => "System.Byte",
            PrimitiveKind::SByte => "System.SByte",
            PrimitiveKind::Int16 => "System.Int16",
            PrimitiveKind::UInt16 => "System.UInt16",
            PrimitiveKind::Int32 => "System.Int32",
            PrimitiveKind::UInt32 => "System.UInt32",
            PrimitiveKind::Int64 => "System.Int64",
            PrimitiveKind::UInt64 => "System.UInt64",
            PrimitiveKind::Single => "System.Single",
            PrimitiveKind::Double => "System.Double",
            PrimitiveKind::Decimal => "System.Decimal",
            PrimitiveKind::Guid => "System.Guid",
            PrimitiveKind::DateTime => "System.DateTime",
            PrimitiveKind::DateTimeOffset => "System.DateTimeOffset",
            PrimitiveKind::DateOnly => "System.DateOnly",
            PrimitiveKind::TimeOnly => "System.TimeOnly",
            PrimitiveKind::TimeSpan => "System.TimeSpan",
            PrimitiveKind::Object => "System.Object",
            PrimitiveKind::Void => "System.Void",
        }
    }

    /// The C# keyword alias, if the type has one
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            PrimitiveKind::String => Some("string"),
            PrimitiveKind::Char => Some("char"),
            PrimitiveKind::Boolean => Some("bool"),
            PrimitiveKind::Byte => Some("byte"),
            PrimitiveKind::SByte => Some("sbyte"),
            PrimitiveKind::Int16 => Some("short"),
            PrimitiveKind::UInt16 => Some("ushort"),
            PrimitiveKind::Int32 => Some("int"),
            PrimitiveKind::UInt32 => Some("uint"),
            PrimitiveKind::Int64 => Some("long"),
            PrimitiveKind::UInt64 => Some("ulong"),
            PrimitiveKind::Single => Some("float"),
            PrimitiveKind::Double => Some("double"),
            PrimitiveKind::Decimal => Some("decimal"),
            PrimitiveKind::Object => Some("object"),
            PrimitiveKind::Void => Some("void"),
            _ => None,
        }
    }

    /// Look up a primitive by its fully-qualified name
    pub fn from_full_name(name: &str) -> Option<PrimitiveKind> {
        Self::all().iter().copied().find(|k| k.full_name() == name)
    }

    /// Look up a primitive by C# keyword, simple name or full name
    pub fn parse(name: &str) -> Option<PrimitiveKind> {
        let name = name.strip_prefix("global::").unwrap_or(name);
        Self::all().iter().copied().find(|k| {
            k.keyword() == Some(name)
                || k.full_name() == name
                || k.full_name().strip_prefix("System.") == Some(name)
        })
    }

    /// Simple name without namespace (e.g. `Int32`)
    pub fn name(&self) -> &'static str {
        &self.full_name()["System.".len()..]
    }

    /// Whether the primitive is a value type
    pub fn is_value_type(&self) -> bool {
        !matches!(
            self,
            PrimitiveKind::String | PrimitiveKind::Object | PrimitiveKind::Void
        )
    }

    /// Whether the primitive is numeric
    pub fn is_number(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::Byte
                | PrimitiveKind::SByte
                | PrimitiveKind::Int16
                | PrimitiveKind::UInt16
                | PrimitiveKind::Int32
                | PrimitiveKind::UInt32
                | PrimitiveKind::Int64
                | PrimitiveKind::UInt64
                | PrimitiveKind::Single
                | PrimitiveKind::Double
                | PrimitiveKind::Decimal
        )
    }

    /// Whether the primitive is an integral number
    pub fn is_integral(&self) -> bool {
        self.is_number()
            && !matches!(
                self,
                PrimitiveKind::Single | PrimitiveKind::Double | PrimitiveKind::Decimal
            )
    }

    /// Whether the primitive represents a date, date-time or date-only value
    pub fn is_date(&self) -> bool {
        matches!(
            self,
            PrimitiveKind::DateTime | PrimitiveKind::DateTimeOffset | PrimitiveKind::DateOnly
        )
    }

    /// TypeScript type used for this primitive in generated clients
    pub fn ts_type(&self) -> &'static str {
        match self {
            PrimitiveKind::String | PrimitiveKind::Char | PrimitiveKind::Guid => "string",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::DateTime
            | PrimitiveKind::DateTimeOffset
            | PrimitiveKind::DateOnly
            | PrimitiveKind::TimeOnly => "Date",
            PrimitiveKind::TimeSpan => "string",
            PrimitiveKind::Object => "unknown",
            PrimitiveKind::Void => "void",
            _ => "number",
        }
    }

    /// Metadata `type` discriminator used in generated client metadata
    pub fn metadata_kind(&self) -> &'static str {
        match self {
            PrimitiveKind::String | PrimitiveKind::Char | PrimitiveKind::TimeSpan => "string",
            PrimitiveKind::Guid => "string",
            PrimitiveKind::Boolean => "boolean",
            PrimitiveKind::DateTime
            | PrimitiveKind::DateTimeOffset
            | PrimitiveKind::DateOnly
            | PrimitiveKind::TimeOnly => "date",
            PrimitiveKind::Object => "unknown",
            PrimitiveKind::Void => "void",
            _ => "number",
        }
    }
}

impl std::fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.keyword().unwrap_or(self.full_name()))
    }
}

// ============================================================================
// Security
// ============================================================================

/// Permission level carried by `[Read]`, `[Edit]`, `[Create]`, `[Delete]`
/// and `[Execute]` attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SecurityPermissionLevel {
    AllowAll,
    #[default]
    AllowAuthenticated,
    DenyAll,
}

impl SecurityPermissionLevel {
    /// Parse from an attribute argument (`SecurityPermissionLevels.AllowAll`
    /// or a bare member name)
    pub fn parse(value: &str) -> Option<Self> {
        let member = value.rsplit('.').next().unwrap_or(value);
        match member {
            "AllowAll" => Some(SecurityPermissionLevel::AllowAll),
            "AllowAuthenticated" | "AllowAuthorized" => {
                Some(SecurityPermissionLevel::AllowAuthenticated)
            }
            "DenyAll" => Some(SecurityPermissionLevel::DenyAll),
            _ => None,
        }
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            SecurityPermissionLevel::AllowAll => "Allow All",
            SecurityPermissionLevel::AllowAuthenticated => "Allow Authenticated",
            SecurityPermissionLevel::DenyAll => "Deny All",
        }
    }
}

impl std::fmt::Display for SecurityPermissionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

// ============================================================================
// Search & Sort
// ============================================================================

/// How a `[Search]` property matches a search term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SearchMethod {
    #[default]
    BeginsWith,
    Equals,
    EqualsNatural,
    Contains,
}

impl SearchMethod {
    /// Parse from an attribute argument (`SearchMethods.Contains`)
    pub fn parse(value: &str) -> Option<Self> {
        let member = value.rsplit('.').next().unwrap_or(value);
        match member {
            "BeginsWith" => Some(SearchMethod::BeginsWith),
            "Equals" => Some(SearchMethod::Equals),
            "EqualsNatural" => Some(SearchMethod::EqualsNatural),
            "Contains" => Some(SearchMethod::Contains),
            _ => None,
        }
    }
}

/// Direction of an ordering term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    /// Parse from an attribute argument (`DefaultOrderByAttribute.OrderByDirections.Descending`)
    pub fn parse(value: &str) -> Option<Self> {
        let member = value.rsplit('.').next().unwrap_or(value);
        match member {
            "Ascending" => Some(SortDirection::Ascending),
            "Descending" => Some(SortDirection::Descending),
            _ => None,
        }
    }

    pub fn is_descending(&self) -> bool {
        matches!(self, SortDirection::Descending)
    }
}

// ============================================================================
// Property Roles
// ============================================================================

/// The part a property plays in its class's relational shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum PropertyRole {
    #[default]
    Value,
    PrimaryKey,
    ForeignKey,
    ReferenceNavigation,
    CollectionNavigation,
}

impl PropertyRole {
    /// Whether the role is a navigation to another entity
    pub fn is_navigation(&self) -> bool {
        matches!(
            self,
            PropertyRole::ReferenceNavigation | PropertyRole::CollectionNavigation
        )
    }
}

impl std::fmt::Display for PropertyRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PropertyRole::Value => "value",
            PropertyRole::PrimaryKey => "primaryKey",
            PropertyRole::ForeignKey => "foreignKey",
            PropertyRole::ReferenceNavigation => "referenceNavigation",
            PropertyRole::CollectionNavigation => "collectionNavigation",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// HTTP Methods
// ============================================================================

/// HTTP method of a generated API action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Parse from an attribute argument (`HttpMethod.Get`)
    pub fn parse(value: &str) -> Option<Self> {
        let member = value.rsplit('.').next().unwrap_or(value);
        match member.to_ascii_lowercase().as_str() {
            "get" => Some(HttpMethod::Get),
            "post" => Some(HttpMethod::Post),
            "put" => Some(HttpMethod::Put),
            "patch" => Some(HttpMethod::Patch),
            "delete" => Some(HttpMethod::Delete),
            _ => None,
        }
    }

    /// The ASP.NET routing attribute name (`HttpPost`)
    pub fn attribute_name(&self) -> &'static str {
        match self {
            HttpMethod::Get => "HttpGet",
            HttpMethod::Post => "HttpPost",
            HttpMethod::Put => "HttpPut",
            HttpMethod::Patch => "HttpPatch",
            HttpMethod::Delete => "HttpDelete",
        }
    }

    /// Upper-case method name
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

// ============================================================================
// Validation Rules
// ============================================================================

/// Attribute-derived validation rules for properties and parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationRule {
    /// `[Required]`
    Required,
    /// `[MinLength]`
    MinLength(usize),
    /// `[MaxLength]` / `[StringLength]`
    MaxLength(usize),
    /// `[Range(min, max)]`
    Range { min: f64, max: f64 },
    /// `[RegularExpression(pattern)]`
    Pattern { regex: String, message: String },
    /// `[EmailAddress]`
    Email,
    /// `[Url]`
    Url,
}

impl ValidationRule {
    /// Get a user-friendly error message for a property display name
    pub fn error_message(&self, display_name: &str) -> String {
        match self {
            ValidationRule::Required => format!("{} is required.", display_name),
            ValidationRule::MinLength(n) => {
                format!("{} must be at least {} characters.", display_name, n)
            }
            ValidationRule::MaxLength(n) => {
                format!("{} may not be more than {} characters.", display_name, n)
            }
            ValidationRule::Range { min, max } => {
                format!("{} must be between {} and {}.", display_name, min, max)
            }
            ValidationRule::Pattern { message, .. } if !message.is_empty() => message.clone(),
            ValidationRule::Pattern { .. } => format!("{} is not valid.", display_name),
            ValidationRule::Email => format!("{} must be a valid email address.", display_name),
            ValidationRule::Url => format!("{} must be a valid URL.", display_name),
        }
    }
}

impl std::fmt::Display for ValidationRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationRule::Required => write!(f, "required"),
            ValidationRule::MinLength(n) => write!(f, "minLength({})", n),
            ValidationRule::MaxLength(n) => write!(f, "maxLength({})", n),
            ValidationRule::Range { min, max } => write!(f, "range({}, {})", min, max),
            ValidationRule::Pattern { regex, .. } => write!(f, "pattern({})", regex),
            ValidationRule::Email => write!(f, "email"),
            ValidationRule::Url => write!(f, "url"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_primitive_parse_keyword_and_names() {
        assert_eq!(PrimitiveKind::parse("int"), Some(PrimitiveKind::Int32));
        assert_eq!(PrimitiveKind::parse("Int32"), Some(PrimitiveKind::Int32));
        assert_eq!(PrimitiveKind::parse("System.Int32"), Some(PrimitiveKind::Int32));
        assert_eq!(
            PrimitiveKind::parse("global::System.Guid"),
            Some(PrimitiveKind::Guid)
        );
        assert_eq!(PrimitiveKind::parse("Person"), None);
    }

    #[test]
    fn test_primitive_classification() {
        assert!(PrimitiveKind::Decimal.is_number());
        assert!(!PrimitiveKind::Decimal.is_integral());
        assert!(PrimitiveKind::Int64.is_integral());
        assert!(PrimitiveKind::DateOnly.is_date());
        assert!(!PrimitiveKind::TimeOnly.is_date());
        assert!(!PrimitiveKind::String.is_value_type());
        assert!(PrimitiveKind::Boolean.is_value_type());
    }

    #[test]
    fn test_primitive_ts_type() {
        assert_eq!(PrimitiveKind::String.ts_type(), "string");
        assert_eq!(PrimitiveKind::Double.ts_type(), "number");
        assert_eq!(PrimitiveKind::Boolean.ts_type(), "boolean");
        assert_eq!(PrimitiveKind::DateTimeOffset.ts_type(), "Date");
        assert_eq!(PrimitiveKind::Guid.ts_type(), "string");
    }

    #[test]
    fn test_primitive_name() {
        assert_eq!(PrimitiveKind::DateTimeOffset.name(), "DateTimeOffset");
        assert_eq!(PrimitiveKind::Int32.to_string(), "int");
        assert_eq!(PrimitiveKind::Guid.to_string(), "System.Guid");
    }

    #[test]
    fn test_security_level_parse() {
        assert_eq!(
            SecurityPermissionLevel::parse("SecurityPermissionLevels.AllowAll"),
            Some(SecurityPermissionLevel::AllowAll)
        );
        assert_eq!(
            SecurityPermissionLevel::parse("AllowAuthorized"),
            Some(SecurityPermissionLevel::AllowAuthenticated)
        );
        assert_eq!(SecurityPermissionLevel::parse("Admin"), None);
        assert_eq!(
            SecurityPermissionLevel::default(),
            SecurityPermissionLevel::AllowAuthenticated
        );
    }

    #[test]
    fn test_search_and_sort_parse() {
        assert_eq!(
            SearchMethod::parse("SearchAttribute.SearchMethods.Contains"),
            Some(SearchMethod::Contains)
        );
        assert_eq!(SearchMethod::default(), SearchMethod::BeginsWith);
        assert_eq!(
            SortDirection::parse("DefaultOrderByAttribute.OrderByDirections.Descending"),
            Some(SortDirection::Descending)
        );
    }

    #[test]
    fn test_http_method() {
        assert_eq!(HttpMethod::parse("HttpMethod.Get"), Some(HttpMethod::Get));
        assert_eq!(HttpMethod::Post.attribute_name(), "HttpPost");
        assert_eq!(HttpMethod::default(), HttpMethod::Post);
    }

    #[test]
    fn test_property_role_display() {
        assert_eq!(PropertyRole::ForeignKey.to_string(), "foreignKey");
        assert!(PropertyRole::CollectionNavigation.is_navigation());
        assert!(!PropertyRole::PrimaryKey.is_navigation());
    }

    #[test]
    fn test_validation_rule_messages() {
        assert_eq!(
            ValidationRule::Required.error_message("Name"),
            "Name is required."
        );
        assert_eq!(
            ValidationRule::MaxLength(10).error_message("Name"),
            "Name may not be more than 10 characters."
        );
        let pattern = ValidationRule::Pattern {
            regex: "^a".into(),
            message: "Must start with a".into(),
        };
        assert_eq!(pattern.error_message("Name"), "Must start with a");
    }
}
