//! # TypeViewModel
//!
//! A backend-neutral view of one type occurrence. Every classification the
//! generators and the runtime rely on is derived here from the primitive
//! [`TypeInfo`] capabilities, so the reflection and symbol backends answer
//! identically for the same logical type.
//!
//! ```text
//! ICollection<bool?>
//!   is_collection        true
//!   is_bool              false
//!   pure_type            bool?
//!     is_bool            true
//!     is_nullable        true
//! ```

use std::fmt;
use std::sync::Arc;

use coalesce_core::{PrimitiveKind, TypeKind};

use crate::attributes::{AttributeData, AttributeSliceExt};
use crate::class::ClassViewModel;
use crate::repository::ReflectionRepository;
use crate::type_info::{Backend, EnumMember, MethodInfo, PropertyInfo, TypeRef};
use crate::well_known::names;

// ============================================================================
// TypeKey
// ============================================================================

/// Identity of a discovered type: backend plus qualified name, with
/// nullable-value wrapping stripped
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeKey {
    pub backend: Backend,
    pub name: String,
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.backend)
    }
}

// ============================================================================
// Classification
// ============================================================================

/// The single broad category a pure type falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClassification {
    Primitive,
    Enum,
    Date,
    Class,
    Collection,
}

// ============================================================================
// TypeViewModel
// ============================================================================

/// One type occurrence, possibly constructed generic, nullable, array or
/// collection
#[derive(Clone)]
pub struct TypeViewModel {
    info: TypeRef,
}

impl TypeViewModel {
    pub fn new(info: TypeRef) -> Self {
        Self { info }
    }

    pub fn info(&self) -> &TypeRef {
        &self.info
    }

    pub fn backend(&self) -> Backend {
        self.info.backend()
    }

    pub fn name(&self) -> String {
        self.info.name()
    }

    pub fn namespace(&self) -> Option<String> {
        self.info.namespace()
    }

    pub fn qualified_name(&self) -> String {
        self.info.qualified_name()
    }

    pub fn kind(&self) -> TypeKind {
        self.info.kind()
    }

    /// Identity used by the repository
    pub fn identity(&self) -> TypeKey {
        TypeKey {
            backend: self.backend(),
            name: self.nullable_stripped().qualified_name(),
        }
    }

    pub fn is_user_defined(&self) -> bool {
        self.info.is_user_defined()
    }

    pub fn is_abstract(&self) -> bool {
        self.info.is_abstract()
    }

    pub fn attributes(&self) -> Vec<AttributeData> {
        self.info.attributes()
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.info.attributes().has_attribute(name)
    }

    pub fn enum_members(&self) -> Vec<EnumMember> {
        self.nullable_stripped().info.enum_members()
    }

    pub fn properties(&self) -> Vec<Arc<dyn PropertyInfo>> {
        self.info.properties()
    }

    pub fn methods(&self) -> Vec<Arc<dyn MethodInfo>> {
        self.info.methods()
    }

    // ====================================================================
    // Generics
    // ====================================================================

    pub fn generic_arguments(&self) -> Vec<TypeViewModel> {
        self.info
            .generic_arguments()
            .into_iter()
            .map(TypeViewModel::new)
            .collect()
    }

    pub fn first_generic_argument(&self) -> Option<TypeViewModel> {
        self.generic_arguments().into_iter().next()
    }

    pub fn generic_arguments_for(&self, definition: &str) -> Option<Vec<TypeViewModel>> {
        self.info
            .generic_arguments_for(definition)
            .map(|args| args.into_iter().map(TypeViewModel::new).collect())
    }

    /// Whether the type is, derives from, or implements `definition`
    pub fn is_a(&self, definition: &str) -> bool {
        self.info.is_a(definition)
    }

    /// Whether this type is a construction of the generic `definition`
    pub fn is_generic_of(&self, definition: &str) -> bool {
        self.qualified_name() == definition && !self.info.generic_arguments().is_empty()
    }

    // ====================================================================
    // Nullability
    // ====================================================================

    pub fn is_nullable_value_type(&self) -> bool {
        self.qualified_name() == names::NULLABLE && self.info.generic_arguments().len() == 1
    }

    pub fn nullable_value_underlying_type(&self) -> Option<TypeViewModel> {
        if self.is_nullable_value_type() {
            self.first_generic_argument()
        } else {
            None
        }
    }

    /// The underlying type of a nullable value type, otherwise the type itself
    pub fn nullable_stripped(&self) -> TypeViewModel {
        self.nullable_value_underlying_type()
            .unwrap_or_else(|| self.clone())
    }

    pub fn is_value_type(&self) -> bool {
        self.kind().is_value_type()
    }

    /// True for reference types and `Nullable<T>`; false for plain value
    /// types
    pub fn is_reference_or_nullable_value(&self) -> bool {
        if self.is_nullable_value_type() {
            return true;
        }
        match self.kind() {
            TypeKind::Struct | TypeKind::Enum | TypeKind::Void => false,
            _ => true,
        }
    }

    // ====================================================================
    // Arrays & collections
    // ====================================================================

    pub fn is_array(&self) -> bool {
        self.kind() == TypeKind::Array
    }

    pub fn array_type(&self) -> Option<TypeViewModel> {
        self.info.array_element().map(TypeViewModel::new)
    }

    pub fn is_byte_array(&self) -> bool {
        self.array_type()
            .map(|e| e.qualified_name() == names::BYTE)
            .unwrap_or(false)
    }

    /// Implements `IEnumerable<T>` and is neither a string nor a byte array
    pub fn is_collection(&self) -> bool {
        if self.is_string() || self.is_byte_array() {
            return false;
        }
        self.is_array() || self.collection_element_type().is_some()
    }

    /// Element type of an array or `IEnumerable<T>`
    pub fn collection_element_type(&self) -> Option<TypeViewModel> {
        if let Some(element) = self.array_type() {
            return Some(element);
        }
        self.generic_arguments_for(names::IENUMERABLE)
            .and_then(|args| args.into_iter().next())
    }

    /// The element type of a collection, otherwise the type itself
    pub fn pure_type(&self) -> TypeViewModel {
        if self.is_collection() {
            if let Some(element) = self.collection_element_type() {
                return element;
            }
        }
        self.clone()
    }

    // ====================================================================
    // Classification (looks through Nullable<T>)
    // ====================================================================

    pub fn primitive_kind(&self) -> Option<PrimitiveKind> {
        let stripped = self.nullable_stripped();
        if !stripped.info.generic_arguments().is_empty() {
            return None;
        }
        PrimitiveKind::from_full_name(&stripped.qualified_name())
    }

    fn is_primitive(&self, kind: PrimitiveKind) -> bool {
        self.primitive_kind() == Some(kind)
    }

    pub fn is_string(&self) -> bool {
        self.is_primitive(PrimitiveKind::String)
    }

    pub fn is_bool(&self) -> bool {
        self.is_primitive(PrimitiveKind::Boolean)
    }

    pub fn is_number(&self) -> bool {
        self.primitive_kind().map(|k| k.is_number()).unwrap_or(false)
    }

    pub fn is_date(&self) -> bool {
        self.primitive_kind().map(|k| k.is_date()).unwrap_or(false)
    }

    pub fn is_date_only(&self) -> bool {
        self.is_primitive(PrimitiveKind::DateOnly)
    }

    pub fn is_time_only(&self) -> bool {
        self.is_primitive(PrimitiveKind::TimeOnly)
    }

    pub fn is_guid(&self) -> bool {
        self.is_primitive(PrimitiveKind::Guid)
    }

    pub fn is_void(&self) -> bool {
        self.kind() == TypeKind::Void || self.is_primitive(PrimitiveKind::Void)
    }

    pub fn is_enum(&self) -> bool {
        self.nullable_stripped().kind() == TypeKind::Enum
    }

    /// Class or interface (strings included)
    pub fn is_class(&self) -> bool {
        matches!(self.kind(), TypeKind::Class | TypeKind::Interface)
    }

    /// A class that is not a primitive, collection or binary value
    pub fn is_poco(&self) -> bool {
        self.is_class()
            && self.primitive_kind().is_none()
            && !self.is_collection()
            && !self.is_byte_array()
    }

    pub fn is_task(&self) -> bool {
        let name = self.qualified_name();
        name == names::TASK || name == names::VALUE_TASK
    }

    /// The broad category of this type; call on a pure type
    pub fn classification(&self) -> TypeClassification {
        if self.is_collection() {
            TypeClassification::Collection
        } else if self.is_enum() {
            TypeClassification::Enum
        } else if self.is_date() || self.is_time_only() {
            TypeClassification::Date
        } else if self.primitive_kind().is_some() || self.is_byte_array() {
            TypeClassification::Primitive
        } else {
            TypeClassification::Class
        }
    }

    // ====================================================================
    // Names
    // ====================================================================

    /// Verbose C# rendering (`System.Collections.Generic.ICollection<bool?>`)
    pub fn full_name(&self) -> String {
        if let Some(underlying) = self.nullable_value_underlying_type() {
            return format!("{}?", underlying.full_name());
        }
        if let Some(element) = self.array_type() {
            return format!("{}[]", element.full_name());
        }
        if self.kind() == TypeKind::TypeParameter {
            return self.name();
        }
        let args = self.generic_arguments();
        if args.is_empty() {
            if let Some(keyword) = self.primitive_kind().and_then(|k| k.keyword()) {
                return keyword.to_string();
            }
            return self.qualified_name();
        }
        let args: Vec<String> = args.iter().map(|a| a.full_name()).collect();
        format!("{}<{}>", self.qualified_name(), args.join(", "))
    }

    /// C# rendering with every model type replaced by its generated DTO in
    /// `dto_namespace`, and model collections rendered as `ICollection<Dto>`
    pub fn dto_full_name(&self, dto_namespace: &str, repo: &ReflectionRepository) -> String {
        if let Some(underlying) = self.nullable_value_underlying_type() {
            return format!("{}?", underlying.dto_full_name(dto_namespace, repo));
        }
        if self.is_byte_array() {
            return "byte[]".to_string();
        }
        if let Some(class) = self.class_view_model(repo).filter(|c| c.has_dto()) {
            return format!("{}.{}", dto_namespace, class.dto_name());
        }
        if self.is_collection() {
            let pure = self.pure_type();
            if pure.class_view_model(repo).is_some_and(|c| c.has_dto()) {
                return format!(
                    "{}<{}>",
                    names::ICOLLECTION,
                    pure.dto_full_name(dto_namespace, repo)
                );
            }
        }
        if let Some(element) = self.array_type() {
            return format!("{}[]", element.dto_full_name(dto_namespace, repo));
        }
        let args = self.generic_arguments();
        if args.is_empty() {
            return self.full_name();
        }
        let args: Vec<String> = args
            .iter()
            .map(|a| a.dto_full_name(dto_namespace, repo))
            .collect();
        format!("{}<{}>", self.qualified_name(), args.join(", "))
    }

    /// TypeScript type used in generated client code
    pub fn ts_type_name(&self) -> String {
        if self.is_void() {
            return "void".to_string();
        }
        if self.is_byte_array() {
            return "string".to_string();
        }
        if self.is_collection() {
            return format!("{}[]", self.pure_type().ts_type_name());
        }
        if self.is_enum() {
            return self.nullable_stripped().name();
        }
        if let Some(kind) = self.primitive_kind() {
            return kind.ts_type().to_string();
        }
        if self.is_poco() {
            return self.name();
        }
        "unknown".to_string()
    }

    /// The discovered class for this type, if any
    pub fn class_view_model(&self, repo: &ReflectionRepository) -> Option<Arc<ClassViewModel>> {
        repo.get_class_view_model(self)
    }
}

impl PartialEq for TypeViewModel {
    fn eq(&self, other: &Self) -> bool {
        self.backend() == other.backend() && self.full_name() == other.full_name()
    }
}

impl fmt::Debug for TypeViewModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeViewModel({}, {})", self.full_name(), self.backend())
    }
}

impl fmt::Display for TypeViewModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, ModelFixture};
    use pretty_assertions::assert_eq;

    fn property_type(fixture: &ModelFixture, class: &str, property: &str) -> TypeViewModel {
        fixture.property_type(class, property)
    }

    // ── Nullability ──────────────────────────────────────────────────────

    #[test]
    fn test_nullable_int_is_reference_or_nullable() {
        for fixture in testing::both() {
            let t = property_type(&fixture, "ComplexModel", "NullableInt");
            assert!(t.is_nullable_value_type(), "{}", fixture.backend);
            assert!(t.is_reference_or_nullable_value(), "{}", fixture.backend);
            let underlying = t.nullable_value_underlying_type().unwrap();
            assert_eq!(underlying.full_name(), "int");
            assert!(t.is_number());
        }
    }

    #[test]
    fn test_plain_value_types_are_not_nullable() {
        for fixture in testing::both() {
            let t = property_type(&fixture, "ComplexModel", "Bool");
            assert!(!t.is_reference_or_nullable_value(), "{}", fixture.backend);
            assert!(t.is_bool());
            let s = property_type(&fixture, "ComplexModel", "String");
            assert!(s.is_reference_or_nullable_value(), "{}", fixture.backend);
        }
    }

    // ── Collections ──────────────────────────────────────────────────────

    #[test]
    fn test_collection_of_nullable_bool() {
        for fixture in testing::both() {
            let t = property_type(&fixture, "ComplexModel", "NullableBoolCollection");
            assert!(t.is_collection(), "{}", fixture.backend);
            assert!(!t.is_bool());
            assert!(!t.is_nullable_value_type());

            let pure = t.pure_type();
            assert!(pure.is_bool(), "{}", fixture.backend);
            assert!(pure.is_nullable_value_type());
            assert!(pure.is_reference_or_nullable_value());
            assert_eq!(
                t.full_name(),
                "System.Collections.Generic.ICollection<bool?>"
            );
        }
    }

    #[test]
    fn test_bool_array_exposes_array_type() {
        for fixture in testing::both() {
            let t = property_type(&fixture, "ComplexModel", "BoolArray");
            assert!(t.is_array(), "{}", fixture.backend);
            assert!(t.is_collection());
            assert!(!t.is_bool());
            assert!(t.array_type().unwrap().is_bool());
            assert_eq!(t.full_name(), "bool[]");
        }
    }

    #[test]
    fn test_byte_array_is_not_a_collection() {
        for fixture in testing::both() {
            let t = property_type(&fixture, "ComplexModel", "Bytes");
            assert!(t.is_byte_array(), "{}", fixture.backend);
            assert!(!t.is_collection());
            assert_eq!(t.classification(), TypeClassification::Primitive);
            assert_eq!(t.ts_type_name(), "string");
        }
    }

    #[test]
    fn test_string_is_not_a_collection() {
        for fixture in testing::both() {
            let t = property_type(&fixture, "ComplexModel", "String");
            assert!(t.is_string());
            assert!(!t.is_collection(), "{}", fixture.backend);
            assert!(t.is_class());
            assert!(!t.is_poco());
        }
    }

    // ── Classification ───────────────────────────────────────────────────

    #[test]
    fn test_date_and_time_classification() {
        for fixture in testing::both() {
            let date_only = property_type(&fixture, "ComplexModel", "DateOnly");
            assert!(date_only.is_date_only() && date_only.is_date());
            let time_only = property_type(&fixture, "ComplexModel", "TimeOnly");
            assert!(time_only.is_time_only() && !time_only.is_date());
            assert_eq!(time_only.classification(), TypeClassification::Date);
            let dto = property_type(&fixture, "ComplexModel", "DateTimeOffsetNullable");
            assert!(dto.is_date(), "{}", fixture.backend);
            assert!(dto.is_nullable_value_type());
        }
    }

    #[test]
    fn test_exactly_one_classification_for_pure_types() {
        for fixture in testing::both() {
            let class = fixture.repo.require_class("ComplexModel").unwrap();
            for prop in &class.properties {
                let pure = prop.type_vm.pure_type();
                let flags = [
                    pure.primitive_kind().is_some() && !pure.is_date() && !pure.is_time_only()
                        || pure.is_byte_array(),
                    pure.is_enum(),
                    pure.is_date() || pure.is_time_only(),
                    pure.is_poco() && !pure.is_enum(),
                    pure.is_collection(),
                ];
                assert_eq!(
                    flags.iter().filter(|f| **f).count(),
                    1,
                    "{} {} ({})",
                    prop.name,
                    pure.full_name(),
                    fixture.backend
                );
            }
        }
    }

    #[test]
    fn test_enum_and_guid() {
        for fixture in testing::both() {
            let e = property_type(&fixture, "ComplexModel", "EnumValue");
            assert!(e.is_enum(), "{}", fixture.backend);
            assert_eq!(e.ts_type_name(), "Statuses");
            assert_eq!(e.enum_members().len(), 5);
            let g = property_type(&fixture, "ComplexModel", "Guid");
            assert!(g.is_guid());
            assert_eq!(g.full_name(), "System.Guid");
        }
    }

    // ── Names ────────────────────────────────────────────────────────────

    #[test]
    fn test_ts_type_names() {
        for fixture in testing::both() {
            assert_eq!(
                property_type(&fixture, "ComplexModel", "StringList").ts_type_name(),
                "string[]"
            );
            assert_eq!(
                property_type(&fixture, "Person", "Company").ts_type_name(),
                "Company"
            );
            assert_eq!(
                property_type(&fixture, "Person", "CasesAssigned").ts_type_name(),
                "Case[]"
            );
        }
    }

    #[test]
    fn test_dto_full_name_renders_model_collections() {
        for fixture in testing::both() {
            let t = property_type(&fixture, "Person", "CasesAssigned");
            assert_eq!(
                t.dto_full_name("MyProject.Web.Models", &fixture.repo),
                "System.Collections.Generic.ICollection<MyProject.Web.Models.CaseDtoGen>"
            );
            let n = property_type(&fixture, "ComplexModel", "NullableInt");
            assert_eq!(n.dto_full_name("MyProject.Web.Models", &fixture.repo), "int?");
        }
    }

    #[test]
    fn test_dto_namespace_is_not_string_replaced() {
        for fixture in testing::namespace_collision() {
            let class = fixture.repo.require_class("MyProject.Test.Models.Test").unwrap();
            assert_eq!(
                class
                    .type_vm
                    .dto_full_name("MyTestProject.Web.Models", &fixture.repo),
                "MyTestProject.Web.Models.TestDtoGen",
                "{}",
                fixture.backend
            );
            let holder = fixture.repo.require_class("MyProject.Test.Models.Holder").unwrap();
            let prop = holder.property("Tests").unwrap();
            assert_eq!(
                prop.type_vm.dto_full_name("MyTestProject.Web.Models", &fixture.repo),
                "System.Collections.Generic.ICollection<MyTestProject.Web.Models.TestDtoGen>"
            );
        }
    }

    #[test]
    fn test_backends_agree_on_every_predicate() {
        let [reflection, symbol] = testing::both();
        for class in reflection.repo.classes() {
            let other = symbol.repo.require_class(&class.full_name).unwrap();
            for prop in &class.properties {
                let a = &prop.type_vm;
                let b = &other.property(&prop.name).unwrap().type_vm;
                let describe = |t: &TypeViewModel| {
                    (
                        t.full_name(),
                        t.is_bool(),
                        t.is_number(),
                        t.is_collection(),
                        t.is_array(),
                        t.is_reference_or_nullable_value(),
                        t.pure_type().full_name(),
                        t.pure_type().is_bool(),
                        t.is_enum(),
                        t.is_date(),
                        t.ts_type_name(),
                    )
                };
                assert_eq!(describe(a), describe(b), "{}.{}", class.name, prop.name);
            }
        }
    }
}
