//! Backend-neutral type information
//!
//! [`TypeInfo`], [`PropertyInfo`] and [`MethodInfo`] are the primitive
//! capability set every metadata backend provides. Everything else the type
//! model knows (collections, nullability, roles, security) is derived from
//! these primitives by the view-model wrappers, so both backends answer the
//! same questions the same way.

use std::fmt;
use std::sync::Arc;

use coalesce_core::TypeKind;

use crate::attributes::{AttributeData, AttributeValue};

// ============================================================================
// Backend
// ============================================================================

/// The source of truth a type was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Backend {
    /// Resolved metadata of compiled types (`AssemblyMetadata`)
    Reflection,
    /// C# source parsed and bound into a `Compilation`
    Symbol,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Reflection => write!(f, "reflection"),
            Backend::Symbol => write!(f, "symbol"),
        }
    }
}

// ============================================================================
// Capability traits
// ============================================================================

/// Shared handle to one type occurrence
pub type TypeRef = Arc<dyn TypeInfo>;

/// One type occurrence: a named (possibly constructed generic) type, an
/// array, or a generic type parameter.
pub trait TypeInfo: Send + Sync {
    /// Which backend produced this type
    fn backend(&self) -> Backend;

    /// Simple name, without namespace or generic arguments (`ICollection`)
    fn name(&self) -> String;

    /// Containing namespace, if any
    fn namespace(&self) -> Option<String>;

    /// Namespace-qualified definition name without generic arguments
    /// (`System.Collections.Generic.ICollection`, `System.Boolean[]`)
    fn qualified_name(&self) -> String;

    /// Broad kind of the type
    fn kind(&self) -> TypeKind;

    /// Element type when this is an array
    fn array_element(&self) -> Option<TypeRef>;

    /// Generic arguments of a constructed generic type
    fn generic_arguments(&self) -> Vec<TypeRef>;

    /// Generic arguments of `definition` when this type is, derives from, or
    /// implements it. Non-generic definitions yield an empty list.
    fn generic_arguments_for(&self, definition: &str) -> Option<Vec<TypeRef>>;

    /// Whether the type is, derives from, or implements `definition`
    fn is_a(&self, definition: &str) -> bool {
        self.generic_arguments_for(definition).is_some()
    }

    /// Whether the type is declared in the assembly or compilation being
    /// modeled (as opposed to a framework type)
    fn is_user_defined(&self) -> bool;

    /// Whether the type is declared `abstract`
    fn is_abstract(&self) -> bool;

    /// Attributes on the type declaration
    fn attributes(&self) -> Vec<AttributeData>;

    /// Members of an enum type
    fn enum_members(&self) -> Vec<EnumMember>;

    /// Public properties
    fn properties(&self) -> Vec<Arc<dyn PropertyInfo>>;

    /// Public methods
    fn methods(&self) -> Vec<Arc<dyn MethodInfo>>;
}

/// One public property of a type
pub trait PropertyInfo: Send + Sync {
    fn name(&self) -> String;
    fn property_type(&self) -> TypeRef;
    /// Whether the property has a public getter
    fn has_getter(&self) -> bool;
    /// Whether the property has a public `set` or `init` accessor
    fn has_setter(&self) -> bool;
    /// Whether the setter is an `init` accessor
    fn is_init_only(&self) -> bool;
    fn is_static(&self) -> bool;
    fn attributes(&self) -> Vec<AttributeData>;
}

/// One public method of a type
pub trait MethodInfo: Send + Sync {
    fn name(&self) -> String;
    fn return_type(&self) -> TypeRef;
    fn parameters(&self) -> Vec<ParameterInfo>;
    fn is_static(&self) -> bool;
    fn attributes(&self) -> Vec<AttributeData>;
}

// ============================================================================
// Plain member data
// ============================================================================

/// A method parameter as reported by a backend
#[derive(Clone)]
pub struct ParameterInfo {
    pub name: String,
    pub parameter_type: TypeRef,
    pub is_out: bool,
    pub is_ref: bool,
    /// Default value when the parameter is optional
    pub default_value: Option<AttributeValue>,
    pub attributes: Vec<AttributeData>,
}

impl ParameterInfo {
    pub fn has_default(&self) -> bool {
        self.default_value.is_some()
    }
}

impl fmt::Debug for ParameterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterInfo")
            .field("name", &self.name)
            .field("type", &self.parameter_type.qualified_name())
            .field("is_out", &self.is_out)
            .finish()
    }
}

/// A member of an enum type
#[derive(Debug, Clone)]
pub struct EnumMember {
    pub name: String,
    pub value: i64,
    pub attributes: Vec<AttributeData>,
}
