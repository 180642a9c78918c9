//! # Coalesce Model
//!
//! The type model every generator and the runtime engine read from.
//!
//! Types can come from two backends that answer the same questions:
//!
//! - **Reflection**: an [`AssemblyMetadata`] document describing compiled types
//! - **Symbol**: C# source parsed with tree-sitter and bound into a [`Compilation`]
//!
//! On top of either backend sit the view models ([`TypeViewModel`],
//! [`ClassViewModel`], [`PropertyViewModel`], [`MethodViewModel`]) and the
//! [`ReflectionRepository`], which discovers the entities, services, data
//! sources, behaviors and external types of a model.
//!

// ============================================================================
// Modules
// ============================================================================

pub mod attributes;
pub mod class;
pub mod method;
pub mod property;
pub mod reflection;
pub mod repository;
pub mod security;
pub mod symbol;
pub mod type_info;
pub mod type_view_model;
pub mod validation;
pub mod well_known;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use attributes::{AttributeData, AttributeSliceExt, AttributeValue};
pub use class::{ClassKind, ClassViewModel, IndexInfo, OrderByTerm};
pub use method::{MethodViewModel, ParameterInjection, ParameterViewModel};
pub use property::{ManyToManyInfo, PropertyViewModel, SearchInfo};
pub use reflection::{AssemblyMetadata, ClrType, MetadataIndex};
pub use repository::ReflectionRepository;
pub use security::{ClaimsPrincipal, ClassSecurityInfo, MethodSecurityInfo, PropertySecurityInfo};
pub use symbol::Compilation;
pub use type_info::{Backend, TypeRef};
pub use type_view_model::{TypeKey, TypeViewModel};
pub use validation::{ValidationIssue, ValidationResult, validate_repository};
