//! # Coalesce Core
//!
//! Core types, traits, and error handling for Coalesce.
//!
//! This crate provides the foundational building blocks shared by the type
//! model, the generators and the runtime CRUD engine:
//!
//! - **Types**: primitive type classification, security levels, search and
//!   sort enums, property roles
//! - **Traits**: `Validatable` and `Persistable`
//! - **Errors**: unified error handling with `CoalesceError` and `CoalesceResult`
//!

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{CoalesceError, CoalesceResult, ResultExt};
pub use traits::{Persistable, Validatable};
pub use types::{
    HttpMethod, PrimitiveKind, PropertyRole, SearchMethod, SecurityPermissionLevel, SortDirection,
    TypeKind, ValidationRule,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
