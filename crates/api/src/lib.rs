//! # Coalesce API
//!
//! The runtime CRUD engine behind generated controllers.
//!
//! A request flows through:
//!
//! - **Controllers** ([`ModelApiController`], [`ServiceApiController`]):
//!   authorize, resolve collaborators, answer with status and envelope
//! - **Data sources** ([`DataSource`]): load, filter, search, sort and page
//! - **Behaviors** ([`Behaviors`]): map incoming DTOs, validate, save, delete
//!   and translate constraint failures
//! - **Mapping**: records to DTOs under an [`IncludeTree`] and the user's
//!   read permissions
//!
//! Everything per-request hangs off a [`CrudContext`]; the
//! [`ReflectionRepository`](coalesce_model::ReflectionRepository) is shared.
//!

// ============================================================================
// Modules
// ============================================================================

pub mod behaviors;
pub mod context;
pub mod controller;
pub mod data_source;
pub mod db;
pub mod factory;
pub mod include_tree;
pub mod kernel;
pub mod mapping;
pub mod methods;
pub mod params;
pub mod query;
pub mod restrictions;
pub mod results;
pub mod validation;
pub mod values;

// ============================================================================
// Re-exports
// ============================================================================

pub use behaviors::{Behaviors, SaveState, StandardBehaviors, translate_constraint_error};
pub use context::{CoalesceOptions, CrudContext, ServiceRegistry};
pub use controller::{ApiEngine, ApiResponse, ModelApiController, ServiceApiController};
pub use data_source::{DataSource, ListPage, LoadedItem, StandardDataSource};
pub use db::{DbContext, InMemoryDatabase, InMemoryDbContext, Record};
pub use factory::{BehaviorsFactory, DataSourceFactory};
pub use include_tree::{IncludeScope, IncludeTree};
pub use kernel::{KernelPlugin, KernelTool, ScopeFactory, ToolKind};
pub use mapping::{MapOptions, map_from_dto, map_to_dto};
pub use methods::{MethodCall, MethodHandler, MethodOutput, MethodRegistry, MethodReturn};
pub use params::{DataSourceParameters, FilterParameters, ListParameters};
pub use query::{Expr, FilterOp, PredicateBuilder, build_predicate};
pub use restrictions::{PropertyRestriction, RestrictionRegistry};
pub use results::{ApiResult, ItemResult, ListResult, ValidationIssue};
