//! # TypeScript Generators
//!
//! The client library for `coalesce-vue`, one file per concern in the client
//! directory:
//!
//! | Generator | Output |
//! |-----------|--------|
//! | [`TsMetadata`] | `metadata.g.ts` |
//! | [`TsModels`] | `models.g.ts` |
//! | [`TsApiClients`] | `api-clients.g.ts` |
//! | [`TsViewModels`] | `viewmodels.g.ts` |
//!
//! Types are emitted in name order so both model backends produce identical
//! files.

pub mod api_clients;
pub mod metadata;
pub mod models;
pub mod viewmodels;

pub use api_clients::TsApiClients;
pub use metadata::TsMetadata;
pub use models::TsModels;
pub use viewmodels::TsViewModels;

use std::sync::Arc;

use serde::Serialize;

use coalesce_model::{ClassViewModel, ReflectionRepository, TypeViewModel};

pub const METADATA_FILE: &str = "metadata.g.ts";
pub const MODELS_FILE: &str = "models.g.ts";
pub const API_CLIENTS_FILE: &str = "api-clients.g.ts";
pub const VIEWMODELS_FILE: &str = "viewmodels.g.ts";

/// Suffix of every generated TypeScript file
pub const GENERATED_SUFFIX: &str = ".g.ts";

/// A TypeScript literal of any JSON-representable value
pub fn ts_literal<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Key of a member in generated metadata objects (`BorCPeople` → `borCPeople`)
pub fn metadata_key(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// TypeScript type of `ty` as seen from a file importing `models.g` as
/// `$models`
pub fn models_type(ty: &TypeViewModel, repo: &ReflectionRepository) -> String {
    if ty.is_void() {
        return "void".to_string();
    }
    if ty.is_collection() && !ty.is_byte_array() {
        return format!("{}[]", models_type(&ty.pure_type(), repo));
    }
    let stripped = ty.nullable_stripped();
    if stripped.is_enum() || stripped.class_view_model(repo).is_some_and(|c| c.has_dto()) {
        return format!("$models.{}", stripped.name());
    }
    stripped.ts_type_name()
}

/// Classes with a client-side model (entities and external types), by name
pub fn model_classes(repo: &ReflectionRepository) -> Vec<Arc<ClassViewModel>> {
    sorted(repo.dto_classes())
}

/// CRUD models, by name
pub fn crud_classes(repo: &ReflectionRepository) -> Vec<Arc<ClassViewModel>> {
    sorted(repo.crud_models().filter(|c| !c.is_abstract))
}

/// Services, by client name
pub fn service_classes(repo: &ReflectionRepository) -> Vec<Arc<ClassViewModel>> {
    let mut services: Vec<Arc<ClassViewModel>> = repo.services().cloned().collect();
    services.sort_by_key(|c| c.client_type_name());
    services
}

/// Enums, by name
pub fn enum_types(repo: &ReflectionRepository) -> Vec<TypeViewModel> {
    let mut enums = repo.enums().to_vec();
    enums.sort_by_key(|e| e.name());
    enums
}

fn sorted<'a>(classes: impl Iterator<Item = &'a Arc<ClassViewModel>>) -> Vec<Arc<ClassViewModel>> {
    let mut classes: Vec<Arc<ClassViewModel>> = classes.cloned().collect();
    classes.sort_by(|a, b| a.name.cmp(&b.name));
    classes
}

// ============================================================================
// Tests
// ============================================================================
