//! Record to DTO mapping
//!
//! Outgoing DTOs carry camelCase keys and only what the user may see:
//! readable properties, restriction checks passed, navigations only where
//! the include tree reaches. Incoming DTOs are applied to a record property
//! by property, skipping anything the user may not write.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::debug;

use coalesce_model::{ClassViewModel, PropertyViewModel};

use crate::context::CrudContext;
use crate::db::Record;
use crate::include_tree::IncludeScope;
use crate::results::ValidationIssue;
use crate::values::{coerce_value, default_value};

/// Output shaping beyond security and includes
#[derive(Debug, Clone, Default)]
pub struct MapOptions {
    /// Content view for `[DtoIncludes]`/`[DtoExcludes]`
    pub includes: Option<String>,
    /// Top-level fields to keep; empty keeps all
    pub fields: Vec<String>,
}

impl MapOptions {
    pub fn with_includes(mut self, includes: Option<&str>) -> Self {
        self.includes = includes.map(str::to_string);
        self
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    fn keeps(&self, prop: &PropertyViewModel) -> bool {
        self.fields.is_empty()
            || self.fields.iter().any(|f| {
                f.eq_ignore_ascii_case(&prop.name) || f.eq_ignore_ascii_case(&prop.json_name)
            })
    }
}

pub fn map_to_dto(
    ctx: &CrudContext,
    class: &ClassViewModel,
    record: &Record,
    scope: IncludeScope<'_>,
    options: &MapOptions,
) -> Value {
    let mut visited = vec![class.full_name.clone()];
    Value::Object(map_object(ctx, class, record, scope, options, true, &mut visited))
}

fn map_object(
    ctx: &CrudContext,
    class: &ClassViewModel,
    record: &Record,
    scope: IncludeScope<'_>,
    options: &MapOptions,
    top_level: bool,
    visited: &mut Vec<String>,
) -> Map<String, Value> {
    let user = ctx.user();
    let mut dto = Map::new();
    for prop in class.client_properties() {
        if !prop.is_included_for(options.includes.as_deref()) {
            continue;
        }
        if top_level && !options.keeps(prop) {
            continue;
        }
        if !prop.security.is_readable(user) || !ctx.restrictions().can_read(ctx, prop, record) {
            continue;
        }

        if prop.is_navigation() {
            let Some(child_scope) = scope.child(&prop.name) else {
                continue;
            };
            let Some(value) = record.get(&prop.name) else {
                continue;
            };
            let Some(target) = prop.pure_type().class_view_model(ctx.repository()) else {
                continue;
            };
            // an open-ended include stops at types already on the path
            if child_scope.is_all() && visited.contains(&target.full_name) {
                continue;
            }
            visited.push(target.full_name.clone());
            let mapped = match value {
                Value::Object(child) => Value::Object(map_object(
                    ctx, &target, child, child_scope, options, false, visited,
                )),
                Value::Array(items) => Value::Array(
                    items
                        .iter()
                        .filter_map(Value::as_object)
                        .map(|child| {
                            Value::Object(map_object(
                                ctx, &target, child, child_scope, options, false, visited,
                            ))
                        })
                        .collect(),
                ),
                _ => Value::Null,
            };
            visited.pop();
            dto.insert(prop.json_name.clone(), mapped);
            continue;
        }

        let value = record.get(&prop.name).cloned().unwrap_or(Value::Null);
        let value = match (&value, prop.pure_type().class_view_model(ctx.repository())) {
            (Value::Object(child), Some(target)) if !prop.is_navigation() => Value::Object(
                map_object(ctx, &target, child, IncludeScope::All, options, false, visited),
            ),
            _ => value,
        };
        dto.insert(prop.json_name.clone(), value);
    }
    dto
}

// ============================================================================
// Incoming
// ============================================================================

/// An incoming DTO applied to a record
#[derive(Debug, Clone, Default)]
pub struct MappedDto {
    pub record: Record,
    /// Declared names of properties whose value changed
    pub changed: BTreeSet<String>,
    /// Values that could not be converted
    pub issues: Vec<ValidationIssue>,
}

/// The incoming value for a property, by camelCase or declared name
pub fn dto_value<'a>(dto: &'a Map<String, Value>, prop: &PropertyViewModel) -> Option<&'a Value> {
    dto.get(&prop.json_name).or_else(|| dto.get(&prop.name))
}

/// Apply `dto` over `existing` (`None` when creating)
///
/// Primary keys are only taken on create. Navigations are never written;
/// relations change through their foreign keys.
pub fn map_from_dto(
    ctx: &CrudContext,
    class: &ClassViewModel,
    dto: &Map<String, Value>,
    existing: Option<&Record>,
) -> MappedDto {
    let user = ctx.user();
    let is_create = existing.is_none();
    let mut mapped = MappedDto {
        record: existing.cloned().unwrap_or_default(),
        ..MappedDto::default()
    };

    for prop in class.properties.iter().filter(|p| p.is_client_property() && !p.is_navigation()) {
        if is_create && prop.is_db_mapped {
            mapped
                .record
                .entry(prop.name.clone())
                .or_insert_with(|| default_value(&prop.type_vm));
        }
        let Some(incoming) = dto_value(dto, prop) else {
            continue;
        };

        if prop.is_primary_key() {
            if is_create {
                if let Some(value) = coerce_value(&prop.type_vm, incoming) {
                    mapped.record.insert(prop.name.clone(), value);
                }
            }
            continue;
        }

        let writable = if is_create {
            prop.security.is_initable(user)
        } else {
            prop.security.is_editable(user)
        };
        if !writable || !ctx.restrictions().can_write(ctx, prop, existing, incoming) {
            debug!(class = %class.name, property = %prop.name, "Skipping unwritable property");
            continue;
        }

        let Some(value) = coerce_value(&prop.type_vm, incoming) else {
            mapped.issues.push(ValidationIssue::new(
                prop.json_name.clone(),
                format!("{} has an invalid value.", prop.display_name),
            ));
            continue;
        };
        if existing.and_then(|r| r.get(&prop.name)) != Some(&value) {
            mapped.changed.insert(prop.name.clone());
        }
        mapped.record.insert(prop.name.clone(), value);
    }
    mapped
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryDatabase;
    use crate::include_tree::IncludeTree;
    use coalesce_model::{ClaimsPrincipal, testing};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn context(user: ClaimsPrincipal) -> CrudContext {
        let repo = testing::both()[0].repo.clone();
        let db = InMemoryDatabase::new(repo.clone());
        CrudContext::new(repo, Arc::new(db.session())).with_user(user)
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    // ── outgoing ──

    #[test]
    fn test_internal_and_unreadable_properties_are_hidden() {
        let ctx = context(ClaimsPrincipal::authenticated("u"));
        let person = ctx.repository().require_class("Person").unwrap();
        let dto = map_to_dto(
            &ctx,
            &person,
            &record(json!({"PersonId": 1, "FirstName": "Ann", "LastName": "Lee", "SecretNote": "x"})),
            IncludeScope::All,
            &MapOptions::default(),
        );
        assert_eq!(dto["firstName"], json!("Ann"));
        assert!(dto.get("secretNote").is_none());
        assert!(dto.get("SecretNote").is_none());
    }

    #[test]
    fn test_role_gated_read() {
        let complex = |user| {
            let ctx = context(user);
            let class = ctx.repository().require_class("ComplexModel").unwrap();
            map_to_dto(
                &ctx,
                &class,
                &record(json!({"ComplexModelId": 1, "AdminReadable": "secret"})),
                IncludeScope::All,
                &MapOptions::default(),
            )
        };
        let admin = complex(ClaimsPrincipal::authenticated("a").with_role("Admin"));
        assert_eq!(admin["adminReadable"], json!("secret"));
        let user = complex(ClaimsPrincipal::authenticated("u"));
        assert!(user.get("adminReadable").is_none());
    }

    #[test]
    fn test_navigations_follow_include_tree() {
        let ctx = context(ClaimsPrincipal::authenticated("u"));
        let case = ctx.repository().require_class("Case").unwrap();
        let row = record(json!({
            "CaseKey": 1,
            "Title": "Broken",
            "AssignedTo": {"PersonId": 2, "FirstName": "Ann", "Company": {"CompanyId": 3, "Name": "Acme"}},
            "ReportedBy": {"PersonId": 4, "FirstName": "Bob"}
        }));
        let tree = IncludeTree::parse("AssignedTo");
        let dto = map_to_dto(&ctx, &case, &row, IncludeScope::from(&tree), &MapOptions::default());
        assert_eq!(dto["assignedTo"]["firstName"], json!("Ann"));
        assert!(dto["assignedTo"].get("company").is_none());
        assert!(dto.get("reportedBy").is_none());

        let all = map_to_dto(&ctx, &case, &row, IncludeScope::All, &MapOptions::default());
        assert_eq!(all["assignedTo"]["company"]["name"], json!("Acme"));
        assert_eq!(all["reportedBy"]["firstName"], json!("Bob"));
    }

    #[test]
    fn test_fields_projection_is_top_level() {
        let ctx = context(ClaimsPrincipal::authenticated("u"));
        let company = ctx.repository().require_class("Company").unwrap();
        let dto = map_to_dto(
            &ctx,
            &company,
            &record(json!({"CompanyId": 1, "Name": "Acme", "City": "Spokane"})),
            IncludeScope::All,
            &MapOptions::default().with_fields(vec!["name".into()]),
        );
        assert_eq!(dto, json!({"name": "Acme"}));
    }

    // ── incoming ──

    #[test]
    fn test_create_takes_initable_and_fills_defaults() {
        let ctx = context(ClaimsPrincipal::authenticated("u"));
        let complex = ctx.repository().require_class("ComplexModel").unwrap();
        let mapped = map_from_dto(
            &ctx,
            &complex,
            &record(json!({"initOnly": "set once", "readOnly": "nope", "string": "s"})),
            None,
        );
        assert_eq!(mapped.record["InitOnly"], json!("set once"));
        assert_eq!(mapped.record["String"], json!("s"));
        assert_eq!(mapped.record["Bool"], json!(false));
        assert!(mapped.record.get("ReadOnly").is_none_or(Value::is_null));
        assert!(mapped.changed.contains("InitOnly"));
        assert!(!mapped.changed.contains("ReadOnly"));
    }

    #[test]
    fn test_update_skips_init_only_and_tracks_changes() {
        let ctx = context(ClaimsPrincipal::authenticated("u"));
        let complex = ctx.repository().require_class("ComplexModel").unwrap();
        let existing = record(json!({"ComplexModelId": 5, "InitOnly": "first", "String": "same", "NullableInt": 1}));
        let mapped = map_from_dto(
            &ctx,
            &complex,
            &record(json!({"complexModelId": 9, "initOnly": "second", "string": "same", "nullableInt": "2"})),
            Some(&existing),
        );
        assert_eq!(mapped.record["ComplexModelId"], json!(5));
        assert_eq!(mapped.record["InitOnly"], json!("first"));
        assert_eq!(mapped.record["NullableInt"], json!(2));
        assert_eq!(mapped.changed.iter().collect::<Vec<_>>(), vec!["NullableInt"]);
    }

    #[test]
    fn test_invalid_values_become_issues() {
        let ctx = context(ClaimsPrincipal::authenticated("u"));
        let complex = ctx.repository().require_class("ComplexModel").unwrap();
        let mapped = map_from_dto(&ctx, &complex, &record(json!({"bool": "maybe"})), None);
        assert_eq!(
            mapped.issues,
            vec![ValidationIssue::new("bool", "Bool has an invalid value.")]
        );
    }

    #[test]
    fn test_navigations_are_not_written() {
        let ctx = context(ClaimsPrincipal::authenticated("u"));
        let case = ctx.repository().require_class("Case").unwrap();
        let mapped = map_from_dto(
            &ctx,
            &case,
            &record(json!({"title": "t", "assignedTo": {"personId": 1}, "assignedToId": 1})),
            None,
        );
        assert!(mapped.record.get("AssignedTo").is_none());
        assert_eq!(mapped.record["AssignedToId"], json!(1));
    }
}
