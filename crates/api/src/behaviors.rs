//! Behaviors
//!
//! Behaviors own the write side of an entity: mapping an incoming DTO onto a
//! new or existing record, validating it, saving it, and deleting. Database
//! constraint failures are translated into messages an end user can act on.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use coalesce_core::{CoalesceError, CoalesceResult};
use coalesce_model::{ClassViewModel, ReflectionRepository};

use crate::context::CrudContext;
use crate::data_source::DataSource;
use crate::db::{Record, columns, foreign_key_name};
use crate::include_tree::IncludeScope;
use crate::mapping::{MapOptions, dto_value, map_from_dto, map_to_dto};
use crate::params::DataSourceParameters;
use crate::results::{ApiResult, ItemResult};
use crate::validation::validate_record;
use crate::values::{display_value, is_unassigned_key};

/// State handed to save hooks
#[derive(Debug, Clone)]
pub struct SaveState {
    pub is_create: bool,
    /// The record about to be written
    pub record: Record,
    /// The stored record before this save, when updating
    pub original: Option<Record>,
    pub changed: BTreeSet<String>,
}

pub type SaveHook = Arc<dyn Fn(&CrudContext, &SaveState) -> ApiResult + Send + Sync>;
pub type DeleteHook = Arc<dyn Fn(&CrudContext, &Record) -> ApiResult + Send + Sync>;

#[async_trait]
pub trait Behaviors: Send + Sync {
    fn class(&self) -> &Arc<ClassViewModel>;

    /// Create or update from a DTO; the returned object is the saved DTO
    async fn save(
        &self,
        ctx: &CrudContext,
        dto: &Map<String, Value>,
        data_source: &dyn DataSource,
        params: &DataSourceParameters,
    ) -> CoalesceResult<ItemResult<Value>>;

    async fn delete(
        &self,
        ctx: &CrudContext,
        id: &Value,
        data_source: &dyn DataSource,
        params: &DataSourceParameters,
    ) -> CoalesceResult<ItemResult<Value>>;
}

// ============================================================================
// StandardBehaviors
// ============================================================================

#[derive(Clone)]
pub struct StandardBehaviors {
    class: Arc<ClassViewModel>,
    before_save: Option<SaveHook>,
    before_delete: Option<DeleteHook>,
}

impl StandardBehaviors {
    pub fn new(class: Arc<ClassViewModel>) -> Self {
        Self {
            class,
            before_save: None,
            before_delete: None,
        }
    }

    /// Runs after validation; a failed result aborts the save
    pub fn with_before_save(
        mut self,
        hook: impl Fn(&CrudContext, &SaveState) -> ApiResult + Send + Sync + 'static,
    ) -> Self {
        self.before_save = Some(Arc::new(hook));
        self
    }

    pub fn with_before_delete(
        mut self,
        hook: impl Fn(&CrudContext, &Record) -> ApiResult + Send + Sync + 'static,
    ) -> Self {
        self.before_delete = Some(Arc::new(hook));
        self
    }

    /// Commit, turning known constraint failures into failed results
    async fn commit(
        &self,
        ctx: &CrudContext,
        changed: &BTreeSet<String>,
    ) -> CoalesceResult<Option<ItemResult<Value>>> {
        match ctx.db().save_changes().await {
            Ok(_) => Ok(None),
            Err(CoalesceError::Database(message)) => {
                match translate_constraint_error(ctx.repository(), &self.class, &message, changed) {
                    Some(friendly) => {
                        debug!(class = %self.class.name, %message, "Translated constraint failure");
                        Ok(Some(ItemResult::failure(friendly)))
                    }
                    None => Err(CoalesceError::Database(message)),
                }
            }
            Err(e) => Err(e),
        }
    }
}

impl fmt::Debug for StandardBehaviors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardBehaviors")
            .field("class", &self.class.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Behaviors for StandardBehaviors {
    fn class(&self) -> &Arc<ClassViewModel> {
        &self.class
    }

    async fn save(
        &self,
        ctx: &CrudContext,
        dto: &Map<String, Value>,
        data_source: &dyn DataSource,
        params: &DataSourceParameters,
    ) -> CoalesceResult<ItemResult<Value>> {
        let class = &self.class;
        let Some(pk) = class.primary_key() else {
            return Err(CoalesceError::validation(format!("{} has no primary key", class.name)));
        };

        let incoming_id = dto_value(dto, pk).filter(|v| !is_unassigned_key(v)).cloned();
        let original = match &incoming_id {
            Some(id) => match data_source.get_item(ctx, id, params).await? {
                Some(item) => Some(columns(class, &item.record)),
                None => return Ok(ItemResult::not_found(display_value(id))),
            },
            None => None,
        };
        let is_create = original.is_none();
        if !class.security.is_save_allowed(ctx.user(), is_create) {
            let verb = if is_create { "Creation" } else { "Editing" };
            return Ok(ItemResult::failure(format!("{} of {} items not allowed.", verb, class.name)));
        }

        let mapped = map_from_dto(ctx, class, dto, original.as_ref());
        let mut issues = mapped.issues;
        issues.extend(validate_record(class, &mapped.record, &mapped.changed, is_create));
        if !issues.is_empty() {
            return Ok(ItemResult::invalid(issues));
        }

        let state = SaveState {
            is_create,
            record: mapped.record,
            original,
            changed: mapped.changed,
        };
        if let Some(hook) = &self.before_save {
            let result = hook(ctx, &state);
            if !result.was_successful {
                return Ok(result.into());
            }
        }

        let saved = if is_create {
            ctx.db().add(class, state.record.clone())?
        } else {
            ctx.db().update(class, state.record.clone())?;
            state.record.clone()
        };
        if let Some(failed) = self.commit(ctx, &state.changed).await? {
            return Ok(failed);
        }

        let id = saved.get(&pk.name).cloned().unwrap_or(Value::Null);
        let options = MapOptions::default().with_includes(params.includes.as_deref());
        let object = match data_source.get_item(ctx, &id, params).await? {
            Some(item) => map_to_dto(ctx, class, &item.record, IncludeScope::from(&item.include_tree), &options),
            // saved but no longer visible through the data source
            None => map_to_dto(ctx, class, &saved, IncludeScope::All, &options),
        };
        debug!(class = %class.name, is_create, "Saved");
        Ok(ItemResult::success(object))
    }

    async fn delete(
        &self,
        ctx: &CrudContext,
        id: &Value,
        data_source: &dyn DataSource,
        params: &DataSourceParameters,
    ) -> CoalesceResult<ItemResult<Value>> {
        if !self.class.security.is_delete_allowed(ctx.user()) {
            return Ok(ItemResult::failure(format!("Deletion of {} items not allowed.", self.class.name)));
        }
        let Some(item) = data_source.get_item(ctx, id, params).await? else {
            return Ok(ItemResult::not_found(display_value(id)));
        };
        let record = columns(&self.class, &item.record);
        if let Some(hook) = &self.before_delete {
            let result = hook(ctx, &record);
            if !result.was_successful {
                return Ok(result.into());
            }
        }
        ctx.db().remove(&self.class, record)?;
        if let Some(failed) = self.commit(ctx, &BTreeSet::new()).await? {
            return Ok(failed);
        }
        debug!(class = %self.class.name, "Deleted");
        Ok(ItemResult::ok())
    }
}

// ============================================================================
// Constraint translation
// ============================================================================

static REFERENCE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r#"The DELETE statement conflicted with the REFERENCE constraint "(?P<constraint>[^"]+)"\. The conflict occurred in database "[^"]*", table "(?:\w+\.)?(?P<table>[^"]+)", column '(?P<column>[^']+)'"#,
    )
    .ok()
});

static FOREIGN_KEY: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r#"The (?:INSERT|UPDATE) statement conflicted with the FOREIGN KEY constraint "(?P<constraint>[^"]+)""#,
    )
    .ok()
});

static UNIQUE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"Cannot insert duplicate key row in object '(?:\w+\.)?(?P<table>[^']+)' with unique index '(?P<index>[^']+)'\. The duplicate key value is \((?P<value>.*)\)",
    )
    .ok()
});

/// A user-facing message for a constraint failure on `class`
///
/// Foreign key and unique index failures are only reported when a property
/// the request changed is involved; anything unrecognized yields `None`.
pub fn translate_constraint_error(
    repo: &ReflectionRepository,
    class: &ClassViewModel,
    message: &str,
    changed: &BTreeSet<String>,
) -> Option<String> {
    if let Some(caps) = REFERENCE.as_ref().and_then(|re| re.captures(message)) {
        let table = &caps["table"];
        let column = &caps["column"];
        let dependent = repo
            .entities()
            .find(|e| e.table_name.eq_ignore_ascii_case(table))?;
        let fk = dependent
            .properties
            .iter()
            .find(|p| p.is_foreign_key() && p.name.eq_ignore_ascii_case(column))?;
        if fk.foreign_key_principal_type.as_ref() != Some(&class.key) {
            return None;
        }
        return Some(format!(
            "The {} is still referenced by at least one {}.",
            class.display_name, dependent.display_name
        ));
    }

    if let Some(caps) = FOREIGN_KEY.as_ref().and_then(|re| re.captures(message)) {
        let constraint = &caps["constraint"];
        let prop = class.properties.iter().filter(|p| p.is_foreign_key()).find(|p| {
            p.foreign_key_principal_type
                .as_ref()
                .and_then(|k| repo.get(k))
                .is_some_and(|principal| {
                    foreign_key_name(class, &principal, p).eq_ignore_ascii_case(constraint)
                })
        })?;
        return changed
            .contains(&prop.name)
            .then(|| format!("The value of {} is not valid.", prop.display_name));
    }

    if let Some(caps) = UNIQUE.as_ref().and_then(|re| re.captures(message)) {
        let table = &caps["table"];
        let index_name = &caps["index"];
        let owner = if class.table_name.eq_ignore_ascii_case(table) {
            class
        } else {
            return None;
        };
        let index = owner
            .indexes
            .iter()
            .find(|i| i.name.eq_ignore_ascii_case(index_name))?;
        if !index.properties.iter().any(|p| changed.contains(p)) {
            return None;
        }
        let names: Vec<String> = index
            .properties
            .iter()
            .map(|p| {
                owner
                    .property(p)
                    .map(|prop| prop.display_name.clone())
                    .unwrap_or_else(|| p.clone())
            })
            .collect();
        return Some(format!(
            "A different item with {} '{}' already exists.",
            names.join(", "),
            &caps["value"]
        ));
    }

    warn!(class = %class.name, "Unrecognized database error");
    None
}

// ============================================================================
// Tests
// ============================================================================
