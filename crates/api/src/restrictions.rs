//! Property restrictions
//!
//! `[Restrict(typeof(X))]` on a property names a restriction type. At runtime
//! each name maps to a [`PropertyRestriction`] registered here; a property
//! with several restrictions is readable only when all of them agree.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use coalesce_model::PropertyViewModel;

use crate::context::CrudContext;
use crate::db::Record;

pub trait PropertyRestriction: Send + Sync {
    fn user_can_read(&self, ctx: &CrudContext, property: &str, record: &Record) -> bool;

    /// `existing` is `None` while creating
    fn user_can_write(
        &self,
        ctx: &CrudContext,
        property: &str,
        existing: Option<&Record>,
        incoming: &Value,
    ) -> bool {
        let _ = incoming;
        existing.is_none_or(|record| self.user_can_read(ctx, property, record))
    }

    fn user_can_filter(&self, ctx: &CrudContext, property: &str) -> bool {
        let _ = (ctx, property);
        true
    }
}

/// Restrictions by type name, full or short
#[derive(Default, Clone)]
pub struct RestrictionRegistry {
    restrictions: HashMap<String, Arc<dyn PropertyRestriction>>,
}

impl RestrictionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, type_name: &str, restriction: Arc<dyn PropertyRestriction>) -> Self {
        self.restrictions.insert(type_name.to_string(), restriction);
        self
    }

    pub fn get(&self, type_name: &str) -> Option<&Arc<dyn PropertyRestriction>> {
        self.restrictions.get(type_name).or_else(|| {
            let short = type_name.rsplit('.').next().unwrap_or(type_name);
            self.restrictions
                .iter()
                .find(|(name, _)| name.rsplit('.').next() == Some(short))
                .map(|(_, restriction)| restriction)
        })
    }

    /// Every restriction of `property`, or `None` if one is not registered
    fn resolve(&self, property: &PropertyViewModel) -> Option<Vec<&Arc<dyn PropertyRestriction>>> {
        property
            .security
            .restrictions
            .iter()
            .map(|name| {
                let found = self.get(name);
                if found.is_none() {
                    warn!(
                        property = %property.name,
                        restriction = %name,
                        "Restriction is not registered; denying access"
                    );
                }
                found
            })
            .collect()
    }

    pub fn can_read(&self, ctx: &CrudContext, property: &PropertyViewModel, record: &Record) -> bool {
        if !property.security.has_restrictions() {
            return true;
        }
        self.resolve(property).is_some_and(|all| {
            all.iter()
                .all(|r| r.user_can_read(ctx, &property.name, record))
        })
    }

    pub fn can_write(
        &self,
        ctx: &CrudContext,
        property: &PropertyViewModel,
        existing: Option<&Record>,
        incoming: &Value,
    ) -> bool {
        if !property.security.has_restrictions() {
            return true;
        }
        self.resolve(property).is_some_and(|all| {
            all.iter()
                .all(|r| r.user_can_write(ctx, &property.name, existing, incoming))
        })
    }

    pub fn can_filter(&self, ctx: &CrudContext, property: &PropertyViewModel) -> bool {
        if !property.security.has_restrictions() {
            return true;
        }
        self.resolve(property)
            .is_some_and(|all| all.iter().all(|r| r.user_can_filter(ctx, &property.name)))
    }
}

impl fmt::Debug for RestrictionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestrictionRegistry")
            .field("restrictions", &self.restrictions.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
