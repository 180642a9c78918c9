//! Data source and behaviors resolution
//!
//! Both factories map an entity and a name onto an implementation. Custom
//! implementations are registered up front; anything not registered falls
//! back to the standard implementation for the entity.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use coalesce_core::{CoalesceError, CoalesceResult};
use coalesce_model::{ClassViewModel, ReflectionRepository};

use crate::behaviors::{Behaviors, StandardBehaviors};
use crate::data_source::{DataSource, StandardDataSource};

pub const DEFAULT_NAME: &str = "Default";

fn is_default(name: &str) -> bool {
    name.is_empty() || name.eq_ignore_ascii_case(DEFAULT_NAME)
}

/// Registered implementations keyed by (entity full name, lowercased name)
type Registry<T> = HashMap<(String, String), Arc<T>>;

// ============================================================================
// DataSourceFactory
// ============================================================================

#[derive(Clone, Default)]
pub struct DataSourceFactory {
    registered: Registry<dyn DataSource>,
}

impl DataSourceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named data source; `"Default"` replaces the entity's default
    pub fn register(mut self, name: &str, data_source: Arc<dyn DataSource>) -> Self {
        let entity = data_source.class().full_name.clone();
        let name = if is_default(name) { DEFAULT_NAME } else { name };
        self.registered.insert((entity, name.to_lowercase()), data_source);
        self
    }

    /// Resolve `name` for `entity`
    ///
    /// Empty and `"Default"` give the registered default or a standard data
    /// source. Other names must be registered, or be a data source declared
    /// for the entity in the model, which then behaves as a standard one.
    pub fn get(
        &self,
        repo: &ReflectionRepository,
        entity: &Arc<ClassViewModel>,
        name: &str,
    ) -> CoalesceResult<Arc<dyn DataSource>> {
        let lookup = if is_default(name) { DEFAULT_NAME } else { name };
        if let Some(found) = self
            .registered
            .get(&(entity.full_name.clone(), lookup.to_lowercase()))
        {
            return Ok(found.clone());
        }
        if is_default(name) {
            return Ok(Arc::new(StandardDataSource::new(entity.clone())));
        }
        let declared = repo
            .data_sources_for(entity)
            .into_iter()
            .any(|ds| ds.name.eq_ignore_ascii_case(name) || ds.full_name.eq_ignore_ascii_case(name));
        if declared {
            debug!(entity = %entity.name, data_source = name, "Using standard behavior for unregistered data source");
            return Ok(Arc::new(StandardDataSource::new(entity.clone())));
        }
        Err(CoalesceError::KeyNotFound(format!(
            "A data source named '{}' was not found for type {}.",
            name, entity.name
        )))
    }

    /// Names a client may pass for `entity`, default first
    pub fn names(&self, repo: &ReflectionRepository, entity: &ClassViewModel) -> Vec<String> {
        let mut names = vec![DEFAULT_NAME.to_string()];
        names.extend(
            repo.data_sources_for(entity)
                .into_iter()
                .filter(|ds| !ds.is_default_data_source)
                .map(|ds| ds.name.clone()),
        );
        for (key_entity, key_name) in self.registered.keys() {
            if *key_entity == entity.full_name
                && !names.iter().any(|n| n.eq_ignore_ascii_case(key_name))
            {
                names.push(key_name.clone());
            }
        }
        names
    }
}

impl fmt::Debug for DataSourceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceFactory")
            .field("registered", &self.registered.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// BehaviorsFactory
// ============================================================================

#[derive(Clone, Default)]
pub struct BehaviorsFactory {
    registered: HashMap<String, Arc<dyn Behaviors>>,
}

impl BehaviorsFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, behaviors: Arc<dyn Behaviors>) -> Self {
        self.registered
            .insert(behaviors.class().full_name.clone(), behaviors);
        self
    }

    pub fn get(&self, entity: &Arc<ClassViewModel>) -> Arc<dyn Behaviors> {
        match self.registered.get(&entity.full_name) {
            Some(found) => found.clone(),
            None => Arc::new(StandardBehaviors::new(entity.clone())),
        }
    }
}

impl fmt::Debug for BehaviorsFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BehaviorsFactory")
            .field("registered", &self.registered.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use coalesce_model::testing;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_names_resolve_to_standard() {
        let fixture = &testing::both()[0];
        let person = fixture.repo.require_class("Person").unwrap();
        let factory = DataSourceFactory::new();
        for name in ["", "Default", "default"] {
            let ds = factory.get(&fixture.repo, &person, name).unwrap();
            assert_eq!(ds.class().name, "Person");
        }
    }

    #[test]
    fn test_registered_default_replaces_standard() {
        let fixture = &testing::both()[0];
        let person = fixture.repo.require_class("Person").unwrap();
        let custom = StandardDataSource::new(person.clone()).with_includes(Default::default());
        let factory = DataSourceFactory::new().register("", Arc::new(custom));
        let ds = factory.get(&fixture.repo, &person, "Default").unwrap();
        assert!(format!("{:?}", factory).contains("default"));
        assert_eq!(ds.class().name, "Person");
    }

    #[test]
    fn test_declared_and_unknown_names() {
        for fixture in testing::both() {
            let person = fixture.repo.require_class("Person").unwrap();
            let factory = DataSourceFactory::new();
            assert!(factory.get(&fixture.repo, &person, "BorCPeople").is_ok());
            let err = factory.get(&fixture.repo, &person, "Nope").err().unwrap();
            assert!(matches!(err, CoalesceError::KeyNotFound(_)));
            assert_eq!(
                err.to_string(),
                "Key not found: A data source named 'Nope' was not found for type Person."
            );
            assert_eq!(factory.names(&fixture.repo, &person), vec!["Default", "BorCPeople"]);
        }
    }

    #[test]
    fn test_behaviors_fallback() {
        let fixture = &testing::both()[0];
        let case = fixture.repo.require_class("Case").unwrap();
        let factory = BehaviorsFactory::new();
        assert_eq!(factory.get(&case).class().name, "Case");
    }
}
