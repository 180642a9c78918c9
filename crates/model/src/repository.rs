//! # ReflectionRepository
//!
//! Discovers the model from one or more sources (reflection metadata
//! assemblies or bound C# compilations) and owns the resulting
//! [`ClassViewModel`] graph.
//!
//! Discovery is recomputed from every root added so far, so adding the same
//! source twice, or adding sources in a different order, yields the same
//! model. Types are identified by [`TypeKey`] (backend plus qualified name
//! with nullable wrapping stripped) and registered once each.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, LazyLock};

use coalesce_core::{CoalesceError, CoalesceResult, TypeKind};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::attributes::{AttributeSliceExt, AttributeValue};
use crate::class::{link_relations, resolve_default_orders, ClassKind, ClassViewModel};
use crate::reflection::{AssemblyMetadata, MetadataIndex};
use crate::symbol::Compilation;
use crate::type_view_model::{TypeKey, TypeViewModel};
use crate::well_known::names;

static GLOBAL: LazyLock<RwLock<Arc<ReflectionRepository>>> =
    LazyLock::new(|| RwLock::new(Arc::new(ReflectionRepository::new())));

/// Registry of discovered types
#[derive(Default)]
pub struct ReflectionRepository {
    /// Declared types of every source added, unique by identity
    roots: Vec<TypeViewModel>,
    root_keys: HashSet<TypeKey>,

    classes: Vec<Arc<ClassViewModel>>,
    by_key: HashMap<TypeKey, usize>,
    enums: Vec<TypeViewModel>,
}

impl ReflectionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide default instance
    pub fn global() -> Arc<ReflectionRepository> {
        Arc::clone(&GLOBAL.read())
    }

    pub fn set_global(repository: Arc<ReflectionRepository>) {
        *GLOBAL.write() = repository;
    }

    // ====================================================================
    // Discovery
    // ====================================================================

    /// Discover every type declared in a reflection metadata document
    pub fn add_assembly(&mut self, assembly: &AssemblyMetadata) -> CoalesceResult<()> {
        let index = MetadataIndex::new(assembly);
        debug!(assembly = %assembly.name, types = assembly.types.len(), "Adding assembly");
        self.add_types(index.all_types())
    }

    /// Discover every type declared in a bound C# compilation
    pub fn add_compilation(&mut self, compilation: &Arc<Compilation>) -> CoalesceResult<()> {
        debug!(types = compilation.len(), "Adding compilation");
        self.add_types(compilation.all_types())
    }

    /// Add discovery roots and rebuild the model
    pub fn add_types(&mut self, types: Vec<TypeViewModel>) -> CoalesceResult<()> {
        for ty in types {
            if self.root_keys.insert(ty.identity()) {
                self.roots.push(ty);
            }
        }
        self.build()
    }

    /// Recompute discovery and every derived fact from the roots
    fn build(&mut self) -> CoalesceResult<()> {
        let mut discovery = Discovery::default();

        // DbContexts first so their entities outrank anything reached later
        for root in &self.roots {
            if is_db_context(root) {
                discovery.register(root, ClassKind::DbContext);
                for prop in root.properties() {
                    let prop_type = TypeViewModel::new(prop.property_type());
                    let Some(entity) = prop_type
                        .generic_arguments_for(names::DB_SET)
                        .and_then(|args| args.into_iter().next())
                    else {
                        continue;
                    };
                    if !entity.is_user_defined() {
                        return Err(CoalesceError::discovery(
                            entity.qualified_name(),
                            format!("DbSet '{}' on '{}' is not a declared type", prop.name(), root.qualified_name()),
                        ));
                    }
                    discovery.register(&entity, ClassKind::DbEntity);
                    discovery
                        .db_sets
                        .entry(entity.identity())
                        .or_insert_with(|| (root.identity(), prop.name()));
                }
            }
        }

        for root in &self.roots {
            if !root.has_attribute("Coalesce") || is_db_context(root) {
                continue;
            }
            let kind = if root.is_a(names::IDATA_SOURCE) {
                ClassKind::DataSource
            } else if root.is_a(names::IBEHAVIORS) {
                ClassKind::Behaviors
            } else if root.has_attribute("StandaloneEntity") {
                ClassKind::StandaloneEntity
            } else {
                ClassKind::Service
            };
            discovery.register(root, kind);
        }

        for root in &self.roots {
            if root.kind() == TypeKind::Enum && root.has_attribute("Coalesce") {
                discovery.register_enum(root);
            }
        }

        discovery.walk_external_types();

        // Build view models, then link the graph
        let mut drafts: Vec<ClassViewModel> = discovery
            .order
            .iter()
            .filter_map(|key| discovery.found.get(key))
            .map(|(ty, kind)| {
                let mut class = ClassViewModel::new(ty.clone(), *kind);
                if let Some((context, set)) = discovery.db_sets.get(&class.key) {
                    class.db_context = Some(context.clone());
                    class.db_set_name = Some(set.clone());
                }
                if matches!(kind, ClassKind::DataSource | ClassKind::Behaviors) {
                    let definition = if *kind == ClassKind::DataSource {
                        names::IDATA_SOURCE
                    } else {
                        names::IBEHAVIORS
                    };
                    class.served_type = ty
                        .generic_arguments_for(definition)
                        .and_then(|args| args.into_iter().next())
                        .map(|t| t.identity());
                }
                class
            })
            .collect();

        link_relations(&mut drafts);
        resolve_default_orders(&mut drafts);

        self.by_key = drafts
            .iter()
            .enumerate()
            .map(|(i, c)| (c.key.clone(), i))
            .collect();
        self.classes = drafts.into_iter().map(Arc::new).collect();
        self.enums = discovery.enums;

        info!(
            roots = self.roots.len(),
            classes = self.classes.len(),
            entities = self.entities().count(),
            enums = self.enums.len(),
            "Reflection repository built"
        );
        Ok(())
    }

    // ====================================================================
    // Lookup
    // ====================================================================

    /// Every discovered class, in discovery order
    pub fn classes(&self) -> impl Iterator<Item = &Arc<ClassViewModel>> {
        self.classes.iter()
    }

    fn of_kind(&self, kind: ClassKind) -> impl Iterator<Item = &Arc<ClassViewModel>> {
        self.classes.iter().filter(move |c| c.kind == kind)
    }

    /// DB entities and standalone entities
    pub fn crud_models(&self) -> impl Iterator<Item = &Arc<ClassViewModel>> {
        self.classes.iter().filter(|c| c.is_crud_model())
    }

    pub fn entities(&self) -> impl Iterator<Item = &Arc<ClassViewModel>> {
        self.of_kind(ClassKind::DbEntity)
    }

    pub fn db_contexts(&self) -> impl Iterator<Item = &Arc<ClassViewModel>> {
        self.of_kind(ClassKind::DbContext)
    }

    pub fn services(&self) -> impl Iterator<Item = &Arc<ClassViewModel>> {
        self.of_kind(ClassKind::Service)
    }

    pub fn external_types(&self) -> impl Iterator<Item = &Arc<ClassViewModel>> {
        self.of_kind(ClassKind::External)
    }

    pub fn custom_data_sources(&self) -> impl Iterator<Item = &Arc<ClassViewModel>> {
        self.of_kind(ClassKind::DataSource)
    }

    pub fn custom_behaviors(&self) -> impl Iterator<Item = &Arc<ClassViewModel>> {
        self.of_kind(ClassKind::Behaviors)
    }

    /// Classes that get a generated DTO
    pub fn dto_classes(&self) -> impl Iterator<Item = &Arc<ClassViewModel>> {
        self.classes.iter().filter(|c| c.has_dto())
    }

    pub fn enums(&self) -> &[TypeViewModel] {
        &self.enums
    }

    pub fn get(&self, key: &TypeKey) -> Option<Arc<ClassViewModel>> {
        self.by_key.get(key).map(|&i| Arc::clone(&self.classes[i]))
    }

    /// Class by fully-qualified name, or by simple name when unambiguous
    /// enough to match first
    pub fn class(&self, name: &str) -> Option<Arc<ClassViewModel>> {
        self.classes
            .iter()
            .find(|c| c.full_name == name)
            .or_else(|| self.classes.iter().find(|c| c.name == name))
            .cloned()
    }

    /// Like [`class`](Self::class), failing with `TypeNotFound`
    pub fn require_class(&self, name: &str) -> CoalesceResult<Arc<ClassViewModel>> {
        self.class(name)
            .ok_or_else(|| CoalesceError::TypeNotFound(name.to_string()))
    }

    /// The discovered class for a type occurrence (nullable stripped)
    pub fn get_class_view_model(&self, ty: &TypeViewModel) -> Option<Arc<ClassViewModel>> {
        self.get(&ty.identity())
    }

    /// Custom data sources declared for an entity
    pub fn data_sources_for(&self, entity: &ClassViewModel) -> Vec<Arc<ClassViewModel>> {
        self.custom_data_sources()
            .filter(|c| c.served_type.as_ref() == Some(&entity.key))
            .cloned()
            .collect()
    }

    /// The custom behaviors declared for an entity, if any
    pub fn behaviors_for(&self, entity: &ClassViewModel) -> Option<Arc<ClassViewModel>> {
        self.custom_behaviors()
            .find(|c| c.served_type.as_ref() == Some(&entity.key))
            .cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl std::fmt::Debug for ReflectionRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReflectionRepository")
            .field("roots", &self.roots.len())
            .field("classes", &self.classes.len())
            .field("enums", &self.enums.len())
            .finish()
    }
}

fn is_db_context(ty: &TypeViewModel) -> bool {
    ty.is_user_defined() && ty.is_class() && ty.is_a(names::DB_CONTEXT)
}

// ============================================================================
// Discovery state
// ============================================================================

#[derive(Default)]
struct Discovery {
    found: HashMap<TypeKey, (TypeViewModel, ClassKind)>,
    order: Vec<TypeKey>,
    db_sets: HashMap<TypeKey, (TypeKey, String)>,
    enums: Vec<TypeViewModel>,
    enum_keys: HashSet<TypeKey>,
}

impl Discovery {
    /// Register `ty` as `kind`; a stronger kind replaces a weaker one
    fn register(&mut self, ty: &TypeViewModel, kind: ClassKind) -> bool {
        let ty = ty.nullable_stripped();
        let key = ty.identity();
        match self.found.get_mut(&key) {
            Some((_, existing)) => {
                if kind.rank() > existing.rank() {
                    *existing = kind;
                }
                false
            }
            None => {
                debug!(ty = %key, %kind, "Discovered");
                self.found.insert(key.clone(), (ty, kind));
                self.order.push(key);
                true
            }
        }
    }

    fn register_enum(&mut self, ty: &TypeViewModel) {
        let ty = ty.nullable_stripped();
        if self.enum_keys.insert(ty.identity()) {
            self.enums.push(ty);
        }
    }

    /// Visit a type reachable from the client surface
    fn visit(&mut self, ty: &TypeViewModel, queue: &mut Vec<TypeKey>) {
        let pure = ty.pure_type().nullable_stripped();
        if pure.is_enum() {
            self.register_enum(&pure);
            return;
        }
        for arg in pure.generic_arguments() {
            self.visit(&arg, queue);
        }
        if pure.is_poco() && pure.is_user_defined() && pure.kind() == TypeKind::Class {
            let key = pure.identity();
            if self.register(&pure, ClassKind::External) {
                queue.push(key);
            }
        }
    }

    /// Walk client properties, exposed method signatures, and `typeof`
    /// arguments of method attributes, registering external types and enums
    fn walk_external_types(&mut self) {
        let mut queue: Vec<TypeKey> = self.order.clone();
        let mut seen: HashSet<TypeKey> = HashSet::new();

        while let Some(key) = queue.pop() {
            if !seen.insert(key.clone()) {
                continue;
            }
            let Some((ty, kind)) = self.found.get(&key).cloned() else {
                continue;
            };
            if kind == ClassKind::DbContext {
                continue;
            }

            for prop in ty.properties() {
                if prop.is_static() || !prop.has_getter() || prop.attributes().has_attribute("InternalUse") {
                    continue;
                }
                self.visit(&TypeViewModel::new(prop.property_type()), &mut queue);
            }

            for method in ty.methods() {
                let attributes = method.attributes();
                let exposed = attributes.has_attribute("Coalesce") || ty.kind() == TypeKind::Interface;
                if !exposed || attributes.has_attribute("InternalUse") {
                    continue;
                }
                self.visit(&TypeViewModel::new(method.return_type()), &mut queue);
                for param in method.parameters() {
                    if param.attributes.has_attribute("Inject") {
                        continue;
                    }
                    let param_type = TypeViewModel::new(param.parameter_type);
                    if param_type.is_a(names::DB_CONTEXT) {
                        continue;
                    }
                    self.visit(&param_type, &mut queue);
                }
                for attr in &attributes {
                    for value in attr.args.iter().chain(attr.named.iter().map(|(_, v)| v)) {
                        self.visit_attribute_value(value, &mut queue);
                    }
                }
            }
        }
    }

    fn visit_attribute_value(&mut self, value: &AttributeValue, queue: &mut Vec<TypeKey>) {
        match value {
            AttributeValue::Type(t) if !t.is_a(names::IDATA_SOURCE) => self.visit(t, queue),
            AttributeValue::Array(items) => {
                for item in items {
                    self.visit_attribute_value(item, queue);
                }
            }
            _ => {}
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
