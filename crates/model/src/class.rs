//! # ClassViewModel
//!
//! One discovered type: a DB entity, standalone entity, service, external
//! type, custom data source/behaviors, or DbContext. Construction happens in
//! two steps. [`ClassViewModel::new`] reads everything that depends on the
//! type alone; the repository then links the whole model
//! ([`link_relations`], [`resolve_default_orders`]) so properties learn their
//! relational roles and classes their composed default ordering.

use std::collections::HashMap;
use std::fmt;

use coalesce_core::{PropertyRole, SortDirection};
use heck::ToTitleCase;
use serde::Serialize;

use crate::attributes::{AttributeData, AttributeSliceExt};
use crate::method::MethodViewModel;
use crate::property::{ManyToManyInfo, PropertyViewModel};
use crate::security::ClassSecurityInfo;
use crate::type_view_model::{TypeKey, TypeViewModel};

/// Suffix of generated DTO classes
pub const DTO_SUFFIX: &str = "DtoGen";

// ============================================================================
// ClassKind
// ============================================================================

/// Why a type is part of the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ClassKind {
    /// Exposed through a `DbSet<T>` on a discovered DbContext
    DbEntity,
    /// `[Coalesce, StandaloneEntity]`: CRUD through a custom data source only
    StandaloneEntity,
    /// `[Coalesce]` interface or `[Coalesce, Service]` class
    Service,
    /// Non-entity class reachable from the client surface
    External,
    /// `[Coalesce]` class implementing `IDataSource<T>`
    DataSource,
    /// `[Coalesce]` class implementing `IBehaviors<T>`
    Behaviors,
    DbContext,
}

impl ClassKind {
    pub fn is_crud_model(&self) -> bool {
        matches!(self, ClassKind::DbEntity | ClassKind::StandaloneEntity)
    }

    /// Kinds that get a generated DTO
    pub fn has_dto(&self) -> bool {
        matches!(
            self,
            ClassKind::DbEntity | ClassKind::StandaloneEntity | ClassKind::External
        )
    }

    /// Precedence when one type is reached more than one way
    pub(crate) fn rank(&self) -> u8 {
        match self {
            ClassKind::DbContext => 6,
            ClassKind::DbEntity => 5,
            ClassKind::StandaloneEntity => 4,
            ClassKind::DataSource | ClassKind::Behaviors => 3,
            ClassKind::Service => 2,
            ClassKind::External => 1,
        }
    }
}

impl fmt::Display for ClassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClassKind::DbEntity => "entity",
            ClassKind::StandaloneEntity => "standalone entity",
            ClassKind::Service => "service",
            ClassKind::External => "external type",
            ClassKind::DataSource => "data source",
            ClassKind::Behaviors => "behaviors",
            ClassKind::DbContext => "db context",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Derived records
// ============================================================================

/// `[Index]` declared on an entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexInfo {
    pub name: String,
    pub properties: Vec<String>,
    pub is_unique: bool,
}

/// One resolved default ordering term
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderByTerm {
    /// Dotted property path from the ordered class (`AssignedTo.LastName`)
    pub field_path: String,
    pub direction: SortDirection,
}

impl OrderByTerm {
    pub fn new(field_path: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field_path: field_path.into(),
            direction,
        }
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.field_path.split('.')
    }
}

// ============================================================================
// ClassViewModel
// ============================================================================

#[derive(Clone)]
pub struct ClassViewModel {
    pub type_vm: TypeViewModel,
    pub key: TypeKey,
    pub kind: ClassKind,
    pub name: String,
    pub full_name: String,
    pub namespace: String,
    pub display_name: String,
    pub description: Option<String>,
    pub attributes: Vec<AttributeData>,
    pub properties: Vec<PropertyViewModel>,
    pub methods: Vec<MethodViewModel>,
    pub security: ClassSecurityInfo,
    pub is_abstract: bool,
    /// `[InternalUse]` on the class
    pub is_internal_use: bool,

    /// DbEntity: the DbContext exposing it and the `DbSet` property name
    pub db_context: Option<TypeKey>,
    pub db_set_name: Option<String>,
    pub table_name: String,
    pub indexes: Vec<IndexInfo>,

    /// DataSource/Behaviors: the entity served
    pub served_type: Option<TypeKey>,
    /// DataSource: `[DefaultDataSource]`
    pub is_default_data_source: bool,

    /// `[SemanticKernel]` description when exposed as a kernel plugin
    pub kernel_description: Option<String>,

    /// Resolved by [`resolve_default_orders`]
    pub default_order: Vec<OrderByTerm>,
}

impl ClassViewModel {
    pub fn new(type_vm: TypeViewModel, kind: ClassKind) -> Self {
        let key = type_vm.identity();
        let name = type_vm.name();
        let attributes = type_vm.attributes();

        let mut properties: Vec<PropertyViewModel> = type_vm
            .properties()
            .into_iter()
            .map(|p| PropertyViewModel::from_info(p, &name))
            .collect();
        if let Some(pk) = find_primary_key(&name, &properties) {
            properties[pk].role = PropertyRole::PrimaryKey;
        }

        let is_service_interface =
            kind == ClassKind::Service && type_vm.kind() == coalesce_core::TypeKind::Interface;
        let methods = type_vm
            .methods()
            .into_iter()
            .map(|m| {
                let mut method = MethodViewModel::from_info(m, &name);
                if is_service_interface {
                    method.is_exposed = true;
                }
                method
            })
            .collect();

        let table_name = attributes
            .attribute("Table")
            .and_then(|a| a.string(0, "Name"))
            .unwrap_or_else(|| name.clone());

        let mut class = Self {
            full_name: type_vm.qualified_name(),
            namespace: type_vm.namespace().unwrap_or_default(),
            display_name: attributes
                .attribute("Display")
                .and_then(|a| a.string(usize::MAX, "Name"))
                .unwrap_or_else(|| name.to_title_case()),
            description: attributes
                .attribute("Description")
                .and_then(|a| a.string(0, "Description")),
            security: ClassSecurityInfo::from_attributes(&attributes),
            is_abstract: type_vm.is_abstract(),
            is_internal_use: attributes.has_attribute("InternalUse"),
            db_context: None,
            db_set_name: None,
            indexes: Vec::new(),
            served_type: None,
            is_default_data_source: attributes.has_attribute("DefaultDataSource"),
            kernel_description: attributes
                .attribute("SemanticKernel")
                .map(|a| a.string(0, "Description").unwrap_or_default()),
            default_order: Vec::new(),
            table_name,
            properties,
            methods,
            attributes,
            name,
            kind,
            key,
            type_vm,
        };
        class.indexes = class.parse_indexes();
        class
    }

    fn parse_indexes(&self) -> Vec<IndexInfo> {
        let mut indexes: Vec<IndexInfo> = self
            .attributes
            .attributes_named("Index")
            .into_iter()
            .map(|a| {
                let properties: Vec<String> = a.args.iter().flat_map(|v| v.strings()).collect();
                IndexInfo {
                    name: a
                        .string(usize::MAX, "Name")
                        .unwrap_or_else(|| format!("IX_{}_{}", self.table_name, properties.join("_"))),
                    is_unique: a.named("IsUnique").and_then(|v| v.as_bool()).unwrap_or(false),
                    properties,
                }
            })
            .collect();

        // property-level [Index] / [Index(IsUnique = true)]
        for prop in &self.properties {
            if let Some(a) = prop.attribute("Index") {
                indexes.push(IndexInfo {
                    name: a
                        .string(usize::MAX, "Name")
                        .unwrap_or_else(|| format!("IX_{}_{}", self.table_name, prop.name)),
                    is_unique: a.named("IsUnique").and_then(|v| v.as_bool()).unwrap_or(false),
                    properties: vec![prop.name.clone()],
                });
            }
        }
        indexes
    }

    // ====================================================================
    // Members
    // ====================================================================

    /// Property by exact name, falling back to a case-insensitive match
    pub fn property(&self, name: &str) -> Option<&PropertyViewModel> {
        self.properties
            .iter()
            .find(|p| p.name == name)
            .or_else(|| self.properties.iter().find(|p| p.name.eq_ignore_ascii_case(name)))
    }

    pub fn property_mut(&mut self, name: &str) -> Option<&mut PropertyViewModel> {
        self.properties.iter_mut().find(|p| p.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&MethodViewModel> {
        self.methods
            .iter()
            .find(|m| m.name == name)
            .or_else(|| self.methods.iter().find(|m| m.name.eq_ignore_ascii_case(name)))
    }

    pub fn primary_key(&self) -> Option<&PropertyViewModel> {
        self.properties.iter().find(|p| p.is_primary_key())
    }

    pub fn client_properties(&self) -> impl Iterator<Item = &PropertyViewModel> {
        self.properties.iter().filter(|p| p.is_client_property())
    }

    pub fn client_methods(&self) -> impl Iterator<Item = &MethodViewModel> {
        self.methods.iter().filter(|m| m.is_client_method())
    }

    /// Properties carrying `[Search]`; the primary key alone when none do
    pub fn search_properties(&self) -> Vec<&PropertyViewModel> {
        let explicit: Vec<&PropertyViewModel> = self
            .properties
            .iter()
            .filter(|p| p.search.is_some() && p.is_client_property())
            .collect();
        if !explicit.is_empty() {
            return explicit;
        }
        self.primary_key().into_iter().collect()
    }

    /// `[ListText]`, else `Name`, else the primary key
    pub fn list_text_property(&self) -> Option<&PropertyViewModel> {
        self.properties
            .iter()
            .find(|p| p.is_list_text)
            .or_else(|| self.properties.iter().find(|p| p.name == "Name"))
            .or_else(|| self.primary_key())
    }

    /// DataSource: `[Coalesce]` properties bound from the request
    pub fn data_source_parameters(&self) -> impl Iterator<Item = &PropertyViewModel> {
        self.properties
            .iter()
            .filter(|p| p.has_attribute("Coalesce") && p.has_setter)
    }

    // ====================================================================
    // Names
    // ====================================================================

    pub fn is_crud_model(&self) -> bool {
        self.kind.is_crud_model()
    }

    pub fn is_db_entity(&self) -> bool {
        self.kind == ClassKind::DbEntity
    }

    pub fn is_service(&self) -> bool {
        self.kind == ClassKind::Service
    }

    pub fn has_dto(&self) -> bool {
        self.kind.has_dto()
    }

    pub fn dto_name(&self) -> String {
        format!("{}{}", self.name, DTO_SUFFIX)
    }

    /// Route segment of the generated controller (`api/Person`)
    pub fn api_route_name(&self) -> String {
        self.client_type_name()
    }

    pub fn controller_name(&self) -> String {
        format!("{}Controller", self.client_type_name())
    }

    /// Type name used in client code; interface services drop the `I`
    pub fn client_type_name(&self) -> String {
        if self.is_service() && self.type_vm.kind() == coalesce_core::TypeKind::Interface {
            if let Some(rest) = self.name.strip_prefix('I') {
                if rest.starts_with(|c: char| c.is_ascii_uppercase()) {
                    return rest.to_string();
                }
            }
        }
        self.name.clone()
    }

    pub fn view_model_class_name(&self) -> String {
        format!("{}ViewModel", self.client_type_name())
    }

    pub fn list_view_model_class_name(&self) -> String {
        format!("{}ListViewModel", self.client_type_name())
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.has_attribute(name)
    }
}

impl fmt::Debug for ClassViewModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassViewModel")
            .field("full_name", &self.full_name)
            .field("kind", &self.kind)
            .field("backend", &self.key.backend)
            .field("properties", &self.properties.len())
            .field("methods", &self.methods.len())
            .finish()
    }
}

/// `[Key]`, then `Id`, then `<ClassName>Id`
fn find_primary_key(class_name: &str, properties: &[PropertyViewModel]) -> Option<usize> {
    let conventional = format!("{}Id", class_name);
    properties
        .iter()
        .position(|p| p.has_attribute("Key"))
        .or_else(|| properties.iter().position(|p| p.name == "Id"))
        .or_else(|| properties.iter().position(|p| p.name == conventional))
}

// ============================================================================
// Relational linking
// ============================================================================

type ClassIndex = HashMap<TypeKey, usize>;

#[derive(Debug, Default)]
struct PropertyLinks {
    role: Option<PropertyRole>,
    foreign_key_principal_type: Option<TypeKey>,
    reference_navigation: Option<String>,
    foreign_key_property: Option<String>,
    inverse_property: Option<String>,
    foreign_key_on_target: Option<String>,
    many_to_many: Option<ManyToManyInfo>,
}

/// The DB entity a property navigates to, if any
fn navigation_target(classes: &[ClassViewModel], index: &ClassIndex, prop: &PropertyViewModel) -> Option<usize> {
    if prop.is_static || !prop.has_getter {
        return None;
    }
    let key = prop.pure_type().nullable_stripped().identity();
    index
        .get(&key)
        .copied()
        .filter(|&i| classes[i].is_db_entity())
}

/// The scalar foreign key backing reference navigation `nav`
fn reference_foreign_key(class: &ClassViewModel, nav: &PropertyViewModel, target: &ClassViewModel) -> Option<String> {
    let exists = |name: &str| class.properties.iter().any(|p| p.name == name && p.name != nav.name);

    if let Some(named) = nav.attribute("ForeignKey").and_then(|a| a.string(0, "Name")) {
        if exists(&named) {
            return Some(named);
        }
    }
    if let Some(p) = class.properties.iter().find(|p| {
        p.attribute("ForeignKey")
            .and_then(|a| a.string(0, "Name"))
            .is_some_and(|n| n == nav.name)
            && !p.type_vm.is_poco()
    }) {
        return Some(p.name.clone());
    }
    let by_id = format!("{}Id", nav.name);
    if exists(&by_id) {
        return Some(by_id);
    }
    let principal_key = target.primary_key()?;
    let by_key = format!("{}{}", nav.name, principal_key.name);
    exists(&by_key).then_some(by_key)
}

/// The reference navigation on `target` that is the inverse of collection
/// `coll` declared on `class`
fn collection_inverse(
    classes: &[ClassViewModel],
    index: &ClassIndex,
    class: &ClassViewModel,
    coll: &PropertyViewModel,
    target: &ClassViewModel,
) -> Option<String> {
    if let Some(named) = coll.attribute("InverseProperty").and_then(|a| a.string(0, "Property")) {
        return target.property(&named).map(|p| p.name.clone());
    }
    let candidates: Vec<&PropertyViewModel> = target
        .properties
        .iter()
        .filter(|p| !p.type_vm.is_collection())
        .filter(|p| navigation_target(classes, index, p).is_some_and(|i| classes[i].key == class.key))
        .collect();
    match candidates.as_slice() {
        [single] => Some(single.name.clone()),
        _ => None,
    }
}

fn class_links(classes: &[ClassViewModel], index: &ClassIndex, class: &ClassViewModel) -> HashMap<String, PropertyLinks> {
    let mut links: HashMap<String, PropertyLinks> = HashMap::new();

    for prop in &class.properties {
        if prop.is_primary_key() {
            continue;
        }
        let Some(target_index) = navigation_target(classes, index, prop) else {
            continue;
        };
        let target = &classes[target_index];

        if prop.type_vm.is_collection() {
            let inverse = collection_inverse(classes, index, class, prop, target);
            let foreign_key_on_target = inverse
                .as_deref()
                .and_then(|inv| target.property(inv))
                .and_then(|inv| reference_foreign_key(target, inv, class));

            let many_to_many = prop.attribute("ManyToMany").map(|a| {
                let far = target.properties.iter().find(|p| {
                    !p.type_vm.is_collection()
                        && Some(&p.name) != inverse.as_ref()
                        && navigation_target(classes, index, p).is_some()
                });
                ManyToManyInfo {
                    name: a.string(0, "CollectionName").unwrap_or_else(|| prop.name.clone()),
                    join_type: target.key.clone(),
                    near_navigation: inverse.clone(),
                    far_navigation: far.map(|p| p.name.clone()),
                    far_type: far.map(|p| p.pure_type().nullable_stripped().identity()),
                }
            });

            let entry = links.entry(prop.name.clone()).or_default();
            entry.role = Some(PropertyRole::CollectionNavigation);
            entry.inverse_property = inverse;
            entry.foreign_key_on_target = foreign_key_on_target;
            entry.many_to_many = many_to_many;
        } else {
            let fk = reference_foreign_key(class, prop, target);
            {
                let entry = links.entry(prop.name.clone()).or_default();
                entry.role = Some(PropertyRole::ReferenceNavigation);
                entry.foreign_key_property = fk.clone();
            }
            if let Some(fk) = fk {
                let is_pk = class.property(&fk).is_some_and(|p| p.is_primary_key());
                let entry = links.entry(fk).or_default();
                if !is_pk {
                    entry.role = Some(PropertyRole::ForeignKey);
                }
                entry.foreign_key_principal_type = Some(target.key.clone());
                entry.reference_navigation = Some(prop.name.clone());
            }
        }
    }
    links
}

/// Assign navigation and foreign-key roles across every class
pub(crate) fn link_relations(classes: &mut [ClassViewModel]) {
    let index: ClassIndex = classes
        .iter()
        .enumerate()
        .map(|(i, c)| (c.key.clone(), i))
        .collect();

    let all_links: Vec<HashMap<String, PropertyLinks>> = classes
        .iter()
        .map(|c| {
            if c.kind.has_dto() {
                class_links(classes, &index, c)
            } else {
                HashMap::new()
            }
        })
        .collect();

    for (class, links) in classes.iter_mut().zip(all_links) {
        for (name, link) in links {
            let Some(prop) = class.property_mut(&name) else {
                continue;
            };
            if let Some(role) = link.role {
                prop.role = role;
            }
            // navigations are written through their foreign keys
            prop.security.is_edit_blocked = prop.is_navigation();
            prop.foreign_key_principal_type = link.foreign_key_principal_type;
            prop.reference_navigation = link.reference_navigation;
            prop.foreign_key_property = link.foreign_key_property;
            prop.inverse_property = link.inverse_property;
            prop.foreign_key_on_target = link.foreign_key_on_target;
            prop.many_to_many = link.many_to_many;
        }
    }
}

// ============================================================================
// Default ordering
// ============================================================================

/// Explicit `[DefaultOrderBy]` properties, stable-sorted by `FieldOrder`
fn explicit_order(class: &ClassViewModel) -> Vec<&PropertyViewModel> {
    let mut props: Vec<&PropertyViewModel> = class
        .properties
        .iter()
        .filter(|p| p.default_order.is_some())
        .collect();
    props.sort_by_key(|p| p.default_order.as_ref().map(|o| o.field_order).unwrap_or(0));
    props
}

fn flip(direction: SortDirection) -> SortDirection {
    match direction {
        SortDirection::Ascending => SortDirection::Descending,
        SortDirection::Descending => SortDirection::Ascending,
    }
}

/// Explicit ordering of `class`, navigations composed into dotted paths
fn composed_order(
    classes: &[ClassViewModel],
    index: &ClassIndex,
    class_index: usize,
    visiting: &mut Vec<usize>,
) -> Vec<OrderByTerm> {
    let class = &classes[class_index];
    visiting.push(class_index);
    let mut terms = Vec::new();

    for prop in explicit_order(class) {
        let Some(order) = prop.default_order.as_ref() else {
            continue;
        };
        let direction = order.direction;
        let target = prop
            .is_reference_navigation()
            .then(|| index.get(&prop.pure_type().nullable_stripped().identity()).copied())
            .flatten();

        let Some(target_index) = target else {
            terms.push(OrderByTerm::new(prop.name.clone(), direction));
            continue;
        };
        let target_class = &classes[target_index];

        if let Some(field) = &order.field_name {
            terms.push(OrderByTerm::new(format!("{}.{}", prop.name, field), direction));
            continue;
        }

        let nested = if visiting.contains(&target_index) {
            Vec::new()
        } else {
            composed_order(classes, index, target_index, visiting)
        };

        if nested.is_empty() {
            // no orderable fields on the target: order by the navigation itself
            let field = target_class
                .list_text_property()
                .map(|p| p.name.clone())
                .unwrap_or_else(|| "Id".to_string());
            terms.push(OrderByTerm::new(format!("{}.{}", prop.name, field), direction));
        } else {
            for term in nested {
                let direction = if direction.is_descending() {
                    flip(term.direction)
                } else {
                    term.direction
                };
                terms.push(OrderByTerm::new(format!("{}.{}", prop.name, term.field_path), direction));
            }
        }
    }

    visiting.pop();
    terms
}

/// Resolve every class's default ordering
pub(crate) fn resolve_default_orders(classes: &mut [ClassViewModel]) {
    let index: ClassIndex = classes
        .iter()
        .enumerate()
        .map(|(i, c)| (c.key.clone(), i))
        .collect();

    let orders: Vec<Vec<OrderByTerm>> = (0..classes.len())
        .map(|i| {
            let explicit = composed_order(classes, &index, i, &mut Vec::new());
            if !explicit.is_empty() {
                return explicit;
            }
            let class = &classes[i];
            class
                .properties
                .iter()
                .find(|p| p.name == "Name" && p.is_scalar())
                .or_else(|| class.primary_key())
                .map(|p| vec![OrderByTerm::new(p.name.clone(), SortDirection::Ascending)])
                .unwrap_or_default()
        })
        .collect();

    for (class, order) in classes.iter_mut().zip(orders) {
        class.default_order = order;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::ClaimsPrincipal;
    use crate::testing;
    use pretty_assertions::assert_eq;

    fn order(terms: &[OrderByTerm]) -> Vec<(String, SortDirection)> {
        terms
            .iter()
            .map(|t| (t.field_path.clone(), t.direction))
            .collect()
    }

    // ── Kinds ────────────────────────────────────────────────────────────

    #[test]
    fn test_class_kinds() {
        for fixture in testing::both() {
            let kind = |name: &str| fixture.repo.require_class(name).unwrap().kind;
            assert_eq!(kind("Person"), ClassKind::DbEntity, "{}", fixture.backend);
            assert_eq!(kind("AppDbContext"), ClassKind::DbContext);
            assert_eq!(kind("IWeatherService"), ClassKind::Service);
            assert_eq!(kind("WeatherData"), ClassKind::External);
            assert_eq!(kind("BorCPeople"), ClassKind::DataSource);
            assert_eq!(kind("CaseBehaviors"), ClassKind::Behaviors);
            assert_eq!(kind("StandaloneReport"), ClassKind::StandaloneEntity);
        }
    }

    #[test]
    fn test_names() {
        for fixture in testing::both() {
            let service = fixture.repo.require_class("IWeatherService").unwrap();
            assert_eq!(service.client_type_name(), "WeatherService");
            assert_eq!(service.controller_name(), "WeatherServiceController");
            let case_product = fixture.repo.require_class("CaseProduct").unwrap();
            assert_eq!(case_product.display_name, "Case Product");
            assert_eq!(case_product.dto_name(), "CaseProductDtoGen");
            assert_eq!(case_product.db_set_name.as_deref(), Some("CaseProducts"));
        }
    }

    // ── Roles ────────────────────────────────────────────────────────────

    #[test]
    fn test_primary_keys() {
        for fixture in testing::both() {
            let pk = |name: &str| {
                fixture
                    .repo
                    .require_class(name)
                    .unwrap()
                    .primary_key()
                    .map(|p| p.name.clone())
            };
            assert_eq!(pk("Person").as_deref(), Some("PersonId"), "{}", fixture.backend);
            assert_eq!(pk("Case").as_deref(), Some("CaseKey"));
            assert_eq!(pk("StandaloneReport").as_deref(), Some("Id"));
        }
    }

    #[test]
    fn test_navigation_and_foreign_key_roles() {
        for fixture in testing::both() {
            let case = fixture.repo.require_class("Case").unwrap();
            let assigned = case.property("AssignedTo").unwrap();
            assert_eq!(assigned.role, PropertyRole::ReferenceNavigation, "{}", fixture.backend);
            assert_eq!(assigned.foreign_key_property.as_deref(), Some("AssignedToId"));

            let fk = case.property("AssignedToId").unwrap();
            assert_eq!(fk.role, PropertyRole::ForeignKey);
            assert_eq!(fk.reference_navigation.as_deref(), Some("AssignedTo"));
            assert_eq!(fk.foreign_key_principal_type.as_ref().unwrap().name, "MyProject.Models.Person");

            let person = fixture.repo.require_class("Person").unwrap();
            let company_id = person.property("CompanyId").unwrap();
            assert_eq!(company_id.role, PropertyRole::ForeignKey, "{}", fixture.backend);

            let case_product = fixture.repo.require_class("CaseProduct").unwrap();
            assert_eq!(case_product.property("CaseId").unwrap().role, PropertyRole::ForeignKey);
            assert_eq!(case_product.property("ProductId").unwrap().role, PropertyRole::ForeignKey);
        }
    }

    #[test]
    fn test_collection_inverse_and_foreign_key_on_target() {
        for fixture in testing::both() {
            let person = fixture.repo.require_class("Person").unwrap();
            let assigned = person.property("CasesAssigned").unwrap();
            assert_eq!(assigned.role, PropertyRole::CollectionNavigation, "{}", fixture.backend);
            assert_eq!(assigned.inverse_property.as_deref(), Some("AssignedTo"));
            assert_eq!(assigned.foreign_key_on_target.as_deref(), Some("AssignedToId"));

            let company = fixture.repo.require_class("Company").unwrap();
            let employees = company.property("Employees").unwrap();
            assert_eq!(employees.inverse_property.as_deref(), Some("Company"));
            assert_eq!(employees.foreign_key_on_target.as_deref(), Some("CompanyId"));
        }
    }

    #[test]
    fn test_many_to_many() {
        for fixture in testing::both() {
            let case = fixture.repo.require_class("Case").unwrap();
            let info = case.property("CaseProducts").unwrap().many_to_many.clone().unwrap();
            assert_eq!(info.name, "Products", "{}", fixture.backend);
            assert_eq!(info.join_type.name, "MyProject.Models.CaseProduct");
            assert_eq!(info.near_navigation.as_deref(), Some("Case"));
            assert_eq!(info.far_navigation.as_deref(), Some("Product"));
            assert_eq!(info.far_type.unwrap().name, "MyProject.Models.Product");
        }
    }

    #[test]
    fn test_external_types_have_no_navigations() {
        for fixture in testing::both() {
            let weather = fixture.repo.require_class("WeatherData").unwrap();
            assert!(weather.properties.iter().all(|p| !p.is_navigation()));
            assert!(weather.primary_key().is_none());
        }
    }

    // ── Default ordering ─────────────────────────────────────────────────

    #[test]
    fn test_default_order_composes_navigation_fields() {
        for fixture in testing::both() {
            let case = fixture.repo.require_class("Case").unwrap();
            assert_eq!(
                order(&case.default_order),
                vec![
                    ("AssignedTo.LastName".to_string(), SortDirection::Ascending),
                    ("AssignedTo.FirstName".to_string(), SortDirection::Ascending),
                    ("OpenedAt".to_string(), SortDirection::Descending),
                ],
                "{}",
                fixture.backend
            );
        }
    }

    #[test]
    fn test_default_order_falls_back_to_navigation() {
        for fixture in testing::both() {
            let case_product = fixture.repo.require_class("CaseProduct").unwrap();
            assert_eq!(
                order(&case_product.default_order),
                vec![("Product.Name".to_string(), SortDirection::Ascending)],
                "{}",
                fixture.backend
            );
        }
    }

    #[test]
    fn test_default_order_by_name_then_key() {
        for fixture in testing::both() {
            let company = fixture.repo.require_class("Company").unwrap();
            assert_eq!(
                order(&company.default_order),
                vec![("Name".to_string(), SortDirection::Ascending)]
            );
            let complex = fixture.repo.require_class("ComplexModel").unwrap();
            assert_eq!(
                order(&complex.default_order),
                vec![("ComplexModelId".to_string(), SortDirection::Ascending)],
                "{}",
                fixture.backend
            );
        }
    }

    // ── Security and indexes ─────────────────────────────────────────────

    #[test]
    fn test_class_security() {
        for fixture in testing::both() {
            let case = fixture.repo.require_class("Case").unwrap();
            let user = ClaimsPrincipal::authenticated("u");
            let admin = ClaimsPrincipal::authenticated("a").with_role("Admin");
            assert!(case.security.is_read_allowed(&user));
            assert!(!case.security.is_create_allowed(&user), "{}", fixture.backend);
            assert!(case.security.is_create_allowed(&admin));
            assert!(!case.security.is_delete_allowed(&admin));
            assert!(!case.security.is_read_allowed(&ClaimsPrincipal::anonymous()));

            let product = fixture.repo.require_class("Product").unwrap();
            assert!(product.security.is_read_allowed(&ClaimsPrincipal::anonymous()));
        }
    }

    #[test]
    fn test_unique_index() {
        for fixture in testing::both() {
            let product = fixture.repo.require_class("Product").unwrap();
            assert_eq!(
                product.indexes,
                vec![IndexInfo {
                    name: "IX_Product_UniqueId1".to_string(),
                    properties: vec!["UniqueId1".to_string()],
                    is_unique: true,
                }],
                "{}",
                fixture.backend
            );
        }
    }

    #[test]
    fn test_search_and_list_text() {
        for fixture in testing::both() {
            let company = fixture.repo.require_class("Company").unwrap();
            let search: Vec<&str> = company.search_properties().iter().map(|p| p.name.as_str()).collect();
            assert_eq!(search, vec!["Name", "LogoUrl"]);
            let product = fixture.repo.require_class("Product").unwrap();
            assert_eq!(product.list_text_property().unwrap().name, "Name");
            let person = fixture.repo.require_class("Person").unwrap();
            assert_eq!(person.search_properties()[0].name, "PersonId");
        }
    }
}
