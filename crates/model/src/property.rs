//! # PropertyViewModel
//!
//! One member of a [`ClassViewModel`](crate::ClassViewModel). Attribute-derived
//! facts are read once at construction; relational facts (role, foreign key,
//! inverse, many-to-many) are filled in by the class builder once the whole
//! model is known.

use std::fmt;
use std::sync::Arc;

use coalesce_core::{PropertyRole, SearchMethod, SecurityPermissionLevel, SortDirection, ValidationRule};
use heck::{ToLowerCamelCase, ToTitleCase};
use serde::Serialize;

use crate::attributes::{AttributeData, AttributeSliceExt};
use crate::security::{PropertySecurityInfo, SecurityPermission};
use crate::type_info::PropertyInfo;
use crate::type_view_model::{TypeKey, TypeViewModel};

// ============================================================================
// Attribute-derived records
// ============================================================================

/// `[Search]` configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchInfo {
    pub method: SearchMethod,
    pub is_split_on_spaces: bool,
}

/// `[DefaultOrderBy]` configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DefaultOrderInfo {
    pub field_order: i64,
    pub direction: SortDirection,
    /// Field of the navigation target to order by
    pub field_name: Option<String>,
}

/// `[ManyToMany]` metadata of a collection navigation through a join entity
#[derive(Debug, Clone, PartialEq)]
pub struct ManyToManyInfo {
    /// Name of the generated far-side collection (`Products`)
    pub name: String,
    /// The join entity (`CaseProduct`)
    pub join_type: TypeKey,
    /// Navigation on the join entity pointing back at the declaring class
    pub near_navigation: Option<String>,
    /// Navigation on the join entity pointing at the far side
    pub far_navigation: Option<String>,
    pub far_type: Option<TypeKey>,
}

// ============================================================================
// PropertyViewModel
// ============================================================================

/// One public property of a modeled class
#[derive(Clone)]
pub struct PropertyViewModel {
    info: Arc<dyn PropertyInfo>,

    /// Property name as declared
    pub name: String,

    /// camelCase name used in JSON and client code
    pub json_name: String,

    /// Name of the declaring class
    pub parent_name: String,

    pub type_vm: TypeViewModel,
    pub attributes: Vec<AttributeData>,
    pub role: PropertyRole,

    pub display_name: String,
    pub description: Option<String>,

    pub has_getter: bool,
    pub has_setter: bool,
    pub is_init_only: bool,
    pub is_static: bool,

    /// `[InternalUse]`: never exposed to clients
    pub is_internal_use: bool,
    /// `[Hidden]`
    pub is_hidden: bool,
    /// `[ListText]`
    pub is_list_text: bool,
    /// `[NotMapped]` or computed (no setter)
    pub is_db_mapped: bool,

    pub search: Option<SearchInfo>,
    pub list_group: Option<String>,
    pub default_order: Option<DefaultOrderInfo>,
    pub validation: Vec<ValidationRule>,
    pub security: PropertySecurityInfo,

    /// `[DtoIncludes]` content views
    pub dto_includes: Vec<String>,
    /// `[DtoExcludes]` content views
    pub dto_excludes: Vec<String>,

    /// Foreign keys: the principal class
    pub foreign_key_principal_type: Option<TypeKey>,
    /// Foreign keys: the navigation this key backs
    pub reference_navigation: Option<String>,
    /// Reference navigations: the foreign key property
    pub foreign_key_property: Option<String>,
    /// Collection navigations: the inverse reference navigation on the target
    pub inverse_property: Option<String>,
    /// Collection navigations: the foreign key on the target pointing back
    pub foreign_key_on_target: Option<String>,
    pub many_to_many: Option<ManyToManyInfo>,
}

impl PropertyViewModel {
    /// Read everything that depends only on the property itself
    pub(crate) fn from_info(info: Arc<dyn PropertyInfo>, parent_name: &str) -> Self {
        let name = info.name();
        let attributes = info.attributes();
        let type_vm = TypeViewModel::new(info.property_type());
        let has_getter = info.has_getter();
        let has_setter = info.has_setter();
        let is_init_only = info.is_init_only();

        let display_name = attributes
            .attribute("Display")
            .and_then(|a| a.string(usize::MAX, "Name"))
            .or_else(|| attributes.attribute("DisplayName").and_then(|a| a.string(0, "DisplayName")))
            .unwrap_or_else(|| name.to_title_case());

        let description = attributes
            .attribute("Description")
            .and_then(|a| a.string(0, "Description"))
            .or_else(|| {
                attributes
                    .attribute("Display")
                    .and_then(|a| a.string(usize::MAX, "Description"))
            });

        let read_attr = attributes.attribute("Read");
        let read = SecurityPermission::from_attribute("Read", read_attr, SecurityPermissionLevel::AllowAll);
        let edit = SecurityPermission::from_attribute(
            "Edit",
            attributes.attribute("Edit"),
            SecurityPermissionLevel::AllowAll,
        );
        let is_read_only = read_attr.is_some() && !read.has_roles() && read_attr.is_some_and(|a| a.args.is_empty() && a.named.is_empty());

        let restrictions = attributes
            .attributes_named("Restrict")
            .iter()
            .flat_map(|a| a.args.iter().chain(a.named.iter().map(|(_, v)| v)))
            .filter_map(|v| v.as_type().map(|t| t.qualified_name()))
            .collect();

        let is_internal_use = attributes.has_attribute("InternalUse");

        Self {
            json_name: name.to_lower_camel_case(),
            parent_name: parent_name.to_string(),
            role: PropertyRole::Value,
            display_name,
            description,
            has_getter,
            has_setter,
            is_init_only,
            is_static: info.is_static(),
            is_internal_use,
            is_hidden: attributes.has_attribute("Hidden"),
            is_list_text: attributes.has_attribute("ListText"),
            is_db_mapped: has_setter && !attributes.has_attribute("NotMapped"),
            search: parse_search(&attributes),
            list_group: attributes
                .attribute("ListGroup")
                .and_then(|a| a.string(0, "Group")),
            default_order: parse_default_order(&attributes),
            validation: parse_validation(&attributes),
            security: PropertySecurityInfo {
                read,
                edit,
                restrictions,
                is_read_only,
                has_setter,
                is_init_only,
                is_edit_blocked: false,
            },
            dto_includes: content_views(&attributes, "DtoIncludes"),
            dto_excludes: content_views(&attributes, "DtoExcludes"),
            foreign_key_principal_type: None,
            reference_navigation: None,
            foreign_key_property: None,
            inverse_property: None,
            foreign_key_on_target: None,
            many_to_many: None,
            name,
            type_vm,
            attributes,
            info,
        }
    }

    pub fn info(&self) -> &Arc<dyn PropertyInfo> {
        &self.info
    }

    pub fn pure_type(&self) -> TypeViewModel {
        self.type_vm.pure_type()
    }

    pub fn is_primary_key(&self) -> bool {
        self.role == PropertyRole::PrimaryKey
    }

    pub fn is_foreign_key(&self) -> bool {
        self.role == PropertyRole::ForeignKey
    }

    pub fn is_reference_navigation(&self) -> bool {
        self.role == PropertyRole::ReferenceNavigation
    }

    pub fn is_collection_navigation(&self) -> bool {
        self.role == PropertyRole::CollectionNavigation
    }

    pub fn is_navigation(&self) -> bool {
        self.role.is_navigation()
    }

    /// Exposed to clients (DTOs, metadata, list results)
    pub fn is_client_property(&self) -> bool {
        !self.is_internal_use && self.has_getter && !self.is_static
    }

    /// Scalar values that can be filtered and sorted on directly
    pub fn is_scalar(&self) -> bool {
        !self.is_navigation() && !self.type_vm.is_collection() && !self.type_vm.is_poco()
    }

    pub fn is_required(&self) -> bool {
        self.validation.contains(&ValidationRule::Required)
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.has_attribute(name)
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeData> {
        self.attributes.attribute(name)
    }

    /// Whether this property is part of the DTO for a content view
    /// (`includes` query parameter)
    pub fn is_included_for(&self, includes: Option<&str>) -> bool {
        let matches = |views: &[String]| {
            includes.is_some_and(|inc| {
                inc.split(',')
                    .any(|i| views.iter().any(|v| v.eq_ignore_ascii_case(i.trim())))
            })
        };
        if !self.dto_includes.is_empty() && !matches(&self.dto_includes) {
            return false;
        }
        !(!self.dto_excludes.is_empty() && matches(&self.dto_excludes))
    }
}

impl fmt::Debug for PropertyViewModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyViewModel")
            .field("name", &self.name)
            .field("type", &self.type_vm.full_name())
            .field("role", &self.role)
            .finish()
    }
}

// ============================================================================
// Attribute parsing
// ============================================================================

fn parse_search(attributes: &[AttributeData]) -> Option<SearchInfo> {
    let attr = attributes.attribute("Search")?;
    Some(SearchInfo {
        method: attr
            .named("SearchMethod")
            .and_then(|v| v.as_enum_member())
            .and_then(SearchMethod::parse)
            .unwrap_or_default(),
        is_split_on_spaces: attr
            .named("IsSplitOnSpaces")
            .and_then(|v| v.as_bool())
            .unwrap_or(true),
    })
}

fn parse_default_order(attributes: &[AttributeData]) -> Option<DefaultOrderInfo> {
    let attr = attributes.attribute("DefaultOrderBy")?;
    Some(DefaultOrderInfo {
        field_order: attr
            .value(0, "FieldOrder")
            .and_then(|v| v.as_i64())
            .unwrap_or(0),
        direction: attr
            .value(1, "OrderByDirection")
            .and_then(|v| v.as_enum_member())
            .and_then(SortDirection::parse)
            .unwrap_or_default(),
        field_name: attr.string(usize::MAX, "FieldName"),
    })
}

pub(crate) fn parse_validation(attributes: &[AttributeData]) -> Vec<ValidationRule> {
    let mut rules = Vec::new();
    for attr in attributes {
        match attr.name.as_str() {
            "Required" => rules.push(ValidationRule::Required),
            "MaxLength" => {
                if let Some(n) = attr.value(0, "Length").and_then(|v| v.as_i64()) {
                    rules.push(ValidationRule::MaxLength(n.max(0) as usize));
                }
            }
            "MinLength" => {
                if let Some(n) = attr.value(0, "Length").and_then(|v| v.as_i64()) {
                    rules.push(ValidationRule::MinLength(n.max(0) as usize));
                }
            }
            "StringLength" => {
                if let Some(n) = attr.value(0, "MaximumLength").and_then(|v| v.as_i64()) {
                    rules.push(ValidationRule::MaxLength(n.max(0) as usize));
                }
                if let Some(n) = attr.named("MinimumLength").and_then(|v| v.as_i64()) {
                    rules.push(ValidationRule::MinLength(n.max(0) as usize));
                }
            }
            "Range" => {
                let min = attr.value(0, "Minimum").and_then(|v| v.as_f64());
                let max = attr.value(1, "Maximum").and_then(|v| v.as_f64());
                if let (Some(min), Some(max)) = (min, max) {
                    rules.push(ValidationRule::Range { min, max });
                }
            }
            "RegularExpression" => {
                if let Some(regex) = attr.string(0, "Pattern") {
                    rules.push(ValidationRule::Pattern {
                        regex,
                        message: attr.string(usize::MAX, "ErrorMessage").unwrap_or_default(),
                    });
                }
            }
            "EmailAddress" => rules.push(ValidationRule::Email),
            "Url" => rules.push(ValidationRule::Url),
            _ => {}
        }
    }
    rules
}

fn content_views(attributes: &[AttributeData], name: &str) -> Vec<String> {
    attributes
        .attributes_named(name)
        .iter()
        .flat_map(|a| a.args.iter().flat_map(|v| v.strings()))
        .flat_map(|s| s.split(',').map(|p| p.trim().to_string()).collect::<Vec<_>>())
        .filter(|s| !s.is_empty())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::security::ClaimsPrincipal;
    use crate::testing;
    use coalesce_core::{PropertyRole, SearchMethod, ValidationRule};

    #[test]
    fn test_display_names() {
        for fixture in testing::both() {
            let product = fixture.repo.require_class("Product").unwrap();
            assert_eq!(product.property("UniqueId1").unwrap().display_name, "ID1");
            assert_eq!(product.property("ProductId").unwrap().display_name, "Product Id");
        }
    }

    #[test]
    fn test_search_info() {
        for fixture in testing::both() {
            let company = fixture.repo.require_class("Company").unwrap();
            let name = company.property("Name").unwrap();
            assert_eq!(name.search.unwrap().method, SearchMethod::Contains, "{}", fixture.backend);
            assert!(name.search.unwrap().is_split_on_spaces);
            assert!(company.property("City").unwrap().search.is_none());
        }
    }

    #[test]
    fn test_validation_rules() {
        for fixture in testing::both() {
            let person = fixture.repo.require_class("Person").unwrap();
            let first = person.property("FirstName").unwrap();
            assert!(first.is_required(), "{}", fixture.backend);
            assert!(first.validation.contains(&ValidationRule::MaxLength(75)));

            let complex = fixture.repo.require_class("ComplexModel").unwrap();
            let range = complex.property("RangeValue").unwrap();
            assert_eq!(
                range.validation,
                vec![ValidationRule::Range { min: 1.0, max: 100.0 }]
            );
        }
    }

    #[test]
    fn test_accessor_shapes() {
        for fixture in testing::both() {
            let complex = fixture.repo.require_class("ComplexModel").unwrap();
            let user = ClaimsPrincipal::authenticated("u");

            let init = complex.property("InitOnly").unwrap();
            assert!(init.is_init_only, "{}", fixture.backend);
            assert!(!init.security.is_editable(&user));
            assert!(init.security.is_initable(&user));

            let read_only = complex.property("ReadOnly").unwrap();
            assert!(!read_only.has_setter, "{}", fixture.backend);
            assert!(!read_only.security.is_initable(&user));

            let private_set = complex.property("PrivateSet").unwrap();
            assert!(private_set.has_getter);
            assert!(!private_set.has_setter, "{}", fixture.backend);
        }
    }

    #[test]
    fn test_property_read_and_edit_roles() {
        for fixture in testing::both() {
            let complex = fixture.repo.require_class("ComplexModel").unwrap();
            let user = ClaimsPrincipal::authenticated("u");
            let admin = ClaimsPrincipal::authenticated("a").with_role("Admin");

            let readable = complex.property("AdminReadable").unwrap();
            assert!(!readable.security.is_readable(&user), "{}", fixture.backend);
            assert!(readable.security.is_readable(&admin));

            let editable = complex.property("AdminEditable").unwrap();
            assert!(editable.security.is_readable(&user));
            assert!(!editable.security.is_editable(&user));
            assert!(editable.security.is_editable(&admin));
        }
    }

    #[test]
    fn test_restrictions_and_list_group() {
        for fixture in testing::both() {
            let complex = fixture.repo.require_class("ComplexModel").unwrap();
            let restricted = complex.property("RestrictedString").unwrap();
            assert_eq!(
                restricted.security.restrictions,
                vec!["MyProject.Models.ComplexModelRestriction".to_string()],
                "{}",
                fixture.backend
            );
            let grouped = complex.property("Grouped").unwrap();
            assert_eq!(grouped.list_group.as_deref(), Some("Group1"));
        }
    }

    #[test]
    fn test_internal_use_is_not_client_property() {
        for fixture in testing::both() {
            let person = fixture.repo.require_class("Person").unwrap();
            let secret = person.property("SecretNote").unwrap();
            assert!(secret.is_internal_use);
            assert!(!secret.is_client_property());
            assert_eq!(secret.role, PropertyRole::Value);
        }
    }
}
