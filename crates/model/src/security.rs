//! Security model
//!
//! Attribute-derived permissions for classes, properties and methods, checked
//! against a [`ClaimsPrincipal`]. Role names in attributes are expanded through
//! the process-wide [`RoleMapping`] at check time.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use coalesce_core::SecurityPermissionLevel;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::attributes::{AttributeData, AttributeValue};

// ============================================================================
// ClaimsPrincipal
// ============================================================================

/// The current user
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClaimsPrincipal {
    name: Option<String>,
    authenticated: bool,
    roles: BTreeSet<String>,
    claims: Vec<(String, String)>,
}

impl ClaimsPrincipal {
    /// An unauthenticated user
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// An authenticated user with no roles
    pub fn authenticated(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            authenticated: true,
            ..Self::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn with_claim(mut self, claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.push((claim_type.into(), value.into()));
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn is_in_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(String::as_str)
    }

    /// First value of a claim type
    pub fn claim(&self, claim_type: &str) -> Option<&str> {
        self.claims
            .iter()
            .find(|(t, _)| t == claim_type)
            .map(|(_, v)| v.as_str())
    }
}

// ============================================================================
// RoleMapping
// ============================================================================

static ROLE_MAPPINGS: LazyLock<RwLock<HashMap<String, BTreeSet<String>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Process-wide expansion of role names used in security attributes
///
/// `RoleMapping::add("Admin", "SuperUser")` makes `[Read(Roles = "Admin")]`
/// also admit users in the `SuperUser` role.
pub struct RoleMapping;

impl RoleMapping {
    pub fn add(role: &str, mapped_role: &str) {
        ROLE_MAPPINGS
            .write()
            .entry(role.to_string())
            .or_default()
            .insert(mapped_role.to_string());
    }

    pub fn remove(role: &str, mapped_role: &str) {
        let mut mappings = ROLE_MAPPINGS.write();
        if let Some(set) = mappings.get_mut(role) {
            set.remove(mapped_role);
            if set.is_empty() {
                mappings.remove(role);
            }
        }
    }

    pub fn clear() {
        ROLE_MAPPINGS.write().clear();
    }

    /// The roles plus everything they map to, without duplicates
    pub fn expand(roles: &[String]) -> Vec<String> {
        let mappings = ROLE_MAPPINGS.read();
        let mut expanded: Vec<String> = Vec::new();
        for role in roles {
            if !expanded.contains(role) {
                expanded.push(role.clone());
            }
            if let Some(mapped) = mappings.get(role) {
                for m in mapped {
                    if !expanded.contains(m) {
                        expanded.push(m.clone());
                    }
                }
            }
        }
        expanded
    }
}

// ============================================================================
// SecurityPermission
// ============================================================================

/// One permission rule (`[Read]`, `[Edit]`, `[Create]`, `[Delete]`,
/// `[Execute]`)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SecurityPermission {
    pub name: String,
    pub level: SecurityPermissionLevel,
    pub roles: Vec<String>,
    /// Whether the rule came from an explicit attribute
    pub is_explicit: bool,
}

impl SecurityPermission {
    pub fn new(name: &str, level: SecurityPermissionLevel) -> Self {
        Self {
            name: name.to_string(),
            level,
            roles: Vec::new(),
            is_explicit: false,
        }
    }

    /// Read a rule from an attribute, or use `default` when absent
    pub fn from_attribute(
        name: &str,
        attribute: Option<&AttributeData>,
        default: SecurityPermissionLevel,
    ) -> Self {
        let Some(attr) = attribute else {
            return Self::new(name, default);
        };

        let mut level = None;
        let mut roles: Vec<String> = Vec::new();

        let mut absorb = |value: &AttributeValue, level: &mut Option<SecurityPermissionLevel>| {
            match value {
                AttributeValue::Enum { member, .. } => match SecurityPermissionLevel::parse(member) {
                    Some(parsed) => *level = Some(parsed),
                    None => roles.push(member.clone()),
                },
                other => roles.extend(other.strings()),
            }
        };

        for arg in &attr.args {
            absorb(arg, &mut level);
        }
        if let Some(value) = attr.named("PermissionLevel") {
            absorb(value, &mut level);
        }
        if let Some(value) = attr.named("Roles") {
            absorb(value, &mut level);
        }

        let roles: Vec<String> = roles
            .iter()
            .flat_map(|r| r.split(','))
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();

        let level = match level {
            Some(level) => level,
            None if roles.is_empty() => default,
            None => SecurityPermissionLevel::AllowAuthenticated,
        };

        Self {
            name: name.to_string(),
            level,
            roles,
            is_explicit: true,
        }
    }

    pub fn has_roles(&self) -> bool {
        !self.roles.is_empty()
    }

    /// Roles after `RoleMapping` expansion
    pub fn expanded_roles(&self) -> Vec<String> {
        RoleMapping::expand(&self.roles)
    }

    pub fn is_allowed(&self, user: &ClaimsPrincipal) -> bool {
        match self.level {
            SecurityPermissionLevel::AllowAll => true,
            SecurityPermissionLevel::DenyAll => false,
            SecurityPermissionLevel::AllowAuthenticated => {
                user.is_authenticated()
                    && (self.roles.is_empty()
                        || self.expanded_roles().iter().any(|r| user.is_in_role(r)))
            }
        }
    }

    /// Short human description (`Allow All`, `Roles: Admin, User`)
    pub fn describe(&self) -> String {
        if self.level == SecurityPermissionLevel::AllowAuthenticated && self.has_roles() {
            format!("Roles: {}", self.roles.join(", "))
        } else {
            self.level.display_name().to_string()
        }
    }
}

// ============================================================================
// Class / property / method security
// ============================================================================

/// Class-level CRUD permissions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassSecurityInfo {
    pub read: SecurityPermission,
    pub create: SecurityPermission,
    pub edit: SecurityPermission,
    pub delete: SecurityPermission,
}

impl ClassSecurityInfo {
    pub fn from_attributes(attributes: &[AttributeData]) -> Self {
        use crate::attributes::AttributeSliceExt;
        let default = SecurityPermissionLevel::AllowAuthenticated;
        Self {
            read: SecurityPermission::from_attribute("Read", attributes.attribute("Read"), default),
            create: SecurityPermission::from_attribute("Create", attributes.attribute("Create"), default),
            edit: SecurityPermission::from_attribute("Edit", attributes.attribute("Edit"), default),
            delete: SecurityPermission::from_attribute("Delete", attributes.attribute("Delete"), default),
        }
    }

    pub fn is_read_allowed(&self, user: &ClaimsPrincipal) -> bool {
        self.read.is_allowed(user)
    }

    pub fn is_create_allowed(&self, user: &ClaimsPrincipal) -> bool {
        self.create.is_allowed(user)
    }

    pub fn is_edit_allowed(&self, user: &ClaimsPrincipal) -> bool {
        self.edit.is_allowed(user)
    }

    pub fn is_delete_allowed(&self, user: &ClaimsPrincipal) -> bool {
        self.delete.is_allowed(user)
    }

    /// Whether a save is allowed; `is_create` selects between create and edit
    pub fn is_save_allowed(&self, user: &ClaimsPrincipal, is_create: bool) -> bool {
        if is_create {
            self.is_create_allowed(user)
        } else {
            self.is_edit_allowed(user)
        }
    }
}

/// Property-level permissions
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySecurityInfo {
    pub read: SecurityPermission,
    pub edit: SecurityPermission,
    /// `[Restrict(typeof(T))]` restriction type names
    pub restrictions: Vec<String>,
    /// `[Read]` with no roles: the property is never client-writable
    pub is_read_only: bool,
    pub has_setter: bool,
    pub is_init_only: bool,
    /// Navigations and primary keys are not edited through the property
    pub is_edit_blocked: bool,
}

impl PropertySecurityInfo {
    pub fn is_readable(&self, user: &ClaimsPrincipal) -> bool {
        self.read.is_allowed(user)
    }

    /// Writable on an existing entity
    pub fn is_editable(&self, user: &ClaimsPrincipal) -> bool {
        self.has_setter
            && !self.is_init_only
            && !self.is_read_only
            && !self.is_edit_blocked
            && self.is_readable(user)
            && self.edit.is_allowed(user)
    }

    /// Writable when the entity is first created
    pub fn is_initable(&self, user: &ClaimsPrincipal) -> bool {
        self.has_setter
            && !self.is_read_only
            && self.is_readable(user)
            && self.edit.is_allowed(user)
    }

    pub fn has_restrictions(&self) -> bool {
        !self.restrictions.is_empty()
    }
}

/// Method-level permission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodSecurityInfo {
    pub execute: SecurityPermission,
}

impl MethodSecurityInfo {
    pub fn from_attributes(attributes: &[AttributeData]) -> Self {
        use crate::attributes::AttributeSliceExt;
        Self {
            execute: SecurityPermission::from_attribute(
                "Execute",
                attributes.attribute("Execute"),
                SecurityPermissionLevel::AllowAuthenticated,
            ),
        }
    }

    pub fn is_executable(&self, user: &ClaimsPrincipal) -> bool {
        self.execute.is_allowed(user)
    }
}

// ============================================================================
// Tests
// ============================================================================
