//! Model validation
//!
//! Checks a built [`ReflectionRepository`] for shapes that would generate
//! code that does not compile or behaves surprisingly at runtime. Errors
//! fail generation; warnings are reported and generation continues.

use std::collections::HashMap;

use coalesce_core::{CoalesceError, CoalesceResult};

use crate::class::ClassKind;
use crate::method::ParameterInjection;
use crate::repository::ReflectionRepository;

// ============================================================================
// ValidationResult
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
    }

    pub fn add_warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Fails with every error message joined
    pub fn to_result(&self) -> CoalesceResult<()> {
        if self.is_valid() {
            return Ok(());
        }
        let msg = self
            .errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Err(CoalesceError::validation(msg))
    }
}

// ============================================================================
// ValidationIssue
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IssueCode {
    NoPrimaryKey,
    DuplicateClientName,
    OrphanDataSource,
    MultipleDefaultDataSources,
    UnsupportedParameter,
    InstanceMethodOnNonEntity,
    MissingForeignKey,
    MissingInverse,
    UnknownOrderField,
}

#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub code: IssueCode,
    pub message: String,
    /// `Class.Member` the issue concerns
    pub path: String,
}

impl ValidationIssue {
    pub fn new(code: IssueCode, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            path: path.into(),
        }
    }
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.path, self.message)
    }
}

// ============================================================================
// Rules
// ============================================================================

/// One check over the whole repository
pub trait RepositoryRule {
    fn name(&self) -> &'static str;
    fn validate(&self, repo: &ReflectionRepository) -> ValidationResult;
}

/// Runs a set of [`RepositoryRule`]s
#[derive(Default)]
pub struct Validator {
    rules: Vec<Box<dyn RepositoryRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_rules() -> Self {
        let mut validator = Self::new();
        validator.add_rule(Box::new(KeysRule));
        validator.add_rule(Box::new(ClientNamesRule));
        validator.add_rule(Box::new(StrategiesRule));
        validator.add_rule(Box::new(MethodsRule));
        validator.add_rule(Box::new(RelationsRule));
        validator
    }

    pub fn add_rule(&mut self, rule: Box<dyn RepositoryRule>) {
        self.rules.push(rule);
    }

    pub fn validate(&self, repo: &ReflectionRepository) -> ValidationResult {
        let mut result = ValidationResult::ok();
        for rule in &self.rules {
            let rule_result = rule.validate(repo);
            tracing::debug!(
                rule = rule.name(),
                errors = rule_result.errors.len(),
                warnings = rule_result.warnings.len(),
                "Validation rule ran"
            );
            result.merge(rule_result);
        }
        result
    }
}

/// Validate with the default rules
pub fn validate_repository(repo: &ReflectionRepository) -> ValidationResult {
    Validator::with_default_rules().validate(repo)
}

/// CRUD models need a primary key
pub struct KeysRule;

impl RepositoryRule for KeysRule {
    fn name(&self) -> &'static str {
        "keys"
    }

    fn validate(&self, repo: &ReflectionRepository) -> ValidationResult {
        let mut result = ValidationResult::ok();
        for class in repo.crud_models() {
            if class.primary_key().is_none() {
                result.add_error(ValidationIssue::new(
                    IssueCode::NoPrimaryKey,
                    &class.name,
                    format!("{} has no primary key. Add [Key], Id, or {}Id.", class.name, class.name),
                ));
            }
        }
        result
    }
}

/// Generated client names must not collide across namespaces
pub struct ClientNamesRule;

impl RepositoryRule for ClientNamesRule {
    fn name(&self) -> &'static str {
        "client_names"
    }

    fn validate(&self, repo: &ReflectionRepository) -> ValidationResult {
        let mut result = ValidationResult::ok();
        let mut seen: HashMap<String, String> = HashMap::new();
        for class in repo.classes().filter(|c| c.has_dto() || c.is_service()) {
            let client = class.client_type_name();
            match seen.get(&client) {
                Some(other) if other != &class.full_name => result.add_error(ValidationIssue::new(
                    IssueCode::DuplicateClientName,
                    &class.name,
                    format!(
                        "{} and {} both generate client type '{}'",
                        other, class.full_name, client
                    ),
                )),
                _ => {
                    seen.insert(client, class.full_name.clone());
                }
            }
        }
        result
    }
}

/// Custom data sources and behaviors must serve a CRUD model
pub struct StrategiesRule;

impl RepositoryRule for StrategiesRule {
    fn name(&self) -> &'static str {
        "strategies"
    }

    fn validate(&self, repo: &ReflectionRepository) -> ValidationResult {
        let mut result = ValidationResult::ok();
        for class in repo
            .classes()
            .filter(|c| matches!(c.kind, ClassKind::DataSource | ClassKind::Behaviors))
        {
            let served = class.served_type.as_ref().and_then(|k| repo.get(k));
            if !served.is_some_and(|s| s.is_crud_model()) {
                result.add_error(ValidationIssue::new(
                    IssueCode::OrphanDataSource,
                    &class.name,
                    format!("{} {} does not serve a known entity", class.kind, class.name),
                ));
            }
        }

        for entity in repo.crud_models() {
            let defaults: Vec<String> = repo
                .data_sources_for(entity)
                .iter()
                .filter(|s| s.is_default_data_source)
                .map(|s| s.name.clone())
                .collect();
            if defaults.len() > 1 {
                result.add_error(ValidationIssue::new(
                    IssueCode::MultipleDefaultDataSources,
                    &entity.name,
                    format!("Multiple default data sources: {}", defaults.join(", ")),
                ));
            }
        }
        result
    }
}

/// Exposed method signatures must be bindable
pub struct MethodsRule;

impl RepositoryRule for MethodsRule {
    fn name(&self) -> &'static str {
        "methods"
    }

    fn validate(&self, repo: &ReflectionRepository) -> ValidationResult {
        let mut result = ValidationResult::ok();
        for class in repo.classes().filter(|c| c.is_crud_model() || c.is_service()) {
            for method in class.client_methods() {
                let path = format!("{}.{}", class.name, method.name);
                for param in &method.parameters {
                    let unsupported = (param.is_out && param.injection != ParameterInjection::IncludeTree)
                        || param.is_ref;
                    if unsupported {
                        result.add_error(ValidationIssue::new(
                            IssueCode::UnsupportedParameter,
                            &path,
                            format!("Parameter '{}' cannot be out or ref", param.name),
                        ));
                    }
                }
                if !method.is_static && class.is_crud_model() && class.primary_key().is_none() {
                    result.add_error(ValidationIssue::new(
                        IssueCode::InstanceMethodOnNonEntity,
                        &path,
                        "Instance methods require a primary key to load the target",
                    ));
                }
            }
        }
        result
    }
}

/// Navigations should resolve their keys, and ordering fields should exist
pub struct RelationsRule;

impl RepositoryRule for RelationsRule {
    fn name(&self) -> &'static str {
        "relations"
    }

    fn validate(&self, repo: &ReflectionRepository) -> ValidationResult {
        let mut result = ValidationResult::ok();
        for class in repo.entities() {
            for prop in &class.properties {
                let path = format!("{}.{}", class.name, prop.name);
                if prop.is_reference_navigation() && prop.foreign_key_property.is_none() {
                    result.add_warning(ValidationIssue::new(
                        IssueCode::MissingForeignKey,
                        &path,
                        "No foreign key property found; the navigation will be read-only",
                    ));
                }
                if prop.is_collection_navigation()
                    && prop.inverse_property.is_none()
                    && prop.many_to_many.is_none()
                {
                    result.add_warning(ValidationIssue::new(
                        IssueCode::MissingInverse,
                        &path,
                        "No inverse navigation found; add [InverseProperty]",
                    ));
                }
            }

            for term in &class.default_order {
                if !path_exists(repo, class, &term.field_path) {
                    result.add_warning(ValidationIssue::new(
                        IssueCode::UnknownOrderField,
                        &class.name,
                        format!("Default ordering field '{}' does not exist", term.field_path),
                    ));
                }
            }
        }
        result
    }
}

fn path_exists(repo: &ReflectionRepository, class: &crate::ClassViewModel, path: &str) -> bool {
    let mut segments = path.split('.');
    let Some(first) = segments.next() else {
        return false;
    };
    let Some(mut prop) = class.property(first).cloned() else {
        return false;
    };
    for segment in segments {
        let Some(next) = prop
            .pure_type()
            .class_view_model(repo)
            .and_then(|c| c.property(segment).cloned())
        else {
            return false;
        };
        prop = next;
    }
    true
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn test_fixture_model_is_valid() {
        for fixture in testing::both() {
            let result = validate_repository(&fixture.repo);
            assert!(result.is_valid(), "{}: {:?}", fixture.backend, result.errors);
            assert!(result.to_result().is_ok());
        }
    }

    #[test]
    fn test_collision_fixture_warns_on_missing_inverse() {
        for fixture in testing::namespace_collision() {
            let result = validate_repository(&fixture.repo);
            assert!(result.is_valid());
            assert!(result
                .warnings
                .iter()
                .any(|w| w.code == IssueCode::MissingInverse && w.path == "Holder.Tests"));
        }
    }

    #[test]
    fn test_result_to_result_joins_errors() {
        let mut result = ValidationResult::ok();
        result.add_error(ValidationIssue::new(IssueCode::NoPrimaryKey, "A", "first"));
        result.add_error(ValidationIssue::new(IssueCode::NoPrimaryKey, "B", "second"));
        let err = result.to_result().unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("[A] first; [B] second"));
    }

    #[test]
    fn test_issue_display() {
        let issue = ValidationIssue::new(IssueCode::MissingForeignKey, "Case.AssignedTo", "missing");
        assert_eq!(issue.to_string(), "[Case.AssignedTo] missing");
    }
}
