//! # MethodViewModel
//!
//! A custom method exposed through a generated controller, plus its
//! parameters. Parameters are either bound from the client or injected by the
//! runtime (`DbContext`, the current user, the `CrudContext`, `[Inject]`
//! services, cancellation tokens and `out IncludeTree`).

use std::fmt;
use std::sync::Arc;

use coalesce_core::{HttpMethod, ValidationRule};
use heck::{ToLowerCamelCase, ToTitleCase};

use crate::attributes::{AttributeData, AttributeSliceExt, AttributeValue};
use crate::property::parse_validation;
use crate::repository::ReflectionRepository;
use crate::security::MethodSecurityInfo;
use crate::type_info::{MethodInfo, ParameterInfo};
use crate::type_view_model::TypeViewModel;
use crate::well_known::names;

/// Name of the data source an instance method loads its target with when
/// `[LoadFromDataSource]` is absent
pub const DEFAULT_DATA_SOURCE_NAME: &str = "Default";

// ============================================================================
// Parameters
// ============================================================================

/// Where a parameter's value comes from at invocation time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterInjection {
    /// Bound from the client request
    Client,
    DbContext,
    User,
    CrudContext,
    CancellationToken,
    /// `[Inject]` service resolved by type
    Service,
    /// `out IncludeTree` handed back to the DTO mapper
    IncludeTree,
}

/// One parameter of a custom method
#[derive(Debug, Clone)]
pub struct ParameterViewModel {
    pub name: String,
    pub json_name: String,
    pub display_name: String,
    pub type_vm: TypeViewModel,
    pub is_out: bool,
    pub is_ref: bool,
    pub default_value: Option<AttributeValue>,
    pub attributes: Vec<AttributeData>,
    pub validation: Vec<ValidationRule>,
    pub injection: ParameterInjection,
}

impl ParameterViewModel {
    fn from_info(info: ParameterInfo) -> Self {
        let type_vm = TypeViewModel::new(info.parameter_type);
        let injection = if info.attributes.has_attribute("Inject") {
            ParameterInjection::Service
        } else if info.is_out && type_vm.qualified_name() == names::INCLUDE_TREE {
            ParameterInjection::IncludeTree
        } else if type_vm.is_a(names::DB_CONTEXT) {
            ParameterInjection::DbContext
        } else if type_vm.qualified_name() == names::CLAIMS_PRINCIPAL {
            ParameterInjection::User
        } else if type_vm.is_a(names::CRUD_CONTEXT) {
            ParameterInjection::CrudContext
        } else if type_vm.qualified_name() == names::CANCELLATION_TOKEN {
            ParameterInjection::CancellationToken
        } else {
            ParameterInjection::Client
        };

        Self {
            json_name: info.name.to_lower_camel_case(),
            display_name: info.name.to_title_case(),
            validation: parse_validation(&info.attributes),
            name: info.name,
            type_vm,
            is_out: info.is_out,
            is_ref: info.is_ref,
            default_value: info.default_value,
            attributes: info.attributes,
            injection,
        }
    }

    pub fn is_injected(&self) -> bool {
        self.injection != ParameterInjection::Client
    }

    pub fn is_required(&self) -> bool {
        self.validation.contains(&ValidationRule::Required)
    }

    pub fn is_file(&self) -> bool {
        self.type_vm.pure_type().is_a(names::IFILE)
    }
}

// ============================================================================
// MethodViewModel
// ============================================================================

#[derive(Clone)]
pub struct MethodViewModel {
    info: Arc<dyn MethodInfo>,
    pub name: String,
    pub json_name: String,
    pub parent_name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub attributes: Vec<AttributeData>,
    pub is_static: bool,
    pub parameters: Vec<ParameterViewModel>,
    /// Declared return type
    pub return_type: TypeViewModel,
    pub security: MethodSecurityInfo,
    pub http_method: HttpMethod,
    /// Exposed through generated controllers and clients
    pub is_exposed: bool,
    pub is_internal_use: bool,
    /// Instance methods: the named data source used to load the target
    pub load_from_data_source_name: String,
    /// `[SemanticKernel]` description when the method is a kernel tool
    pub kernel_description: Option<String>,
}

impl MethodViewModel {
    pub(crate) fn from_info(info: Arc<dyn MethodInfo>, parent_name: &str) -> Self {
        let name = info.name();
        let attributes = info.attributes();
        let is_static = info.is_static();

        let http_method = attributes
            .attribute("ControllerAction")
            .and_then(|a| a.value(0, "Method"))
            .and_then(|v| v.as_enum_member().or_else(|| v.as_str()))
            .and_then(HttpMethod::parse)
            .unwrap_or_default();

        let load_from_data_source_name = attributes
            .attribute("LoadFromDataSource")
            .and_then(|a| a.value(0, "DataSourceType"))
            .and_then(|v| match v {
                AttributeValue::Type(t) => Some(t.name()),
                other => other.as_str().map(str::to_string),
            })
            .unwrap_or_else(|| DEFAULT_DATA_SOURCE_NAME.to_string());

        Self {
            json_name: name.to_lower_camel_case(),
            parent_name: parent_name.to_string(),
            display_name: attributes
                .attribute("Display")
                .and_then(|a| a.string(usize::MAX, "Name"))
                .unwrap_or_else(|| name.to_title_case()),
            description: attributes
                .attribute("Description")
                .and_then(|a| a.string(0, "Description")),
            is_static,
            parameters: info
                .parameters()
                .into_iter()
                .map(ParameterViewModel::from_info)
                .collect(),
            return_type: TypeViewModel::new(info.return_type()),
            security: MethodSecurityInfo::from_attributes(&attributes),
            http_method,
            is_exposed: attributes.has_attribute("Coalesce"),
            is_internal_use: attributes.has_attribute("InternalUse"),
            load_from_data_source_name,
            kernel_description: attributes
                .attribute("SemanticKernel")
                .map(|a| a.string(0, "Description").unwrap_or_default()),
            name,
            attributes,
            info,
        }
    }

    pub fn info(&self) -> &Arc<dyn MethodInfo> {
        &self.info
    }

    /// Exposed and not hidden from clients
    pub fn is_client_method(&self) -> bool {
        self.is_exposed && !self.is_internal_use
    }

    /// Parameters bound from the request
    pub fn client_parameters(&self) -> impl Iterator<Item = &ParameterViewModel> {
        self.parameters.iter().filter(|p| !p.is_injected())
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterViewModel> {
        self.parameters
            .iter()
            .find(|p| p.name == name)
            .or_else(|| self.parameters.iter().find(|p| p.name.eq_ignore_ascii_case(name)))
    }

    /// Whether an `out IncludeTree` parameter is present
    pub fn has_include_tree_parameter(&self) -> bool {
        self.parameters
            .iter()
            .any(|p| p.injection == ParameterInjection::IncludeTree)
    }

    pub fn is_async(&self) -> bool {
        self.return_type.is_task()
    }

    /// `Task<T>` and `ValueTask<T>` unwrapped to `T`; a bare `Task` stays as is
    pub fn task_unwrapped_result_type(&self) -> TypeViewModel {
        if self.return_type.is_task() {
            if let Some(inner) = self.return_type.first_generic_argument() {
                return inner;
            }
        }
        self.return_type.clone()
    }

    /// Returns a bare `Task` or `void`
    pub fn returns_void(&self) -> bool {
        let unwrapped = self.task_unwrapped_result_type();
        unwrapped.is_void() || unwrapped.is_task()
    }

    /// The unwrapped type is `ListResult<T>`
    pub fn returns_list_result(&self) -> bool {
        self.task_unwrapped_result_type().qualified_name() == names::LIST_RESULT
    }

    /// The unwrapped type is `ItemResult` or `ItemResult<T>`
    pub fn returns_item_result(&self) -> bool {
        self.task_unwrapped_result_type().qualified_name() == names::ITEM_RESULT
    }

    /// The payload type after unwrapping tasks, `ItemResult<T>` and
    /// `ListResult<T>`; `None` when there is no payload
    pub fn result_type(&self) -> Option<TypeViewModel> {
        if self.returns_void() {
            return None;
        }
        let unwrapped = self.task_unwrapped_result_type();
        if self.returns_item_result() || self.returns_list_result() {
            return unwrapped.first_generic_argument();
        }
        Some(unwrapped)
    }

    /// Return type of the generated controller action
    ///
    /// ```text
    /// void / Task / ItemResult       ItemResult
    /// ListResult<Person>             ListResult<Ns.PersonDtoGen>
    /// ICollection<Person>            ItemResult<System.Collections.Generic.ICollection<Ns.PersonDtoGen>>
    /// ```
    pub fn api_action_return_type_declaration(
        &self,
        dto_namespace: &str,
        repo: &ReflectionRepository,
    ) -> String {
        match self.result_type() {
            None => "ItemResult".to_string(),
            Some(result) if self.returns_list_result() => {
                format!("ListResult<{}>", result.dto_full_name(dto_namespace, repo))
            }
            Some(result) => format!("ItemResult<{}>", result.dto_full_name(dto_namespace, repo)),
        }
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.has_attribute(name)
    }
}

impl fmt::Debug for MethodViewModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodViewModel")
            .field("name", &self.name)
            .field("return_type", &self.return_type.full_name())
            .field("parameters", &self.parameters.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
