//! API controller generators
//!
//! [`ModelApiController`] emits the CRUD controller of one entity, deriving
//! from the runtime's `BaseApiController<T, TDto, TContext>` and exposing its
//! custom methods. [`ServiceApiController`] exposes the methods of one
//! service.

use std::sync::Arc;

use coalesce_core::{CoalesceError, CoalesceResult};
use coalesce_model::{
    AttributeValue, ClassViewModel, MethodViewModel, ParameterInjection, ParameterViewModel, ReflectionRepository,
    TypeViewModel,
};

use crate::config::ControllerSettings;
use crate::context::GenerationContext;
use crate::csharp::{authorize_attribute, string_literal};
use crate::generator::Configurable;
use crate::template::Template;

const USINGS: &str = "using IntelliTect.Coalesce;
using IntelliTect.Coalesce.Api;
using IntelliTect.Coalesce.Api.Controllers;
using IntelliTect.Coalesce.Api.DataSources;
using IntelliTect.Coalesce.Mapping;
using IntelliTect.Coalesce.Mapping.IncludeTrees;
using IntelliTect.Coalesce.Models;
using Microsoft.AspNetCore.Authorization;
using Microsoft.AspNetCore.Mvc;
using System;
using System.Collections.Generic;
using System.Linq;
using System.Threading.Tasks;
";

// ============================================================================
// ModelApiController
// ============================================================================

pub struct ModelApiController {
    class: Arc<ClassViewModel>,
    ctx: Arc<GenerationContext>,
    route_prefix: String,
}

impl Configurable for ModelApiController {
    const ID: &'static str = "Coalesce.Generators.ModelApiController";
    type Settings = ControllerSettings;
}

impl ModelApiController {
    pub fn new(class: Arc<ClassViewModel>, ctx: Arc<GenerationContext>, settings: &ControllerSettings) -> Self {
        Self {
            class,
            ctx,
            route_prefix: settings.route_prefix.clone(),
        }
    }

    pub fn file_name(class: &ClassViewModel) -> String {
        format!("{}.g.cs", class.controller_name())
    }

    fn repo(&self) -> &ReflectionRepository {
        self.ctx.repository()
    }

    fn db_context_name(&self) -> Option<String> {
        let key = self.class.db_context.as_ref()?;
        self.repo().get(key).map(|c| c.full_name.clone())
    }

    fn write_crud_actions(&self, out: &mut String, entity: &str, dto: &str) -> CoalesceResult<()> {
        let pk = self.class.primary_key().ok_or_else(|| {
            CoalesceError::codegen(format!("{} has no primary key", self.class.full_name))
        })?;
        let key_type = pk.type_vm.full_name();
        let security = &self.class.security;
        let data_source = format!("IDataSource<{}> dataSource", entity);
        let behaviors = format!("IBehaviors<{}> behaviors", entity);

        if let Some(auth) = authorize_attribute(&security.read) {
            out.push_str("[HttpGet(\"get/{id}\")]\n");
            out.push_str(&format!("{}\n", auth));
            out.push_str(&format!(
                "public virtual Task<ItemResult<{dto}>> Get(\n{key_type} id,\n[FromQuery] DataSourceParameters parameters,\n{data_source})\n=> GetImplementation(id, parameters, dataSource);\n\n"
            ));

            out.push_str("[HttpGet(\"list\")]\n");
            out.push_str(&format!("{}\n", auth));
            out.push_str(&format!(
                "public virtual Task<ListResult<{dto}>> List(\n[FromQuery] ListParameters parameters,\n{data_source})\n=> ListImplementation(parameters, dataSource);\n\n"
            ));

            out.push_str("[HttpGet(\"count\")]\n");
            out.push_str(&format!("{}\n", auth));
            out.push_str(&format!(
                "public virtual Task<ItemResult<int>> Count(\n[FromQuery] FilterParameters parameters,\n{data_source})\n=> CountImplementation(parameters, dataSource);\n\n"
            ));

            out.push_str("[HttpGet(\"propertyValues\")]\n");
            out.push_str(&format!("{}\n", auth));
            out.push_str(&format!(
                "public virtual Task<ListResult<string>> PropertyValues(\nstring property,\nint page = 1,\nstring search = \"\")\n=> PropertyValuesImplementation(property, page, search);\n\n"
            ));
        }

        let save_auth = if security.create.level == security.edit.level && security.create.roles == security.edit.roles {
            authorize_attribute(&security.create)
        } else if authorize_attribute(&security.create).is_some() || authorize_attribute(&security.edit).is_some() {
            // The runtime tells create from edit per request.
            Some("[Authorize]".to_string())
        } else {
            None
        };
        if let Some(auth) = save_auth {
            out.push_str("[HttpPost(\"save\")]\n");
            out.push_str(&format!("{}\n", auth));
            out.push_str(&format!(
                "public virtual Task<ItemResult<{dto}>> Save(\n[FromForm] {dto} dto,\n[FromQuery] DataSourceParameters parameters,\n{data_source},\n{behaviors})\n=> SaveImplementation(dto, parameters, dataSource, behaviors);\n\n"
            ));
        }

        if let Some(auth) = authorize_attribute(&security.delete) {
            out.push_str("[HttpPost(\"delete/{id}\")]\n");
            out.push_str(&format!("{}\n", auth));
            out.push_str(&format!(
                "public virtual Task<ItemResult<{dto}>> Delete(\n{key_type} id,\n{behaviors},\n{data_source})\n=> DeleteImplementation(id, new DataSourceParameters(), dataSource, behaviors);\n\n"
            ));
        }
        Ok(())
    }
}

impl Template for ModelApiController {
    fn name(&self) -> String {
        format!("ModelApiController ({})", self.class.name)
    }

    fn render(&self) -> CoalesceResult<String> {
        let class = &self.class;
        let entity = &class.full_name;
        let dto = format!("{}.{}", self.ctx.dto_namespace(), class.dto_name());

        let mut out = String::with_capacity(8192);
        out.push_str(USINGS);
        out.push('\n');
        out.push_str(&format!("namespace {}\n{{\n", self.ctx.api_namespace()));

        out.push_str(&format!(
            "[Route(\"{}/{}\")]\n",
            self.route_prefix,
            class.api_route_name()
        ));
        if let Some(auth) = authorize_attribute(&class.security.read) {
            out.push_str(&format!("{}\n", auth));
        }
        out.push_str("[ServiceFilter(typeof(IApiActionFilter))]\n");

        let context = self.db_context_name();
        let base = match &context {
            Some(db) => format!("BaseApiController<{}, {}, {}>", entity, dto, db),
            None => format!("BaseApiController<{}, {}>", entity, dto),
        };
        let crud_context = match &context {
            Some(db) => format!("CrudContext<{}>", db),
            None => "CrudContext".to_string(),
        };
        out.push_str(&format!("public partial class {}\n: {}\n{{\n", class.controller_name(), base));
        out.push_str(&format!(
            "public {}({} context) : base(context)\n{{\n",
            class.controller_name(),
            crud_context
        ));
        out.push_str(&format!(
            "GeneratedForClassViewModel = context.ReflectionRepository.GetClassViewModel<{}>();\n",
            entity
        ));
        out.push_str("}\n\n");

        self.write_crud_actions(&mut out, entity, &dto)?;

        let writer = MethodWriter {
            repo: self.repo(),
            dto_namespace: self.ctx.dto_namespace(),
            target: MethodTarget::Entity {
                class,
                has_db: context.is_some(),
            },
        };
        for method in class.client_methods() {
            writer.write(&mut out, method)?;
        }

        out.push_str("}\n}\n");
        Ok(out)
    }
}

// ============================================================================
// ServiceApiController
// ============================================================================

pub struct ServiceApiController {
    class: Arc<ClassViewModel>,
    ctx: Arc<GenerationContext>,
    route_prefix: String,
}

impl Configurable for ServiceApiController {
    const ID: &'static str = "Coalesce.Generators.ServiceApiController";
    type Settings = ControllerSettings;
}

impl ServiceApiController {
    pub fn new(class: Arc<ClassViewModel>, ctx: Arc<GenerationContext>, settings: &ControllerSettings) -> Self {
        Self {
            class,
            ctx,
            route_prefix: settings.route_prefix.clone(),
        }
    }

    pub fn file_name(class: &ClassViewModel) -> String {
        format!("{}.g.cs", class.controller_name())
    }
}

impl Template for ServiceApiController {
    fn name(&self) -> String {
        format!("ServiceApiController ({})", self.class.name)
    }

    fn render(&self) -> CoalesceResult<String> {
        let class = &self.class;
        let service = &class.full_name;
        let controller = class.controller_name();

        let mut out = String::with_capacity(4096);
        out.push_str(USINGS);
        out.push('\n');
        out.push_str(&format!("namespace {}\n{{\n", self.ctx.api_namespace()));
        out.push_str(&format!(
            "[Route(\"{}/{}\")]\n",
            self.route_prefix,
            class.api_route_name()
        ));
        out.push_str("[ServiceFilter(typeof(IApiActionFilter))]\n");
        out.push_str(&format!("public partial class {} : BaseApiController\n{{\n", controller));
        out.push_str(&format!("protected {} Service {{ get; }}\n\n", service));
        out.push_str(&format!(
            "public {}(CrudContext context, {} service) : base(context)\n{{\n",
            controller, service
        ));
        out.push_str(&format!(
            "GeneratedForClassViewModel = context.ReflectionRepository.GetClassViewModel<{}>();\n",
            service
        ));
        out.push_str("Service = service;\n}\n\n");

        let writer = MethodWriter {
            repo: self.ctx.repository(),
            dto_namespace: self.ctx.dto_namespace(),
            target: MethodTarget::Service,
        };
        for method in class.client_methods() {
            writer.write(&mut out, method)?;
        }

        out.push_str("}\n}\n");
        Ok(out)
    }
}

// ============================================================================
// Custom methods
// ============================================================================

enum MethodTarget<'a> {
    Entity { class: &'a ClassViewModel, has_db: bool },
    Service,
}

struct MethodWriter<'a> {
    repo: &'a ReflectionRepository,
    dto_namespace: &'a str,
    target: MethodTarget<'a>,
}

impl MethodWriter<'_> {
    fn write(&self, out: &mut String, method: &MethodViewModel) -> CoalesceResult<()> {
        // DenyAll methods are not routable
        let Some(auth) = authorize_attribute(&method.security.execute) else {
            return Ok(());
        };

        let is_instance = matches!(self.target, MethodTarget::Entity { .. }) && !method.is_static;
        let is_async = method.is_async() || is_instance;
        let return_decl = method.api_action_return_type_declaration(self.dto_namespace, self.repo);

        out.push_str(&format!("/// <summary>\n/// Method: {}\n/// </summary>\n", method.name));
        out.push_str(&format!(
            "[{}({})]\n",
            method.http_method.attribute_name(),
            string_literal(&method.name)
        ));
        out.push_str(&format!("{}\n", auth));
        let modifiers = if is_async { "public virtual async" } else { "public virtual" };
        let returns = if is_async {
            format!("Task<{}>", return_decl)
        } else {
            return_decl.clone()
        };

        let mut params = Vec::new();
        if is_instance {
            params.push("[FromServices] IDataSourceFactory dataSourceFactory".to_string());
            if let MethodTarget::Entity { class, .. } = &self.target {
                let pk = class.primary_key().ok_or_else(|| {
                    CoalesceError::codegen(format!("{} has no primary key", class.full_name))
                })?;
                params.push(format!("{} id", pk.type_vm.full_name()));
            }
        }
        for param in &method.parameters {
            if let Some(declared) = self.action_parameter(method, param) {
                params.push(declared);
            }
        }

        out.push_str(&format!("{} {} {}(", modifiers, returns, method.name));
        if params.is_empty() {
            out.push_str(")\n");
        } else {
            out.push('\n');
            out.push_str(&params.join(",\n"));
            out.push_str(")\n");
        }
        out.push_str("{\n");

        let receiver = match &self.target {
            MethodTarget::Service => "Service".to_string(),
            MethodTarget::Entity { class, .. } if method.is_static => class.full_name.clone(),
            MethodTarget::Entity { class, .. } => {
                out.push_str(&format!(
                    "var dataSource = dataSourceFactory.GetDataSource<{entity}, {entity}>({name});\n",
                    entity = class.full_name,
                    name = string_literal(&method.load_from_data_source_name),
                ));
                out.push_str("var (itemResult, _) = await dataSource.GetItemAsync(id, new DataSourceParameters());\n");
                out.push_str("if (!itemResult.WasSuccessful)\n{\n");
                out.push_str(&format!("return new {}(itemResult);\n", return_decl));
                out.push_str("}\n");
                out.push_str("var item = itemResult.Object;\n");
                "item".to_string()
            }
        };

        out.push_str("var _mappingContext = new MappingContext(Context);\n");
        if method.has_include_tree_parameter() {
            out.push_str("IncludeTree includeTree = null;\n");
        }

        let args: Vec<String> = method.parameters.iter().map(|p| self.call_argument(p)).collect();
        let call = format!(
            "{}{}.{}({})",
            if method.is_async() { "await " } else { "" },
            receiver,
            method.name,
            args.join(", ")
        );
        let tree = if method.has_include_tree_parameter() { "includeTree" } else { "null" };

        match method.result_type() {
            None if method.returns_void() => {
                out.push_str(&format!("{};\n", call));
                if is_instance && self.has_db() {
                    out.push_str("await Db.SaveChangesAsync();\n");
                }
                out.push_str("return new ItemResult();\n");
            }
            None => {
                out.push_str(&format!("var _methodResult = {};\n", call));
                out.push_str("return _methodResult;\n");
            }
            Some(result) if method.returns_list_result() => {
                out.push_str(&format!("var _methodResult = {};\n", call));
                out.push_str(&format!("var _result = new {}(_methodResult);\n", return_decl));
                let element = result.pure_type();
                if self.has_dto(&element) {
                    out.push_str(&format!(
                        "_result.List = _methodResult.List?.ToList().Select(o => {}).ToList();\n",
                        self.map_to_dto("o", &element, &format!("{} ?? _methodResult.IncludeTree", tree))
                    ));
                } else {
                    out.push_str("_result.List = _methodResult.List;\n");
                }
                out.push_str("return _result;\n");
            }
            Some(result) => {
                out.push_str(&format!("var _methodResult = {};\n", call));
                let (source, result_ctor) = if method.returns_item_result() {
                    ("_methodResult.Object", format!("new {}(_methodResult)", return_decl))
                } else {
                    ("_methodResult", format!("new {}()", return_decl))
                };
                if is_instance && self.has_db() {
                    out.push_str("await Db.SaveChangesAsync();\n");
                }
                out.push_str(&format!("var _result = {};\n", result_ctor));
                out.push_str(&format!("_result.Object = {};\n", self.map_value(source, &result, tree)));
                out.push_str("return _result;\n");
            }
        }
        out.push_str("}\n\n");
        Ok(())
    }

    fn has_db(&self) -> bool {
        matches!(self.target, MethodTarget::Entity { has_db: true, .. })
    }

    fn has_dto(&self, ty: &TypeViewModel) -> bool {
        ty.class_view_model(self.repo).is_some_and(|c| c.has_dto())
    }

    fn map_to_dto(&self, expr: &str, ty: &TypeViewModel, tree: &str) -> String {
        format!(
            "Mapper.MapToDto<{}, {}>({}, _mappingContext, {})",
            ty.full_name(),
            ty.dto_full_name(self.dto_namespace, self.repo),
            expr,
            tree
        )
    }

    /// `expr` of type `ty` converted to what the action returns
    fn map_value(&self, expr: &str, ty: &TypeViewModel, tree: &str) -> String {
        let pure = ty.pure_type();
        if !self.has_dto(&pure) {
            return expr.to_string();
        }
        if ty.is_collection() {
            format!(
                "{}?.ToList().Select(o => {}).ToList()",
                expr,
                self.map_to_dto("o", &pure, tree)
            )
        } else {
            self.map_to_dto(expr, ty, tree)
        }
    }

    /// Declaration of `param` in the action signature, if it appears there
    fn action_parameter(&self, method: &MethodViewModel, param: &ParameterViewModel) -> Option<String> {
        match param.injection {
            ParameterInjection::Service => Some(format!(
                "[FromServices] {} {}",
                param.type_vm.full_name(),
                param.name
            )),
            ParameterInjection::DbContext if !self.has_db() => Some(format!(
                "[FromServices] {} {}",
                param.type_vm.full_name(),
                param.name
            )),
            ParameterInjection::Client => {
                let ty = param.type_vm.dto_full_name(self.dto_namespace, self.repo);
                let binding = if method.http_method == coalesce_core::HttpMethod::Get {
                    format!("[FromQuery(Name = {})]", string_literal(&param.json_name))
                } else {
                    format!("[FromForm(Name = {})]", string_literal(&param.json_name))
                };
                let default = param
                    .default_value
                    .as_ref()
                    .map(|v| format!(" = {}", csharp_literal(v)))
                    .unwrap_or_default();
                Some(format!("{} {} {}{}", binding, ty, param.name, default))
            }
            _ => None,
        }
    }

    /// Expression passed for `param` when calling the method
    fn call_argument(&self, param: &ParameterViewModel) -> String {
        match param.injection {
            ParameterInjection::DbContext if self.has_db() => "Db".to_string(),
            ParameterInjection::User => "User".to_string(),
            ParameterInjection::CrudContext => "Context".to_string(),
            ParameterInjection::CancellationToken => "HttpContext.RequestAborted".to_string(),
            ParameterInjection::IncludeTree => "out includeTree".to_string(),
            ParameterInjection::Client => {
                let pure = param.type_vm.pure_type();
                if !self.has_dto(&pure) {
                    param.name.clone()
                } else if param.type_vm.is_collection() {
                    format!(
                        "{}?.Select(_m => _m.MapToNew(_mappingContext)).ToList()",
                        param.name
                    )
                } else {
                    format!("{}?.MapToNew(_mappingContext)", param.name)
                }
            }
            ParameterInjection::DbContext | ParameterInjection::Service => param.name.clone(),
        }
    }
}

/// C# literal of a parameter default value
fn csharp_literal(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Null => "null".to_string(),
        AttributeValue::Bool(b) => b.to_string(),
        AttributeValue::Int(i) => i.to_string(),
        AttributeValue::Float(f) => f.to_string(),
        AttributeValue::String(s) => string_literal(s),
        AttributeValue::Enum { type_name, member } => format!("{}.{}", type_name, member),
        AttributeValue::Type(t) => format!("typeof({})", t.full_name()),
        AttributeValue::Array(items) => format!(
            "new[] {{ {} }}",
            items.iter().map(csharp_literal).collect::<Vec<_>>().join(", ")
        ),
    }
}

// ============================================================================
// Tests
// ============================================================================
