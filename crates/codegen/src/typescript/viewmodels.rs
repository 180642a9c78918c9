//! `viewmodels.g.ts`: stateful view-models over the API clients
//!
//! Each CRUD model gets a `ViewModel` (one item, with auto-save and method
//! callers) and a `ListViewModel`; each service gets a `ServiceViewModel`.
//! The `typeLookup` tables at the end let `coalesce-vue` build view-models
//! for nested navigations.

use std::sync::Arc;

use coalesce_core::CoalesceResult;
use coalesce_model::{ClassViewModel, MethodViewModel, PropertyViewModel, ReflectionRepository};

use crate::config::CommonSettings;
use crate::context::GenerationContext;
use crate::generator::Configurable;
use crate::template::Template;
use crate::typescript::api_clients::client_arguments;
use crate::typescript::{crud_classes, models_type, service_classes};

pub struct TsViewModels {
    ctx: Arc<GenerationContext>,
}

impl Configurable for TsViewModels {
    const ID: &'static str = "Coalesce.Generators.TsViewModels";
    type Settings = CommonSettings;
}

impl TsViewModels {
    pub fn new(ctx: Arc<GenerationContext>) -> Self {
        Self { ctx }
    }
}

impl Template for TsViewModels {
    fn name(&self) -> String {
        "TsViewModels".to_string()
    }

    fn render(&self) -> CoalesceResult<String> {
        let repo = self.ctx.repository();
        let classes = crud_classes(repo);
        let services = service_classes(repo);

        let mut out = String::with_capacity(8 * 1024);
        out.push_str("import * as $metadata from './metadata.g'\n");
        out.push_str("import * as $models from './models.g'\n");
        out.push_str("import * as $apiClients from './api-clients.g'\n");
        out.push_str("import { ViewModel, ListViewModel, ViewModelCollection, ServiceViewModel, type DeepPartial, defineProps } from 'coalesce-vue/lib/viewmodel'\n\n");

        for class in &classes {
            write_view_model(&mut out, repo, class);
            write_list_view_model(&mut out, repo, class);
        }
        for service in &services {
            write_service_view_model(&mut out, repo, service);
        }

        out.push_str("\nconst viewModelTypeLookup = ViewModel.typeLookup = {\n");
        for class in &classes {
            out.push_str(&format!("  {}: {},\n", class.name, class.view_model_class_name()));
        }
        out.push_str("}\n");
        out.push_str("const listViewModelTypeLookup = ListViewModel.typeLookup = {\n");
        for class in &classes {
            out.push_str(&format!("  {}: {},\n", class.name, class.list_view_model_class_name()));
        }
        out.push_str("}\n");
        out.push_str("const serviceViewModelTypeLookup = ServiceViewModel.typeLookup = {\n");
        for service in &services {
            out.push_str(&format!(
                "  {}: {},\n",
                service.client_type_name(),
                service.view_model_class_name()
            ));
        }
        out.push_str("}\n\n");
        Ok(out)
    }
}

/// View-model member declaration of one property
fn member(repo: &ReflectionRepository, prop: &PropertyViewModel) -> String {
    let pure = prop.pure_type();
    let target = pure.class_view_model(repo).filter(|c| c.is_crud_model());
    match target {
        Some(target) if prop.type_vm.is_collection() => format!(
            "  get {name}(): ViewModelCollection<{vm}, $models.{model}>;\n  set {name}(value: ({vm} | $models.{model})[] | null);\n",
            name = prop.json_name,
            vm = target.view_model_class_name(),
            model = target.name,
        ),
        Some(target) => format!(
            "  get {name}(): {vm} | null;\n  set {name}(value: {vm} | $models.{model} | null);\n",
            name = prop.json_name,
            vm = target.view_model_class_name(),
            model = target.name,
        ),
        None => format!("  {}: {} | null;\n", prop.json_name, models_type(&prop.type_vm, repo)),
    }
}

fn write_view_model(out: &mut String, repo: &ReflectionRepository, class: &ClassViewModel) {
    let name = &class.name;
    let vm = class.view_model_class_name();
    let key_type = class
        .primary_key()
        .map(|pk| models_type(&pk.type_vm, repo))
        .unwrap_or_else(|| "string".to_string());

    out.push_str(&format!("export interface {vm} extends $models.{name} {{\n"));
    for prop in class.client_properties() {
        out.push_str(&member(repo, prop));
    }
    out.push_str("}\n");

    out.push_str(&format!(
        "export class {vm} extends ViewModel<$models.{name}, $apiClients.{name}ApiClient, {key_type}> implements $models.{name}  {{\n"
    ));
    for method in class.client_methods() {
        write_method_caller(out, repo, method, Some(class));
    }
    out.push_str("  \n");
    out.push_str(&format!(
        "  constructor(initialData?: DeepPartial<$models.{name}> | null) {{\n"
    ));
    out.push_str(&format!(
        "    super($metadata.{name}, new $apiClients.{name}ApiClient(), initialData)\n  }}\n}}\n"
    ));
    out.push_str(&format!("defineProps({vm}, $metadata.{name})\n\n"));
}

fn write_list_view_model(out: &mut String, repo: &ReflectionRepository, class: &ClassViewModel) {
    let name = &class.name;
    out.push_str(&format!(
        "export class {} extends ListViewModel<$models.{name}, $apiClients.{name}ApiClient, {}> {{\n",
        class.list_view_model_class_name(),
        class.view_model_class_name(),
    ));
    if !repo.data_sources_for(class).is_empty() {
        out.push_str(&format!("  static DataSources = $models.{name}.DataSources;\n"));
    }
    for method in class.client_methods().filter(|m| m.is_static) {
        write_method_caller(out, repo, method, None);
    }
    out.push_str("  \n");
    out.push_str(&format!(
        "  constructor() {{\n    super($metadata.{name}, new $apiClients.{name}ApiClient())\n  }}\n}}\n\n\n"
    ));
}

fn write_service_view_model(out: &mut String, repo: &ReflectionRepository, service: &ClassViewModel) {
    let name = service.client_type_name();
    out.push_str(&format!(
        "export class {} extends ServiceViewModel<typeof $metadata.{name}, $apiClients.{name}ApiClient> {{\n",
        service.view_model_class_name()
    ));
    for method in service.client_methods() {
        write_method_caller(out, repo, method, None);
    }
    out.push_str("  \n");
    out.push_str(&format!(
        "  constructor() {{\n    super($metadata.{name}, new $apiClients.{name}ApiClient())\n  }}\n}}\n\n\n"
    ));
}

/// A lazily created API caller bound to one method
///
/// Instance methods on item view-models pass `this.$primaryKey` for the key.
fn write_method_caller(
    out: &mut String,
    repo: &ReflectionRepository,
    method: &MethodViewModel,
    owner: Option<&ClassViewModel>,
) {
    let transport = if method.returns_list_result() { "list" } else { "item" };
    let mut args = client_arguments(repo, method, owner);
    let bound_key = owner.is_some() && !method.is_static;
    if bound_key && !args.is_empty() {
        args.remove(0);
    }

    let typed: Vec<String> = args.iter().map(|(n, t)| format!("{}?: {}", n, t)).collect();
    let mut call: Vec<String> = args.iter().map(|(n, _)| n.clone()).collect();
    let mut from_args: Vec<String> = args.iter().map(|(n, _)| format!("args.{}", n)).collect();
    if bound_key {
        call.insert(0, "this.$primaryKey".to_string());
        from_args.insert(0, "this.$primaryKey".to_string());
    }
    let defaults: String = args
        .iter()
        .map(|(n, t)| format!("{}: null as {}, ", n, t))
        .collect();

    let name = &method.json_name;
    out.push_str("  \n");
    out.push_str(&format!("  public get {}() {{\n", name));
    out.push_str(&format!("    const {} = this.$apiCaller({:?}, \n", name, transport));
    out.push_str(&format!(
        "      (c{}) => c.{}({}),\n",
        typed.iter().map(|t| format!(", {}", t)).collect::<String>(),
        name,
        call.join(", ")
    ));
    out.push_str(&format!("      () => ({{{}}}),\n", defaults));
    out.push_str(&format!("      (c, args) => c.{}({}))\n", name, from_args.join(", ")));
    out.push_str("    \n");
    out.push_str(&format!(
        "    Object.defineProperty(this, '{}', {{value: {}}});\n",
        name, name
    ));
    out.push_str(&format!("    return {}\n  }}\n", name));
}

// ============================================================================
// Tests
// ============================================================================
