//! `api-clients.g.ts`: one typed HTTP client per model controller and service

use std::sync::Arc;

use coalesce_core::CoalesceResult;
use coalesce_model::{ClassViewModel, MethodViewModel, ReflectionRepository};

use crate::config::CommonSettings;
use crate::context::GenerationContext;
use crate::generator::Configurable;
use crate::template::Template;
use crate::typescript::{crud_classes, models_type, service_classes};

pub struct TsApiClients {
    ctx: Arc<GenerationContext>,
}

impl Configurable for TsApiClients {
    const ID: &'static str = "Coalesce.Generators.TsApiClients";
    type Settings = CommonSettings;
}

impl TsApiClients {
    pub fn new(ctx: Arc<GenerationContext>) -> Self {
        Self { ctx }
    }
}

impl Template for TsApiClients {
    fn name(&self) -> String {
        "TsApiClients".to_string()
    }

    fn render(&self) -> CoalesceResult<String> {
        let repo = self.ctx.repository();
        let mut out = String::with_capacity(8 * 1024);
        out.push_str("import * as $metadata from './metadata.g'\n");
        out.push_str("import * as $models from './models.g'\n");
        out.push_str("import type { AxiosPromise, AxiosRequestConfig, ItemResult, ListResult } from 'coalesce-vue/lib/api-client'\n");
        out.push_str("import { ModelApiClient, ServiceApiClient } from 'coalesce-vue/lib/api-client'\n\n");

        for class in crud_classes(repo) {
            let name = &class.name;
            out.push_str(&format!(
                "export class {name}ApiClient extends ModelApiClient<$models.{name}> {{\n"
            ));
            out.push_str(&format!("  constructor() {{ super($metadata.{name}) }}\n"));
            for method in class.client_methods() {
                write_method(&mut out, repo, method, Some(&class));
            }
            out.push_str("}\n\n\n");
        }

        for service in service_classes(repo) {
            let name = service.client_type_name();
            out.push_str(&format!(
                "export class {name}ApiClient extends ServiceApiClient<typeof $metadata.{name}> {{\n"
            ));
            out.push_str(&format!("  constructor() {{ super($metadata.{name}) }}\n"));
            for method in service.client_methods() {
                write_method(&mut out, repo, method, None);
            }
            out.push_str("}\n\n\n");
        }
        Ok(out)
    }
}

/// `(name, type)` of each argument the client passes, the key first for
/// instance methods
pub(crate) fn client_arguments(
    repo: &ReflectionRepository,
    method: &MethodViewModel,
    owner: Option<&ClassViewModel>,
) -> Vec<(String, String)> {
    let mut args = Vec::new();
    if let (Some(class), false) = (owner, method.is_static) {
        if let Some(pk) = class.primary_key() {
            args.push(("id".to_string(), format!("{} | null", models_type(&pk.type_vm, repo))));
        }
    }
    for param in method.client_parameters() {
        args.push((param.json_name.clone(), format!("{} | null", models_type(&param.type_vm, repo))));
    }
    args
}

/// Promise type a client method resolves to
pub(crate) fn result_promise(repo: &ReflectionRepository, method: &MethodViewModel) -> String {
    let result = method
        .result_type()
        .map(|t| models_type(&t, repo))
        .unwrap_or_else(|| "void".to_string());
    if method.returns_list_result() {
        format!("AxiosPromise<ListResult<{}>>", result)
    } else {
        format!("AxiosPromise<ItemResult<{}>>", result)
    }
}

fn write_method(
    out: &mut String,
    repo: &ReflectionRepository,
    method: &MethodViewModel,
    owner: Option<&ClassViewModel>,
) {
    let args = client_arguments(repo, method, owner);
    let signature: Vec<String> = args
        .iter()
        .map(|(name, ty)| format!("{}?: {}", name, ty))
        .chain(std::iter::once("$config?: AxiosRequestConfig".to_string()))
        .collect();

    out.push_str("  \n");
    out.push_str(&format!(
        "  public {}({}): {} {{\n",
        method.json_name,
        signature.join(", "),
        result_promise(repo, method)
    ));
    out.push_str(&format!("    const $method = this.$metadata.methods.{}\n", method.json_name));
    out.push_str("    const $params =  {\n");
    for (name, _) in &args {
        out.push_str(&format!("      {},\n", name));
    }
    out.push_str("    }\n");
    out.push_str("    return this.$invoke($method, $params, $config)\n");
    out.push_str("  }\n");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoalesceConfig;
    use coalesce_model::testing;
    use pretty_assertions::assert_eq;

    fn render(fixture: &testing::ModelFixture) -> String {
        let ctx = Arc::new(GenerationContext::new(
            fixture.repo.clone(),
            CoalesceConfig::new("MyProject.Web"),
            ".",
        ));
        TsApiClients::new(ctx).render().unwrap()
    }

    #[test]
    fn test_backends_render_identically() {
        let [reflection, symbol] = testing::both();
        assert_eq!(render(reflection), render(symbol));
    }

    #[test]
    fn test_model_client_methods() {
        let text = render(&testing::both()[0]);
        assert!(text.contains("export class PersonApiClient extends ModelApiClient<$models.Person> {"));
        assert!(text.contains(
            "  public rename(id?: number | null, name?: string | null, $config?: AxiosRequestConfig): AxiosPromise<ItemResult<$models.Person>> {"
        ));
        assert!(text.contains(
            "  public staticListMethod(filter?: string | null, $config?: AxiosRequestConfig): AxiosPromise<ListResult<$models.Person>> {"
        ));
        assert!(text.contains("): AxiosPromise<ItemResult<$models.Person[]>> {"));
        assert!(!text.contains("StandaloneReportApiClient extends ServiceApiClient"));
    }

    #[test]
    fn test_service_client() {
        let text = render(&testing::both()[1]);
        assert!(text.contains(
            "export class WeatherServiceApiClient extends ServiceApiClient<typeof $metadata.WeatherService> {"
        ));
        assert!(text.contains(
            "  public getWeather(location?: string | null, dateTime?: Date | null, $config?: AxiosRequestConfig): AxiosPromise<ItemResult<$models.WeatherData>> {"
        ));
    }
}
