//! Kernel plugin tool surface
//!
//! Entities marked `[SemanticKernel]` are exposed to AI agents as tools:
//! `list_<entity>`, `get_<entity>`, `save_<entity>` and `delete_<entity>`.
//! Every tool call runs in a fresh scope so that one call's change tracker
//! never leaks into the next.

use std::fmt;
use std::sync::Arc;

use heck::ToSnakeCase;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use coalesce_core::{CoalesceError, CoalesceResult, SecurityPermissionLevel};
use coalesce_model::ClassViewModel;

use crate::context::CrudContext;
use crate::controller::ApiEngine;
use crate::params::{DataSourceParameters, ListParameters};

/// Page size used by `list_*` tools
pub const KERNEL_PAGE_SIZE: usize = 100;

/// Creates one request scope per tool call
pub trait ScopeFactory: Send + Sync {
    fn create_scope(&self) -> CrudContext;
}

impl<F> ScopeFactory for F
where
    F: Fn() -> CrudContext + Send + Sync,
{
    fn create_scope(&self) -> CrudContext {
        self()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    List,
    Get,
    Save,
    Delete,
}

impl ToolKind {
    fn prefix(self) -> &'static str {
        match self {
            ToolKind::List => "list",
            ToolKind::Get => "get",
            ToolKind::Save => "save",
            ToolKind::Delete => "delete",
        }
    }
}

/// One callable tool
#[derive(Debug, Clone, Serialize)]
pub struct KernelTool {
    pub name: String,
    pub description: String,
    pub kind: ToolKind,
    /// JSON schema of the arguments object
    pub parameters: Value,
    #[serde(skip)]
    pub entity: Arc<ClassViewModel>,
}

pub struct KernelPlugin {
    engine: Arc<ApiEngine>,
    scopes: Arc<dyn ScopeFactory>,
    tools: Vec<KernelTool>,
}

impl KernelPlugin {
    pub fn new(engine: Arc<ApiEngine>, scopes: Arc<dyn ScopeFactory>) -> Self {
        let tools = engine
            .repository()
            .entities()
            .filter(|e| e.kernel_description.is_some())
            .flat_map(tools_for)
            .collect::<Vec<_>>();
        info!(tools = tools.len(), "Built kernel plugin");
        Self { engine, scopes, tools }
    }

    pub fn tools(&self) -> &[KernelTool] {
        &self.tools
    }

    pub fn tool(&self, name: &str) -> Option<&KernelTool> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// Run one tool in a new scope and return its envelope as JSON
    ///
    /// Authorization and validation failures come back as failed envelopes;
    /// only an unknown tool name is an error.
    pub async fn invoke_scoped(&self, name: &str, args: &Map<String, Value>) -> CoalesceResult<Value> {
        let tool = self
            .tool(name)
            .ok_or_else(|| CoalesceError::KeyNotFound(format!("No kernel tool named '{}'", name)))?;
        let ctx = self.scopes.create_scope();
        let controller = self.engine.model_controller(&tool.entity.name)?;
        debug!(tool = name, "Invoking kernel tool");

        let body = match tool.kind {
            ToolKind::List => {
                let params = list_parameters(args);
                controller.list(&ctx, &params).await.json()
            }
            ToolKind::Get => {
                let id = args.get("id").cloned().unwrap_or(Value::Null);
                controller.get(&ctx, &id, &DataSourceParameters::default()).await.json()
            }
            ToolKind::Save => {
                let dto = match args.get("dto") {
                    Some(Value::Object(dto)) => dto.clone(),
                    Some(Value::String(text)) => serde_json::from_str::<Map<String, Value>>(text)
                        .map_err(|e| CoalesceError::validation(format!("dto is not a JSON object: {}", e)))?,
                    _ => args.clone(),
                };
                controller.save(&ctx, &dto, &DataSourceParameters::default()).await.json()
            }
            ToolKind::Delete => {
                let id = args.get("id").cloned().unwrap_or(Value::Null);
                controller.delete(&ctx, &id, &DataSourceParameters::default()).await.json()
            }
        };
        Ok(body)
    }
}

impl fmt::Debug for KernelPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelPlugin")
            .field("tools", &self.tools.iter().map(|t| &t.name).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

fn denies_all(level: SecurityPermissionLevel) -> bool {
    level == SecurityPermissionLevel::DenyAll
}

fn tools_for(entity: &Arc<ClassViewModel>) -> Vec<KernelTool> {
    let snake = entity.name.to_snake_case();
    let about = entity.kernel_description.clone().unwrap_or_default();
    let security = &entity.security;
    let mut kinds = vec![ToolKind::List, ToolKind::Get];
    if !(denies_all(security.create.level) && denies_all(security.edit.level)) {
        kinds.push(ToolKind::Save);
    }
    if !denies_all(security.delete.level) {
        kinds.push(ToolKind::Delete);
    }

    let id_schema = json!({
        "type": "object",
        "properties": {"id": {"description": format!("The {} key", entity.display_name)}},
        "required": ["id"],
    });
    kinds
        .into_iter()
        .map(|kind| {
            let (description, parameters) = match kind {
                ToolKind::List => (
                    format!("Search and page through {} items. {}", entity.display_name, about),
                    json!({
                        "type": "object",
                        "properties": {
                            "search": {"type": "string"},
                            "page": {"type": "integer", "minimum": 1},
                            "countOnly": {"type": "boolean"},
                            "fields": {"type": "array", "items": {"type": "string"}},
                        },
                    }),
                ),
                ToolKind::Get => (
                    format!("Get one {} by key. {}", entity.display_name, about),
                    id_schema.clone(),
                ),
                ToolKind::Save => (
                    format!("Create or update a {}. {}", entity.display_name, about),
                    json!({
                        "type": "object",
                        "properties": {"dto": {"type": "object"}},
                        "required": ["dto"],
                    }),
                ),
                ToolKind::Delete => (
                    format!("Delete a {} by key. {}", entity.display_name, about),
                    id_schema.clone(),
                ),
            };
            KernelTool {
                name: format!("{}_{}", kind.prefix(), snake),
                description: description.trim().to_string(),
                kind,
                parameters,
                entity: entity.clone(),
            }
        })
        .collect()
}

fn list_parameters(args: &Map<String, Value>) -> ListParameters {
    let mut params = ListParameters {
        page: args.get("page").and_then(Value::as_u64).map(|p| p as usize),
        page_size: Some(KERNEL_PAGE_SIZE),
        count_only: args.get("countOnly").and_then(Value::as_bool).unwrap_or(false),
        ..Default::default()
    };
    params.filter.search = args
        .get("search")
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string);
    params.fields = match args.get("fields") {
        Some(Value::Array(items)) if !items.is_empty() => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(","),
        ),
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    };
    params
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryDatabase;
    use coalesce_model::{ClaimsPrincipal, testing};
    use pretty_assertions::assert_eq;

    fn plugin(user: ClaimsPrincipal) -> (KernelPlugin, Arc<InMemoryDatabase>) {
        let db = InMemoryDatabase::new(testing::both()[0].repo.clone());
        db.seed(
            "Company",
            [
                json!({"name": "Acme Corp", "logoUrl": "https://acme.test/logo.png"}),
                json!({"name": "Globex", "logoUrl": "https://cdn.test/acme-like.png"}),
                json!({"name": "Initech"}),
            ],
        )
        .unwrap();
        let engine = Arc::new(ApiEngine::new(db.repository().clone()));
        let scope_db = db.clone();
        let scopes = move || {
            CrudContext::new(scope_db.repository().clone(), Arc::new(scope_db.session())).with_user(user.clone())
        };
        (KernelPlugin::new(engine, Arc::new(scopes)), db)
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_tools_for_marked_entities() {
        let (plugin, _) = plugin(ClaimsPrincipal::authenticated("u"));
        let names: Vec<&str> = plugin
            .tools()
            .iter()
            .filter(|t| t.entity.name == "Company")
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(names, vec!["list_company", "get_company", "save_company", "delete_company"]);
        let list = plugin.tool("list_company").unwrap();
        assert!(list.description.contains("where they are located"));
        assert!(plugin.tool("save_product").is_some());
        assert!(plugin.tool("list_person").is_none());
    }

    #[tokio::test]
    async fn test_list_search_uses_kernel_page_size() {
        let (plugin, _) = plugin(ClaimsPrincipal::authenticated("u"));
        let body = plugin
            .invoke_scoped(
                "list_company",
                &args(json!({"search": "Acme", "page": 1, "countOnly": false, "fields": []})),
            )
            .await
            .unwrap();
        assert_eq!(body["wasSuccessful"], json!(true));
        assert_eq!(body["page"], json!(1));
        assert_eq!(body["pageSize"], json!(100));
        assert_eq!(body["totalCount"], json!(2));
        let names: Vec<&str> = body["list"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|c| c["name"].as_str())
            .collect();
        assert_eq!(names, vec!["Acme Corp", "Globex"]);
    }

    #[tokio::test]
    async fn test_each_call_gets_a_fresh_scope() {
        let (plugin, db) = plugin(ClaimsPrincipal::authenticated("u"));
        db.seed("Product", [json!({"name": "Widget", "uniqueId1": "qwerty"})])
            .unwrap();

        // The failed insert stays staged in its own scope only
        let failed = plugin
            .invoke_scoped("save_product", &args(json!({"dto": {"name": "Copy", "uniqueId1": "qwerty"}})))
            .await
            .unwrap();
        assert_eq!(failed["wasSuccessful"], json!(false));
        assert_eq!(
            failed["message"],
            json!("A different item with ID1 'qwerty' already exists.")
        );

        let saved = plugin
            .invoke_scoped("save_product", &args(json!({"dto": "{\"name\": \"Gadget\", \"uniqueId1\": \"asdf\"}"})))
            .await
            .unwrap();
        assert_eq!(saved["wasSuccessful"], json!(true));
        // identity 2 went to the rejected insert
        assert_eq!(saved["object"]["productId"], json!(3));
        assert_eq!(db.rows("Product").len(), 2);
    }

    #[tokio::test]
    async fn test_auth_failures_are_envelopes() {
        let (plugin, _) = plugin(ClaimsPrincipal::anonymous());
        let body = plugin
            .invoke_scoped("get_company", &args(json!({"id": 1})))
            .await
            .unwrap();
        assert_eq!(body["wasSuccessful"], json!(false));
        assert!(plugin.invoke_scoped("drop_tables", &Map::new()).await.is_err());
    }
}
