//! Custom methods
//!
//! Methods declared on models and services are described by the model but
//! implemented by the application. Implementations are registered as async
//! handlers keyed by the declaring class and method name; the controllers
//! bind client arguments, inject framework values and dispatch to them.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use coalesce_core::{CoalesceError, CoalesceResult};
use coalesce_model::{AttributeValue, ClassViewModel, MethodViewModel, ParameterInjection, TypeViewModel};

use crate::context::CrudContext;
use crate::db::Record;
use crate::include_tree::IncludeTree;
use crate::results::{ItemResult, ListResult, ValidationIssue};
use crate::validation::validate_arguments;
use crate::values::{coerce_value, default_value};

/// Everything a handler needs for one invocation
#[derive(Debug, Clone)]
pub struct MethodCall {
    pub ctx: Arc<CrudContext>,
    pub class: Arc<ClassViewModel>,
    pub method: MethodViewModel,
    /// The loaded instance for instance methods
    pub instance: Option<Record>,
    /// Bound client arguments keyed by declared parameter name
    pub args: Map<String, Value>,
}

impl MethodCall {
    pub fn arg(&self, name: &str) -> Option<&Value> {
        self.args.get(name).or_else(|| {
            self.args
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v)
        })
    }

    pub fn arg_as<T: DeserializeOwned>(&self, name: &str) -> CoalesceResult<T> {
        let value = self.arg(name).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value)
            .map_err(|e| CoalesceError::validation(format!("Argument '{}': {}", name, e)))
    }

    /// An injected service by the parameter's type name
    pub fn service<T: Send + Sync + 'static>(&self, type_name: &str) -> CoalesceResult<Arc<T>> {
        self.ctx
            .services()
            .get::<T>(type_name)
            .ok_or_else(|| CoalesceError::internal(format!("No service registered for {}", type_name)))
    }
}

/// What a handler produced
#[derive(Debug, Clone, PartialEq)]
pub enum MethodReturn {
    Void,
    /// A plain return value; entity records are mapped to DTOs by the caller
    Value(Value),
    Item(ItemResult<Value>),
    List(ListResult<Value>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodOutput {
    pub result: MethodReturn,
    /// Set by methods with an `out IncludeTree` parameter
    pub include_tree: Option<IncludeTree>,
}

impl MethodOutput {
    pub fn void() -> Self {
        Self {
            result: MethodReturn::Void,
            include_tree: None,
        }
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Self {
            result: MethodReturn::Value(value.into()),
            include_tree: None,
        }
    }

    pub fn item(result: ItemResult<Value>) -> Self {
        Self {
            result: MethodReturn::Item(result),
            include_tree: None,
        }
    }

    pub fn list(result: ListResult<Value>) -> Self {
        Self {
            result: MethodReturn::List(result),
            include_tree: None,
        }
    }

    pub fn with_include_tree(mut self, tree: IncludeTree) -> Self {
        self.include_tree = Some(tree);
        self
    }
}

pub type MethodHandler = Arc<dyn Fn(MethodCall) -> BoxFuture<'static, CoalesceResult<MethodOutput>> + Send + Sync>;

// ============================================================================
// Registry
// ============================================================================

#[derive(Clone, Default)]
pub struct MethodRegistry {
    handlers: HashMap<(String, String), MethodHandler>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the implementation of `class_name.method_name`
    ///
    /// `class_name` may be the full or the short class name.
    pub fn register<F, Fut>(mut self, class_name: &str, method_name: &str, handler: F) -> Self
    where
        F: Fn(MethodCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CoalesceResult<MethodOutput>> + Send + 'static,
    {
        let handler: MethodHandler = Arc::new(move |call| handler(call).boxed());
        self.handlers
            .insert((class_name.to_string(), method_name.to_string()), handler);
        self
    }

    pub fn get(&self, class: &ClassViewModel, method_name: &str) -> Option<&MethodHandler> {
        self.handlers
            .get(&(class.full_name.clone(), method_name.to_string()))
            .or_else(|| self.handlers.get(&(class.name.clone(), method_name.to_string())))
    }

    pub async fn invoke(&self, call: MethodCall) -> CoalesceResult<MethodOutput> {
        let Some(handler) = self.get(&call.class, &call.method.name) else {
            return Err(CoalesceError::internal(format!(
                "No implementation registered for {}.{}",
                call.class.name, call.method.name
            )));
        };
        handler(call).await
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// Argument binding
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArguments {
    pub args: Map<String, Value>,
    pub issues: Vec<ValidationIssue>,
}

/// Bind client arguments for `method` from a request body or query
///
/// Arguments are looked up by JSON name, then declared name. Missing
/// arguments take the declared default or the type's default. Injected
/// services must be registered.
pub fn bind_arguments(
    ctx: &CrudContext,
    method: &MethodViewModel,
    raw: &Map<String, Value>,
) -> CoalesceResult<BoundArguments> {
    let mut bound = BoundArguments::default();

    for param in &method.parameters {
        match param.injection {
            ParameterInjection::Client => {}
            ParameterInjection::Service => {
                let type_name = param.type_vm.qualified_name();
                if !ctx.services().contains(&type_name) {
                    return Err(CoalesceError::internal(format!(
                        "No service registered for {} (parameter '{}' of {})",
                        type_name, param.name, method.name
                    )));
                }
                continue;
            }
            _ => continue,
        }

        let supplied = raw
            .get(&param.json_name)
            .or_else(|| raw.get(&param.name))
            .or_else(|| {
                raw.iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(&param.name))
                    .map(|(_, v)| v)
            });
        let value = match supplied {
            Some(value) => match coerce_value(&param.type_vm, value) {
                Some(v) => v,
                None => {
                    bound.issues.push(ValidationIssue::new(
                        param.json_name.clone(),
                        format!("{} has an invalid value.", param.display_name),
                    ));
                    continue;
                }
            },
            None => param
                .default_value
                .as_ref()
                .and_then(|d| attribute_json(&param.type_vm, d))
                .unwrap_or_else(|| default_value(&param.type_vm)),
        };
        bound.args.insert(param.name.clone(), value);
    }

    if bound.issues.is_empty() {
        bound.issues = validate_arguments(method, &bound.args);
    }
    Ok(bound)
}

/// A declared constant as a stored value of `ty`
fn attribute_json(ty: &TypeViewModel, value: &AttributeValue) -> Option<Value> {
    let json = match value {
        AttributeValue::Null => Value::Null,
        AttributeValue::Bool(b) => Value::Bool(*b),
        AttributeValue::Int(i) => Value::from(*i),
        AttributeValue::Float(f) => Value::from(*f),
        AttributeValue::String(s) => Value::String(s.clone()),
        AttributeValue::Enum { member, .. } => Value::String(member.clone()),
        AttributeValue::Type(t) => Value::String(t.qualified_name()),
        AttributeValue::Array(items) => {
            let element = ty.collection_element_type()?;
            return items
                .iter()
                .map(|item| attribute_json(&element, item))
                .collect::<Option<Vec<_>>>()
                .map(Value::Array);
        }
    };
    coerce_value(ty, &json)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ServiceRegistry;
    use crate::db::InMemoryDatabase;
    use coalesce_model::testing;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct Weather;

    fn context(services: ServiceRegistry) -> CrudContext {
        let repo = testing::both()[0].repo.clone();
        let db = InMemoryDatabase::new(repo.clone());
        CrudContext::new(repo, Arc::new(db.session())).with_services(Arc::new(services))
    }

    fn many_params() -> MethodViewModel {
        let class = testing::both()[0].repo.require_class("ComplexModel").unwrap();
        class.method("MethodWithManyParams").unwrap().clone()
    }

    fn raw(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    // ── binding ──

    #[test]
    fn test_bind_client_arguments_only() {
        let ctx = context(ServiceRegistry::new().register("IWeatherService", Arc::new(Weather)));
        let bound = bind_arguments(&ctx, &many_params(), &raw(json!({"id": "5", "name": "x"}))).unwrap();
        assert_eq!(bound.args, raw(json!({"id": 5, "name": "x"})));
        assert!(bound.issues.is_empty());
    }

    #[test]
    fn test_bind_missing_and_invalid() {
        let ctx = context(ServiceRegistry::new().register("IWeatherService", Arc::new(Weather)));
        let bound = bind_arguments(&ctx, &many_params(), &Map::new()).unwrap();
        assert_eq!(bound.args, raw(json!({"id": 0, "name": null})));

        let bound = bind_arguments(&ctx, &many_params(), &raw(json!({"id": "abc"}))).unwrap();
        assert_eq!(bound.issues, vec![ValidationIssue::new("id", "Id has an invalid value.")]);
    }

    #[test]
    fn test_bind_requires_injected_service() {
        let ctx = context(ServiceRegistry::new());
        let err = bind_arguments(&ctx, &many_params(), &Map::new()).unwrap_err();
        assert!(err.to_string().contains("IWeatherService"));
    }

    // ── dispatch ──

    #[tokio::test]
    async fn test_registry_dispatch() {
        let class = testing::both()[0].repo.require_class("ComplexModel").unwrap();
        let method = class.method("GetMethod").unwrap().clone();
        let registry = MethodRegistry::new().register("ComplexModel", "GetMethod", |call: MethodCall| async move {
            Ok(MethodOutput::value(format!("hello from {}", call.class.name)))
        });
        let call = MethodCall {
            ctx: Arc::new(context(ServiceRegistry::new())),
            class: class.clone(),
            method,
            instance: None,
            args: Map::new(),
        };
        let output = registry.invoke(call.clone()).await.unwrap();
        assert_eq!(output.result, MethodReturn::Value(json!("hello from ComplexModel")));

        let missing = MethodCall {
            method: class.method("VoidMethod").unwrap().clone(),
            ..call
        };
        assert!(registry.invoke(missing).await.is_err());
    }

    #[test]
    fn test_call_argument_helpers() {
        let class = testing::both()[0].repo.require_class("ComplexModel").unwrap();
        let call = MethodCall {
            ctx: Arc::new(context(ServiceRegistry::new())),
            class: class.clone(),
            method: many_params(),
            instance: None,
            args: raw(json!({"id": 7, "name": "n"})),
        };
        assert_eq!(call.arg_as::<i64>("Id").unwrap(), 7);
        assert_eq!(call.arg("name"), Some(&json!("n")));
        assert!(call.service::<Weather>("IWeatherService").is_err());
    }
}
