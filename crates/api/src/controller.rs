//! API controllers
//!
//! A [`ModelApiController`] serves the fixed verb surface of one entity
//! (`list`, `count`, `get`, `save`, `delete`, `propertyValues`) plus its
//! custom methods; a [`ServiceApiController`] serves the methods of a
//! service. Every action answers with an HTTP status and an envelope.
//!
//! Status codes:
//!
//! ```text
//! 200  success
//! 400  failed envelope (validation, constraint, bad data source name)
//! 401  anonymous user denied
//! 403  authenticated user denied
//! 404  item or method not found
//! 499  request cancelled
//! 500  unexpected error
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use coalesce_core::{CoalesceError, CoalesceResult};
use coalesce_model::{ClassViewModel, MethodViewModel, PropertyViewModel, ReflectionRepository, TypeViewModel};

use crate::behaviors::Behaviors;
use crate::context::CrudContext;
use crate::data_source::DataSource;
use crate::factory::{BehaviorsFactory, DataSourceFactory};
use crate::include_tree::{IncludeScope, IncludeTree};
use crate::mapping::{MapOptions, map_to_dto};
use crate::methods::{MethodCall, MethodRegistry, MethodReturn, bind_arguments};
use crate::params::{DataSourceParameters, FilterParameters, ListParameters};
use crate::results::{ItemResult, ListResult};
use crate::values::display_value;

/// Message for unexpected errors when details are hidden
pub const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred while processing the request.";

/// A status code and the envelope to serialize
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    pub status: u16,
    pub body: T,
}

impl<T> ApiResponse<T> {
    pub fn new(status: u16, body: T) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl<T: Serialize> ApiResponse<T> {
    /// The body as JSON
    pub fn json(&self) -> Value {
        serde_json::to_value(&self.body).unwrap_or(Value::Null)
    }
}

/// Envelopes that can carry a failure
trait Envelope {
    fn failed(message: String) -> Self;
    fn succeeded(&self) -> bool;
}

impl<T> Envelope for ItemResult<T> {
    fn failed(message: String) -> Self {
        ItemResult::failure(message)
    }

    fn succeeded(&self) -> bool {
        self.was_successful
    }
}

impl<T> Envelope for ListResult<T> {
    fn failed(message: String) -> Self {
        ListResult::failure(message)
    }

    fn succeeded(&self) -> bool {
        self.was_successful
    }
}

fn denied<R: Envelope>(ctx: &CrudContext, message: String) -> ApiResponse<R> {
    let status = if ctx.user().is_authenticated() { 403 } else { 401 };
    ApiResponse::new(status, R::failed(message))
}

/// Turn an action outcome into a response, logging unexpected errors
fn respond<R: Envelope>(ctx: &CrudContext, target: &str, action: &str, outcome: CoalesceResult<R>) -> ApiResponse<R> {
    match outcome {
        Ok(body) => {
            let status = if body.succeeded() { 200 } else { 400 };
            ApiResponse::new(status, body)
        }
        Err(CoalesceError::Cancelled) => {
            debug!(target_type = target, action, "Request cancelled");
            ApiResponse::new(499, R::failed(CoalesceError::Cancelled.to_string()))
        }
        Err(CoalesceError::KeyNotFound(message)) => ApiResponse::new(400, R::failed(message)),
        Err(CoalesceError::Validation(message)) => ApiResponse::new(400, R::failed(message)),
        Err(e) => {
            error!(target_type = target, action, error = %e, "Unhandled error");
            let message = if ctx.options().detailed_exception_messages {
                e.to_string()
            } else {
                GENERIC_ERROR_MESSAGE.to_string()
            };
            ApiResponse::new(500, R::failed(message))
        }
    }
}

// ============================================================================
// ApiEngine
// ============================================================================

/// Shared, read-only wiring for every controller
#[derive(Debug, Clone)]
pub struct ApiEngine {
    repository: Arc<ReflectionRepository>,
    data_sources: DataSourceFactory,
    behaviors: BehaviorsFactory,
    methods: MethodRegistry,
}

impl ApiEngine {
    pub fn new(repository: Arc<ReflectionRepository>) -> Self {
        Self {
            repository,
            data_sources: DataSourceFactory::new(),
            behaviors: BehaviorsFactory::new(),
            methods: MethodRegistry::new(),
        }
    }

    pub fn with_data_sources(mut self, data_sources: DataSourceFactory) -> Self {
        self.data_sources = data_sources;
        self
    }

    pub fn with_behaviors(mut self, behaviors: BehaviorsFactory) -> Self {
        self.behaviors = behaviors;
        self
    }

    pub fn with_methods(mut self, methods: MethodRegistry) -> Self {
        self.methods = methods;
        self
    }

    pub fn repository(&self) -> &Arc<ReflectionRepository> {
        &self.repository
    }

    pub fn data_sources(&self) -> &DataSourceFactory {
        &self.data_sources
    }

    pub fn behaviors(&self) -> &BehaviorsFactory {
        &self.behaviors
    }

    pub fn methods(&self) -> &MethodRegistry {
        &self.methods
    }

    pub fn model_controller(self: &Arc<Self>, class_name: &str) -> CoalesceResult<ModelApiController> {
        let class = self.repository.require_class(class_name)?;
        if !class.is_crud_model() {
            return Err(CoalesceError::validation(format!("{} is not an exposed model", class.name)));
        }
        Ok(ModelApiController {
            engine: self.clone(),
            class,
        })
    }

    pub fn service_controller(self: &Arc<Self>, class_name: &str) -> CoalesceResult<ServiceApiController> {
        let class = self.repository.require_class(class_name)?;
        if !class.is_service() {
            return Err(CoalesceError::validation(format!("{} is not a service", class.name)));
        }
        Ok(ServiceApiController {
            engine: self.clone(),
            class,
        })
    }

    fn data_source(&self, class: &Arc<ClassViewModel>, params: &DataSourceParameters) -> CoalesceResult<Arc<dyn DataSource>> {
        self.data_sources
            .get(&self.repository, class, params.data_source_name())
    }

    /// Bind, authorize and run a custom method
    async fn invoke(
        &self,
        ctx: Arc<CrudContext>,
        class: &Arc<ClassViewModel>,
        method_name: &str,
        id: Option<&Value>,
        args: &Map<String, Value>,
    ) -> ApiResponse<Value> {
        let Some(method) = class
            .client_methods()
            .find(|m| m.name.eq_ignore_ascii_case(method_name) || m.json_name == method_name)
            .cloned()
        else {
            return item_response(ApiResponse::new(
                404,
                ItemResult::failure(format!("Method {} not found on {}.", method_name, class.name)),
            ));
        };
        if !method.security.is_executable(ctx.user()) {
            return item_response(denied(&ctx, format!("Execution of {} is not allowed.", method.name)));
        }

        let outcome = self.run_method(ctx.clone(), class, &method, id, args).await;
        match outcome {
            Ok(response) => response,
            Err(e) => {
                let response: ApiResponse<ItemResult<Value>> = respond(&ctx, &class.name, &method.name, Err(e));
                item_response(response)
            }
        }
    }

    async fn run_method(
        &self,
        ctx: Arc<CrudContext>,
        class: &Arc<ClassViewModel>,
        method: &MethodViewModel,
        id: Option<&Value>,
        args: &Map<String, Value>,
    ) -> CoalesceResult<ApiResponse<Value>> {
        let instance = if method.is_static || class.is_service() {
            None
        } else {
            let Some(id) = id.filter(|v| !v.is_null()) else {
                return Ok(item_response(ApiResponse::new(
                    400,
                    ItemResult::failure(format!("An id is required to call {}.", method.name)),
                )));
            };
            let params = DataSourceParameters {
                data_source: Some(method.load_from_data_source_name.clone()),
                ..Default::default()
            };
            let data_source = self.data_source(class, &params)?;
            match data_source.get_item(&ctx, id, &params).await? {
                Some(item) => Some(item.record),
                None => {
                    return Ok(item_response(ApiResponse::new(
                        404,
                        ItemResult::not_found(display_value(id)),
                    )));
                }
            }
        };

        let bound = bind_arguments(&ctx, method, args)?;
        if !bound.issues.is_empty() {
            return Ok(item_response(ApiResponse::new(400, ItemResult::invalid(bound.issues))));
        }
        ctx.check_cancelled()?;

        let call = MethodCall {
            ctx: ctx.clone(),
            class: class.clone(),
            method: method.clone(),
            instance,
            args: bound.args,
        };
        let output = self.methods.invoke(call).await?;
        debug!(class = %class.name, method = %method.name, "Invoked method");

        let result_type = method.result_type();
        let options = MapOptions::default();
        let tree = output.include_tree;
        let map = |value: Value| map_result(&ctx, result_type.as_ref(), value, tree.as_ref(), &options);
        let response = match output.result {
            MethodReturn::Void => item_response(ApiResponse::new(200, ItemResult::<Value>::ok())),
            MethodReturn::Value(value) => item_response(ApiResponse::new(200, ItemResult::success(map(value)))),
            MethodReturn::Item(result) => {
                let status = if result.was_successful { 200 } else { 400 };
                item_response(ApiResponse::new(status, result.map(map)))
            }
            MethodReturn::List(result) => {
                let status = if result.was_successful { 200 } else { 400 };
                let body = result.map(map);
                ApiResponse::new(status, serde_json::to_value(&body).unwrap_or(Value::Null))
            }
        };
        Ok(response)
    }
}

fn item_response(response: ApiResponse<ItemResult<Value>>) -> ApiResponse<Value> {
    ApiResponse::new(
        response.status,
        serde_json::to_value(&response.body).unwrap_or(Value::Null),
    )
}

/// Map a method's return value to DTOs when its type is a model class
fn map_result(
    ctx: &CrudContext,
    ty: Option<&TypeViewModel>,
    value: Value,
    tree: Option<&IncludeTree>,
    options: &MapOptions,
) -> Value {
    let Some(class) = ty.and_then(|t| t.pure_type().class_view_model(ctx.repository())) else {
        return value;
    };
    let scope = tree.map(IncludeScope::from).unwrap_or(IncludeScope::All);
    match value {
        Value::Object(record) => map_to_dto(ctx, &class, &record, scope, options),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| match item {
                    Value::Object(record) => map_to_dto(ctx, &class, &record, scope, options),
                    other => other,
                })
                .collect(),
        ),
        other => other,
    }
}

// ============================================================================
// ModelApiController
// ============================================================================

#[derive(Debug, Clone)]
pub struct ModelApiController {
    engine: Arc<ApiEngine>,
    class: Arc<ClassViewModel>,
}

impl ModelApiController {
    pub fn class(&self) -> &Arc<ClassViewModel> {
        &self.class
    }

    fn read_denied<R: Envelope>(&self, ctx: &CrudContext) -> Option<ApiResponse<R>> {
        (!self.class.security.is_read_allowed(ctx.user()))
            .then(|| denied(ctx, format!("Reading of {} items not allowed.", self.class.name)))
    }

    async fn try_list(&self, ctx: &CrudContext, params: &ListParameters) -> CoalesceResult<ListResult<Value>> {
        let data_source = self.engine.data_source(&self.class, &params.filter.data_source)?;
        let page = data_source.get_list(ctx, params).await?;
        if params.count_only {
            return Ok(ListResult::count_only(page.page, page.page_size, page.total_count));
        }
        let options = MapOptions::default()
            .with_includes(params.filter.data_source.includes.as_deref())
            .with_fields(params.field_list());
        let list = page
            .items
            .iter()
            .map(|row| map_to_dto(ctx, &self.class, row, IncludeScope::from(&page.include_tree), &options))
            .collect();
        Ok(ListResult::success(list, page.page, page.page_size, page.total_count))
    }

    async fn try_get(&self, ctx: &CrudContext, id: &Value, params: &DataSourceParameters) -> CoalesceResult<Option<Value>> {
        let data_source = self.engine.data_source(&self.class, params)?;
        let options = MapOptions::default().with_includes(params.includes.as_deref());
        Ok(data_source.get_item(ctx, id, params).await?.map(|item| {
            map_to_dto(ctx, &self.class, &item.record, IncludeScope::from(&item.include_tree), &options)
        }))
    }

    async fn try_property_values(
        &self,
        ctx: &CrudContext,
        prop: &PropertyViewModel,
        page: Option<usize>,
        search: &str,
    ) -> CoalesceResult<ListResult<String>> {
        let data_source = self.engine.data_source(&self.class, &DataSourceParameters::default())?;
        let params = ListParameters {
            page_size: Some(ctx.options().max_page_size),
            order_by: Some(prop.name.clone()),
            ..Default::default()
        };
        let rows = data_source.get_list(ctx, &params).await?.items;
        let needle = search.trim().to_lowercase();
        let mut seen = BTreeSet::new();
        let values: Vec<String> = rows
            .iter()
            .filter(|row| ctx.restrictions().can_read(ctx, prop, row))
            .filter_map(|row| row.get(&prop.name).and_then(Value::as_str))
            .filter(|v| !v.is_empty() && v.to_lowercase().starts_with(&needle))
            .filter(|v| seen.insert(v.to_lowercase()))
            .map(str::to_string)
            .collect();
        let (page, page_size) = ctx.options().paging(page, None);
        let total = values.len() as i64;
        let list = values
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();
        Ok(ListResult::success(list, page, page_size, total))
    }

    pub async fn list(&self, ctx: &CrudContext, params: &ListParameters) -> ApiResponse<ListResult<Value>> {
        if let Some(response) = self.read_denied(ctx) {
            return response;
        }
        let outcome = self.try_list(ctx, params).await;
        respond(ctx, &self.class.name, "list", outcome)
    }

    pub async fn count(&self, ctx: &CrudContext, params: &FilterParameters) -> ApiResponse<ItemResult<i64>> {
        if let Some(response) = self.read_denied(ctx) {
            return response;
        }
        let outcome = match self.engine.data_source(&self.class, &params.data_source) {
            Ok(data_source) => data_source.get_count(ctx, params).await.map(ItemResult::success),
            Err(e) => Err(e),
        };
        respond(ctx, &self.class.name, "count", outcome)
    }

    pub async fn get(&self, ctx: &CrudContext, id: &Value, params: &DataSourceParameters) -> ApiResponse<ItemResult<Value>> {
        if let Some(response) = self.read_denied(ctx) {
            return response;
        }
        let outcome = self.try_get(ctx, id, params).await;
        match outcome {
            Ok(Some(object)) => ApiResponse::new(200, ItemResult::success(object)),
            Ok(None) => ApiResponse::new(404, ItemResult::not_found(display_value(id))),
            Err(e) => respond(ctx, &self.class.name, "get", Err(e)),
        }
    }

    pub async fn save(
        &self,
        ctx: &CrudContext,
        dto: &Map<String, Value>,
        params: &DataSourceParameters,
    ) -> ApiResponse<ItemResult<Value>> {
        let user = ctx.user();
        if !self.class.security.is_create_allowed(user) && !self.class.security.is_edit_allowed(user) {
            return denied(ctx, format!("Saving of {} items not allowed.", self.class.name));
        }
        let outcome = match self.engine.data_source(&self.class, params) {
            Ok(data_source) => {
                let behaviors = self.engine.behaviors.get(&self.class);
                behaviors.save(ctx, dto, data_source.as_ref(), params).await
            }
            Err(e) => Err(e),
        };
        respond(ctx, &self.class.name, "save", outcome)
    }

    pub async fn delete(&self, ctx: &CrudContext, id: &Value, params: &DataSourceParameters) -> ApiResponse<ItemResult<Value>> {
        if !self.class.security.is_delete_allowed(ctx.user()) {
            return denied(ctx, format!("Deletion of {} items not allowed.", self.class.name));
        }
        let outcome = match self.engine.data_source(&self.class, params) {
            Ok(data_source) => {
                let behaviors: Arc<dyn Behaviors> = self.engine.behaviors.get(&self.class);
                behaviors.delete(ctx, id, data_source.as_ref(), params).await
            }
            Err(e) => Err(e),
        };
        let not_found = ItemResult::<Value>::not_found(display_value(id)).message;
        match respond(ctx, &self.class.name, "delete", outcome) {
            response if response.status == 400 && response.body.message == not_found => {
                ApiResponse::new(404, response.body)
            }
            response => response,
        }
    }

    /// Distinct values of a string property starting with `search`
    pub async fn property_values(
        &self,
        ctx: &CrudContext,
        property: &str,
        page: Option<usize>,
        search: &str,
    ) -> ApiResponse<ListResult<String>> {
        if let Some(response) = self.read_denied(ctx) {
            return response;
        }
        let Some(prop) = self
            .class
            .client_properties()
            .find(|p| p.name.eq_ignore_ascii_case(property) || p.json_name == property)
            .filter(|p| p.type_vm.nullable_stripped().is_string() && p.security.is_readable(ctx.user()))
        else {
            warn!(class = %self.class.name, property, "Property values requested for unknown property");
            return ApiResponse::new(400, ListResult::failure(format!("Unknown property {}.", property)));
        };

        let outcome = self.try_property_values(ctx, prop, page, search).await;
        respond(ctx, &self.class.name, "propertyValues", outcome)
    }

    /// Call a custom method; instance methods load `id` first
    pub async fn invoke(
        &self,
        ctx: Arc<CrudContext>,
        method_name: &str,
        id: Option<&Value>,
        args: &Map<String, Value>,
    ) -> ApiResponse<Value> {
        self.engine.invoke(ctx, &self.class, method_name, id, args).await
    }
}

// ============================================================================
// ServiceApiController
// ============================================================================

#[derive(Debug, Clone)]
pub struct ServiceApiController {
    engine: Arc<ApiEngine>,
    class: Arc<ClassViewModel>,
}

impl ServiceApiController {
    pub fn class(&self) -> &Arc<ClassViewModel> {
        &self.class
    }

    pub async fn invoke(&self, ctx: Arc<CrudContext>, method_name: &str, args: &Map<String, Value>) -> ApiResponse<Value> {
        self.engine.invoke(ctx, &self.class, method_name, None, args).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CoalesceOptions, ServiceRegistry};
    use crate::db::{DbContext, InMemoryDatabase, Record};
    use crate::methods::MethodOutput;
    use async_trait::async_trait;
    use coalesce_model::{ClaimsPrincipal, testing};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::any::Any;
    use tokio_util::sync::CancellationToken;

    fn seeded() -> Arc<InMemoryDatabase> {
        let db = InMemoryDatabase::new(testing::both()[0].repo.clone());
        db.seed(
            "Company",
            [
                json!({"name": "Acme Corp", "city": "Spokane"}),
                json!({"name": "Globex", "city": "Spokane"}),
                json!({"name": "Initech", "city": "Austin"}),
            ],
        )
        .unwrap();
        db.seed("Person", [json!({"firstName": "Ann", "lastName": "Lee", "companyId": 1})])
            .unwrap();
        db.seed("Product", [json!({"name": "Widget", "uniqueId1": "qwerty"})])
            .unwrap();
        db
    }

    fn engine(db: &Arc<InMemoryDatabase>) -> Arc<ApiEngine> {
        Arc::new(ApiEngine::new(db.repository().clone()))
    }

    fn context(db: &Arc<InMemoryDatabase>, user: ClaimsPrincipal) -> CrudContext {
        CrudContext::new(db.repository().clone(), Arc::new(db.session())).with_user(user)
    }

    fn user() -> ClaimsPrincipal {
        ClaimsPrincipal::authenticated("u")
    }

    // ── list / count / get ──

    #[tokio::test]
    async fn test_list_with_fields_projection() {
        let db = seeded();
        let controller = engine(&db).model_controller("Company").unwrap();
        let ctx = context(&db, user());
        let params = ListParameters::from_query([("fields", "name"), ("orderBy", "name")]);
        let response = controller.list(&ctx, &params).await;
        assert_eq!(response.status, 200);
        let list = response.body.list.unwrap();
        assert_eq!(list[0], json!({"name": "Acme Corp"}));
        assert_eq!(response.body.total_count, 3);
    }

    #[tokio::test]
    async fn test_count_and_count_only() {
        let db = seeded();
        let controller = engine(&db).model_controller("Company").unwrap();
        let ctx = context(&db, user());
        let params = FilterParameters {
            filter: [("city".to_string(), "Spokane".to_string())].into(),
            ..Default::default()
        };
        let response = controller.count(&ctx, &params).await;
        assert_eq!(response.body.object, Some(2));

        let list = controller
            .list(&ctx, &ListParameters::from_query([("countOnly", "true")]))
            .await;
        assert!(list.body.list.is_none());
        assert_eq!(list.body.total_count, 3);
    }

    #[tokio::test]
    async fn test_anonymous_and_forbidden() {
        let db = seeded();
        let engine = engine(&db);
        let companies = engine.model_controller("Company").unwrap();
        let anonymous = context(&db, ClaimsPrincipal::anonymous());
        assert_eq!(companies.list(&anonymous, &Default::default()).await.status, 401);

        // Product allows anonymous reads
        let products = engine.model_controller("Product").unwrap();
        assert_eq!(products.list(&anonymous, &Default::default()).await.status, 200);

        let cases = engine.model_controller("Case").unwrap();
        let response = cases.delete(&context(&db, user()), &json!(1), &Default::default()).await;
        assert_eq!(response.status, 403);
        assert_eq!(response.body.message.as_deref(), Some("Deletion of Case items not allowed."));
    }

    #[tokio::test]
    async fn test_get_missing_and_unknown_data_source() {
        let db = seeded();
        let controller = engine(&db).model_controller("Person").unwrap();
        let ctx = context(&db, user());
        let found = controller.get(&ctx, &json!(1), &Default::default()).await;
        assert_eq!(found.status, 200);
        assert_eq!(found.body.object.unwrap()["company"]["name"], json!("Acme Corp"));

        let missing = controller.get(&ctx, &json!(9), &Default::default()).await;
        assert_eq!(missing.status, 404);
        assert_eq!(missing.body.message.as_deref(), Some("Item with ID 9 was not found."));

        let params = DataSourceParameters {
            data_source: Some("Nope".into()),
            ..Default::default()
        };
        let bad = controller.get(&ctx, &json!(1), &params).await;
        assert_eq!(bad.status, 400);
    }

    // ── errors ──

    struct Broken;

    #[async_trait]
    impl DbContext for Broken {
        fn as_any(&self) -> &dyn Any {
            self
        }
        async fn load(&self, _: &ClassViewModel) -> CoalesceResult<Vec<Record>> {
            Err(CoalesceError::database("connection reset"))
        }
        fn add(&self, _: &Arc<ClassViewModel>, record: Record) -> CoalesceResult<Record> {
            Ok(record)
        }
        fn update(&self, _: &Arc<ClassViewModel>, _: Record) -> CoalesceResult<()> {
            Ok(())
        }
        fn remove(&self, _: &Arc<ClassViewModel>, _: Record) -> CoalesceResult<()> {
            Ok(())
        }
        async fn save_changes(&self) -> CoalesceResult<usize> {
            Ok(0)
        }
        fn pending_changes(&self) -> usize {
            0
        }
    }

    #[tokio::test]
    async fn test_list_and_count_errors_are_normalized() {
        let repo = testing::both()[0].repo.clone();
        let engine = Arc::new(ApiEngine::new(repo.clone()));
        let controller = engine.model_controller("Company").unwrap();

        let hidden = CrudContext::new(repo.clone(), Arc::new(Broken)).with_user(user());
        let list = controller.list(&hidden, &Default::default()).await;
        assert_eq!(list.status, 500);
        assert_eq!(list.body.message.as_deref(), Some(GENERIC_ERROR_MESSAGE));
        let count = controller.count(&hidden, &Default::default()).await;
        assert_eq!(count.status, 500);
        assert!(!count.body.was_successful);

        let detailed = CrudContext::new(repo, Arc::new(Broken))
            .with_user(user())
            .with_options(CoalesceOptions::default().with_detailed_exception_messages(true));
        let count = controller.count(&detailed, &Default::default()).await;
        assert_eq!(count.body.message.as_deref(), Some("Database error: connection reset"));
    }

    #[tokio::test]
    async fn test_cancelled_request() {
        let db = seeded();
        let controller = engine(&db).model_controller("Company").unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let ctx = context(&db, user()).with_cancellation(token);
        let response = controller.list(&ctx, &Default::default()).await;
        assert_eq!(response.status, 499);
    }

    // ── save / delete / propertyValues ──

    #[tokio::test]
    async fn test_save_then_delete() {
        let db = seeded();
        let controller = engine(&db).model_controller("Product").unwrap();
        let ctx = context(&db, user());
        let dto = json!({"name": "Gadget", "uniqueId1": "zxcv"});
        let saved = controller
            .save(&ctx, dto.as_object().unwrap(), &Default::default())
            .await;
        assert_eq!(saved.status, 200);
        let id = saved.body.object.unwrap()["productId"].clone();

        let ctx = context(&db, user());
        let deleted = controller.delete(&ctx, &id, &Default::default()).await;
        assert_eq!(deleted.status, 200);
        let again = controller.delete(&context(&db, user()), &id, &Default::default()).await;
        assert_eq!(again.status, 404);
    }

    #[tokio::test]
    async fn test_duplicate_save_is_bad_request() {
        let db = seeded();
        let controller = engine(&db).model_controller("Product").unwrap();
        let ctx = context(&db, user());
        let dto = json!({"name": "Copy", "uniqueId1": "qwerty"});
        let response = controller
            .save(&ctx, dto.as_object().unwrap(), &Default::default())
            .await;
        assert_eq!(response.status, 400);
        assert_eq!(
            response.body.message.as_deref(),
            Some("A different item with ID1 'qwerty' already exists.")
        );
    }

    #[tokio::test]
    async fn test_property_values() {
        let db = seeded();
        let controller = engine(&db).model_controller("Company").unwrap();
        let ctx = context(&db, user());
        let response = controller.property_values(&ctx, "city", None, "s").await;
        assert_eq!(response.body.list, Some(vec!["Spokane".to_string()]));
        let response = controller.property_values(&ctx, "city", None, "").await;
        assert_eq!(response.body.list, Some(vec!["Austin".to_string(), "Spokane".to_string()]));
        let bad = controller.property_values(&ctx, "companyId", None, "").await;
        assert_eq!(bad.status, 400);
    }

    // ── custom methods ──

    struct Weather;

    fn method_engine(db: &Arc<InMemoryDatabase>) -> Arc<ApiEngine> {
        let methods = MethodRegistry::new()
            .register("ComplexModel", "GetMethod", |call: MethodCall| async move {
                let id = call.instance.as_ref().and_then(|r| r.get("ComplexModelId")).cloned();
                Ok(MethodOutput::value(json!(format!("instance {}", id.unwrap_or(Value::Null)))))
            })
            .register("ComplexModel", "StaticListMethod", |call: MethodCall| async move {
                let person = call.ctx.repository().require_class("Person")?;
                let people = call.ctx.db().load(&person).await?;
                Ok(MethodOutput::list(ListResult::success(
                    people.into_iter().map(Value::Object).collect(),
                    1,
                    25,
                    1,
                )))
            });
        Arc::new(ApiEngine::new(db.repository().clone()).with_methods(methods))
    }

    #[tokio::test]
    async fn test_invoke_instance_method() {
        let db = seeded();
        db.seed("ComplexModel", [json!({"rangeValue": 5})]).unwrap();
        let controller = method_engine(&db).model_controller("ComplexModel").unwrap();
        let ctx = Arc::new(context(&db, user()));
        let response = controller.invoke(ctx.clone(), "GetMethod", Some(&json!(1)), &Map::new()).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body, json!({"wasSuccessful": true, "object": "instance 1"}));

        let missing = controller.invoke(ctx, "GetMethod", Some(&json!(5)), &Map::new()).await;
        assert_eq!(missing.status, 404);
    }

    #[tokio::test]
    async fn test_invoke_static_list_maps_dtos() {
        let db = seeded();
        let controller = method_engine(&db).model_controller("ComplexModel").unwrap();
        let ctx = Arc::new(context(&db, user()));
        let response = controller
            .invoke(ctx, "StaticListMethod", None, json!({"filter": "x"}).as_object().unwrap())
            .await;
        assert_eq!(response.status, 200);
        assert_eq!(response.body["list"][0]["firstName"], json!("Ann"));
        assert!(response.body["list"][0].get("secretNote").is_none());
    }

    #[tokio::test]
    async fn test_invoke_security_and_unknown() {
        let db = seeded();
        let controller = method_engine(&db).model_controller("ComplexModel").unwrap();
        let ctx = Arc::new(context(&db, user()));
        let admin_only = controller.invoke(ctx.clone(), "AdminMethod", None, &Map::new()).await;
        assert_eq!(admin_only.status, 403);
        let hidden = controller.invoke(ctx, "NotExposed", None, &Map::new()).await;
        assert_eq!(hidden.status, 404);
    }

    #[tokio::test]
    async fn test_service_controller_requires_service() {
        let db = seeded();
        let engine = method_engine(&db);
        let service = engine.service_controller("IWeatherService").unwrap();
        assert_eq!(service.class().name, "IWeatherService");
        assert!(engine.service_controller("Person").is_err());

        let ctx = Arc::new(
            context(&db, user())
                .with_services(Arc::new(ServiceRegistry::new().register("IWeatherService", Arc::new(Weather)))),
        );
        let response = service.invoke(ctx, "NoSuchMethod", &Map::new()).await;
        assert_eq!(response.status, 404);
    }
}
