//! Data sources
//!
//! A data source decides which records of an entity a request can see and in
//! what shape: it loads rows and their related entities, applies its own
//! restrictions, then the request's filters, search, ordering and paging.
//!
//! [`StandardDataSource`] is the default for every entity. Custom data sources
//! either wrap it (adding a query filter, includes or ordering) or implement
//! [`DataSource`] directly.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use coalesce_core::CoalesceResult;
use coalesce_model::{ClassViewModel, OrderByTerm, ReflectionRepository};

use crate::context::CrudContext;
use crate::db::Record;
use crate::include_tree::{IncludeScope, IncludeTree};
use crate::params::{DataSourceParameters, FilterParameters, ListParameters};
use crate::query::{Expr, PredicateBuilder, filters_predicate, order_terms, sort_records};
use crate::values::{coerce_value, keys_equal};

/// One loaded entity and the navigations loaded with it
#[derive(Debug, Clone)]
pub struct LoadedItem {
    pub record: Record,
    pub include_tree: IncludeTree,
}

/// One page of a list query
#[derive(Debug, Clone)]
pub struct ListPage {
    pub items: Vec<Record>,
    pub page: usize,
    pub page_size: usize,
    pub total_count: i64,
    pub include_tree: IncludeTree,
}

#[async_trait]
pub trait DataSource: Send + Sync {
    fn class(&self) -> &Arc<ClassViewModel>;

    async fn get_item(
        &self,
        ctx: &CrudContext,
        id: &Value,
        params: &DataSourceParameters,
    ) -> CoalesceResult<Option<LoadedItem>>;

    async fn get_list(&self, ctx: &CrudContext, params: &ListParameters) -> CoalesceResult<ListPage>;

    async fn get_count(&self, ctx: &CrudContext, params: &FilterParameters) -> CoalesceResult<i64>;
}

/// Extra restriction a data source applies to every row
pub type QueryFilter = Arc<dyn Fn(&CrudContext, &DataSourceParameters, &Record) -> bool + Send + Sync>;

// ============================================================================
// StandardDataSource
// ============================================================================

#[derive(Clone)]
pub struct StandardDataSource {
    class: Arc<ClassViewModel>,
    includes: IncludeTree,
    filter: Option<QueryFilter>,
    default_order: Option<Vec<OrderByTerm>>,
}

impl StandardDataSource {
    /// Loads every navigation of the entity, one level deep
    pub fn new(class: Arc<ClassViewModel>) -> Self {
        let includes = class
            .client_properties()
            .filter(|p| p.is_navigation())
            .fold(IncludeTree::new(), |tree, p| {
                tree.with_child(&p.name, Some(IncludeTree::new()))
            });
        Self {
            class,
            includes,
            filter: None,
            default_order: None,
        }
    }

    pub fn with_includes(mut self, includes: IncludeTree) -> Self {
        self.includes = includes;
        self
    }

    pub fn with_query_filter(
        mut self,
        filter: impl Fn(&CrudContext, &DataSourceParameters, &Record) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn with_default_order(mut self, order: Vec<OrderByTerm>) -> Self {
        self.default_order = Some(order);
        self
    }

    pub fn includes(&self) -> &IncludeTree {
        &self.includes
    }

    /// Rows visible to this request, with the navigations of `scope` attached
    async fn query(
        &self,
        ctx: &CrudContext,
        params: &DataSourceParameters,
        scope: &IncludeTree,
    ) -> CoalesceResult<Vec<Record>> {
        let mut rows = ctx.db().load(&self.class).await?;
        load_includes(ctx, &self.class, &mut rows, IncludeScope::from(scope)).await?;
        if let Some(filter) = &self.filter {
            rows.retain(|row| filter(ctx, params, row));
        }
        Ok(rows)
    }

    /// The request's filters and search as one predicate
    fn predicate(&self, ctx: &CrudContext, params: &FilterParameters) -> Expr {
        let builder =
            PredicateBuilder::new(ctx.repository(), &self.class).with_time_zone(ctx.time_zone());
        let mut all = vec![filters_predicate(ctx, &builder, &params.filter)];
        all.extend(params.search.as_deref().map(|s| builder.search(s)));
        Expr::and(all)
    }

    /// This data source's includes, widened to every navigation `paths` walk
    /// through. Rows are filtered and sorted on the widened graph; responses
    /// are still mapped with [`includes`](Self::includes).
    pub fn load_scope<'a>(&self, paths: impl IntoIterator<Item = &'a [String]>) -> IncludeTree {
        let mut scope = self.includes.clone();
        for path in paths {
            if let Some((_, navigations)) = path.split_last() {
                if !navigations.is_empty() {
                    scope.include(&navigations.join("."));
                }
            }
        }
        scope
    }
}

impl fmt::Debug for StandardDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardDataSource")
            .field("class", &self.class.name)
            .field("includes", &self.includes.to_string())
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[async_trait]
impl DataSource for StandardDataSource {
    fn class(&self) -> &Arc<ClassViewModel> {
        &self.class
    }

    async fn get_item(
        &self,
        ctx: &CrudContext,
        id: &Value,
        params: &DataSourceParameters,
    ) -> CoalesceResult<Option<LoadedItem>> {
        let Some(pk) = self.class.primary_key() else {
            return Ok(None);
        };
        let Some(id) = coerce_value(&pk.type_vm, id) else {
            return Ok(None);
        };
        let rows = self.query(ctx, params, &self.includes).await?;
        Ok(rows
            .into_iter()
            .find(|row| row.get(&pk.name).is_some_and(|v| keys_equal(v, &id)))
            .map(|record| LoadedItem {
                record,
                include_tree: self.includes.clone(),
            }))
    }

    async fn get_list(&self, ctx: &CrudContext, params: &ListParameters) -> CoalesceResult<ListPage> {
        let predicate = self.predicate(ctx, &params.filter);
        let builder = PredicateBuilder::new(ctx.repository(), &self.class);
        let default_order = self.default_order.as_deref().unwrap_or(&self.class.default_order);
        let terms = if params.count_only {
            Vec::new()
        } else {
            order_terms(
                &builder,
                default_order,
                params.order_by.as_deref(),
                params.order_by_descending.as_deref(),
            )
        };
        let order_paths: Vec<Vec<String>> = terms
            .iter()
            .map(|t| t.segments().map(str::to_string).collect())
            .collect();
        let scope = self.load_scope(
            predicate
                .paths()
                .into_iter()
                .chain(order_paths.iter().map(Vec::as_slice)),
        );

        let mut rows = self.query(ctx, &params.filter.data_source, &scope).await?;
        ctx.check_cancelled()?;

        rows.retain(|row| predicate.eval(row));
        let total_count = rows.len() as i64;
        let (page, page_size) = ctx.options().paging(params.page, params.page_size);

        if params.count_only {
            return Ok(ListPage {
                items: Vec::new(),
                page,
                page_size,
                total_count,
                include_tree: self.includes.clone(),
            });
        }

        sort_records(&mut rows, &terms);
        ctx.check_cancelled()?;

        let items: Vec<Record> = rows
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();
        debug!(
            class = %self.class.name,
            total = total_count,
            page,
            returned = items.len(),
            "Listed"
        );
        Ok(ListPage {
            items,
            page,
            page_size,
            total_count,
            include_tree: self.includes.clone(),
        })
    }

    async fn get_count(&self, ctx: &CrudContext, params: &FilterParameters) -> CoalesceResult<i64> {
        let predicate = self.predicate(ctx, params);
        let scope = self.load_scope(predicate.paths());
        let mut rows = self.query(ctx, &params.data_source, &scope).await?;
        ctx.check_cancelled()?;
        rows.retain(|row| predicate.eval(row));
        Ok(rows.len() as i64)
    }
}

// ============================================================================
// Include loading
// ============================================================================

/// Attach related entities to `rows` as far as `scope` reaches
///
/// An open-ended scope stops at entity types already on the current path.
pub async fn load_includes(
    ctx: &CrudContext,
    class: &ClassViewModel,
    rows: &mut [Record],
    scope: IncludeScope<'_>,
) -> CoalesceResult<()> {
    let repo = ctx.repository();
    let mut needed = BTreeMap::new();
    needed_classes(repo, class, scope, &mut vec![class.full_name.clone()], &mut needed);

    let mut tables = BTreeMap::new();
    for (name, target) in needed {
        tables.insert(name, ctx.db().load(&target).await?);
    }
    let mut path = vec![class.full_name.clone()];
    for row in rows.iter_mut() {
        attach(repo, &tables, class, row, scope, &mut path);
    }
    Ok(())
}

fn navigations(
    repo: &ReflectionRepository,
    class: &ClassViewModel,
) -> Vec<(String, bool, Arc<ClassViewModel>)> {
    class
        .properties
        .iter()
        .filter(|p| p.is_navigation())
        .filter_map(|p| {
            p.pure_type()
                .class_view_model(repo)
                .map(|target| (p.name.clone(), p.is_collection_navigation(), target))
        })
        .collect()
}

fn needed_classes(
    repo: &ReflectionRepository,
    class: &ClassViewModel,
    scope: IncludeScope<'_>,
    path: &mut Vec<String>,
    out: &mut BTreeMap<String, Arc<ClassViewModel>>,
) {
    for (name, _, target) in navigations(repo, class) {
        let Some(child) = scope.child(&name) else {
            continue;
        };
        if child.is_all() && path.contains(&target.full_name) {
            continue;
        }
        out.entry(target.full_name.clone()).or_insert_with(|| target.clone());
        path.push(target.full_name.clone());
        needed_classes(repo, &target, child, path, out);
        path.pop();
    }
}

fn attach(
    repo: &ReflectionRepository,
    tables: &BTreeMap<String, Vec<Record>>,
    class: &ClassViewModel,
    row: &mut Record,
    scope: IncludeScope<'_>,
    path: &mut Vec<String>,
) {
    for prop in class.properties.iter().filter(|p| p.is_navigation()) {
        let Some(child) = scope.child(&prop.name) else {
            continue;
        };
        let Some(target) = prop.pure_type().class_view_model(repo) else {
            continue;
        };
        if child.is_all() && path.contains(&target.full_name) {
            continue;
        }
        let Some(target_rows) = tables.get(&target.full_name) else {
            continue;
        };

        path.push(target.full_name.clone());
        let value = if prop.is_collection_navigation() {
            let (Some(fk), Some(pk)) = (&prop.foreign_key_on_target, class.primary_key()) else {
                path.pop();
                continue;
            };
            let id = row.get(&pk.name).cloned().unwrap_or(Value::Null);
            let children = target_rows
                .iter()
                .filter(|r| !id.is_null() && r.get(fk).is_some_and(|v| keys_equal(v, &id)))
                .map(|r| {
                    let mut child_row = r.clone();
                    attach(repo, tables, &target, &mut child_row, child, path);
                    Value::Object(child_row)
                })
                .collect();
            Value::Array(children)
        } else {
            let (Some(fk), Some(target_pk)) = (&prop.foreign_key_property, target.primary_key()) else {
                path.pop();
                continue;
            };
            let key = row.get(fk).cloned().unwrap_or(Value::Null);
            target_rows
                .iter()
                .find(|r| !key.is_null() && r.get(&target_pk.name).is_some_and(|v| keys_equal(v, &key)))
                .map(|r| {
                    let mut child_row = r.clone();
                    attach(repo, tables, &target, &mut child_row, child, path);
                    Value::Object(child_row)
                })
                .unwrap_or(Value::Null)
        };
        path.pop();
        row.insert(prop.name.clone(), value);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::InMemoryDatabase;
    use coalesce_core::SortDirection;
    use coalesce_model::{ClaimsPrincipal, testing};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    fn seeded() -> Arc<InMemoryDatabase> {
        let db = InMemoryDatabase::new(testing::both()[0].repo.clone());
        db.seed(
            "Company",
            [
                json!({"name": "Acme Corp", "city": "Spokane"}),
                json!({"name": "Globex", "city": "Seattle", "logoUrl": "https://acme.example"}),
                json!({"name": "Initech", "city": "Austin"}),
            ],
        )
        .unwrap();
        db.seed(
            "Person",
            [
                json!({"firstName": "Ann", "lastName": "Lee", "companyId": 1}),
                json!({"firstName": "Bob", "lastName": "Adams", "companyId": 1}),
                json!({"firstName": "Cy", "lastName": "Baker", "companyId": 2}),
            ],
        )
        .unwrap();
        db.seed(
            "Case",
            [
                json!({"title": "Printer", "assignedToId": 1, "reportedById": 2, "status": 0}),
                json!({"title": "Network", "assignedToId": null, "reportedById": 3, "status": 2}),
            ],
        )
        .unwrap();
        db
    }

    fn context(db: &Arc<InMemoryDatabase>) -> CrudContext {
        CrudContext::new(db.repository().clone(), Arc::new(db.session()))
            .with_user(ClaimsPrincipal::authenticated("u"))
    }

    fn source(db: &InMemoryDatabase, name: &str) -> StandardDataSource {
        StandardDataSource::new(db.repository().require_class(name).unwrap())
    }

    #[tokio::test]
    async fn test_list_search_and_paging() {
        let db = seeded();
        let ctx = context(&db);
        let companies = source(&db, "Company");
        let params = ListParameters {
            filter: FilterParameters {
                search: Some("acme".into()),
                ..Default::default()
            },
            page_size: Some(1),
            ..Default::default()
        };
        let page = companies.get_list(&ctx, &params).await.unwrap();
        assert_eq!(page.total_count, 2);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.page_size, 1);
    }

    #[tokio::test]
    async fn test_default_includes_are_one_level() {
        let db = seeded();
        let ctx = context(&db);
        let cases = source(&db, "Case");
        let item = cases
            .get_item(&ctx, &json!("1"), &DataSourceParameters::default())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.record["AssignedTo"]["FirstName"], json!("Ann"));
        assert_eq!(item.record["ReportedBy"]["FirstName"], json!("Bob"));
        assert!(item.record["AssignedTo"].get("Company").is_none());
        assert!(item.include_tree.is_included("CaseProducts"));
    }

    #[tokio::test]
    async fn test_collection_navigation_loads_children() {
        let db = seeded();
        let ctx = context(&db);
        let companies = source(&db, "Company");
        let item = companies
            .get_item(&ctx, &json!(1), &DataSourceParameters::default())
            .await
            .unwrap()
            .unwrap();
        let employees = item.record["Employees"].as_array().unwrap();
        assert_eq!(employees.len(), 2);
    }

    #[tokio::test]
    async fn test_open_ended_includes_stop_at_cycles() {
        let db = seeded();
        let ctx = context(&db);
        let class = db.repository().require_class("Person").unwrap();
        let mut rows = ctx.db().load(&class).await.unwrap();
        let tree = IncludeTree::parse("Company.*");
        load_includes(&ctx, &class, &mut rows, IncludeScope::from(&tree)).await.unwrap();
        let company = rows[0]["Company"].as_object().unwrap();
        assert_eq!(company["Name"], json!("Acme Corp"));
        assert!(company.get("Employees").is_none());
    }

    #[tokio::test]
    async fn test_query_filter_and_filters() {
        let db = seeded();
        let ctx = context(&db);
        let cases = source(&db, "Case").with_query_filter(|_, _, row| row["Status"] != json!(2));
        let params = ListParameters::default();
        assert_eq!(cases.get_list(&ctx, &params).await.unwrap().total_count, 1);

        let people = source(&db, "Person");
        let mut filter = FilterParameters::default();
        filter.filter.insert("companyId".into(), "2".into());
        assert_eq!(people.get_count(&ctx, &filter).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_is_sorted_by_default_order() {
        let db = seeded();
        let ctx = context(&db);
        let page = source(&db, "Person")
            .get_list(&ctx, &ListParameters::default())
            .await
            .unwrap();
        let last: Vec<&str> = page.items.iter().map(|r| r["LastName"].as_str().unwrap()).collect();
        assert_eq!(last, vec!["Adams", "Baker", "Lee"]);
        assert_eq!(page.page_size, 25);
    }

    #[tokio::test]
    async fn test_list_sorts_through_two_navigations() {
        let db = seeded();
        let ctx = context(&db);
        let cases = source(&db, "Case").with_default_order(vec![OrderByTerm::new(
            "ReportedBy.Company.Name",
            SortDirection::Descending,
        )]);
        let page = cases.get_list(&ctx, &ListParameters::default()).await.unwrap();
        let keys: Vec<&Value> = page.items.iter().map(|r| &r["CaseKey"]).collect();
        // Globex before Acme Corp
        assert_eq!(keys, vec![&json!(2), &json!(1)]);
        assert_eq!(&page.include_tree, cases.includes());
    }

    #[tokio::test]
    async fn test_count_filters_through_two_navigations() {
        let db = seeded();
        let ctx = context(&db);
        let mut filter = FilterParameters::default();
        filter.filter.insert("reportedBy.company.name".into(), "Globex".into());
        assert_eq!(source(&db, "Case").get_count(&ctx, &filter).await.unwrap(), 1);
    }

    #[test]
    fn test_load_scope_adds_navigation_prefixes() {
        let db = seeded();
        let cases = source(&db, "Case");
        let path = ["AssignedTo".to_string(), "Company".to_string(), "Name".to_string()];
        let title = ["Title".to_string()];
        let scope = cases.load_scope([&path[..], &title[..]]);

        let assigned = scope.child("AssignedTo").flatten().unwrap();
        assert!(assigned.is_included("Company"));
        assert!(!scope.is_included("Title"));
        assert!(cases.includes().child("AssignedTo").flatten().unwrap().child("Company").is_none());
    }

    #[tokio::test]
    async fn test_count_only_returns_no_items() {
        let db = seeded();
        let ctx = context(&db);
        let params = ListParameters {
            count_only: true,
            ..Default::default()
        };
        let page = source(&db, "Person").get_list(&ctx, &params).await.unwrap();
        assert_eq!(page.total_count, 3);
        assert!(page.items.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_list_fails() {
        let db = seeded();
        let token = CancellationToken::new();
        token.cancel();
        let ctx = context(&db).with_cancellation(token);
        let err = source(&db, "Person")
            .get_list(&ctx, &ListParameters::default())
            .await
            .unwrap_err();
        assert!(matches!(err, coalesce_core::CoalesceError::Cancelled));
    }
}
