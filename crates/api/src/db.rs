//! Database seam
//!
//! Data sources and behaviors talk to storage through [`DbContext`], a unit of
//! work: `add`, `update` and `remove` stage changes that `save_changes`
//! applies atomically. Records are JSON objects keyed by the declared
//! property names of their class and hold scalar columns only.
//!
//! [`InMemoryDatabase`] is the bundled store. It enforces foreign keys and
//! unique indexes and reports violations with the same messages SQL Server
//! uses, so constraint translation behaves the same against either.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use coalesce_core::{CoalesceError, CoalesceResult};
use coalesce_model::{ClassViewModel, PropertyViewModel, ReflectionRepository};

use crate::values::{default_value, display_value, is_unassigned_key, keys_equal};

/// One stored row
pub type Record = Map<String, Value>;

pub const DEFAULT_DATABASE_NAME: &str = "Coalesce";

#[async_trait]
pub trait DbContext: Send + Sync {
    fn as_any(&self) -> &dyn Any;

    /// Every stored row of `class`; staged changes are not visible
    async fn load(&self, class: &ClassViewModel) -> CoalesceResult<Vec<Record>>;

    /// Stage an insert, assigning a generated key when the key is unset
    fn add(&self, class: &Arc<ClassViewModel>, record: Record) -> CoalesceResult<Record>;

    fn update(&self, class: &Arc<ClassViewModel>, record: Record) -> CoalesceResult<()>;

    fn remove(&self, class: &Arc<ClassViewModel>, record: Record) -> CoalesceResult<()>;

    /// Apply every staged change or none of them
    async fn save_changes(&self) -> CoalesceResult<usize>;

    fn pending_changes(&self) -> usize;
}

// ============================================================================
// Store
// ============================================================================

#[derive(Debug, Clone, Default)]
struct Table {
    rows: Vec<Record>,
    /// Last generated integer key
    identity: i64,
}

pub struct InMemoryDatabase {
    name: String,
    repository: Arc<ReflectionRepository>,
    tables: RwLock<HashMap<String, Table>>,
}

impl InMemoryDatabase {
    pub fn new(repository: Arc<ReflectionRepository>) -> Arc<Self> {
        Self::with_name(repository, DEFAULT_DATABASE_NAME)
    }

    pub fn with_name(repository: Arc<ReflectionRepository>, name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            repository,
            tables: RwLock::new(HashMap::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn repository(&self) -> &Arc<ReflectionRepository> {
        &self.repository
    }

    /// A new unit of work over this store
    pub fn session(self: &Arc<Self>) -> InMemoryDbContext {
        InMemoryDbContext {
            database: Arc::clone(self),
            tracker: Mutex::new(Vec::new()),
        }
    }

    /// Insert rows directly, without constraint checks
    ///
    /// Rows may use declared or camelCase property names. Returns the stored
    /// records with generated keys filled in.
    pub fn seed<I>(&self, class_name: &str, rows: I) -> CoalesceResult<Vec<Record>>
    where
        I: IntoIterator<Item = Value>,
    {
        let class = self.repository.require_class(class_name)?;
        let mut stored = Vec::new();
        for row in rows {
            let Value::Object(map) = row else {
                return Err(CoalesceError::validation(format!(
                    "Seed rows for {} must be JSON objects",
                    class.name
                )));
            };
            let mut record = columns(&class, &map);
            self.assign_key(&class, &mut record);
            let mut tables = self.tables.write();
            let table = tables.entry(class.full_name.clone()).or_default();
            if let Some(id) = key_of(&class, &record).and_then(Value::as_i64) {
                table.identity = table.identity.max(id);
            }
            table.rows.push(record.clone());
            stored.push(record);
        }
        debug!(class = %class.name, rows = stored.len(), "Seeded table");
        Ok(stored)
    }

    /// Committed rows of a class
    pub fn rows(&self, class_name: &str) -> Vec<Record> {
        let Some(class) = self.repository.class(class_name) else {
            return Vec::new();
        };
        self.tables
            .read()
            .get(&class.full_name)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    fn assign_key(&self, class: &ClassViewModel, record: &mut Record) {
        let Some(pk) = class.primary_key() else {
            return;
        };
        let current = record.get(&pk.name).cloned().unwrap_or(Value::Null);
        if !is_unassigned_key(&current) {
            return;
        }
        let stripped = pk.type_vm.nullable_stripped();
        if stripped.primitive_kind().is_some_and(|k| k.is_integral()) {
            let mut tables = self.tables.write();
            let table = tables.entry(class.full_name.clone()).or_default();
            table.identity += 1;
            record.insert(pk.name.clone(), Value::from(table.identity));
        } else if stripped.is_guid() {
            record.insert(pk.name.clone(), Value::String(Uuid::new_v4().to_string()));
        }
    }

    // ====================================================================
    // Constraints
    // ====================================================================

    fn apply(&self, tables: &mut HashMap<String, Table>, change: &Change) -> CoalesceResult<()> {
        let class = &change.class;
        let record = &change.record;
        let Some(id) = key_of(class, record).cloned() else {
            return Err(CoalesceError::database(format!(
                "The entity type '{}' requires a primary key to be defined.",
                class.name
            )));
        };
        let position = tables.get(&class.full_name).and_then(|t| {
            t.rows
                .iter()
                .position(|row| key_of(class, row).is_some_and(|v| keys_equal(v, &id)))
        });

        match change.kind {
            ChangeKind::Added => {
                if position.is_some() {
                    return Err(CoalesceError::database(format!(
                        "Violation of PRIMARY KEY constraint 'PK_{}'. Cannot insert duplicate key \
                         in object 'dbo.{}'. The duplicate key value is ({}).",
                        class.table_name,
                        class.table_name,
                        display_value(&id)
                    )));
                }
                self.check_foreign_keys(tables, class, record, "INSERT")?;
                self.check_unique_indexes(tables, class, record, None)?;
                tables
                    .entry(class.full_name.clone())
                    .or_default()
                    .rows
                    .push(record.clone());
            }
            ChangeKind::Modified => {
                let position = position.ok_or_else(|| missing_row(class, &id))?;
                self.check_foreign_keys(tables, class, record, "UPDATE")?;
                self.check_unique_indexes(tables, class, record, Some(position))?;
                if let Some(table) = tables.get_mut(&class.full_name) {
                    table.rows[position] = record.clone();
                }
            }
            ChangeKind::Deleted => {
                let position = position.ok_or_else(|| missing_row(class, &id))?;
                self.check_references(tables, class, &id)?;
                if let Some(table) = tables.get_mut(&class.full_name) {
                    table.rows.remove(position);
                }
            }
        }
        Ok(())
    }

    fn check_foreign_keys(
        &self,
        tables: &HashMap<String, Table>,
        class: &ClassViewModel,
        record: &Record,
        statement: &str,
    ) -> CoalesceResult<()> {
        for prop in class.properties.iter().filter(|p| p.is_foreign_key()) {
            let value = match record.get(&prop.name) {
                None | Some(Value::Null) => continue,
                Some(v) => v,
            };
            let Some(principal) = prop
                .foreign_key_principal_type
                .as_ref()
                .and_then(|k| self.repository.get(k))
            else {
                continue;
            };
            let Some(principal_key) = principal.primary_key() else {
                continue;
            };
            let exists = tables.get(&principal.full_name).is_some_and(|t| {
                t.rows.iter().any(|row| {
                    row.get(&principal_key.name)
                        .is_some_and(|v| keys_equal(v, value))
                })
            });
            if !exists {
                return Err(CoalesceError::database(format!(
                    "The {} statement conflicted with the FOREIGN KEY constraint \"{}\". \
                     The conflict occurred in database \"{}\", table \"dbo.{}\", column '{}'.",
                    statement,
                    foreign_key_name(class, &principal, prop),
                    self.name,
                    principal.table_name,
                    principal_key.name
                )));
            }
        }
        Ok(())
    }

    fn check_unique_indexes(
        &self,
        tables: &HashMap<String, Table>,
        class: &ClassViewModel,
        record: &Record,
        skip: Option<usize>,
    ) -> CoalesceResult<()> {
        let rows = tables
            .get(&class.full_name)
            .map(|t| t.rows.as_slice())
            .unwrap_or_default();
        for index in class.indexes.iter().filter(|i| i.is_unique) {
            let values: Vec<&Value> = index
                .properties
                .iter()
                .map(|p| record.get(p).unwrap_or(&Value::Null))
                .collect();
            if values.iter().any(|v| v.is_null()) {
                continue;
            }
            let duplicate = rows.iter().enumerate().any(|(i, row)| {
                Some(i) != skip
                    && index
                        .properties
                        .iter()
                        .zip(&values)
                        .all(|(p, v)| row.get(p).is_some_and(|existing| keys_equal(existing, v)))
            });
            if duplicate {
                return Err(CoalesceError::database(format!(
                    "Cannot insert duplicate key row in object 'dbo.{}' with unique index '{}'. \
                     The duplicate key value is ({}).",
                    class.table_name,
                    index.name,
                    values
                        .iter()
                        .map(|v| display_value(v))
                        .collect::<Vec<_>>()
                        .join(", ")
                )));
            }
        }
        Ok(())
    }

    fn check_references(
        &self,
        tables: &HashMap<String, Table>,
        class: &ClassViewModel,
        id: &Value,
    ) -> CoalesceResult<()> {
        for dependent in self.repository.entities() {
            let Some(rows) = tables.get(&dependent.full_name).map(|t| &t.rows) else {
                continue;
            };
            for fk in dependent.properties.iter().filter(|p| {
                p.is_foreign_key() && p.foreign_key_principal_type.as_ref() == Some(&class.key)
            }) {
                let referenced = rows
                    .iter()
                    .any(|row| row.get(&fk.name).is_some_and(|v| keys_equal(v, id)));
                if referenced {
                    return Err(CoalesceError::database(format!(
                        "The DELETE statement conflicted with the REFERENCE constraint \"{}\". \
                         The conflict occurred in database \"{}\", table \"dbo.{}\", column '{}'.",
                        foreign_key_name(dependent, class, fk),
                        self.name,
                        dependent.table_name,
                        fk.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// `FK_{dependent table}_{principal table}_{foreign key}`
pub fn foreign_key_name(
    dependent: &ClassViewModel,
    principal: &ClassViewModel,
    foreign_key: &PropertyViewModel,
) -> String {
    format!(
        "FK_{}_{}_{}",
        dependent.table_name, principal.table_name, foreign_key.name
    )
}

fn missing_row(class: &ClassViewModel, id: &Value) -> CoalesceError {
    CoalesceError::database(format!(
        "Attempted to update or delete a {} with key {} that does not exist in the store.",
        class.name,
        display_value(id)
    ))
}

fn key_of<'a>(class: &ClassViewModel, record: &'a Record) -> Option<&'a Value> {
    class
        .primary_key()
        .and_then(|pk| record.get(&pk.name))
        .filter(|v| !v.is_null())
}

/// The stored columns of `class`, read from declared or camelCase names
pub fn columns(class: &ClassViewModel, source: &Map<String, Value>) -> Record {
    class
        .properties
        .iter()
        .filter(|p| p.is_db_mapped && !p.is_navigation() && !p.is_static)
        .map(|p| {
            let value = source
                .get(&p.name)
                .or_else(|| source.get(&p.json_name))
                .cloned()
                .unwrap_or_else(|| default_value(&p.type_vm));
            (p.name.clone(), value)
        })
        .collect()
}

// ============================================================================
// Session
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

struct Change {
    kind: ChangeKind,
    class: Arc<ClassViewModel>,
    record: Record,
}

/// One unit of work against an [`InMemoryDatabase`]
///
/// A failed save keeps its staged changes, so later saves on the same
/// session fail the same way.
pub struct InMemoryDbContext {
    database: Arc<InMemoryDatabase>,
    tracker: Mutex<Vec<Change>>,
}

impl InMemoryDbContext {
    pub fn database(&self) -> &Arc<InMemoryDatabase> {
        &self.database
    }

    fn track(&self, kind: ChangeKind, class: &Arc<ClassViewModel>, record: Record) {
        self.tracker.lock().push(Change {
            kind,
            class: Arc::clone(class),
            record,
        });
    }

    /// Kinds of the staged changes, in order
    pub fn staged(&self) -> Vec<ChangeKind> {
        self.tracker.lock().iter().map(|c| c.kind).collect()
    }
}

#[async_trait]
impl DbContext for InMemoryDbContext {
    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn load(&self, class: &ClassViewModel) -> CoalesceResult<Vec<Record>> {
        Ok(self
            .database
            .tables
            .read()
            .get(&class.full_name)
            .map(|t| t.rows.clone())
            .unwrap_or_default())
    }

    fn add(&self, class: &Arc<ClassViewModel>, record: Record) -> CoalesceResult<Record> {
        let mut record = columns(class, &record);
        self.database.assign_key(class, &mut record);
        self.track(ChangeKind::Added, class, record.clone());
        Ok(record)
    }

    fn update(&self, class: &Arc<ClassViewModel>, record: Record) -> CoalesceResult<()> {
        let record = columns(class, &record);
        if key_of(class, &record).is_none() {
            return Err(CoalesceError::validation(format!(
                "Cannot update a {} without its key",
                class.name
            )));
        }
        self.track(ChangeKind::Modified, class, record);
        Ok(())
    }

    fn remove(&self, class: &Arc<ClassViewModel>, record: Record) -> CoalesceResult<()> {
        if key_of(class, &record).is_none() {
            return Err(CoalesceError::validation(format!(
                "Cannot remove a {} without its key",
                class.name
            )));
        }
        self.track(ChangeKind::Deleted, class, record);
        Ok(())
    }

    async fn save_changes(&self) -> CoalesceResult<usize> {
        let mut tracker = self.tracker.lock();
        if tracker.is_empty() {
            return Ok(0);
        }
        let mut tables = self.database.tables.write();
        let mut staged = tables.clone();
        for change in tracker.iter() {
            self.database.apply(&mut staged, change)?;
        }
        *tables = staged;
        let saved = tracker.len();
        tracker.clear();
        debug!(saved, database = %self.database.name, "Saved changes");
        Ok(saved)
    }

    fn pending_changes(&self) -> usize {
        self.tracker.lock().len()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use coalesce_model::testing;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn database() -> Arc<InMemoryDatabase> {
        let db = InMemoryDatabase::new(testing::both()[0].repo.clone());
        db.seed("Product", [json!({"name": "Widget", "uniqueId1": "qwerty"})])
            .unwrap();
        db.seed("Case", [json!({"title": "Broken", "reportedById": 0})])
            .unwrap();
        db
    }

    fn class(db: &InMemoryDatabase, name: &str) -> Arc<ClassViewModel> {
        db.repository().require_class(name).unwrap()
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_seed_assigns_identity_and_defaults() {
        let db = database();
        let rows = db.rows("Product");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["ProductId"], json!(1));
        assert_eq!(rows[0]["UniqueId1"], json!("qwerty"));
        assert!(rows[0].get("name").is_none());
    }

    #[tokio::test]
    async fn test_add_and_save() {
        let db = database();
        let session = db.session();
        let product = class(&db, "Product");
        let added = session
            .add(&product, record(json!({"Name": "Gadget", "UniqueId1": "asdf"})))
            .unwrap();
        assert_eq!(added["ProductId"], json!(2));
        assert_eq!(session.pending_changes(), 1);
        assert_eq!(session.load(&product).await.unwrap().len(), 1);

        assert_eq!(session.save_changes().await.unwrap(), 1);
        assert_eq!(session.pending_changes(), 0);
        assert_eq!(db.rows("Product").len(), 2);
    }

    #[tokio::test]
    async fn test_unique_index_violation() {
        let db = database();
        let session = db.session();
        let product = class(&db, "Product");
        session
            .add(&product, record(json!({"Name": "Copy", "UniqueId1": "QWERTY"})))
            .unwrap();
        let err = session.save_changes().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Database error: Cannot insert duplicate key row in object 'dbo.Product' with unique \
             index 'IX_Product_UniqueId1'. The duplicate key value is (QWERTY)."
        );
        assert_eq!(session.pending_changes(), 1);
        assert_eq!(db.rows("Product").len(), 1);
    }

    #[tokio::test]
    async fn test_identity_not_reused_after_failed_insert() {
        let db = database();
        let product = class(&db, "Product");
        let failed = db.session();
        failed
            .add(&product, record(json!({"Name": "Copy", "UniqueId1": "qwerty"})))
            .unwrap();
        assert!(failed.save_changes().await.is_err());

        let session = db.session();
        let added = session
            .add(&product, record(json!({"Name": "Gadget", "UniqueId1": "asdf"})))
            .unwrap();
        assert_eq!(added["ProductId"], json!(3));
        session.save_changes().await.unwrap();
        let ids: Vec<Value> = db.rows("Product").iter().map(|r| r["ProductId"].clone()).collect();
        assert_eq!(ids, vec![json!(1), json!(3)]);
    }

    #[tokio::test]
    async fn test_foreign_key_violation_on_insert() {
        let db = database();
        let session = db.session();
        let case_product = class(&db, "CaseProduct");
        session
            .add(&case_product, record(json!({"CaseId": 1, "ProductId": 42})))
            .unwrap();
        let err = session.save_changes().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Database error: The INSERT statement conflicted with the FOREIGN KEY constraint \
             \"FK_CaseProduct_Product_ProductId\". The conflict occurred in database \"Coalesce\", \
             table \"dbo.Product\", column 'ProductId'."
        );
    }

    #[tokio::test]
    async fn test_reference_violation_on_delete() {
        let db = database();
        db.seed("CaseProduct", [json!({"CaseId": 1, "ProductId": 1})])
            .unwrap();
        let session = db.session();
        let product = class(&db, "Product");
        let row = db.rows("Product").remove(0);
        session.remove(&product, row).unwrap();
        let err = session.save_changes().await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Database error: The DELETE statement conflicted with the REFERENCE constraint \
             \"FK_CaseProduct_Product_ProductId\". The conflict occurred in database \"Coalesce\", \
             table \"dbo.CaseProduct\", column 'ProductId'."
        );
        assert_eq!(db.rows("Product").len(), 1);
    }

    #[tokio::test]
    async fn test_save_is_atomic() {
        let db = database();
        let session = db.session();
        let product = class(&db, "Product");
        session
            .add(&product, record(json!({"Name": "Fine", "UniqueId1": "one"})))
            .unwrap();
        session
            .add(&product, record(json!({"Name": "Dup", "UniqueId1": "qwerty"})))
            .unwrap();
        assert!(session.save_changes().await.is_err());
        assert_eq!(db.rows("Product").len(), 1);
        assert_eq!(session.staged(), vec![ChangeKind::Added, ChangeKind::Added]);
    }

    #[tokio::test]
    async fn test_update_changes_row() {
        let db = database();
        let session = db.session();
        let product = class(&db, "Product");
        let mut row = db.rows("Product").remove(0);
        row.insert("Name".into(), json!("Renamed"));
        session.update(&product, row).unwrap();
        session.save_changes().await.unwrap();
        assert_eq!(db.rows("Product")[0]["Name"], json!("Renamed"));
    }

    #[tokio::test]
    async fn test_update_of_missing_row_fails() {
        let db = database();
        let session = db.session();
        let product = class(&db, "Product");
        session
            .update(&product, record(json!({"ProductId": 99, "Name": "Ghost"})))
            .unwrap();
        let err = session.save_changes().await.unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
