//! Tables: handles, committed logs and scans.

mod items;
mod log;

pub use items::{Items, ItemsIter};
pub(crate) use log::TableLog;

use crate::engine::Engine;
use crate::error::CoreResult;
use crate::record::{Record, Revisioned};
use crate::schema::TableSchema;
use crate::types::{RecordId, RevisionId, TableId};
use rekord_codec::Value;
use std::sync::Arc;

/// A handle to one table of a database.
///
/// Handles are cheap to clone and stay valid until the database is closed,
/// after which every operation fails with `DatabaseClosed`.
///
/// # Example
///
/// ```rust
/// use rekord_core::{Database, Revisioned, TableSchema};
/// use rekord_codec::{FieldType, Value};
///
/// let db = Database::builder()
///     .table(
///         TableSchema::builder("persons")
///             .unique("name", FieldType::Text)
///             .field("age", FieldType::Integer)
///             .build()
///             .unwrap(),
///     )
///     .open_in_memory()
///     .unwrap();
///
/// let persons = db.table("persons").unwrap();
/// let miku = persons.insert(vec![Value::from("Miku"), Value::Integer(16)]).unwrap();
/// let before = db.current_revision_id();
/// persons.remove(miku).unwrap();
///
/// assert_eq!(persons.items().unwrap().iter().count(), 0);
/// assert!(persons.get(miku).unwrap().is_live_at(before));
/// ```
#[derive(Clone)]
pub struct Table {
    engine: Arc<Engine>,
    id: TableId,
    schema: Arc<TableSchema>,
}

impl Table {
    pub(crate) fn new(engine: Arc<Engine>, id: TableId, schema: Arc<TableSchema>) -> Self {
        Self { engine, id, schema }
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Returns the table schema.
    #[must_use]
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    /// Inserts a record and returns its id.
    ///
    /// Outside a transaction the record is committed under a new revision.
    /// Inside one it is buffered in the innermost frame; the id is allocated
    /// immediately and never reused, even if the frame is rolled back.
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` for a wrong arity or field type,
    /// `ConstraintViolation` if a unique value is already taken (including
    /// by this transaction's own pending inserts), or a persistence error.
    pub fn insert(&self, fields: Vec<Value>) -> CoreResult<RecordId> {
        self.engine.insert(self.id, fields)
    }

    /// Logically removes a record.
    ///
    /// # Errors
    ///
    /// `NotFound` if no committed or pending record has the id,
    /// `AlreadyRemoved` for a second removal, or a persistence error.
    pub fn remove(&self, id: RecordId) -> CoreResult<()> {
        self.engine.remove(self.id, id)
    }

    /// Returns the committed state of a record, live or removed.
    ///
    /// # Errors
    ///
    /// `NotFound` if no committed record has the id.
    pub fn get(&self, id: RecordId) -> CoreResult<Record> {
        self.engine.get(self.id, id)
    }

    /// Records live at the current revision.
    ///
    /// # Errors
    ///
    /// `DatabaseClosed` if the database has been closed.
    pub fn items(&self) -> CoreResult<Items> {
        let revision = self.engine.current_revision();
        self.items_at(revision)
    }

    /// Records live at `revision`.
    ///
    /// # Errors
    ///
    /// `DatabaseClosed` if the database has been closed.
    pub fn items_at(&self, revision: RevisionId) -> CoreResult<Items> {
        self.engine.count_all(self.id)?;
        Ok(Items::live_at(self.clone(), revision))
    }

    /// Every committed record, including removed ones.
    ///
    /// # Errors
    ///
    /// `DatabaseClosed` if the database has been closed.
    pub fn all_items(&self) -> CoreResult<Items> {
        self.engine.count_all(self.id)?;
        Ok(Items::all(self.clone()))
    }

    /// Returns `true` if `record` is visible at `revision`.
    #[must_use]
    pub fn is_live_at<R: Revisioned + ?Sized>(&self, record: &R, revision: RevisionId) -> bool {
        record.is_live_at(revision)
    }

    /// Number of records ever committed, live or removed.
    ///
    /// # Errors
    ///
    /// `DatabaseClosed` if the database has been closed.
    pub fn count_all_records(&self) -> CoreResult<u64> {
        self.engine.count_all(self.id)
    }

    /// Looks up the live committed record holding `value` in a unique field.
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` if `field` has no unique index.
    pub fn find_unique(&self, field: &str, value: &Value) -> CoreResult<Option<Record>> {
        self.engine.find_unique(self.id, field, value)
    }

    pub(crate) fn record_after(&self, after: Option<RecordId>) -> CoreResult<Option<Record>> {
        self.engine.record_after(self.id, after)
    }
}

impl std::fmt::Debug for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name())
            .field("id", &self.id.0)
            .finish()
    }
}
