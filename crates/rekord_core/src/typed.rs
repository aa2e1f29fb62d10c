//! Typed tables over plain Rust structs.

use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use crate::record::{Record, Revisioned};
use crate::schema::TableSchema;
use crate::table::{Items, Table};
use crate::types::{RecordId, RevisionId};
use rekord_codec::Value;
use std::marker::PhantomData;
use std::ops::Deref;

/// A struct stored as the rows of one table.
///
/// Implementations declare the table name, its schema, and explicit
/// conversions to and from field values in schema order.
///
/// # Example
///
/// ```rust
/// use rekord_core::{CoreResult, FieldReader, Model, Record, TableSchema};
/// use rekord_codec::{FieldType, Value};
///
/// struct Person {
///     name: String,
///     age: i64,
/// }
///
/// impl Model for Person {
///     const TABLE: &'static str = "persons";
///
///     fn schema() -> CoreResult<TableSchema> {
///         TableSchema::builder(Self::TABLE)
///             .unique("name", FieldType::Text)
///             .field("age", FieldType::Integer)
///             .build()
///     }
///
///     fn to_fields(&self) -> Vec<Value> {
///         vec![Value::from(self.name.as_str()), Value::Integer(self.age)]
///     }
///
///     fn from_record(record: &Record) -> CoreResult<Self> {
///         let fields = FieldReader::new(Self::TABLE, record);
///         Ok(Self {
///             name: fields.text(0)?.to_string(),
///             age: fields.integer(1)?,
///         })
///     }
/// }
/// ```
pub trait Model: Sized {
    /// Table name.
    const TABLE: &'static str;

    /// Returns the table schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema is invalid.
    fn schema() -> CoreResult<TableSchema>;

    /// Converts the value to fields in schema order.
    fn to_fields(&self) -> Vec<Value>;

    /// Rebuilds a value from a committed record.
    ///
    /// # Errors
    ///
    /// Returns an error if a field has an unexpected type.
    fn from_record(record: &Record) -> CoreResult<Self>;
}

/// Typed access to the fields of a record, for [`Model::from_record`].
#[derive(Debug, Clone, Copy)]
pub struct FieldReader<'a> {
    table: &'a str,
    record: &'a Record,
}

impl<'a> FieldReader<'a> {
    /// Wraps a record of the named table.
    #[must_use]
    pub const fn new(table: &'a str, record: &'a Record) -> Self {
        Self { table, record }
    }

    fn value(&self, index: usize) -> CoreResult<&'a Value> {
        self.record.field(index).ok_or_else(|| {
            CoreError::schema_mismatch(format!(
                "record {} of {} has no field {index}",
                self.record.id(),
                self.table
            ))
        })
    }

    fn mismatch(&self, index: usize, expected: &str, found: &Value) -> CoreError {
        CoreError::schema_mismatch(format!(
            "field {index} of {} record {} is {}, expected {expected}",
            self.table,
            self.record.id(),
            found.field_type()
        ))
    }

    /// Reads an integer field.
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` if the field is missing or not an integer.
    pub fn integer(&self, index: usize) -> CoreResult<i64> {
        let value = self.value(index)?;
        value
            .as_integer()
            .ok_or_else(|| self.mismatch(index, "integer", value))
    }

    /// Reads a float field.
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` if the field is missing or not a float.
    pub fn float(&self, index: usize) -> CoreResult<f64> {
        let value = self.value(index)?;
        value
            .as_float()
            .ok_or_else(|| self.mismatch(index, "float", value))
    }

    /// Reads a timestamp field.
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` if the field is missing or not a timestamp.
    pub fn datetime(&self, index: usize) -> CoreResult<chrono::DateTime<chrono::Utc>> {
        let value = self.value(index)?;
        value
            .as_datetime()
            .ok_or_else(|| self.mismatch(index, "datetime", value))
    }

    /// Reads a text field.
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` if the field is missing or not text.
    pub fn text(&self, index: usize) -> CoreResult<&'a str> {
        let value = self.value(index)?;
        value
            .as_text()
            .ok_or_else(|| self.mismatch(index, "text", value))
    }

    /// Reads a bytes field.
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` if the field is missing or not bytes.
    pub fn bytes(&self, index: usize) -> CoreResult<&'a [u8]> {
        let value = self.value(index)?;
        value
            .as_bytes()
            .ok_or_else(|| self.mismatch(index, "bytes", value))
    }
}

/// A model value together with its record identity and revisions.
#[derive(Debug, Clone, PartialEq)]
pub struct Stored<M> {
    id: RecordId,
    inserted_at: RevisionId,
    removed_at: Option<RevisionId>,
    model: M,
}

impl<M: Model> Stored<M> {
    fn from_record(record: &Record) -> CoreResult<Self> {
        Ok(Self {
            id: record.id(),
            inserted_at: record.inserted_at(),
            removed_at: record.removed_at(),
            model: M::from_record(record)?,
        })
    }
}

impl<M> Stored<M> {
    /// Returns the model value.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Consumes the wrapper, returning the model value.
    pub fn into_model(self) -> M {
        self.model
    }
}

impl<M> Deref for Stored<M> {
    type Target = M;

    fn deref(&self) -> &M {
        &self.model
    }
}

impl<M> Revisioned for Stored<M> {
    fn id(&self) -> RecordId {
        self.id
    }

    fn inserted_at(&self) -> RevisionId {
        self.inserted_at
    }

    fn removed_at(&self) -> Option<RevisionId> {
        self.removed_at
    }
}

/// A table whose rows convert to and from `M`.
pub struct TypedTable<M: Model> {
    table: Table,
    _marker: PhantomData<fn() -> M>,
}

impl<M: Model> TypedTable<M> {
    /// Returns the untyped handle.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Inserts a value. See [`Table::insert`].
    ///
    /// # Errors
    ///
    /// Same as [`Table::insert`].
    pub fn insert(&self, model: &M) -> CoreResult<RecordId> {
        self.table.insert(model.to_fields())
    }

    /// Logically removes a value. See [`Table::remove`].
    ///
    /// # Errors
    ///
    /// Same as [`Table::remove`].
    pub fn remove(&self, id: RecordId) -> CoreResult<()> {
        self.table.remove(id)
    }

    /// Returns the committed value with this id, live or removed.
    ///
    /// # Errors
    ///
    /// `NotFound` if no committed record has the id, or a conversion error.
    pub fn get(&self, id: RecordId) -> CoreResult<Stored<M>> {
        Stored::from_record(&self.table.get(id)?)
    }

    /// Values live at the current revision.
    ///
    /// # Errors
    ///
    /// `DatabaseClosed` if the database has been closed.
    pub fn items(&self) -> CoreResult<TypedItems<M>> {
        Ok(TypedItems::new(self.table.items()?))
    }

    /// Values live at `revision`.
    ///
    /// # Errors
    ///
    /// `DatabaseClosed` if the database has been closed.
    pub fn items_at(&self, revision: RevisionId) -> CoreResult<TypedItems<M>> {
        Ok(TypedItems::new(self.table.items_at(revision)?))
    }

    /// Every committed value, including removed ones.
    ///
    /// # Errors
    ///
    /// `DatabaseClosed` if the database has been closed.
    pub fn all_items(&self) -> CoreResult<TypedItems<M>> {
        Ok(TypedItems::new(self.table.all_items()?))
    }

    /// Number of values ever committed.
    ///
    /// # Errors
    ///
    /// `DatabaseClosed` if the database has been closed.
    pub fn count_all_records(&self) -> CoreResult<u64> {
        self.table.count_all_records()
    }

    /// Looks up the live value holding `value` in a unique field.
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` if `field` has no unique index, or a conversion error.
    pub fn find_unique(&self, field: &str, value: &Value) -> CoreResult<Option<Stored<M>>> {
        self.table
            .find_unique(field, value)?
            .as_ref()
            .map(Stored::<M>::from_record)
            .transpose()
    }
}

impl<M: Model> Clone for TypedTable<M> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            _marker: PhantomData,
        }
    }
}

impl<M: Model> std::fmt::Debug for TypedTable<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TypedTable").field(&self.table).finish()
    }
}

/// A lazy, restartable sequence of typed values. See [`Items`].
pub struct TypedItems<M: Model> {
    items: Items,
    _marker: PhantomData<fn() -> M>,
}

impl<M: Model> TypedItems<M> {
    fn new(items: Items) -> Self {
        Self {
            items,
            _marker: PhantomData,
        }
    }

    /// Starts a new pass. Records that fail to convert are skipped with a
    /// warning.
    pub fn iter(&self) -> impl Iterator<Item = Stored<M>> {
        self.items
            .iter()
            .filter_map(|record| match Stored::<M>::from_record(&record) {
                Ok(stored) => Some(stored),
                Err(e) => {
                    tracing::warn!(table = M::TABLE, id = %record.id(), error = %e, "skipping record");
                    None
                }
            })
    }
}

impl<M: Model> std::fmt::Debug for TypedItems<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TypedItems").field(&self.items).finish()
    }
}

impl Database {
    /// Returns a typed handle to the table of `M`.
    ///
    /// # Errors
    ///
    /// `TableNotFound` if `M::TABLE` was not declared, or `SchemaMismatch`
    /// if it was declared with a different schema than `M::schema()`.
    pub fn typed_table<M: Model>(&self) -> CoreResult<TypedTable<M>> {
        let table = self.table(M::TABLE)?;
        if *table.schema() != M::schema()? {
            return Err(CoreError::schema_mismatch(format!(
                "table {} was declared with a different schema",
                M::TABLE
            )));
        }
        Ok(TypedTable {
            table,
            _marker: PhantomData,
        })
    }
}
