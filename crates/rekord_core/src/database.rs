//! Database facade and builder.

use crate::config::Config;
use crate::engine::Engine;
use crate::error::CoreResult;
use crate::schema::TableSchema;
use crate::stats::DatabaseStats;
use crate::table::Table;
use crate::transaction::{TransactionScope, TransactionState};
use crate::types::RevisionId;
use std::path::Path;
use std::sync::Arc;

/// The main database handle.
///
/// A database composes one revision clock, the tables declared when it was
/// opened and a single transaction log. It is either purely in memory or
/// backed by a directory (see [`DatabaseBuilder::open_directory`]).
///
/// # Opening a Database
///
/// ```rust
/// use rekord_core::{Database, TableSchema};
/// use rekord_codec::{FieldType, Value};
///
/// let persons = TableSchema::builder("persons")
///     .unique("name", FieldType::Text)
///     .field("age", FieldType::Integer)
///     .build()
///     .unwrap();
///
/// let db = Database::builder().table(persons).open_in_memory().unwrap();
/// let persons = db.table("persons").unwrap();
///
/// db.transaction(|_| {
///     persons.insert(vec![Value::from("Miku"), Value::Integer(16)])?;
///     persons.insert(vec![Value::from("Yukari"), Value::Integer(18)])?;
///     Ok(())
/// })
/// .unwrap();
///
/// assert_eq!(db.current_revision_id().as_u64(), 1);
/// db.close().unwrap();
/// ```
///
/// Dropping the database closes it. Table handles outliving the database
/// fail with `DatabaseClosed`.
pub struct Database {
    engine: Arc<Engine>,
}

impl Database {
    /// Starts configuring a database.
    #[must_use]
    pub fn builder() -> DatabaseBuilder {
        DatabaseBuilder::default()
    }

    pub(crate) fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Returns a handle to a declared table.
    ///
    /// # Errors
    ///
    /// `TableNotFound` if no table with that name was declared.
    pub fn table(&self, name: &str) -> CoreResult<Table> {
        let (id, schema) = self.engine.table_id(name)?;
        Ok(Table::new(Arc::clone(&self.engine), id, schema))
    }

    /// Names of the declared tables in declaration order.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.engine.table_names()
    }

    /// Returns the current revision.
    #[must_use]
    pub fn current_revision_id(&self) -> RevisionId {
        self.engine.current_revision()
    }

    // ========================================================================
    // Transactions
    // ========================================================================

    /// Opens a (possibly nested) transaction frame and returns its depth.
    ///
    /// Prefer [`Database::transaction`] or [`Database::scope`], which also
    /// hold the writer lock and roll back on early exit.
    ///
    /// # Errors
    ///
    /// `DatabaseClosed` if the database has been closed.
    pub fn begin(&self) -> CoreResult<usize> {
        self.engine.begin()
    }

    /// Commits the innermost frame.
    ///
    /// Returns the new revision when the outermost frame applied a
    /// non-empty batch, `None` otherwise.
    ///
    /// # Errors
    ///
    /// `TransactionState` without an open frame, or a persistence error, in
    /// which case the whole outer transaction is discarded.
    pub fn commit(&self) -> CoreResult<Option<RevisionId>> {
        self.engine.commit()
    }

    /// Discards the innermost frame.
    ///
    /// # Errors
    ///
    /// `TransactionState` without an open frame.
    pub fn rollback(&self) -> CoreResult<()> {
        self.engine.rollback()
    }

    /// Runs `f` inside a frame, committing on `Ok` and rolling back on `Err`.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`, or of the commit.
    pub fn transaction<T, F>(&self, f: F) -> CoreResult<T>
    where
        F: FnOnce(&Self) -> CoreResult<T>,
    {
        let scope = self.scope()?;
        let value = f(self)?;
        scope.commit()?;
        Ok(value)
    }

    /// Opens a frame that rolls back when the returned guard is dropped
    /// without [`TransactionScope::commit`].
    ///
    /// # Errors
    ///
    /// `DatabaseClosed` if the database has been closed.
    pub fn scope(&self) -> CoreResult<TransactionScope<'_>> {
        TransactionScope::begin(self)
    }

    /// Returns whether a transaction is open and at what depth.
    #[must_use]
    pub fn transaction_state(&self) -> TransactionState {
        self.engine.transaction_state()
    }

    /// Nesting depth of the open transaction, 0 when idle.
    #[must_use]
    pub fn transaction_depth(&self) -> usize {
        match self.transaction_state() {
            TransactionState::Idle => 0,
            TransactionState::InTransaction(depth) => depth,
        }
    }

    /// Operations buffered by the open transaction.
    #[must_use]
    pub fn pending_operations(&self) -> usize {
        self.engine.pending_count()
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Closes the database.
    ///
    /// Discards any open transaction, flushes segments, saves the manifest
    /// and releases the directory lock. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the first persistence error hit while flushing; the lock is
    /// released regardless.
    pub fn close(&self) -> CoreResult<()> {
        self.engine.close()
    }

    /// Checks if the database is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.engine.is_open()
    }

    /// Directory of a directory database.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.engine.path()
    }

    /// Returns database configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        self.engine.config()
    }

    /// Returns activity counters.
    #[must_use]
    pub fn stats(&self) -> &DatabaseStats {
        self.engine.stats()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("is_open", &self.is_open())
            .field("path", &self.path())
            .field("revision", &self.current_revision_id())
            .finish_non_exhaustive()
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::error!(error = %e, "failed to close database on drop");
        }
    }
}

/// Builder collecting table schemas and configuration before opening.
#[derive(Debug, Clone, Default)]
pub struct DatabaseBuilder {
    config: Config,
    tables: Vec<TableSchema>,
}

impl DatabaseBuilder {
    /// Declares a table.
    #[must_use]
    pub fn table(mut self, schema: TableSchema) -> Self {
        self.tables.push(schema);
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Opens a database without persistence.
    ///
    /// # Errors
    ///
    /// `SchemaMismatch` if two tables share a name.
    pub fn open_in_memory(self) -> CoreResult<Database> {
        let engine = Engine::open_in_memory(self.config, self.tables)?;
        Ok(Database {
            engine: Arc::new(engine),
        })
    }

    /// Opens or creates a database in a directory.
    ///
    /// Stored tables whose schema fingerprint differs from the declared
    /// schema, and stored tables no longer declared, are dropped and logged
    /// at `warn` unless `reset_on_schema_change` is off, in which case the
    /// open fails.
    ///
    /// # Errors
    ///
    /// `DatabaseLocked` if another process has the directory open,
    /// `SchemaMismatch` for a rejected schema change, or a persistence
    /// error for unreadable files.
    pub fn open_directory(self, path: impl AsRef<Path>) -> CoreResult<Database> {
        let engine = Engine::open_directory(self.config, self.tables, path.as_ref())?;
        Ok(Database {
            engine: Arc::new(engine),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use rekord_codec::{FieldType, Value};

    fn create_db() -> Database {
        Database::builder()
            .table(
                TableSchema::builder("persons")
                    .unique("name", FieldType::Text)
                    .field("age", FieldType::Integer)
                    .build()
                    .unwrap(),
            )
            .open_in_memory()
            .unwrap()
    }

    fn row(name: &str, age: i64) -> Vec<Value> {
        vec![Value::from(name), Value::Integer(age)]
    }

    #[test]
    fn open_in_memory() {
        let db = create_db();
        assert!(db.is_open());
        assert!(db.path().is_none());
        assert_eq!(db.table_names(), vec!["persons"]);
        assert_eq!(db.current_revision_id(), RevisionId::ZERO);
    }

    #[test]
    fn unknown_table() {
        let db = create_db();
        assert!(matches!(
            db.table("songs"),
            Err(CoreError::TableNotFound { .. })
        ));
    }

    #[test]
    fn transaction_commits_on_ok() {
        let db = create_db();
        let persons = db.table("persons").unwrap();

        db.transaction(|db| {
            persons.insert(row("Miku", 16))?;
            assert_eq!(db.transaction_depth(), 1);
            Ok(())
        })
        .unwrap();

        assert_eq!(db.transaction_depth(), 0);
        assert_eq!(persons.count_all_records().unwrap(), 1);
        assert_eq!(db.stats().commits(), 1);
    }

    #[test]
    fn transaction_rolls_back_on_err() {
        let db = create_db();
        let persons = db.table("persons").unwrap();

        let result: CoreResult<()> = db.transaction(|_| {
            persons.insert(row("Miku", 16))?;
            persons.insert(row("Miku", 17))?;
            Ok(())
        });
        assert!(matches!(result, Err(CoreError::ConstraintViolation { .. })));

        assert_eq!(db.transaction_depth(), 0);
        assert_eq!(persons.count_all_records().unwrap(), 0);
        assert_eq!(db.current_revision_id(), RevisionId::ZERO);
        // the name is free again
        persons.insert(row("Miku", 16)).unwrap();
    }

    #[test]
    fn nested_scopes() {
        let db = create_db();
        let persons = db.table("persons").unwrap();

        let outer = db.scope().unwrap();
        persons.insert(row("Miku", 16)).unwrap();
        {
            let inner = db.scope().unwrap();
            assert_eq!(inner.depth(), 2);
            persons.insert(row("Rin", 14)).unwrap();
        }
        assert_eq!(db.transaction_depth(), 1);
        assert_eq!(db.pending_operations(), 1);

        let revision = outer.commit().unwrap();
        assert_eq!(revision, Some(RevisionId(1)));
        let names: Vec<_> = persons
            .items()
            .unwrap()
            .iter()
            .map(|r| r.fields()[0].clone())
            .collect();
        assert_eq!(names, vec![Value::from("Miku")]);
    }

    #[test]
    fn raw_commit_without_begin_fails() {
        let db = create_db();
        assert!(matches!(db.commit(), Err(CoreError::TransactionState { .. })));
        assert!(matches!(db.rollback(), Err(CoreError::TransactionState { .. })));
    }

    #[test]
    fn closed_database_rejects_operations() {
        let db = create_db();
        let persons = db.table("persons").unwrap();
        db.close().unwrap();

        assert!(!db.is_open());
        assert!(matches!(persons.get(crate::RecordId(0)), Err(CoreError::DatabaseClosed)));
        assert!(matches!(db.begin(), Err(CoreError::DatabaseClosed)));
        assert!(matches!(db.table("persons"), Err(CoreError::DatabaseClosed)));
    }

    #[test]
    fn handles_outlive_dropped_database() {
        let persons = {
            let db = create_db();
            db.table("persons").unwrap()
        };
        assert!(matches!(
            persons.insert(row("Miku", 16)),
            Err(CoreError::DatabaseClosed)
        ));
    }
}
