//! Guard for a scoped transaction frame.

use crate::database::Database;
use crate::error::CoreResult;
use crate::types::RevisionId;
use parking_lot::ReentrantMutexGuard;

/// A transaction frame that rolls back when dropped uncommitted.
///
/// The scope holds the database writer lock for its whole lifetime, so
/// writes from other threads cannot land in its frame. Writes from the
/// owning thread re-enter the lock freely.
///
/// # Example
///
/// ```rust
/// use rekord_core::{Database, TableSchema};
/// use rekord_codec::{FieldType, Value};
///
/// let db = Database::builder()
///     .table(TableSchema::builder("persons").field("name", FieldType::Text).build().unwrap())
///     .open_in_memory()
///     .unwrap();
/// let persons = db.table("persons").unwrap();
///
/// {
///     let _scope = db.scope().unwrap();
///     persons.insert(vec![Value::from("Rin")]).unwrap();
///     // dropped without commit: rolled back
/// }
/// assert_eq!(persons.count_all_records().unwrap(), 0);
/// ```
#[must_use = "a scope rolls back when dropped; call commit() to keep its writes"]
pub struct TransactionScope<'db> {
    db: &'db Database,
    depth: usize,
    finished: bool,
    _writer: ReentrantMutexGuard<'db, ()>,
}

impl<'db> TransactionScope<'db> {
    pub(crate) fn begin(db: &'db Database) -> CoreResult<Self> {
        let writer = db.engine().writer().lock();
        let depth = db.engine().begin()?;
        Ok(Self {
            db,
            depth,
            finished: false,
            _writer: writer,
        })
    }

    /// Nesting depth of this scope's frame.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Commits the frame. Returns the new revision if this was the
    /// outermost frame and it applied a batch.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the outermost batch could not be
    /// written; the batch is then discarded.
    pub fn commit(mut self) -> CoreResult<Option<RevisionId>> {
        self.finished = true;
        self.db.engine().commit()
    }

    /// Rolls the frame back explicitly.
    ///
    /// # Errors
    ///
    /// Fails only if the frame was already popped or the database closed.
    pub fn rollback(mut self) -> CoreResult<()> {
        self.finished = true;
        self.db.engine().rollback()
    }
}

impl Drop for TransactionScope<'_> {
    fn drop(&mut self) {
        if self.finished || self.db.transaction_depth() < self.depth {
            return;
        }
        if let Err(e) = self.db.engine().rollback() {
            tracing::warn!(depth = self.depth, error = %e, "scope rollback failed");
        }
    }
}

impl std::fmt::Debug for TransactionScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionScope")
            .field("depth", &self.depth)
            .field("finished", &self.finished)
            .finish()
    }
}
