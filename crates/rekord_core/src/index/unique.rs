//! Unique value index over one field of one table.

use crate::error::{CoreError, CoreResult};
use crate::types::RecordId;
use rekord_codec::Value;
use std::collections::HashMap;

/// Maps each value of an indexed field to the record holding it.
///
/// The index keeps two views. The tentative view, used by [`check`] and
/// [`lookup`], includes values of records inserted by the open transaction
/// and excludes values of records whose removal is pending. Every tentative
/// mutation returns an [`IndexChange`] so the enclosing transaction frame
/// can undo it. The committed view, used by [`lookup_committed`], only
/// changes when a batch is applied.
///
/// [`check`]: UniqueIndex::check
/// [`lookup`]: UniqueIndex::lookup
/// [`lookup_committed`]: UniqueIndex::lookup_committed
#[derive(Debug, Clone)]
pub struct UniqueIndex {
    table: String,
    field: String,
    position: usize,
    entries: HashMap<Value, RecordId>,
    committed: HashMap<Value, RecordId>,
}

/// A reversible mutation of a [`UniqueIndex`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum IndexChange {
    /// A value was registered.
    Registered(Value),
    /// A value previously mapped to the id was unregistered.
    Unregistered(Value, RecordId),
}

impl UniqueIndex {
    /// Creates an empty index for `table.field` at the given field position.
    pub fn new(table: impl Into<String>, field: impl Into<String>, position: usize) -> Self {
        Self {
            table: table.into(),
            field: field.into(),
            position,
            entries: HashMap::new(),
            committed: HashMap::new(),
        }
    }

    /// Returns the indexed field name.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the position of the indexed field in a row.
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Checks that no record holds `value`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ConstraintViolation`] if the value is taken.
    pub fn check(&self, value: &Value) -> CoreResult<()> {
        if self.entries.contains_key(value) {
            return Err(CoreError::constraint_violation(
                self.table.as_str(),
                self.field.as_str(),
                value.to_string(),
            ));
        }
        Ok(())
    }

    /// Returns the record holding `value` in the tentative view.
    #[must_use]
    pub fn lookup(&self, value: &Value) -> Option<RecordId> {
        self.entries.get(value).copied()
    }

    /// Returns the live committed record holding `value`.
    #[must_use]
    pub fn lookup_committed(&self, value: &Value) -> Option<RecordId> {
        self.committed.get(value).copied()
    }

    /// Records a committed insert.
    pub(crate) fn commit_insert(&mut self, value: Value, id: RecordId) {
        self.committed.insert(value, id);
    }

    /// Records a committed removal if `value` belongs to `id`.
    pub(crate) fn commit_remove(&mut self, value: &Value, id: RecordId) {
        if self.committed.get(value) == Some(&id) {
            self.committed.remove(value);
        }
    }

    /// Maps `value` to `id`. The caller has checked the value is free.
    pub(crate) fn register(&mut self, value: Value, id: RecordId) -> IndexChange {
        let previous = self.entries.insert(value.clone(), id);
        debug_assert!(previous.is_none(), "unique value registered twice");
        IndexChange::Registered(value)
    }

    /// Removes `value` if it currently maps to `id`.
    pub(crate) fn unregister(&mut self, value: &Value, id: RecordId) -> Option<IndexChange> {
        match self.entries.get(value) {
            Some(owner) if *owner == id => {
                self.entries.remove(value);
                Some(IndexChange::Unregistered(value.clone(), id))
            }
            _ => None,
        }
    }

    /// Undoes a change returned by `register` or `unregister`.
    pub(crate) fn revert(&mut self, change: IndexChange) {
        match change {
            IndexChange::Registered(value) => {
                self.entries.remove(&value);
            }
            IndexChange::Unregistered(value, id) => {
                self.entries.insert(value, id);
            }
        }
    }

    /// Replaces both views with the given committed value/id pairs.
    pub fn rebuild<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (Value, RecordId)>,
    {
        self.committed.clear();
        self.committed.extend(entries);
        self.entries.clone_from(&self.committed);
    }

    /// Returns the number of indexed values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no value is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> UniqueIndex {
        UniqueIndex::new("persons", "name", 0)
    }

    #[test]
    fn register_then_check() {
        let mut index = names();
        index.check(&Value::from("Miku")).unwrap();
        index.register(Value::from("Miku"), RecordId(0));

        let err = index.check(&Value::from("Miku")).unwrap_err();
        assert!(matches!(
            err,
            CoreError::ConstraintViolation { ref table, ref field, .. }
                if table == "persons" && field == "name"
        ));
        assert_eq!(index.lookup(&Value::from("Miku")), Some(RecordId(0)));
        index.check(&Value::from("Yukari")).unwrap();
    }

    #[test]
    fn unregister_only_matching_owner() {
        let mut index = names();
        index.register(Value::from("Rin"), RecordId(2));

        assert!(index.unregister(&Value::from("Rin"), RecordId(5)).is_none());
        assert_eq!(index.len(), 1);

        let change = index.unregister(&Value::from("Rin"), RecordId(2)).unwrap();
        assert_eq!(change, IndexChange::Unregistered(Value::from("Rin"), RecordId(2)));
        assert!(index.is_empty());
    }

    #[test]
    fn revert_in_reverse_restores_previous_mapping() {
        let mut index = names();
        index.register(Value::from("Miku"), RecordId(0));

        let mut undo = Vec::new();
        undo.extend(index.unregister(&Value::from("Miku"), RecordId(0)));
        undo.push(index.register(Value::from("Miku"), RecordId(3)));
        assert_eq!(index.lookup(&Value::from("Miku")), Some(RecordId(3)));

        for change in undo.into_iter().rev() {
            index.revert(change);
        }
        assert_eq!(index.lookup(&Value::from("Miku")), Some(RecordId(0)));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn rebuild_replaces_entries() {
        let mut index = names();
        index.register(Value::from("stale"), RecordId(9));
        index.rebuild(vec![
            (Value::from("Miku"), RecordId(0)),
            (Value::from("Yukari"), RecordId(1)),
        ]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup(&Value::from("stale")), None);
        assert_eq!(index.lookup_committed(&Value::from("Yukari")), Some(RecordId(1)));
    }

    #[test]
    fn committed_view_ignores_tentative_changes() {
        let mut index = names();
        index.rebuild(vec![(Value::from("Miku"), RecordId(0))]);

        index.unregister(&Value::from("Miku"), RecordId(0)).unwrap();
        index.register(Value::from("Miku"), RecordId(4));
        assert_eq!(index.lookup(&Value::from("Miku")), Some(RecordId(4)));
        assert_eq!(index.lookup_committed(&Value::from("Miku")), Some(RecordId(0)));

        index.commit_remove(&Value::from("Miku"), RecordId(0));
        index.commit_insert(Value::from("Miku"), RecordId(4));
        assert_eq!(index.lookup_committed(&Value::from("Miku")), Some(RecordId(4)));

        // a stale removal does not evict the new owner
        index.commit_remove(&Value::from("Miku"), RecordId(0));
        assert_eq!(index.lookup_committed(&Value::from("Miku")), Some(RecordId(4)));
    }

    #[test]
    fn float_keys_by_bits() {
        let mut index = UniqueIndex::new("songs", "bpm", 1);
        index.register(Value::Float(128.0), RecordId(0));
        assert!(index.check(&Value::Float(128.0)).is_err());
        index.check(&Value::Float(128.5)).unwrap();
    }
}
