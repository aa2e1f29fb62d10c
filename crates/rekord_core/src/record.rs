//! Committed records and the revision liveness rule.

use crate::types::{RecordId, RevisionId};
use rekord_codec::Value;

/// Anything carrying a record identity and a revision lifetime.
///
/// A record is live at revision `r` iff it was inserted at or before `r` and
/// either never removed or removed after `r`.
pub trait Revisioned {
    /// Returns the record id.
    fn id(&self) -> RecordId;

    /// Returns the revision that inserted the record.
    fn inserted_at(&self) -> RevisionId;

    /// Returns the revision that removed the record, if any.
    fn removed_at(&self) -> Option<RevisionId>;

    /// Returns `true` if the record is visible at `revision`.
    fn is_live_at(&self, revision: RevisionId) -> bool {
        self.inserted_at() <= revision && self.removed_at().map_or(true, |r| revision < r)
    }
}

/// A committed record of a table.
///
/// Field values never change after insertion. Removal only stamps
/// `removed_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: RecordId,
    fields: Vec<Value>,
    inserted_at: RevisionId,
    removed_at: Option<RevisionId>,
}

impl Record {
    pub(crate) fn new(id: RecordId, fields: Vec<Value>, inserted_at: RevisionId) -> Self {
        Self {
            id,
            fields,
            inserted_at,
            removed_at: None,
        }
    }

    /// Returns the field values in schema order.
    #[must_use]
    pub fn fields(&self) -> &[Value] {
        &self.fields
    }

    /// Returns the value at a field position.
    #[must_use]
    pub fn field(&self, index: usize) -> Option<&Value> {
        self.fields.get(index)
    }

    /// Consumes the record, returning its field values.
    #[must_use]
    pub fn into_fields(self) -> Vec<Value> {
        self.fields
    }

    /// Returns `true` if a removal has been committed.
    #[must_use]
    pub const fn is_removed(&self) -> bool {
        self.removed_at.is_some()
    }

    pub(crate) fn mark_removed(&mut self, revision: RevisionId) {
        self.removed_at = Some(revision);
    }
}

impl Revisioned for Record {
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
