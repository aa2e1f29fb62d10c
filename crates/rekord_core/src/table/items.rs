//! Lazy, restartable record scans.

use crate::record::{Record, Revisioned};
use crate::table::Table;
use crate::types::{RecordId, RevisionId};

/// A lazy sequence of a table's records in ascending id order.
///
/// The snapshot revision is fixed when the sequence is created; every call
/// to [`Items::iter`] restarts the scan against that same revision. Records
/// committed later are never yielded, records removed later still are.
#[derive(Debug, Clone)]
pub struct Items {
    table: Table,
    revision: Option<RevisionId>,
}

impl Items {
    pub(crate) fn live_at(table: Table, revision: RevisionId) -> Self {
        Self {
            table,
            revision: Some(revision),
        }
    }

    pub(crate) fn all(table: Table) -> Self {
        Self {
            table,
            revision: None,
        }
    }

    /// Returns the snapshot revision, or `None` for a scan that includes
    /// removed records.
    #[must_use]
    pub const fn revision(&self) -> Option<RevisionId> {
        self.revision
    }

    /// Starts a new pass over the records.
    #[must_use]
    pub fn iter(&self) -> ItemsIter {
        ItemsIter {
            table: self.table.clone(),
            revision: self.revision,
            cursor: None,
            done: false,
        }
    }
}

impl IntoIterator for Items {
    type Item = Record;
    type IntoIter = ItemsIter;

    fn into_iter(self) -> ItemsIter {
        ItemsIter {
            table: self.table,
            revision: self.revision,
            cursor: None,
            done: false,
        }
    }
}

impl IntoIterator for &Items {
    type Item = Record;
    type IntoIter = ItemsIter;

    fn into_iter(self) -> ItemsIter {
        self.iter()
    }
}

/// One pass over an [`Items`] sequence.
///
/// Each step takes the engine read lock briefly. The pass ends early if the
/// database is closed underneath it.
#[derive(Debug)]
pub struct ItemsIter {
    table: Table,
    revision: Option<RevisionId>,
    cursor: Option<RecordId>,
    done: bool,
}

impl Iterator for ItemsIter {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        while !self.done {
            let next = match self.table.record_after(self.cursor) {
                Ok(next) => next,
                Err(e) => {
                    tracing::debug!(table = self.table.name(), error = %e, "scan ended early");
                    None
                }
            };
            let Some(record) = next else {
                self.done = true;
                break;
            };
            self.cursor = Some(record.id());
            if self.revision.map_or(true, |r| record.is_live_at(r)) {
                return Some(record);
            }
        }
        None
    }
}

impl std::iter::FusedIterator for ItemsIter {}
