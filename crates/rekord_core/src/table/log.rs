//! Committed state of one table.

use crate::error::{CoreError, CoreResult};
use crate::index::{IndexChange, UniqueIndex};
use crate::record::{Record, Revisioned};
use crate::schema::TableSchema;
use crate::segment::{EntryKind, SegmentEntry, TableSegment};
use crate::transaction::IndexUndo;
use crate::types::{RecordId, RevisionId, TableId};
use rekord_codec::Value;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

/// An id-keyed, append-only record log with its unique indexes.
///
/// `records` holds committed state only. The indexes hold both the
/// tentative state, including the effects of an open transaction, and the
/// committed one.
#[derive(Debug)]
pub(crate) struct TableLog {
    id: TableId,
    schema: Arc<TableSchema>,
    records: BTreeMap<RecordId, Record>,
    next_id: u64,
    indexes: Vec<UniqueIndex>,
    segment: Option<TableSegment>,
}

/// What replaying a segment found.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct ReplaySummary {
    pub(crate) entries: usize,
    pub(crate) max_revision: RevisionId,
}

impl TableLog {
    pub(crate) fn new(id: TableId, schema: Arc<TableSchema>, segment: Option<TableSegment>) -> Self {
        let indexes = schema
            .unique_fields()
            .map(|(position, field)| UniqueIndex::new(schema.name(), field.name(), position))
            .collect();
        Self {
            id,
            schema,
            records: BTreeMap::new(),
            next_id: 0,
            indexes,
            segment,
        }
    }

    pub(crate) fn name(&self) -> &str {
        self.schema.name()
    }

    pub(crate) fn schema(&self) -> &Arc<TableSchema> {
        &self.schema
    }

    pub(crate) const fn next_id(&self) -> u64 {
        self.next_id
    }

    pub(crate) fn segment_mut(&mut self) -> Option<&mut TableSegment> {
        self.segment.as_mut()
    }

    pub(crate) fn allocate_id(&mut self) -> RecordId {
        let id = RecordId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.get(&id)
    }

    /// First committed record with an id greater than `after`.
    pub(crate) fn record_after(&self, after: Option<RecordId>) -> Option<&Record> {
        let lower = after.map_or(Bound::Unbounded, Bound::Excluded);
        self.records
            .range((lower, Bound::Unbounded))
            .next()
            .map(|(_, record)| record)
    }

    pub(crate) fn count_all(&self) -> u64 {
        self.records.len() as u64
    }

    pub(crate) fn count_live(&self) -> u64 {
        self.records.values().filter(|r| !r.is_removed()).count() as u64
    }

    /// Looks up a live committed record through the index on `field`.
    pub(crate) fn find_unique(&self, field: &str, value: &Value) -> CoreResult<Option<&Record>> {
        let index = self
            .indexes
            .iter()
            .find(|i| i.field() == field)
            .ok_or_else(|| {
                CoreError::schema_mismatch(format!(
                    "{}.{field} has no unique index",
                    self.name()
                ))
            })?;
        Ok(index
            .lookup_committed(value)
            .and_then(|id| self.records.get(&id))
            .filter(|record| !record.is_removed()))
    }

    /// Fails if any unique value of `fields` is already taken.
    pub(crate) fn check_unique(&self, fields: &[Value]) -> CoreResult<()> {
        for index in &self.indexes {
            if let Some(value) = fields.get(index.position()) {
                index.check(value)?;
            }
        }
        Ok(())
    }

    pub(crate) fn register_unique(&mut self, id: RecordId, fields: &[Value]) -> Vec<IndexUndo> {
        let table = self.id;
        self.indexes
            .iter_mut()
            .enumerate()
            .filter_map(|(slot, index)| {
                let value = fields.get(index.position())?.clone();
                Some(IndexUndo {
                    table,
                    slot,
                    change: index.register(value, id),
                })
            })
            .collect()
    }

    pub(crate) fn unregister_unique(&mut self, id: RecordId, fields: &[Value]) -> Vec<IndexUndo> {
        let table = self.id;
        self.indexes
            .iter_mut()
            .enumerate()
            .filter_map(|(slot, index)| {
                let value = fields.get(index.position())?;
                let change = index.unregister(value, id)?;
                Some(IndexUndo {
                    table,
                    slot,
                    change,
                })
            })
            .collect()
    }

    pub(crate) fn revert_index(&mut self, slot: usize, change: IndexChange) {
        if let Some(index) = self.indexes.get_mut(slot) {
            index.revert(change);
        }
    }

    pub(crate) fn apply_insert(&mut self, id: RecordId, fields: Vec<Value>, revision: RevisionId) {
        for index in &mut self.indexes {
            if let Some(value) = fields.get(index.position()) {
                index.commit_insert(value.clone(), id);
            }
        }
        self.records.insert(id, Record::new(id, fields, revision));
    }

    pub(crate) fn apply_remove(&mut self, id: RecordId, revision: RevisionId) {
        match self.records.get_mut(&id) {
            Some(record) => {
                record.mark_removed(revision);
                for index in &mut self.indexes {
                    if let Some(value) = record.field(index.position()) {
                        index.commit_remove(value, id);
                    }
                }
            }
            None => tracing::error!(table = self.name(), %id, "removal of unknown record"),
        }
    }

    /// Restores committed state from segment entries and rebuilds indexes.
    pub(crate) fn replay(&mut self, entries: Vec<SegmentEntry>) -> CoreResult<ReplaySummary> {
        let mut summary = ReplaySummary::default();
        for entry in entries {
            summary.entries += 1;
            summary.max_revision = summary.max_revision.max(entry.revision);
            self.next_id = self.next_id.max(entry.record_id.as_u64() + 1);

            match entry.kind {
                EntryKind::Insert => {
                    let fields = rekord_codec::decode_row(&entry.payload)?;
                    self.schema.validate(&fields).map_err(|e| {
                        CoreError::segment_corruption(format!(
                            "record {} of {}: {e}",
                            entry.record_id,
                            self.name()
                        ))
                    })?;
                    self.apply_insert(entry.record_id, fields, entry.revision);
                }
                EntryKind::Remove => {
                    if !self.records.contains_key(&entry.record_id) {
                        return Err(CoreError::segment_corruption(format!(
                            "removal of unknown record {} in {}",
                            entry.record_id,
                            self.name()
                        )));
                    }
                    self.apply_remove(entry.record_id, entry.revision);
                }
            }
        }
        self.rebuild_indexes();
        Ok(summary)
    }

    /// Raises the id counter to at least `next_id`.
    pub(crate) fn reserve_ids(&mut self, next_id: u64) {
        self.next_id = self.next_id.max(next_id);
    }

    fn rebuild_indexes(&mut self) {
        let records = &self.records;
        for index in &mut self.indexes {
            let position = index.position();
            index.rebuild(records.values().filter(|r| !r.is_removed()).filter_map(|r| {
                r.field(position).map(|value| (value.clone(), r.id()))
            }));
        }
    }
}
