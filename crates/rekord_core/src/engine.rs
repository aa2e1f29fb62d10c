//! Shared engine state behind `Database` and `Table` handles.

use crate::config::Config;
use crate::dir::DatabaseDir;
use crate::error::{CoreError, CoreResult};
use crate::manifest::{Manifest, TableEntry};
use crate::record::Record;
use crate::revision::RevisionClock;
use crate::schema::TableSchema;
use crate::segment::{SegmentEntry, TableSegment};
use crate::stats::DatabaseStats;
use crate::table::TableLog;
use crate::transaction::{CommitOutcome, IndexUndo, PendingOp, TransactionLog, TransactionState};
use crate::types::{RecordId, RevisionId, TableId};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use rekord_codec::Value;
use rekord_storage::FileBackend;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Tables and the transaction log, guarded together by one lock.
#[derive(Debug)]
pub(crate) struct EngineState {
    tables: Vec<TableLog>,
    names: HashMap<String, TableId>,
    txlog: TransactionLog,
}

impl EngineState {
    fn new(tables: Vec<TableLog>) -> Self {
        let names = tables
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name().to_string(), TableId(i as u32)))
            .collect();
        Self {
            tables,
            names,
            txlog: TransactionLog::new(),
        }
    }

    fn table(&self, id: TableId) -> CoreResult<&TableLog> {
        self.tables
            .get(id.index())
            .ok_or_else(|| CoreError::TableNotFound {
                name: format!("#{}", id.0),
            })
    }

    /// Reverts tentative index changes, last change first.
    fn revert(&mut self, undo: Vec<IndexUndo>) {
        for entry in undo.into_iter().rev() {
            if let Some(table) = self.tables.get_mut(entry.table.index()) {
                table.revert_index(entry.slot, entry.change);
            }
        }
    }
}

/// The engine shared by a database and its table handles.
pub(crate) struct Engine {
    config: Config,
    path: Option<PathBuf>,
    dir: Mutex<Option<DatabaseDir>>,
    clock: RevisionClock,
    state: RwLock<EngineState>,
    writer: ReentrantMutex<()>,
    stats: DatabaseStats,
    open: AtomicBool,
}

/// Rejects duplicate table names.
fn check_registry(schemas: &[TableSchema]) -> CoreResult<()> {
    let mut seen = HashSet::new();
    for schema in schemas {
        if !seen.insert(schema.name()) {
            return Err(CoreError::schema_mismatch(format!(
                "table {} declared twice",
                schema.name()
            )));
        }
    }
    Ok(())
}

impl Engine {
    fn assemble(
        config: Config,
        dir: Option<DatabaseDir>,
        tables: Vec<TableLog>,
        revision: RevisionId,
    ) -> Self {
        let clock = RevisionClock::new();
        clock.restore(revision);
        Self {
            config,
            path: dir.as_ref().map(|d| d.path().to_path_buf()),
            dir: Mutex::new(dir),
            clock,
            state: RwLock::new(EngineState::new(tables)),
            writer: ReentrantMutex::new(()),
            stats: DatabaseStats::new(),
            open: AtomicBool::new(true),
        }
    }

    pub(crate) fn open_in_memory(config: Config, schemas: Vec<TableSchema>) -> CoreResult<Self> {
        check_registry(&schemas)?;
        let tables = schemas
            .into_iter()
            .enumerate()
            .map(|(i, schema)| TableLog::new(TableId(i as u32), Arc::new(schema), None))
            .collect::<Vec<_>>();
        tracing::info!(tables = tables.len(), "opened in-memory database");
        Ok(Self::assemble(config, None, tables, RevisionId::ZERO))
    }

    pub(crate) fn open_directory(
        config: Config,
        schemas: Vec<TableSchema>,
        path: &Path,
    ) -> CoreResult<Self> {
        check_registry(&schemas)?;
        let dir = DatabaseDir::open(path, config.create_if_missing)?;
        let manifest = dir.load_manifest()?;

        if let Some(m) = &manifest {
            if m.format_version.0 != config.format_version.0 {
                return Err(CoreError::invalid_format(format!(
                    "database format {}.{} is not readable by format {}.{}",
                    m.format_version.0,
                    m.format_version.1,
                    config.format_version.0,
                    config.format_version.1
                )));
            }
        }

        // Decide the reset before touching any file, so a rejected open
        // leaves the directory as it was. A change to any table resets all
        // of them.
        let mut changed = Vec::new();
        for schema in &schemas {
            let stored = manifest.as_ref().and_then(|m| m.table(schema.name()));
            let differs = match stored {
                Some(entry) => entry.fingerprint != schema.fingerprint()?,
                None => dir.segment_path(schema.name()).exists(),
            };
            if differs {
                changed.push(schema.name().to_string());
            }
        }

        let undeclared: Vec<String> = dir
            .segment_names()?
            .into_iter()
            .filter(|name| !schemas.iter().any(|s| s.name() == name))
            .collect();

        let reset = !changed.is_empty() || !undeclared.is_empty();
        if reset && !config.reset_on_schema_change {
            return Err(CoreError::schema_mismatch(format!(
                "stored schema differs from the declared schema (changed: [{}], undeclared: [{}])",
                changed.join(", "),
                undeclared.join(", ")
            )));
        }
        if reset {
            tracing::warn!(
                changed = %changed.join(", "),
                undeclared = %undeclared.join(", "),
                "schema changed, dropping every stored table"
            );
            for name in &undeclared {
                dir.remove_segment(name)?;
            }
            for schema in &schemas {
                dir.remove_segment(schema.name())?;
            }
        }

        let mut revision = manifest.as_ref().map_or(RevisionId::ZERO, |m| m.revision);
        let mut tables = Vec::with_capacity(schemas.len());
        for (i, schema) in schemas.into_iter().enumerate() {
            let backend = FileBackend::open_with_create_dirs(&dir.segment_path(schema.name()))?;
            let mut segment = TableSegment::new(Box::new(backend));
            let entries = segment.replay()?;

            let stored_next_id = manifest
                .as_ref()
                .and_then(|m| m.table(schema.name()))
                .filter(|_| !reset)
                .map(|entry| entry.next_id);

            let mut log = TableLog::new(TableId(i as u32), Arc::new(schema), Some(segment));
            let summary = log.replay(entries)?;
            if let Some(next_id) = stored_next_id {
                log.reserve_ids(next_id);
            }
            revision = revision.max(summary.max_revision);

            tracing::debug!(
                table = log.name(),
                entries = summary.entries,
                records = log.count_all(),
                live = log.count_live(),
                next_id = log.next_id(),
                "replayed table segment"
            );
            tables.push(log);
        }

        let engine = Self::assemble(config, Some(dir), tables, revision);
        engine.save_manifest(&engine.state.read())?;
        tracing::info!(
            path = %path.display(),
            revision = revision.as_u64(),
            "opened directory database"
        );
        Ok(engine)
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn stats(&self) -> &DatabaseStats {
        &self.stats
    }

    pub(crate) fn writer(&self) -> &ReentrantMutex<()> {
        &self.writer
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(CoreError::DatabaseClosed)
        }
    }

    pub(crate) fn current_revision(&self) -> RevisionId {
        self.clock.current()
    }

    // === Registry ===

    pub(crate) fn table_id(&self, name: &str) -> CoreResult<(TableId, Arc<TableSchema>)> {
        self.ensure_open()?;
        let state = self.state.read();
        let id = state
            .names
            .get(name)
            .copied()
            .ok_or_else(|| CoreError::TableNotFound {
                name: name.to_string(),
            })?;
        Ok((id, Arc::clone(state.table(id)?.schema())))
    }

    pub(crate) fn table_names(&self) -> Vec<String> {
        self.state
            .read()
            .tables
            .iter()
            .map(|t| t.name().to_string())
            .collect()
    }

    // === Reads ===

    pub(crate) fn get(&self, table: TableId, id: RecordId) -> CoreResult<Record> {
        self.ensure_open()?;
        let state = self.state.read();
        let log = state.table(table)?;
        log.get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found(log.name(), id))
    }

    pub(crate) fn record_after(
        &self,
        table: TableId,
        after: Option<RecordId>,
    ) -> CoreResult<Option<Record>> {
        self.ensure_open()?;
        let state = self.state.read();
        Ok(state.table(table)?.record_after(after).cloned())
    }

    pub(crate) fn count_all(&self, table: TableId) -> CoreResult<u64> {
        self.ensure_open()?;
        Ok(self.state.read().table(table)?.count_all())
    }

    pub(crate) fn find_unique(
        &self,
        table: TableId,
        field: &str,
        value: &Value,
    ) -> CoreResult<Option<Record>> {
        self.ensure_open()?;
        let state = self.state.read();
        Ok(state.table(table)?.find_unique(field, value)?.cloned())
    }

    pub(crate) fn transaction_state(&self) -> TransactionState {
        self.state.read().txlog.state()
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.state.read().txlog.pending_count()
    }

    // === Mutations ===

    pub(crate) fn insert(&self, table: TableId, fields: Vec<Value>) -> CoreResult<RecordId> {
        let _writer = self.writer.lock();
        self.ensure_open()?;
        let mut guard = self.state.write();
        let state = &mut *guard;

        let log = state
            .tables
            .get_mut(table.index())
            .ok_or_else(|| CoreError::TableNotFound {
                name: format!("#{}", table.0),
            })?;
        log.schema().validate(&fields)?;
        if let Err(e) = log.check_unique(&fields) {
            self.stats.record_constraint_violation();
            return Err(e);
        }

        let id = log.allocate_id();
        let undo = log.register_unique(id, &fields);
        let op = PendingOp::Insert { table, id, fields };

        if state.txlog.is_active() {
            state.txlog.record(op, undo);
            tracing::trace!(%id, depth = state.txlog.depth(), "buffered insert");
        } else if let Err(e) = self.apply_batch(state, vec![op]) {
            state.revert(undo);
            return Err(e);
        }

        self.stats.record_insert();
        Ok(id)
    }

    pub(crate) fn remove(&self, table: TableId, id: RecordId) -> CoreResult<()> {
        let _writer = self.writer.lock();
        self.ensure_open()?;
        let mut guard = self.state.write();
        let state = &mut *guard;

        let log = state
            .tables
            .get_mut(table.index())
            .ok_or_else(|| CoreError::TableNotFound {
                name: format!("#{}", table.0),
            })?;

        let fields = if state.txlog.pending_remove(table, id) {
            return Err(CoreError::already_removed(log.name(), id));
        } else if let Some(record) = log.get(id) {
            if record.is_removed() {
                return Err(CoreError::already_removed(log.name(), id));
            }
            record.fields().to_vec()
        } else if let Some(fields) = state.txlog.pending_insert(table, id) {
            fields.to_vec()
        } else {
            return Err(CoreError::not_found(log.name(), id));
        };

        let undo = log.unregister_unique(id, &fields);
        let op = PendingOp::Remove { table, id };

        if state.txlog.is_active() {
            state.txlog.record(op, undo);
            tracing::trace!(%id, depth = state.txlog.depth(), "buffered removal");
        } else if let Err(e) = self.apply_batch(state, vec![op]) {
            state.revert(undo);
            return Err(e);
        }

        self.stats.record_remove();
        Ok(())
    }

    // === Transactions ===

    pub(crate) fn begin(&self) -> CoreResult<usize> {
        let _writer = self.writer.lock();
        self.ensure_open()?;
        let depth = self.state.write().txlog.begin();
        tracing::debug!(depth, "began transaction frame");
        Ok(depth)
    }

    pub(crate) fn commit(&self) -> CoreResult<Option<RevisionId>> {
        let _writer = self.writer.lock();
        self.ensure_open()?;
        let mut guard = self.state.write();
        let state = &mut *guard;

        match state.txlog.commit()? {
            CommitOutcome::Merged { depth } => {
                tracing::debug!(depth, "merged nested frame into parent");
                Ok(None)
            }
            CommitOutcome::Batch(frame) => {
                let ops = frame.ops.len();
                match self.apply_batch(state, frame.ops) {
                    Ok(revision) => {
                        self.stats.record_commit();
                        tracing::debug!(
                            ops,
                            revision = revision.map(RevisionId::as_u64),
                            "committed transaction"
                        );
                        Ok(revision)
                    }
                    Err(e) => {
                        state.revert(frame.undo);
                        self.stats.record_rollback();
                        tracing::warn!(ops, error = %e, "commit failed, transaction discarded");
                        Err(e)
                    }
                }
            }
        }
    }

    pub(crate) fn rollback(&self) -> CoreResult<()> {
        let _writer = self.writer.lock();
        self.ensure_open()?;
        let mut guard = self.state.write();
        let state = &mut *guard;

        let frame = state.txlog.rollback()?;
        let ops = frame.ops.len();
        state.revert(frame.undo);
        self.stats.record_rollback();
        tracing::debug!(ops, depth = state.txlog.depth(), "rolled back transaction frame");
        Ok(())
    }

    /// Persists and applies a batch under one new revision.
    ///
    /// Returns `None` for an empty batch, which leaves the clock alone.
    fn apply_batch(
        &self,
        state: &mut EngineState,
        ops: Vec<PendingOp>,
    ) -> CoreResult<Option<RevisionId>> {
        if ops.is_empty() {
            return Ok(None);
        }

        let revision = self.clock.current().next();
        self.persist_batch(state, &ops, revision)?;

        for op in ops {
            match op {
                PendingOp::Insert { table, id, fields } => {
                    if let Some(log) = state.tables.get_mut(table.index()) {
                        log.apply_insert(id, fields, revision);
                    }
                }
                PendingOp::Remove { table, id } => {
                    if let Some(log) = state.tables.get_mut(table.index()) {
                        log.apply_remove(id, revision);
                    }
                }
            }
        }

        let advanced = self.clock.advance();
        debug_assert_eq!(advanced, revision);
        Ok(Some(revision))
    }

    /// Appends the batch to every touched segment, all or nothing.
    fn persist_batch(
        &self,
        state: &mut EngineState,
        ops: &[PendingOp],
        revision: RevisionId,
    ) -> CoreResult<()> {
        let mut batches: BTreeMap<TableId, Vec<SegmentEntry>> = BTreeMap::new();
        for op in ops {
            let entry = match op {
                PendingOp::Insert { id, fields, .. } => {
                    SegmentEntry::insert(*id, revision, rekord_codec::encode_row(fields)?)
                }
                PendingOp::Remove { id, .. } => SegmentEntry::remove(*id, revision),
            };
            batches.entry(op.table()).or_default().push(entry);
        }

        let mut written: Vec<(TableId, u64)> = Vec::new();
        let result = self.write_batches(state, &batches, &mut written);
        if let Err(e) = result {
            for (table, size) in written {
                let segment = state
                    .tables
                    .get_mut(table.index())
                    .and_then(TableLog::segment_mut);
                if let Some(segment) = segment {
                    if let Err(undo_err) = segment.rollback_to(size) {
                        tracing::error!(
                            table = table.0,
                            error = %undo_err,
                            "failed to truncate segment after failed commit"
                        );
                    }
                }
            }
            return Err(e);
        }

        if !written.is_empty() {
            self.stats.record_batch_persisted();
        }
        Ok(())
    }

    fn write_batches(
        &self,
        state: &mut EngineState,
        batches: &BTreeMap<TableId, Vec<SegmentEntry>>,
        written: &mut Vec<(TableId, u64)>,
    ) -> CoreResult<()> {
        for (table, entries) in batches {
            let Some(segment) = state
                .tables
                .get_mut(table.index())
                .and_then(TableLog::segment_mut)
            else {
                continue;
            };
            let before = segment.size()?;
            written.push((*table, before));
            segment.append_batch(entries)?;
        }

        for (table, _) in written.iter() {
            if let Some(segment) = state
                .tables
                .get_mut(table.index())
                .and_then(TableLog::segment_mut)
            {
                segment.flush(self.config.sync_on_commit)?;
            }
        }
        Ok(())
    }

    // === Lifecycle ===

    fn save_manifest(&self, state: &EngineState) -> CoreResult<()> {
        let dir = self.dir.lock();
        let Some(dir) = dir.as_ref() else {
            return Ok(());
        };

        let tables = state
            .tables
            .iter()
            .map(|t| {
                Ok(TableEntry {
                    name: t.name().to_string(),
                    fingerprint: t.schema().fingerprint()?,
                    next_id: t.next_id(),
                })
            })
            .collect::<CoreResult<Vec<_>>>()?;

        dir.save_manifest(&Manifest {
            format_version: self.config.format_version,
            revision: self.clock.current(),
            tables,
        })
    }

    /// Discards open frames, flushes segments, saves the manifest and
    /// releases the directory lock. Idempotent.
    pub(crate) fn close(&self) -> CoreResult<()> {
        let _writer = self.writer.lock();
        if !self.open.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let mut guard = self.state.write();
        let state = &mut *guard;

        let frames = state.txlog.drain();
        if !frames.is_empty() {
            tracing::warn!(
                frames = frames.len(),
                "closing with an open transaction, discarding buffered operations"
            );
            for frame in frames {
                state.revert(frame.undo);
            }
        }

        let mut result = Ok(());
        for log in &mut state.tables {
            if let Some(segment) = log.segment_mut() {
                if let Err(e) = segment.flush(true) {
                    tracing::error!(table = log.name(), error = %e, "failed to flush segment on close");
                    if result.is_ok() {
                        result = Err(e);
                    }
                }
            }
        }

        if let Err(e) = self.save_manifest(state) {
            tracing::error!(error = %e, "failed to save manifest on close");
            if result.is_ok() {
                result = Err(e);
            }
        }

        self.dir.lock().take();
        tracing::info!(revision = self.clock.current().as_u64(), "closed database");
        result
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("path", &self.path)
            .field("revision", &self.clock.current())
            .field("open", &self.is_open())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rekord_codec::FieldType;
    use rekord_storage::{InMemoryBackend, StorageBackend, StorageError, StorageResult};

    fn persons_schema() -> TableSchema {
        TableSchema::builder("persons")
            .unique("name", FieldType::Text)
            .field("age", FieldType::Integer)
            .build()
            .unwrap()
    }

    fn row(name: &str, age: i64) -> Vec<Value> {
        vec![Value::from(name), Value::Integer(age)]
    }

    /// Accepts appends until `budget` bytes have been written, then fails
    /// after writing half of the next chunk.
    #[derive(Debug)]
    struct FlakyBackend {
        inner: InMemoryBackend,
        budget: usize,
    }

    impl StorageBackend for FlakyBackend {
        fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
            self.inner.read_at(offset, len)
        }

        fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
            if data.len() > self.budget {
                let half = data.len() / 2;
                self.inner.append(&data[..half])?;
                return Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            self.budget -= data.len();
            self.inner.append(data)
        }

        fn flush(&mut self) -> StorageResult<()> {
            Ok(())
        }

        fn size(&self) -> StorageResult<u64> {
            self.inner.size()
        }

        fn sync(&mut self) -> StorageResult<()> {
            Ok(())
        }

        fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
            self.inner.truncate(new_size)
        }
    }

    fn flaky_engine(budget: usize) -> Engine {
        let segment = TableSegment::new(Box::new(FlakyBackend {
            inner: InMemoryBackend::new(),
            budget,
        }));
        let log = TableLog::new(TableId(0), Arc::new(persons_schema()), Some(segment));
        Engine::assemble(Config::default(), None, vec![log], RevisionId::ZERO)
    }

    fn segment_size(engine: &Engine) -> u64 {
        engine.state.write().tables[0]
            .segment_mut()
            .unwrap()
            .size()
            .unwrap()
    }

    #[test]
    fn failed_insert_leaves_state_untouched() {
        let engine = flaky_engine(0);
        let err = engine.insert(TableId(0), row("Miku", 16)).unwrap_err();
        assert!(err.is_persistence());

        assert_eq!(engine.current_revision(), RevisionId::ZERO);
        assert_eq!(engine.count_all(TableId(0)).unwrap(), 0);
        assert_eq!(segment_size(&engine), 0);

        // the unique value was released again
        engine.state.read().tables[0]
            .check_unique(&row("Miku", 16))
            .unwrap();
    }

    #[test]
    fn failed_commit_truncates_and_reverts() {
        let engine = flaky_engine(1 << 20);
        engine.insert(TableId(0), row("Miku", 16)).unwrap();
        let committed_size = segment_size(&engine);

        if let Some(segment) = engine.state.write().tables[0].segment_mut() {
            *segment = TableSegment::new(Box::new(FlakyBackend {
                inner: InMemoryBackend::with_data(vec![0; committed_size as usize]),
                budget: 0,
            }));
        }

        engine.begin().unwrap();
        engine.insert(TableId(0), row("Yukari", 18)).unwrap();
        engine.remove(TableId(0), RecordId(0)).unwrap();
        let err = engine.commit().unwrap_err();
        assert!(err.is_persistence());

        assert_eq!(engine.transaction_state(), TransactionState::Idle);
        assert_eq!(engine.current_revision(), RevisionId(1));
        assert_eq!(segment_size(&engine), committed_size);
        assert!(!engine.get(TableId(0), RecordId(0)).unwrap().is_removed());
        assert!(engine.get(TableId(0), RecordId(1)).is_err());

        // index view matches committed state again
        let found = engine
            .find_unique(TableId(0), "name", &Value::from("Miku"))
            .unwrap();
        assert_eq!(found.map(|r| r.fields().to_vec()), Some(row("Miku", 16)));
        let err = engine.insert(TableId(0), row("Miku", 1)).unwrap_err();
        assert!(matches!(err, CoreError::ConstraintViolation { .. }));
    }

    #[test]
    fn empty_outer_commit_does_not_advance() {
        let engine = Engine::open_in_memory(Config::default(), vec![persons_schema()]).unwrap();
        engine.begin().unwrap();
        assert_eq!(engine.commit().unwrap(), None);
        assert_eq!(engine.current_revision(), RevisionId::ZERO);
    }

    #[test]
    fn duplicate_table_names_rejected() {
        let result =
            Engine::open_in_memory(Config::default(), vec![persons_schema(), persons_schema()]);
        assert!(matches!(result, Err(CoreError::SchemaMismatch { .. })));
    }

    #[test]
    fn close_discards_open_frames() {
        let engine = Engine::open_in_memory(Config::default(), vec![persons_schema()]).unwrap();
        engine.begin().unwrap();
        engine.insert(TableId(0), row("Rin", 14)).unwrap();
        engine.close().unwrap();

        assert!(!engine.is_open());
        assert!(matches!(
            engine.insert(TableId(0), row("Len", 14)),
            Err(CoreError::DatabaseClosed)
        ));
        assert_eq!(engine.transaction_state(), TransactionState::Idle);
        engine.close().unwrap();
    }
}
