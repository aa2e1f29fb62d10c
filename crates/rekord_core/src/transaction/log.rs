//! The stack of buffered-operation frames.

use crate::error::{CoreError, CoreResult};
use crate::index::IndexChange;
use crate::types::{RecordId, TableId};
use rekord_codec::Value;

/// An operation buffered by an open transaction.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PendingOp {
    /// Insert a record with an already allocated id.
    Insert {
        table: TableId,
        id: RecordId,
        fields: Vec<Value>,
    },
    /// Remove a committed or pending record.
    Remove { table: TableId, id: RecordId },
}

impl PendingOp {
    pub(crate) const fn table(&self) -> TableId {
        match self {
            Self::Insert { table, .. } | Self::Remove { table, .. } => *table,
        }
    }
}

/// A tentative index update, recorded so a rollback can undo it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IndexUndo {
    pub(crate) table: TableId,
    /// Slot of the index within its table.
    pub(crate) slot: usize,
    pub(crate) change: IndexChange,
}

/// One level of a nested transaction.
#[derive(Debug, Default)]
pub(crate) struct Frame {
    pub(crate) ops: Vec<PendingOp>,
    pub(crate) undo: Vec<IndexUndo>,
}

/// Observable state of the transaction log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// No transaction is open.
    Idle,
    /// A transaction is open at the given nesting depth (at least 1).
    InTransaction(usize),
}

/// What popping a frame on commit produced.
#[derive(Debug)]
pub(crate) enum CommitOutcome {
    /// An inner frame was folded into its parent.
    Merged { depth: usize },
    /// The outermost frame closed; its operations form one batch.
    Batch(Frame),
}

/// Stack of frames owned by the database.
#[derive(Debug, Default)]
pub(crate) struct TransactionLog {
    frames: Vec<Frame>,
}

impl TransactionLog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn state(&self) -> TransactionState {
        match self.frames.len() {
            0 => TransactionState::Idle,
            depth => TransactionState::InTransaction(depth),
        }
    }

    pub(crate) fn depth(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn is_active(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Number of operations buffered across all frames.
    pub(crate) fn pending_count(&self) -> usize {
        self.frames.iter().map(|f| f.ops.len()).sum()
    }

    pub(crate) fn begin(&mut self) -> usize {
        self.frames.push(Frame::default());
        self.frames.len()
    }

    /// Appends an operation and its index undo entries to the innermost frame.
    ///
    /// Returns `false` without recording anything when no frame is open.
    pub(crate) fn record(&mut self, op: PendingOp, undo: Vec<IndexUndo>) -> bool {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.ops.push(op);
                frame.undo.extend(undo);
                true
            }
            None => false,
        }
    }

    pub(crate) fn commit(&mut self) -> CoreResult<CommitOutcome> {
        let frame = self
            .frames
            .pop()
            .ok_or_else(|| CoreError::transaction_state("commit without an active transaction"))?;

        match self.frames.last_mut() {
            Some(parent) => {
                parent.ops.extend(frame.ops);
                parent.undo.extend(frame.undo);
                Ok(CommitOutcome::Merged {
                    depth: self.frames.len(),
                })
            }
            None => Ok(CommitOutcome::Batch(frame)),
        }
    }

    /// Pops the innermost frame, returning it so its index changes can be
    /// reverted.
    pub(crate) fn rollback(&mut self) -> CoreResult<Frame> {
        self.frames
            .pop()
            .ok_or_else(|| CoreError::transaction_state("rollback without an active transaction"))
    }

    /// Discards every frame, innermost first.
    pub(crate) fn drain(&mut self) -> Vec<Frame> {
        let mut frames = std::mem::take(&mut self.frames);
        frames.reverse();
        frames
    }

    /// Returns the fields of a record inserted by an open frame.
    pub(crate) fn pending_insert(&self, table: TableId, id: RecordId) -> Option<&[Value]> {
        self.ops().find_map(|op| match op {
            PendingOp::Insert {
                table: t,
                id: i,
                fields,
            } if *t == table && *i == id => Some(fields.as_slice()),
            _ => None,
        })
    }

    /// Returns `true` if an open frame removes the record.
    pub(crate) fn pending_remove(&self, table: TableId, id: RecordId) -> bool {
        self.ops().any(|op| {
            matches!(op, PendingOp::Remove { table: t, id: i } if *t == table && *i == id)
        })
    }

    fn ops(&self) -> impl Iterator<Item = &PendingOp> {
        self.frames.iter().flat_map(|f| f.ops.iter())
    }
}
