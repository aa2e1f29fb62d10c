//! Nested transactions.
//!
//! A database owns exactly one [`TransactionState`]-bearing log of frames.
//! `begin` pushes a frame, `commit` folds the innermost frame into its
//! parent or, for the outermost frame, applies every buffered operation as
//! one batch under a single new revision. `rollback` discards the innermost
//! frame and undoes its tentative unique index updates.

mod log;
mod scope;

pub(crate) use log::{CommitOutcome, IndexUndo, PendingOp, TransactionLog};
pub use log::TransactionState;
pub use scope::TransactionScope;
