//! Database statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of engine activity.
///
/// All counters are monotonically increasing and updated with relaxed
/// atomics; read them through [`DatabaseStats::snapshot`] for a plain copy.
#[derive(Debug, Default)]
pub struct DatabaseStats {
    inserts: AtomicU64,
    removes: AtomicU64,
    commits: AtomicU64,
    rollbacks: AtomicU64,
    constraint_violations: AtomicU64,
    batches_persisted: AtomicU64,
}

impl DatabaseStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_remove(&self) {
        self.removes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_commit(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rollback(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_constraint_violation(&self) {
        self.constraint_violations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch_persisted(&self) {
        self.batches_persisted.fetch_add(1, Ordering::Relaxed);
    }

    /// Successful insert calls, buffered or applied.
    pub fn inserts(&self) -> u64 {
        self.inserts.load(Ordering::Relaxed)
    }

    /// Successful remove calls, buffered or applied.
    pub fn removes(&self) -> u64 {
        self.removes.load(Ordering::Relaxed)
    }

    /// Outermost commits that applied a batch.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Frames rolled back, at any depth.
    pub fn rollbacks(&self) -> u64 {
        self.rollbacks.load(Ordering::Relaxed)
    }

    /// Inserts rejected by a unique index.
    pub fn constraint_violations(&self) -> u64 {
        self.constraint_violations.load(Ordering::Relaxed)
    }

    /// Batches written to table segments.
    pub fn batches_persisted(&self) -> u64 {
        self.batches_persisted.load(Ordering::Relaxed)
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            inserts: self.inserts(),
            removes: self.removes(),
            commits: self.commits(),
            rollbacks: self.rollbacks(),
            constraint_violations: self.constraint_violations(),
            batches_persisted: self.batches_persisted(),
        }
    }
}

/// A point-in-time copy of [`DatabaseStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Successful insert calls.
    pub inserts: u64,
    /// Successful remove calls.
    pub removes: u64,
    /// Outermost commits that applied a batch.
    pub commits: u64,
    /// Frames rolled back.
    pub rollbacks: u64,
    /// Inserts rejected by a unique index.
    pub constraint_violations: u64,
    /// Batches written to table segments.
    pub batches_persisted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_feed_snapshot() {
        let stats = DatabaseStats::new();
        stats.record_insert();
        stats.record_insert();
        stats.record_remove();
        stats.record_commit();
        stats.record_rollback();
        stats.record_constraint_violation();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.inserts, 2);
        assert_eq!(snapshot.removes, 1);
        assert_eq!(snapshot.commits, 1);
        assert_eq!(snapshot.rollbacks, 1);
        assert_eq!(snapshot.constraint_violations, 1);
        assert_eq!(snapshot.batches_persisted, 0);
    }
}
