//! The database-wide revision clock.

use crate::types::RevisionId;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counter naming consistent snapshots of the database.
///
/// The clock is advanced only while the engine state write lock is held, so
/// a reader that observes revision `r` also observes every record stamped
/// with `r`.
#[derive(Debug, Default)]
pub struct RevisionClock {
    current: AtomicU64,
}

impl RevisionClock {
    /// Creates a clock at revision 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current revision.
    #[must_use]
    pub fn current(&self) -> RevisionId {
        RevisionId(self.current.load(Ordering::Acquire))
    }

    /// Advances the clock by one and returns the new revision.
    pub fn advance(&self) -> RevisionId {
        RevisionId(self.current.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Resumes at a persisted revision. Only used while opening.
    pub(crate) fn restore(&self, revision: RevisionId) {
        self.current.store(revision.0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        assert_eq!(RevisionClock::new().current(), RevisionId::ZERO);
    }

    #[test]
    fn advance_returns_new_value() {
        let clock = RevisionClock::new();
        assert_eq!(clock.advance(), RevisionId(1));
        assert_eq!(clock.advance(), RevisionId(2));
        assert_eq!(clock.current(), RevisionId(2));
    }

    #[test]
    fn restore_resumes() {
        let clock = RevisionClock::new();
        clock.restore(RevisionId(41));
        assert_eq!(clock.advance(), RevisionId(42));
    }
}
