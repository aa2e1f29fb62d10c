//! Append-only table segments.
//!
//! Each table of a directory database persists its committed inserts and
//! removals as a sequence of checksummed [`SegmentEntry`] values. Replaying
//! a segment in order rebuilds the table.

mod entry;
mod store;

pub use entry::{EntryKind, SegmentEntry, SegmentScan};
pub use store::TableSegment;
