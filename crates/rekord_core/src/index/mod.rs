//! Secondary indexes.
//!
//! Tables carry one [`UniqueIndex`] per field declared unique in their
//! schema. Indexes are maintained in lockstep with inserts and removals,
//! including the tentative updates of an open transaction.

mod unique;

pub(crate) use unique::IndexChange;
pub use unique::UniqueIndex;
