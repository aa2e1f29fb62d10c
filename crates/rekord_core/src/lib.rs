//! # Rekord Core
//!
//! A revisioned, transactional record store.
//!
//! Every committed mutation batch advances one database-wide revision.
//! Records are never updated in place: an insert stamps the record with
//! the revision that committed it, and a removal stamps the revision that
//! retired it. Any past revision can therefore be read back by filtering
//! on [`Revisioned::is_live_at`].
//!
//! ## Components
//!
//! - [`RevisionClock`]: monotonic counter naming consistent snapshots
//! - [`UniqueIndex`]: value to record mapping enforcing uniqueness
//! - [`Table`]: id-keyed, append-only record log with logical deletion
//! - nested transactions: a stack of frames owned by the [`Database`]
//! - [`Database`]: in-memory or directory-backed composition of the above
//!
//! ## Example
//!
//! ```rust
//! use rekord_core::{Database, Revisioned, TableSchema};
//! use rekord_codec::{FieldType, Value};
//!
//! let db = Database::builder()
//!     .table(
//!         TableSchema::builder("persons")
//!             .unique("name", FieldType::Text)
//!             .field("age", FieldType::Integer)
//!             .build()
//!             .unwrap(),
//!     )
//!     .open_in_memory()
//!     .unwrap();
//! let persons = db.table("persons").unwrap();
//!
//! let miku = persons.insert(vec![Value::from("Miku"), Value::Integer(16)]).unwrap();
//! persons.insert(vec![Value::from("Yukari"), Value::Integer(18)]).unwrap();
//! let r0 = db.current_revision_id();
//!
//! persons.remove(miku).unwrap();
//! assert_eq!(persons.items().unwrap().iter().count(), 1);
//! assert_eq!(persons.items_at(r0).unwrap().iter().count(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod database;
mod engine;
mod error;
mod record;
mod revision;
mod schema;
mod stats;
mod table;
mod transaction;
mod typed;
mod types;

pub mod dir;
pub mod index;
pub mod manifest;
pub mod segment;

pub use config::Config;
pub use database::{Database, DatabaseBuilder};
pub use error::{CoreError, CoreResult};
pub use index::UniqueIndex;
pub use record::{Record, Revisioned};
pub use revision::RevisionClock;
pub use schema::{FieldDef, TableSchema, TableSchemaBuilder};
pub use stats::{DatabaseStats, StatsSnapshot};
pub use table::{Items, ItemsIter, Table};
pub use transaction::{TransactionScope, TransactionState};
pub use typed::{FieldReader, Model, Stored, TypedTable, TypedItems};
pub use types::{RecordId, RevisionId};

/// Crate version, written by tools that report it.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
