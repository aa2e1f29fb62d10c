//! # Rekord Storage
//!
//! Byte store backends used by Rekord table segments.
//!
//! A backend is an **opaque, append-only byte store**. It knows nothing about
//! records, revisions or tables; `rekord_core` owns the segment format and
//! only asks the backend to append, read back, flush and truncate.
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - Ephemeral storage, used by tests
//! - [`FileBackend`] - One OS file per segment
//!
//! ## Example
//!
//! ```rust
//! use rekord_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! let offset = backend.append(b"entry").unwrap();
//! assert_eq!(backend.read_at(offset, 5).unwrap(), b"entry");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
