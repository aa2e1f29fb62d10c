//! CLI command implementations.

pub mod dump;
pub mod inspect;
pub mod verify;

use rekord_core::dir::DatabaseDir;
use rekord_core::manifest::Manifest;
use rekord_core::segment::{SegmentEntry, SegmentScan};
use rekord_storage::{FileBackend, StorageBackend};
use std::path::Path;

/// Result type shared by the commands.
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// A locked database directory and its manifest.
pub struct Opened {
    /// The locked directory.
    pub dir: DatabaseDir,
    /// The stored manifest.
    pub manifest: Manifest,
}

/// Locks an existing database directory and loads its manifest.
pub fn open(path: &Path) -> CliResult<Opened> {
    let dir = DatabaseDir::open(path, false)?;
    let manifest = dir
        .load_manifest()?
        .ok_or_else(|| format!("No database found at {}", path.display()))?;
    Ok(Opened { dir, manifest })
}

/// Reads the raw bytes of a table segment, empty if it was never written.
pub fn read_segment(dir: &DatabaseDir, table: &str) -> CliResult<Vec<u8>> {
    let path = dir.segment_path(table);
    if !path.exists() {
        return Ok(Vec::new());
    }
    let backend = FileBackend::open(&path)?;
    Ok(backend.read_all()?)
}

/// Reads and decodes a table segment.
pub fn scan_segment(dir: &DatabaseDir, table: &str) -> CliResult<SegmentScan> {
    let data = read_segment(dir, table)?;
    Ok(SegmentEntry::decode_all(&data)?)
}
