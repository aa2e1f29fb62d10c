//! Per-table segment store.

use crate::error::CoreResult;
use crate::segment::entry::SegmentEntry;
use rekord_storage::StorageBackend;

/// The append-only log of one table's committed entries.
///
/// Segments are only touched while applying a committed batch or while
/// opening, both under the engine state write lock, so no interior locking
/// is needed.
pub struct TableSegment {
    backend: Box<dyn StorageBackend>,
}

impl TableSegment {
    /// Wraps a storage backend.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Reads every complete entry, truncating a torn trailing entry.
    ///
    /// # Errors
    ///
    /// Returns an error if a complete entry is corrupt or the backend fails.
    pub fn replay(&mut self) -> CoreResult<Vec<SegmentEntry>> {
        let data = self.backend.read_all()?;
        let scan = SegmentEntry::decode_all(&data)?;
        if scan.torn_bytes > 0 {
            tracing::warn!(
                valid_len = scan.valid_len,
                torn_bytes = scan.torn_bytes,
                "truncating torn segment tail"
            );
            self.backend.truncate(scan.valid_len)?;
        }
        Ok(scan.entries)
    }

    /// Appends a batch of entries with a single write.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails. The caller is
    /// responsible for truncating any partial write with
    /// [`TableSegment::rollback_to`].
    pub fn append_batch(&mut self, entries: &[SegmentEntry]) -> CoreResult<()> {
        let mut buf = Vec::with_capacity(entries.iter().map(SegmentEntry::encoded_size).sum());
        for entry in entries {
            entry.encode_into(&mut buf);
        }
        self.backend.append(&buf)?;
        Ok(())
    }

    /// Flushes buffered writes, syncing to disk when `sync` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to flush or sync.
    pub fn flush(&mut self, sync: bool) -> CoreResult<()> {
        self.backend.flush()?;
        if sync {
            self.backend.sync()?;
        }
        Ok(())
    }

    /// Truncates the segment back to `size`.
    ///
    /// Always truncates, even when the tracked size already equals `size`,
    /// since a failed append may have left bytes the backend never counted.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot truncate.
    pub fn rollback_to(&mut self, size: u64) -> CoreResult<()> {
        self.backend.truncate(size)?;
        Ok(())
    }

    /// Returns the current segment size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot report its size.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }
}

impl std::fmt::Debug for TableSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableSegment")
            .field("size", &self.backend.size().ok())
            .finish()
    }
}
