//! Database manifest.
//!
//! ```text
//! | magic "RKMF" (4) | version (2) | body_len (4) | body (CBOR) | crc32 (4) |
//! ```

use crate::error::{CoreError, CoreResult};
use crate::types::RevisionId;
use serde::{Deserialize, Serialize};

/// Magic bytes for the manifest file.
pub const MANIFEST_MAGIC: [u8; 4] = *b"RKMF";

/// Current manifest framing version.
pub const MANIFEST_VERSION: u16 = 1;

const PREFIX_SIZE: usize = 10;
const CRC_SIZE: usize = 4;

/// Persisted metadata of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEntry {
    /// Table name, also the segment file stem.
    pub name: String,
    /// Hex SHA-256 fingerprint of the schema the data was written with.
    pub fingerprint: String,
    /// Next record id to allocate.
    pub next_id: u64,
}

/// Database metadata persisted across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Format version (major, minor).
    pub format_version: (u16, u16),
    /// Revision of the clock when the manifest was saved.
    pub revision: RevisionId,
    /// Tables in registry order.
    pub tables: Vec<TableEntry>,
}

impl Manifest {
    /// Creates an empty manifest.
    #[must_use]
    pub fn new(format_version: (u16, u16)) -> Self {
        Self {
            format_version,
            revision: RevisionId::ZERO,
            tables: Vec::new(),
        }
    }

    /// Looks up a table entry by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableEntry> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Encodes the manifest to bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the body cannot be encoded.
    pub fn encode(&self) -> CoreResult<Vec<u8>> {
        let body = rekord_codec::to_cbor(self)?;
        let body_len = u32::try_from(body.len())
            .map_err(|_| CoreError::invalid_format("manifest body too large"))?;

        let mut buf = Vec::with_capacity(PREFIX_SIZE + body.len() + CRC_SIZE);
        buf.extend_from_slice(&MANIFEST_MAGIC);
        buf.extend_from_slice(&MANIFEST_VERSION.to_le_bytes());
        buf.extend_from_slice(&body_len.to_le_bytes());
        buf.extend_from_slice(&body);

        let crc = crc32fast::hash(&buf);
        buf.extend_from_slice(&crc.to_le_bytes());
        Ok(buf)
    }

    /// Decodes a manifest from bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` for a bad magic, unsupported version or wrong
    /// length, and `ChecksumMismatch` if the CRC does not match.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() < PREFIX_SIZE + CRC_SIZE || data[0..4] != MANIFEST_MAGIC {
            return Err(CoreError::invalid_format("invalid manifest magic"));
        }

        let version = u16::from_le_bytes([data[4], data[5]]);
        if version > MANIFEST_VERSION {
            return Err(CoreError::invalid_format(format!(
                "unsupported manifest version: {version}"
            )));
        }

        let body_len = u32::from_le_bytes([data[6], data[7], data[8], data[9]]) as usize;
        if data.len() != PREFIX_SIZE + body_len + CRC_SIZE {
            return Err(CoreError::invalid_format(format!(
                "manifest length {} does not match body length {body_len}",
                data.len()
            )));
        }

        let crc_at = PREFIX_SIZE + body_len;
        let stored = u32::from_le_bytes([
            data[crc_at],
            data[crc_at + 1],
            data[crc_at + 2],
            data[crc_at + 3],
        ]);
        let computed = crc32fast::hash(&data[..crc_at]);
        if stored != computed {
            return Err(CoreError::ChecksumMismatch {
                expected: stored,
                actual: computed,
            });
        }

        Ok(rekord_codec::from_cbor(&data[PREFIX_SIZE..crc_at])?)
    }
}
