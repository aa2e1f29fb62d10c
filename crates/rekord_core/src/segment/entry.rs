//! Segment entry format.

use crate::error::{CoreError, CoreResult};
use crate::types::{RecordId, RevisionId};

/// What a segment entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// A record was inserted; the payload is its CBOR row.
    Insert,
    /// A record was removed; the payload is empty.
    Remove,
}

impl EntryKind {
    const fn as_byte(self) -> u8 {
        match self {
            Self::Insert => 1,
            Self::Remove => 2,
        }
    }

    fn from_byte(b: u8) -> CoreResult<Self> {
        match b {
            1 => Ok(Self::Insert),
            2 => Ok(Self::Remove),
            other => Err(CoreError::segment_corruption(format!(
                "unknown entry kind {other}"
            ))),
        }
    }
}

/// One committed mutation of a table.
///
/// ```text
/// | entry_len (4) | kind (1) | record_id (8) | revision (8) | payload (N) | crc32 (4) |
/// ```
///
/// `entry_len` counts the whole entry including itself. All integers are
/// little-endian and the CRC covers every byte before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentEntry {
    /// Entry kind.
    pub kind: EntryKind,
    /// Record the entry applies to.
    pub record_id: RecordId,
    /// Revision of the batch that committed the entry.
    pub revision: RevisionId,
    /// CBOR row for inserts, empty for removals.
    pub payload: Vec<u8>,
}

/// Result of scanning a segment's bytes.
#[derive(Debug, Default)]
pub struct SegmentScan {
    /// Complete, checksummed entries in file order.
    pub entries: Vec<SegmentEntry>,
    /// Length of the prefix holding those entries.
    pub valid_len: u64,
    /// Bytes after `valid_len` belonging to an incomplete entry.
    pub torn_bytes: u64,
}

impl SegmentEntry {
    /// Header size: entry_len (4) + kind (1) + record_id (8) + revision (8).
    pub const HEADER_SIZE: usize = 21;
    /// CRC size.
    pub const CRC_SIZE: usize = 4;

    /// Creates an insert entry.
    #[must_use]
    pub fn insert(record_id: RecordId, revision: RevisionId, payload: Vec<u8>) -> Self {
        Self {
            kind: EntryKind::Insert,
            record_id,
            revision,
            payload,
        }
    }

    /// Creates a removal entry.
    #[must_use]
    pub fn remove(record_id: RecordId, revision: RevisionId) -> Self {
        Self {
            kind: EntryKind::Remove,
            record_id,
            revision,
            payload: Vec::new(),
        }
    }

    /// Returns the encoded size of this entry.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len() + Self::CRC_SIZE
    }

    /// Appends the encoded entry to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        let start = buf.len();
        let entry_len = self.encoded_size();
        buf.reserve(entry_len);

        buf.extend_from_slice(&(entry_len as u32).to_le_bytes());
        buf.push(self.kind.as_byte());
        buf.extend_from_slice(&self.record_id.as_u64().to_le_bytes());
        buf.extend_from_slice(&self.revision.as_u64().to_le_bytes());
        buf.extend_from_slice(&self.payload);

        let crc = crc32fast::hash(&buf[start..]);
        buf.extend_from_slice(&crc.to_le_bytes());
    }

    /// Encodes the entry to a fresh buffer.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode_into(&mut buf);
        buf
    }

    /// Decodes one complete entry from the start of `data`.
    ///
    /// # Errors
    ///
    /// Returns `SegmentCorruption` for a short or malformed entry and
    /// `ChecksumMismatch` if the CRC does not match.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() < Self::HEADER_SIZE + Self::CRC_SIZE {
            return Err(CoreError::segment_corruption("entry too short"));
        }

        let entry_len = read_u32(data, 0) as usize;
        if entry_len < Self::HEADER_SIZE + Self::CRC_SIZE {
            return Err(CoreError::segment_corruption(format!(
                "invalid entry length {entry_len}"
            )));
        }
        if data.len() < entry_len {
            return Err(CoreError::segment_corruption("incomplete entry"));
        }

        let stored_crc = read_u32(data, entry_len - Self::CRC_SIZE);
        let computed_crc = crc32fast::hash(&data[..entry_len - Self::CRC_SIZE]);
        if stored_crc != computed_crc {
            return Err(CoreError::ChecksumMismatch {
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        let kind = EntryKind::from_byte(data[4])?;
        let record_id = RecordId::new(read_u64(data, 5));
        let revision = RevisionId::new(read_u64(data, 13));
        let payload = data[Self::HEADER_SIZE..entry_len - Self::CRC_SIZE].to_vec();

        if kind == EntryKind::Remove && !payload.is_empty() {
            return Err(CoreError::segment_corruption(format!(
                "removal of {record_id} carries a payload"
            )));
        }

        Ok(Self {
            kind,
            record_id,
            revision,
            payload,
        })
    }

    /// Decodes every complete entry of a segment.
    ///
    /// A trailing entry whose length field or body was cut short is not an
    /// error: it is reported through [`SegmentScan::torn_bytes`] so the
    /// caller can truncate it away.
    ///
    /// # Errors
    ///
    /// Any complete entry that fails to decode is an error.
    pub fn decode_all(data: &[u8]) -> CoreResult<SegmentScan> {
        let mut scan = SegmentScan::default();
        let mut offset = 0usize;

        while offset < data.len() {
            let rest = &data[offset..];
            if rest.len() < 4 {
                break;
            }
            let entry_len = read_u32(rest, 0) as usize;
            if entry_len >= Self::HEADER_SIZE + Self::CRC_SIZE && rest.len() < entry_len {
                break;
            }

            let entry = Self::decode(rest).map_err(|e| match e {
                CoreError::SegmentCorruption { message } => {
                    CoreError::segment_corruption(format!("at offset {offset}: {message}"))
                }
                other => other,
            })?;
            offset += entry.encoded_size();
            scan.entries.push(entry);
        }

        scan.valid_len = offset as u64;
        scan.torn_bytes = (data.len() - offset) as u64;
        Ok(scan)
    }
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[at..at + 4]);
    u32::from_le_bytes(bytes)
}

fn read_u64(data: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[at..at + 8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<SegmentEntry> {
        vec![
            SegmentEntry::insert(RecordId(0), RevisionId(1), b"miku".to_vec()),
            SegmentEntry::insert(RecordId(1), RevisionId(2), b"yukari".to_vec()),
            SegmentEntry::remove(RecordId(0), RevisionId(3)),
        ]
    }

    fn encode_all(entries: &[SegmentEntry]) -> Vec<u8> {
        let mut buf = Vec::new();
        for entry in entries {
            entry.encode_into(&mut buf);
        }
        buf
    }

    #[test]
    fn encoded_layout() {
        let entry = SegmentEntry::insert(RecordId(7), RevisionId(9), vec![0xAB]);
        let bytes = entry.encode();
        assert_eq!(bytes.len(), entry.encoded_size());
        assert_eq!(read_u32(&bytes, 0) as usize, bytes.len());
        assert_eq!(bytes[4], 1);
        assert_eq!(read_u64(&bytes, 5), 7);
        assert_eq!(read_u64(&bytes, 13), 9);
        assert_eq!(bytes[21], 0xAB);
        assert_eq!(SegmentEntry::decode(&bytes).unwrap(), entry);
    }

    #[test]
    fn decode_all_reads_every_entry() {
        let bytes = encode_all(&sample());
        let scan = SegmentEntry::decode_all(&bytes).unwrap();
        assert_eq!(scan.entries, sample());
        assert_eq!(scan.valid_len, bytes.len() as u64);
        assert_eq!(scan.torn_bytes, 0);
    }

    #[test]
    fn torn_tail_is_reported_not_fatal() {
        let mut bytes = encode_all(&sample());
        let complete = bytes.len() as u64;
        let extra = SegmentEntry::insert(RecordId(2), RevisionId(4), b"rin".to_vec()).encode();
        bytes.extend_from_slice(&extra[..extra.len() - 3]);

        let scan = SegmentEntry::decode_all(&bytes).unwrap();
        assert_eq!(scan.entries.len(), 3);
        assert_eq!(scan.valid_len, complete);
        assert_eq!(scan.torn_bytes, extra.len() as u64 - 3);
    }

    #[test]
    fn torn_length_field() {
        let mut bytes = encode_all(&sample()[..1]);
        bytes.extend_from_slice(&[0x10, 0x00]);
        let scan = SegmentEntry::decode_all(&bytes).unwrap();
        assert_eq!(scan.entries.len(), 1);
        assert_eq!(scan.torn_bytes, 2);
    }

    #[test]
    fn checksum_mismatch_in_complete_entry_is_fatal() {
        let mut bytes = encode_all(&sample());
        bytes[SegmentEntry::HEADER_SIZE] ^= 0xFF;
        let result = SegmentEntry::decode_all(&bytes);
        assert!(matches!(result, Err(CoreError::ChecksumMismatch { .. })));
    }

    #[test]
    fn unknown_kind_is_corruption() {
        let mut bytes = SegmentEntry::remove(RecordId(0), RevisionId(1)).encode();
        bytes[4] = 9;
        let len = bytes.len();
        let crc = crc32fast::hash(&bytes[..len - 4]);
        bytes[len - 4..].copy_from_slice(&crc.to_le_bytes());

        let result = SegmentEntry::decode(&bytes);
        assert!(matches!(result, Err(CoreError::SegmentCorruption { .. })));
    }
}
