//! Error types for the Rekord engine.

use crate::types::RecordId;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in engine operations.
///
/// Every failing operation leaves the database as it was before the call.
/// The persistence family (see [`CoreError::is_persistence`]) additionally
/// guarantees that committed in-memory state is untouched.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A unique index already maps this value to a live or pending record.
    #[error("unique constraint violated on {table}.{field}: {value} already exists")]
    ConstraintViolation {
        /// Table holding the index.
        table: String,
        /// Indexed field.
        field: String,
        /// Display form of the clashing value.
        value: String,
    },

    /// The id was never assigned to a committed or pending record.
    #[error("record {id} not found in table {table}")]
    NotFound {
        /// Table searched.
        table: String,
        /// The missing id.
        id: RecordId,
    },

    /// The record is already removed, or its removal is pending.
    #[error("record {id} in table {table} is already removed")]
    AlreadyRemoved {
        /// Table holding the record.
        table: String,
        /// The removed id.
        id: RecordId,
    },

    /// Field values or a stored schema do not match the declared schema.
    #[error("schema mismatch: {message}")]
    SchemaMismatch {
        /// Description of the mismatch.
        message: String,
    },

    /// Commit or rollback without an active transaction.
    #[error("transaction state error: {message}")]
    TransactionState {
        /// Description of the misuse.
        message: String,
    },

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] rekord_storage::StorageError),

    /// CBOR codec error.
    #[error("codec error: {0}")]
    Codec(#[from] rekord_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A segment file is corrupted or invalid.
    #[error("segment corruption: {message}")]
    SegmentCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch in a complete segment entry or the manifest.
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Stored checksum.
        expected: u32,
        /// Checksum computed over the bytes read.
        actual: u32,
    },

    /// Invalid database format or version.
    #[error("invalid database format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// No table with this name was declared when the database was opened.
    #[error("table not found: {name}")]
    TableNotFound {
        /// Requested table name.
        name: String,
    },

    /// Another process holds the directory lock.
    #[error("database locked: another process has exclusive access")]
    DatabaseLocked,

    /// The database has been closed.
    #[error("database is closed")]
    DatabaseClosed,
}

impl CoreError {
    /// Returns `true` for I/O and on-disk format failures.
    #[must_use]
    pub const fn is_persistence(&self) -> bool {
        matches!(
            self,
            Self::Storage(_)
                | Self::Codec(_)
                | Self::Io(_)
                | Self::SegmentCorruption { .. }
                | Self::ChecksumMismatch { .. }
                | Self::InvalidFormat { .. }
        )
    }

    /// Creates a constraint violation error.
    pub fn constraint_violation(
        table: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self::ConstraintViolation {
            table: table.into(),
            field: field.into(),
            value: value.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(table: impl Into<String>, id: RecordId) -> Self {
        Self::NotFound {
            table: table.into(),
            id,
        }
    }

    /// Creates an already removed error.
    pub fn already_removed(table: impl Into<String>, id: RecordId) -> Self {
        Self::AlreadyRemoved {
            table: table.into(),
            id,
        }
    }

    /// Creates a schema mismatch error.
    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
        }
    }

    /// Creates a transaction state error.
    pub fn transaction_state(message: impl Into<String>) -> Self {
        Self::TransactionState {
            message: message.into(),
        }
    }

    /// Creates a segment corruption error.
    pub fn segment_corruption(message: impl Into<String>) -> Self {
        Self::SegmentCorruption {
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_family() {
        let io = CoreError::from(io::Error::new(io::ErrorKind::Other, "disk full"));
        assert!(io.is_persistence());
        assert!(CoreError::segment_corruption("bad").is_persistence());
        assert!(CoreError::ChecksumMismatch {
            expected: 1,
            actual: 2
        }
        .is_persistence());

        assert!(!CoreError::not_found("persons", RecordId::new(3)).is_persistence());
        assert!(!CoreError::DatabaseClosed.is_persistence());
    }

    #[test]
    fn messages_name_the_table() {
        let err = CoreError::constraint_violation("persons", "name", "\"Miku\"");
        assert_eq!(
            err.to_string(),
            "unique constraint violated on persons.name: \"Miku\" already exists"
        );

        let err = CoreError::already_removed("persons", RecordId::new(0));
        assert!(err.to_string().contains("persons"));
    }
}
