//! # Rekord Codec
//!
//! Field values and the CBOR encoding of record rows.
//!
//! A row is the ordered list of a record's field values. Rows are written to
//! table segments as CBOR produced by `ciborium` from the `serde`
//! representation of [`Value`]. The same helpers encode any other `serde`
//! type the engine persists (the manifest body, schema fingerprints).
//!
//! ## Usage
//!
//! ```
//! use rekord_codec::{decode_row, encode_row, Value};
//!
//! let row = vec![Value::from("Miku"), Value::from(16)];
//! let bytes = encode_row(&row).unwrap();
//! assert_eq!(decode_row(&bytes).unwrap(), row);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod value;

pub use error::{CodecError, CodecResult};
pub use value::{FieldType, Value};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encodes any serializable item to CBOR bytes.
///
/// # Errors
///
/// Returns [`CodecError::EncodingFailed`] if serialization fails.
pub fn to_cbor<T: Serialize + ?Sized>(item: &T) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::ser::into_writer(item, &mut buf)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(buf)
}

/// Decodes a single CBOR item, rejecting trailing bytes.
///
/// # Errors
///
/// Returns [`CodecError::DecodingFailed`] for malformed input and
/// [`CodecError::TrailingBytes`] if the input holds more than one item.
pub fn from_cbor<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    let mut reader = bytes;
    let item = ciborium::de::from_reader(&mut reader)
        .map_err(|e| CodecError::decoding_failed(e.to_string()))?;
    if !reader.is_empty() {
        return Err(CodecError::TrailingBytes {
            remaining: reader.len(),
        });
    }
    Ok(item)
}

/// Encodes a record row.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode_row(fields: &[Value]) -> CodecResult<Vec<u8>> {
    to_cbor(fields)
}

/// Decodes a record row.
///
/// # Errors
///
/// Returns an error if the bytes are not a CBOR array of values.
pub fn decode_row(bytes: &[u8]) -> CodecResult<Vec<Value>> {
    from_cbor(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    #[test]
    fn row_with_every_type() {
        let row = vec![
            Value::Integer(-42),
            Value::Float(18.5),
            Value::DateTime(Utc.with_ymd_and_hms(2007, 8, 31, 0, 0, 0).unwrap()),
            Value::Text("Rollin' Girl".to_string()),
            Value::Bytes(vec![0, 1, 2, 255]),
        ];
        let bytes = encode_row(&row).unwrap();
        assert_eq!(decode_row(&bytes).unwrap(), row);
    }

    #[test]
    fn empty_row() {
        let bytes = encode_row(&[]).unwrap();
        assert!(decode_row(&bytes).unwrap().is_empty());
    }

    #[test]
    fn encoding_is_deterministic() {
        let row = vec![Value::from("Yukari"), Value::from(18)];
        assert_eq!(encode_row(&row).unwrap(), encode_row(&row).unwrap());
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = encode_row(&[Value::from(1)]).unwrap();
        bytes.push(0x00);
        assert!(matches!(
            decode_row(&bytes),
            Err(CodecError::TrailingBytes { remaining: 1 })
        ));
    }

    #[test]
    fn garbage_rejected() {
        assert!(matches!(
            decode_row(&[0xff, 0xff]),
            Err(CodecError::DecodingFailed { .. })
        ));
    }

    proptest! {
        #[test]
        fn integer_and_text_rows_survive(n in any::<i64>(), s in ".{0,32}") {
            let row = vec![Value::Integer(n), Value::Text(s)];
            let bytes = encode_row(&row).unwrap();
            prop_assert_eq!(decode_row(&bytes).unwrap(), row);
        }
    }
}
