//! Typed field values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// The type of a table field.
///
/// These are the only types a record field may hold. Narrower host types
/// (`i32`, `char` arrays, ...) must be converted explicitly by the caller.
///
/// There is no lazy variant: lazily loaded text and bytes are stored as
/// plain [`FieldType::Text`] and [`FieldType::Bytes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// 64-bit signed integer.
    Integer,
    /// 64-bit IEEE float.
    Float,
    /// UTC timestamp.
    DateTime,
    /// UTF-8 text.
    Text,
    /// Opaque byte string.
    Bytes,
}

impl FieldType {
    /// Returns a lowercase name for display.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Float => "float",
            Self::DateTime => "datetime",
            Self::Text => "text",
            Self::Bytes => "bytes",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single field value of a record.
///
/// Floats compare and hash by bit pattern, so `Value` is `Eq + Hash` and can
/// key a unique index. Under this rule `0.0 != -0.0` and a NaN equals a NaN
/// with the same bits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// Signed integer.
    Integer(i64),
    /// Float.
    Float(f64),
    /// UTC timestamp.
    DateTime(DateTime<Utc>),
    /// Text string.
    Text(String),
    /// Byte string.
    Bytes(Vec<u8>),
}

impl Value {
    /// Returns the field type this value belongs to.
    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        match self {
            Self::Integer(_) => FieldType::Integer,
            Self::Float(_) => FieldType::Float,
            Self::DateTime(_) => FieldType::DateTime,
            Self::Text(_) => FieldType::Text,
            Self::Bytes(_) => FieldType::Bytes,
        }
    }

    /// Get this value as an integer, if it is one.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Get this value as a float, if it is one.
    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Self::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// Get this value as a timestamp, if it is one.
    #[must_use]
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::DateTime(t) => Some(*t),
            _ => None,
        }
    }

    /// Get this value as text, if it is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get this value as bytes, if it is a byte string.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Integer(n) => n.hash(state),
            Self::Float(x) => x.to_bits().hash(state),
            Self::DateTime(t) => t.hash(state),
            Self::Text(s) => s.hash(state),
            Self::Bytes(b) => b.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::DateTime(t) => write!(f, "{}", t.to_rfc3339()),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Self::DateTime(t)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Self::Bytes(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn field_type_of_each_variant() {
        assert_eq!(Value::from(1).field_type(), FieldType::Integer);
        assert_eq!(Value::from(1.5).field_type(), FieldType::Float);
        assert_eq!(Value::from(Utc::now()).field_type(), FieldType::DateTime);
        assert_eq!(Value::from("miku").field_type(), FieldType::Text);
        assert_eq!(Value::from(vec![1u8]).field_type(), FieldType::Bytes);
    }

    #[test]
    fn floats_compare_by_bits() {
        assert_eq!(Value::Float(f64::NAN), Value::Float(f64::NAN));
        assert_ne!(Value::Float(0.0), Value::Float(-0.0));
    }

    #[test]
    fn values_of_different_types_differ() {
        assert_ne!(Value::Integer(1), Value::Float(1.0));
        assert_ne!(Value::Text("a".into()), Value::Bytes(b"a".to_vec()));
    }

    #[test]
    fn hash_agrees_with_eq() {
        let mut set = HashSet::new();
        set.insert(Value::from("Miku"));
        set.insert(Value::from("Miku"));
        set.insert(Value::Float(2.5));
        set.insert(Value::Float(2.5));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn accessors() {
        assert_eq!(Value::from(16).as_integer(), Some(16));
        assert_eq!(Value::from("Rin").as_text(), Some("Rin"));
        assert_eq!(Value::from(16).as_text(), None);
        assert_eq!(Value::from(vec![7u8]).as_bytes(), Some(&[7u8][..]));
        assert_eq!(Value::from(0.25).as_float(), Some(0.25));
    }

    #[test]
    fn display() {
        assert_eq!(Value::from("Miku").to_string(), "\"Miku\"");
        assert_eq!(Value::from(18).to_string(), "18");
        assert_eq!(FieldType::DateTime.to_string(), "datetime");
    }
}
