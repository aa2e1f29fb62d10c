//! Table schemas and their fingerprints.

use crate::error::{CoreError, CoreResult};
use rekord_codec::{FieldType, Value};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt::Write as _;

/// A single field declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    name: String,
    field_type: FieldType,
    unique: bool,
}

impl FieldDef {
    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared type.
    #[must_use]
    pub const fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Returns `true` if the field carries a unique index.
    #[must_use]
    pub const fn is_unique(&self) -> bool {
        self.unique
    }
}

/// The declared shape of a table: its name and ordered fields.
///
/// Records store their values in field order. The schema fingerprint is
/// compared against the one stored in the manifest when a directory database
/// is reopened.
///
/// # Example
///
/// ```rust
/// use rekord_core::TableSchema;
/// use rekord_codec::FieldType;
///
/// let schema = TableSchema::builder("persons")
///     .unique("name", FieldType::Text)
///     .field("age", FieldType::Integer)
///     .build()
///     .unwrap();
/// assert_eq!(schema.field_index("age"), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    name: String,
    fields: Vec<FieldDef>,
}

impl TableSchema {
    /// Starts building a schema for the named table.
    pub fn builder(name: impl Into<String>) -> TableSchemaBuilder {
        TableSchemaBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Returns the position of a field by name.
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Iterates over the unique fields with their positions.
    pub fn unique_fields(&self) -> impl Iterator<Item = (usize, &FieldDef)> {
        self.fields.iter().enumerate().filter(|(_, f)| f.unique)
    }

    /// Checks arity and field types of a row.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::SchemaMismatch`] naming the first offending field.
    pub fn validate(&self, values: &[Value]) -> CoreResult<()> {
        if values.len() != self.fields.len() {
            return Err(CoreError::schema_mismatch(format!(
                "table {} expects {} fields, got {}",
                self.name,
                self.fields.len(),
                values.len()
            )));
        }

        for (field, value) in self.fields.iter().zip(values) {
            if value.field_type() != field.field_type {
                return Err(CoreError::schema_mismatch(format!(
                    "{}.{} is {}, got {}",
                    self.name,
                    field.name,
                    field.field_type,
                    value.field_type()
                )));
            }
        }
        Ok(())
    }

    /// Returns the SHA-256 of the schema's CBOR encoding as lowercase hex.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be encoded.
    pub fn fingerprint(&self) -> CoreResult<String> {
        let bytes = rekord_codec::to_cbor(self)?;
        let digest = Sha256::digest(&bytes);
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            let _ = write!(hex, "{byte:02x}");
        }
        Ok(hex)
    }
}

/// Builder for [`TableSchema`].
#[derive(Debug, Clone)]
pub struct TableSchemaBuilder {
    name: String,
    fields: Vec<FieldDef>,
}

impl TableSchemaBuilder {
    /// Adds a plain field.
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            field_type,
            unique: false,
        });
        self
    }

    /// Adds a field with a unique index.
    #[must_use]
    pub fn unique(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            field_type,
            unique: true,
        });
        self
    }

    /// Finishes the schema.
    ///
    /// # Errors
    ///
    /// Table names must be non-empty and consist of ASCII letters, digits,
    /// `_` or `-`, since they name segment files. Field names must be
    /// non-empty and distinct.
    pub fn build(self) -> CoreResult<TableSchema> {
        let valid_name = !self.name.is_empty()
            && self
                .name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid_name {
            return Err(CoreError::schema_mismatch(format!(
                "invalid table name {:?}",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(CoreError::schema_mismatch(format!(
                    "table {} has a field with an empty name",
                    self.name
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(CoreError::schema_mismatch(format!(
                    "table {} declares field {} twice",
                    self.name, field.name
                )));
            }
        }

        Ok(TableSchema {
            name: self.name,
            fields: self.fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persons() -> TableSchema {
        TableSchema::builder("persons")
            .unique("name", FieldType::Text)
            .field("age", FieldType::Integer)
            .build()
            .unwrap()
    }

    #[test]
    fn field_lookup() {
        let schema = persons();
        assert_eq!(schema.name(), "persons");
        assert_eq!(schema.fields().len(), 2);
        assert!(schema.field("name").unwrap().is_unique());
        assert_eq!(schema.field("age").unwrap().field_type(), FieldType::Integer);
        assert_eq!(schema.field_index("missing"), None);

        let unique: Vec<_> = schema.unique_fields().map(|(i, f)| (i, f.name())).collect();
        assert_eq!(unique, vec![(0, "name")]);
    }

    #[test]
    fn validate_accepts_matching_row() {
        let schema = persons();
        schema
            .validate(&[Value::from("Miku"), Value::Integer(16)])
            .unwrap();
    }

    #[test]
    fn validate_rejects_wrong_arity() {
        let err = persons().validate(&[Value::from("Miku")]).unwrap_err();
        assert!(matches!(err, CoreError::SchemaMismatch { .. }));
    }

    #[test]
    fn validate_rejects_wrong_type() {
        let err = persons()
            .validate(&[Value::from("Miku"), Value::Float(16.0)])
            .unwrap_err();
        assert!(err.to_string().contains("persons.age"));
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let a = persons();
        assert_eq!(a.fingerprint().unwrap(), persons().fingerprint().unwrap());
        assert_eq!(a.fingerprint().unwrap().len(), 64);

        let b = TableSchema::builder("persons")
            .unique("name", FieldType::Text)
            .field("age", FieldType::Float)
            .build()
            .unwrap();
        assert_ne!(a.fingerprint().unwrap(), b.fingerprint().unwrap());

        let c = TableSchema::builder("persons")
            .field("name", FieldType::Text)
            .field("age", FieldType::Integer)
            .build()
            .unwrap();
        assert_ne!(a.fingerprint().unwrap(), c.fingerprint().unwrap());
    }

    #[test]
    fn build_rejects_bad_names() {
        assert!(TableSchema::builder("").build().is_err());
        assert!(TableSchema::builder("../etc").build().is_err());
        assert!(TableSchema::builder("songs")
            .field("title", FieldType::Text)
            .field("title", FieldType::Text)
            .build()
            .is_err());
    }
}
