//! The document layer: CBOR documents, index descriptors, and the
//! document engine facade over the key-value engine.

mod engine;

pub use engine::DocumentEngine;

use std::collections::BTreeMap;

use ciborium::value::Value;

use crate::error::{StorageError, StorageResult};

/// Name of the mandatory unique id index every collection carries.
pub const ID_INDEX_NAME: &str = "_id_";

/// Field holding a document's identifier.
pub const ID_FIELD: &str = "_id";

/// An ordered-field document.
///
/// Fields are CBOR values keyed by name; the serialized form stored in a
/// record store is the document's CBOR encoding, opaque to every layer
/// below this one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document(BTreeMap<String, Value>);

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field, replacing any previous value.
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> &mut Self {
        self.0.insert(name.into(), value);
        self
    }

    /// Builder form of [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    /// Returns a field's value, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Returns true if the field exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    /// Iterates fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for a document with no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Serializes the document to CBOR bytes.
    ///
    /// # Errors
    ///
    /// [`StorageError::InvalidArgument`] if a field value cannot be
    /// encoded.
    pub fn to_bytes(&self) -> StorageResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&self.0, &mut buf)
            .map_err(|error| StorageError::invalid_argument(format!("cbor encode: {error}")))?;
        Ok(buf)
    }

    /// Deserializes a document from CBOR bytes.
    ///
    /// # Errors
    ///
    /// [`StorageError::InvalidArgument`] for bytes that are not a CBOR map
    /// of named fields.
    pub fn from_bytes(bytes: &[u8]) -> StorageResult<Self> {
        let fields: BTreeMap<String, Value> = ciborium::de::from_reader(bytes)
            .map_err(|error| StorageError::invalid_argument(format!("cbor decode: {error}")))?;
        Ok(Self(fields))
    }

    /// Returns true if every field of `filter` is present here with an
    /// equal value. The empty filter matches every document.
    #[must_use]
    pub fn matches(&self, filter: &Document) -> bool {
        filter
            .fields()
            .all(|(name, value)| self.get(name) == Some(value))
    }

    /// Merges `update`'s fields over this document's, leaving the id field
    /// untouched.
    pub fn apply_update(&mut self, update: &Document) {
        for (name, value) in update.fields() {
            if name != ID_FIELD {
                self.0.insert(name.clone(), value.clone());
            }
        }
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Descriptor of a secondary index on a collection.
///
/// The keyed fields record intent (field name and direction, `1` ascending
/// or `-1` descending); entry extraction itself keys on the document id,
/// the documented simplification this layer inherits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// Index name, unique within its collection.
    pub name: String,
    /// Indexed fields with direction.
    pub keys: Vec<(String, i32)>,
    /// Whether the index enforces key uniqueness.
    pub unique: bool,
    /// Whether documents missing the keyed fields are skipped.
    pub sparse: bool,
}

impl IndexSpec {
    /// Creates a non-unique, non-sparse descriptor with no keyed fields.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: Vec::new(),
            unique: false,
            sparse: false,
        }
    }

    /// Adds a keyed field.
    #[must_use]
    pub fn key(mut self, field: impl Into<String>, direction: i32) -> Self {
        self.keys.push((field.into(), direction));
        self
    }

    /// Marks the index unique.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Marks the index sparse.
    #[must_use]
    pub const fn sparse(mut self) -> Self {
        self.sparse = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str, age: i64) -> Document {
        Document::new()
            .with("name", Value::Text(name.to_string()))
            .with("age", Value::Integer(age.into()))
    }

    #[test]
    fn cbor_round_trip() {
        let doc = user("Alice", 30);
        let bytes = doc.to_bytes().unwrap();
        let decoded = Document::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, doc);
    }

    #[test]
    fn from_bytes_rejects_garbage() {
        assert!(Document::from_bytes(&[0xff, 0x00, 0x13]).is_err());
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(user("Alice", 30).matches(&Document::new()));
    }

    #[test]
    fn filter_matches_on_field_equality() {
        let doc = user("Alice", 30);

        let by_name = Document::new().with("name", Value::Text("Alice".into()));
        assert!(doc.matches(&by_name));

        let wrong_age = Document::new().with("age", Value::Integer(31.into()));
        assert!(!doc.matches(&wrong_age));

        let missing_field = Document::new().with("email", Value::Null);
        assert!(!doc.matches(&missing_field));
    }

    #[test]
    fn apply_update_preserves_id() {
        let mut doc = user("Alice", 30).with(ID_FIELD, Value::Text("1".into()));
        let update = Document::new()
            .with("age", Value::Integer(31.into()))
            .with(ID_FIELD, Value::Text("999".into()));

        doc.apply_update(&update);

        assert_eq!(doc.get("age"), Some(&Value::Integer(31.into())));
        assert_eq!(doc.get(ID_FIELD), Some(&Value::Text("1".into())));
        assert_eq!(doc.get("name"), Some(&Value::Text("Alice".into())));
    }

    #[test]
    fn index_spec_builder() {
        let spec = IndexSpec::new("name_idx").key("name", 1).unique();
        assert_eq!(spec.name, "name_idx");
        assert_eq!(spec.keys, vec![("name".to_string(), 1)]);
        assert!(spec.unique);
        assert!(!spec.sparse);
    }
}
