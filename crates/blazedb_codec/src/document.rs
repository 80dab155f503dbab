//! Document type.

use crate::decoder::decode_value_prefix;
use crate::encoder::encode_value;
use crate::error::{CodecError, CodecResult};
use crate::id::DocumentId;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Field name of the record identifier.
pub const FIELD_ID: &str = "id";
/// Field name of the creation timestamp.
pub const FIELD_CREATED_AT: &str = "createdAt";
/// Field name of the last-update timestamp.
pub const FIELD_UPDATED_AT: &str = "updatedAt";
/// Field name of the project tag.
pub const FIELD_PROJECT: &str = "project";
/// Field name of the soft-deletion marker.
pub const FIELD_IS_DELETED: &str = "isDeleted";

/// A schemaless record: an unordered mapping from field names to values.
///
/// Every persisted document carries at least `id`, `createdAt` and
/// `project`; those are stamped by the collection at insert time, not by
/// this type. An optional `isDeleted` boolean marks soft deletion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: BTreeMap<String, Value>,
}

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a document from existing fields.
    #[must_use]
    pub fn from_fields(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }

    /// Returns the value of `field`, if present.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Sets `field` to `value`, replacing any previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Removes `field` and returns its old value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Returns whether `field` is present.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Returns the number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns whether the document has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates over fields in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Returns the underlying field map.
    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// Returns the record identifier, reading either an id value or a
    /// parseable text form from the `id` field.
    #[must_use]
    pub fn id(&self) -> Option<DocumentId> {
        match self.fields.get(FIELD_ID)? {
            Value::Id(id) => Some(*id),
            Value::Text(text) => DocumentId::parse(text),
            _ => None,
        }
    }

    /// Sets the record identifier.
    pub fn set_id(&mut self, id: DocumentId) {
        self.fields.insert(FIELD_ID.to_string(), Value::Id(id));
    }

    /// Returns the creation timestamp, if stamped.
    #[must_use]
    pub fn created_at(&self) -> Option<i64> {
        self.fields.get(FIELD_CREATED_AT)?.as_timestamp()
    }

    /// Returns the project tag, if stamped.
    #[must_use]
    pub fn project(&self) -> Option<&str> {
        self.fields.get(FIELD_PROJECT)?.as_text()
    }

    /// Returns whether the document is soft-deleted.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.fields
            .get(FIELD_IS_DELETED)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Encodes the document to its binary page payload.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        encode_value(&Value::Map(self.fields.clone()))
    }

    /// Decodes a document from a page payload.
    ///
    /// Trailing bytes after the root map are ignored; page payloads are
    /// re-padded with zeros after the store trims them.
    ///
    /// # Errors
    ///
    /// Fails on malformed input or when the root value is not a map.
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        match decode_value_prefix(bytes)? {
            Value::Map(fields) => Ok(Self { fields }),
            _ => Err(CodecError::NotADocument),
        }
    }
}

impl From<BTreeMap<String, Value>> for Document {
    fn from(fields: BTreeMap<String, Value>) -> Self {
        Self { fields }
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        let mut doc = Document::new();
        doc.set("title", "Fix crash");
        doc.set("severity", Value::Int(3));
        doc.set("resolved", false);
        doc
    }

    #[test]
    fn set_get_remove() {
        let mut doc = sample();
        assert_eq!(doc.get("title"), Some(&Value::text("Fix crash")));
        assert!(doc.contains("severity"));

        doc.remove("severity");
        assert!(!doc.contains("severity"));
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn id_accepts_id_and_text_forms() {
        let id = DocumentId::mint();

        let mut by_value = Document::new();
        by_value.set_id(id);
        assert_eq!(by_value.id(), Some(id));

        let mut by_text = Document::new();
        by_text.set(FIELD_ID, id.to_string());
        assert_eq!(by_text.id(), Some(id));

        let mut bad = Document::new();
        bad.set(FIELD_ID, Value::Int(1));
        assert_eq!(bad.id(), None);
    }

    #[test]
    fn soft_delete_flag_defaults_false() {
        let mut doc = sample();
        assert!(!doc.is_deleted());

        doc.set(FIELD_IS_DELETED, true);
        assert!(doc.is_deleted());
    }

    #[test]
    fn encode_decode_round_trip() {
        let mut doc = sample();
        doc.set_id(DocumentId::mint());
        doc.set(FIELD_CREATED_AT, Value::Timestamp(1_700_000_000_000));

        let bytes = doc.encode();
        let back = Document::decode(&bytes).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn decode_survives_zero_padding() {
        let doc = sample();
        let mut bytes = doc.encode();
        bytes.resize(bytes.len() + 64, 0);

        assert_eq!(Document::decode(&bytes).unwrap(), doc);
    }

    #[test]
    fn decode_rejects_non_map_root() {
        let bytes = crate::encoder::encode_value(&Value::Int(5));
        assert!(matches!(
            Document::decode(&bytes),
            Err(CodecError::NotADocument)
        ));
    }

    #[test]
    fn stamped_accessors() {
        let mut doc = Document::new();
        doc.set(FIELD_CREATED_AT, Value::Timestamp(123));
        doc.set(FIELD_PROJECT, "tracker");

        assert_eq!(doc.created_at(), Some(123));
        assert_eq!(doc.project(), Some("tracker"));
    }
}
