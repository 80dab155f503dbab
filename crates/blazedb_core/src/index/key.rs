//! Compound index keys.

use blazedb_codec::{Document, DocumentId, Value};
use serde::{Deserialize, Serialize};

/// Returns the catalog name of an index over `fields`.
#[must_use]
pub fn index_name(fields: &[String]) -> String {
    fields.join("+")
}

/// One normalized component of a compound key.
///
/// Components are drawn from the scalar value variants. Sequences, nested
/// maps, and missing fields normalize to empty text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyComponent {
    /// Text component.
    Text(String),
    /// Integer component.
    Int(i64),
    /// Float component (non-integral floats only; see normalization).
    Float(f64),
    /// Boolean component.
    Bool(bool),
    /// Identifier component.
    Id(DocumentId),
}

impl KeyComponent {
    /// Normalizes a field value into a key component.
    ///
    /// Coercions make equal values collide regardless of how they were
    /// expressed at insert time: integral floats become ints, timestamps
    /// become their millisecond ints. Anything non-scalar is empty text.
    #[must_use]
    pub fn normalize(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Text(s)) => KeyComponent::Text(s.clone()),
            Some(Value::Int(n)) | Some(Value::Timestamp(n)) => KeyComponent::Int(*n),
            #[allow(clippy::cast_possible_truncation)]
            Some(Value::Float(f)) => {
                if f.fract() == 0.0 && f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64
                {
                    KeyComponent::Int(*f as i64)
                } else {
                    KeyComponent::Float(*f)
                }
            }
            Some(Value::Bool(b)) => KeyComponent::Bool(*b),
            Some(Value::Id(id)) => KeyComponent::Id(*id),
            Some(Value::Seq(_)) | Some(Value::Map(_)) | None => {
                KeyComponent::Text(String::new())
            }
        }
    }
}

/// An ordered sequence of normalized key components.
///
/// Keys built from the same field list with value-equal components encode
/// identically, so they address the same bucket. The canonical encoded
/// form is the deterministic JSON of the component array; that string is
/// the bucket map key on disk and in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompoundKey {
    components: Vec<KeyComponent>,
}

impl CompoundKey {
    /// Builds a key by reading `fields` in order from `doc`.
    #[must_use]
    pub fn from_document(doc: &Document, fields: &[String]) -> Self {
        Self {
            components: fields
                .iter()
                .map(|field| KeyComponent::normalize(doc.get(field)))
                .collect(),
        }
    }

    /// Builds a key from probe values, in field order.
    #[must_use]
    pub fn from_values(values: &[Value]) -> Self {
        Self {
            components: values
                .iter()
                .map(|value| KeyComponent::normalize(Some(value)))
                .collect(),
        }
    }

    /// Returns the components.
    #[must_use]
    pub fn components(&self) -> &[KeyComponent] {
        &self.components
    }

    /// Encodes the key to its canonical string form.
    #[must_use]
    pub fn encode(&self) -> String {
        // component serialization never fails; fall back to the empty
        // array just in case
        serde_json::to_string(&self.components).unwrap_or_else(|_| "[]".to_string())
    }

    /// Decodes a key from its canonical string form.
    #[must_use]
    pub fn decode(encoded: &str) -> Option<Self> {
        serde_json::from_str(encoded)
            .ok()
            .map(|components| Self { components })
    }

    /// Lifts a legacy single-component key (a bare value string) into a
    /// compound key of length one.
    #[must_use]
    pub fn from_legacy_single(text: &str) -> Self {
        Self {
            components: vec![KeyComponent::Text(text.to_string())],
        }
    }
}
