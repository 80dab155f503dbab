//! # BlazeDB Codec
//!
//! The document value model and its deterministic binary encoding.
//!
//! Documents are unordered maps from field names to tagged [`Value`]s.
//! The binary format is deterministic: encoding the same document twice
//! yields identical bytes (map keys are emitted in sorted order), which
//! keeps page contents stable across saves.
//!
//! Decoding reads a single root value from the front of the buffer and
//! ignores anything after it. The page store strips trailing zero runs
//! from payloads, so document decoding re-pads with zeros first; because
//! only zeros were removed, the round trip is exact.
//!
//! ## Usage
//!
//! ```
//! use blazedb_codec::{Document, Value};
//!
//! let mut doc = Document::new();
//! doc.set("title", Value::text("Fix crash"));
//! doc.set("severity", Value::Int(2));
//!
//! let bytes = doc.encode();
//! let back = Document::decode(&bytes).unwrap();
//! assert_eq!(back, doc);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod document;
mod encoder;
mod error;
mod id;
mod value;

pub use decoder::{decode_value, decode_value_prefix, Decoder};
pub use document::{
    Document, FIELD_CREATED_AT, FIELD_ID, FIELD_IS_DELETED, FIELD_PROJECT, FIELD_UPDATED_AT,
};
pub use encoder::{encode_value, Encoder};
pub use error::{CodecError, CodecResult};
pub use id::DocumentId;
pub use value::Value;
