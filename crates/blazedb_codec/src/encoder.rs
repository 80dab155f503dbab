//! Deterministic binary encoder.

use crate::value::Value;

/// Type tags of the binary format.
pub(crate) mod tag {
    pub const TEXT: u8 = 0x01;
    pub const INT: u8 = 0x02;
    pub const FLOAT: u8 = 0x03;
    pub const BOOL: u8 = 0x04;
    pub const TIMESTAMP: u8 = 0x05;
    pub const ID: u8 = 0x06;
    pub const SEQ: u8 = 0x07;
    pub const MAP: u8 = 0x08;
}

/// Encodes a value to its deterministic binary form.
///
/// Identical values always produce identical bytes: map entries are
/// emitted in key order and scalars use fixed-width little-endian
/// encodings.
#[must_use]
pub fn encode_value(value: &Value) -> Vec<u8> {
    let mut encoder = Encoder::new();
    encoder.encode(value);
    encoder.into_bytes()
}

/// Streaming encoder for the binary document format.
///
/// Layout per value: one tag byte followed by the payload.
///
/// | tag  | variant   | payload                                      |
/// |------|-----------|----------------------------------------------|
/// | 0x01 | text      | u32 LE byte length, UTF-8 bytes              |
/// | 0x02 | int       | i64 LE                                       |
/// | 0x03 | float     | f64 LE bit pattern                           |
/// | 0x04 | bool      | one byte, 0 or 1                             |
/// | 0x05 | timestamp | i64 LE Unix milliseconds                     |
/// | 0x06 | id        | 16 raw bytes                                 |
/// | 0x07 | seq       | u32 LE count, then each value                |
/// | 0x08 | map       | u32 LE count, then u16 LE key len + key + value, sorted by key |
pub struct Encoder {
    buffer: Vec<u8>,
}

impl Encoder {
    /// Creates an empty encoder.
    #[must_use]
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Creates an encoder with a pre-sized buffer.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Appends one value to the buffer.
    pub fn encode(&mut self, value: &Value) {
        match value {
            Value::Text(s) => {
                self.buffer.push(tag::TEXT);
                self.put_text(s);
            }
            Value::Int(n) => {
                self.buffer.push(tag::INT);
                self.buffer.extend_from_slice(&n.to_le_bytes());
            }
            Value::Float(f) => {
                self.buffer.push(tag::FLOAT);
                self.buffer.extend_from_slice(&f.to_bits().to_le_bytes());
            }
            Value::Bool(b) => {
                self.buffer.push(tag::BOOL);
                self.buffer.push(u8::from(*b));
            }
            Value::Timestamp(t) => {
                self.buffer.push(tag::TIMESTAMP);
                self.buffer.extend_from_slice(&t.to_le_bytes());
            }
            Value::Id(id) => {
                self.buffer.push(tag::ID);
                self.buffer.extend_from_slice(id.as_bytes());
            }
            Value::Seq(items) => {
                self.buffer.push(tag::SEQ);
                self.put_u32(items.len());
                for item in items {
                    self.encode(item);
                }
            }
            Value::Map(fields) => {
                self.buffer.push(tag::MAP);
                self.put_u32(fields.len());
                // BTreeMap iterates in key order, keeping the bytes stable
                for (key, val) in fields {
                    self.put_key(key);
                    self.encode(val);
                }
            }
        }
    }

    /// Consumes the encoder and returns the bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Returns the bytes written so far.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    fn put_text(&mut self, s: &str) {
        self.put_u32(s.len());
        self.buffer.extend_from_slice(s.as_bytes());
    }

    fn put_key(&mut self, key: &str) {
        let len = u16::try_from(key.len()).unwrap_or(u16::MAX);
        self.buffer.extend_from_slice(&len.to_le_bytes());
        self.buffer.extend_from_slice(&key.as_bytes()[..len as usize]);
    }

    #[allow(clippy::cast_possible_truncation)]
    fn put_u32(&mut self, n: usize) {
        self.buffer.extend_from_slice(&(n as u32).to_le_bytes());
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}
