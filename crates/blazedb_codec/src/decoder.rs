//! Binary decoder.

use crate::encoder::tag;
use crate::error::{CodecError, CodecResult};
use crate::id::DocumentId;
use crate::value::Value;
use std::collections::BTreeMap;

/// Maximum nesting depth accepted while decoding.
///
/// Bounds stack use on hostile input; honest documents never get close.
const MAX_DEPTH: usize = 64;

/// Decodes one value, requiring the input to be fully consumed.
///
/// # Errors
///
/// Fails on malformed input or if bytes remain after the root value.
pub fn decode_value(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = Decoder::new(bytes);
    let value = decoder.decode()?;
    let trailing = decoder.remaining();
    if trailing > 0 {
        return Err(CodecError::TrailingBytes { trailing });
    }
    Ok(value)
}

/// Decodes one value from the front of the input, ignoring the rest.
///
/// Page payloads are zero-padded to the page boundary, so document
/// decoding tolerates a padded tail.
///
/// # Errors
///
/// Fails on malformed input.
pub fn decode_value_prefix(bytes: &[u8]) -> CodecResult<Value> {
    Decoder::new(bytes).decode()
}

/// Cursor-based decoder for the binary document format.
pub struct Decoder<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder over `input`.
    #[must_use]
    pub fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    /// Returns how many bytes have not been consumed yet.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    /// Decodes the next value.
    ///
    /// # Errors
    ///
    /// Fails on truncated input, unknown tags, or invalid UTF-8.
    pub fn decode(&mut self) -> CodecResult<Value> {
        self.decode_at_depth(0)
    }

    fn decode_at_depth(&mut self, depth: usize) -> CodecResult<Value> {
        if depth > MAX_DEPTH {
            return Err(CodecError::DepthExceeded { max: MAX_DEPTH });
        }

        let tag_offset = self.pos;
        let tag_byte = self.take_u8()?;
        match tag_byte {
            tag::TEXT => {
                let len = self.take_u32()? as usize;
                let text = self.take_text(len)?;
                Ok(Value::Text(text))
            }
            tag::INT => Ok(Value::Int(self.take_i64()?)),
            tag::FLOAT => Ok(Value::Float(f64::from_bits(self.take_u64()?))),
            tag::BOOL => Ok(Value::Bool(self.take_u8()? != 0)),
            tag::TIMESTAMP => Ok(Value::Timestamp(self.take_i64()?)),
            tag::ID => {
                let bytes = self.take_bytes(16)?;
                let mut raw = [0u8; 16];
                raw.copy_from_slice(bytes);
                Ok(Value::Id(DocumentId::from_bytes(raw)))
            }
            tag::SEQ => {
                let count = self.take_u32()? as usize;
                let mut items = Vec::with_capacity(count.min(1024));
                for _ in 0..count {
                    items.push(self.decode_at_depth(depth + 1)?);
                }
                Ok(Value::Seq(items))
            }
            tag::MAP => {
                let count = self.take_u32()? as usize;
                let mut fields = BTreeMap::new();
                for _ in 0..count {
                    let key_len = self.take_u16()? as usize;
                    let key = self.take_text(key_len)?;
                    let value = self.decode_at_depth(depth + 1)?;
                    fields.insert(key, value);
                }
                Ok(Value::Map(fields))
            }
            other => Err(CodecError::UnknownTag {
                tag: other,
                offset: tag_offset,
            }),
        }
    }

    fn take_u8(&mut self) -> CodecResult<u8> {
        let byte = *self
            .input
            .get(self.pos)
            .ok_or(CodecError::UnexpectedEnd { offset: self.pos })?;
        self.pos += 1;
        Ok(byte)
    }

    fn take_bytes(&mut self, len: usize) -> CodecResult<&'a [u8]> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(CodecError::LengthOverrun {
                declared: len,
                remaining,
            });
        }
        let slice = &self.input[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn take_text(&mut self, len: usize) -> CodecResult<String> {
        let offset = self.pos;
        let bytes = self.take_bytes(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| CodecError::InvalidUtf8 { offset })
    }

    fn take_u16(&mut self) -> CodecResult<u16> {
        let bytes = self.take_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn take_u32(&mut self) -> CodecResult<u32> {
        let bytes = self.take_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn take_u64(&mut self) -> CodecResult<u64> {
        let bytes = self.take_bytes(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_le_bytes(raw))
    }

    fn take_i64(&mut self) -> CodecResult<i64> {
        Ok(self.take_u64()? as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode_value;

    fn round_trip(value: Value) {
        let bytes = encode_value(&value);
        assert_eq!(decode_value(&bytes).unwrap(), value);
    }

    #[test]
    fn scalars_round_trip() {
        round_trip(Value::text("hello"));
        round_trip(Value::text(""));
        round_trip(Value::Int(0));
        round_trip(Value::Int(-42));
        round_trip(Value::Int(i64::MAX));
        round_trip(Value::Float(3.25));
        round_trip(Value::Float(-0.0));
        round_trip(Value::Bool(true));
        round_trip(Value::Timestamp(1_700_000_000_000));
        round_trip(Value::Id(DocumentId::mint()));
    }

    #[test]
    fn composites_round_trip() {
        round_trip(Value::Seq(vec![
            Value::Int(1),
            Value::text("two"),
            Value::Seq(vec![Value::Bool(false)]),
        ]));

        let mut inner = BTreeMap::new();
        inner.insert("depth".to_string(), Value::Int(2));
        let mut outer = BTreeMap::new();
        outer.insert("nested".to_string(), Value::Map(inner));
        outer.insert("flag".to_string(), Value::Bool(true));
        round_trip(Value::Map(outer));
    }

    #[test]
    fn prefix_decoding_ignores_padding() {
        let mut bytes = encode_value(&Value::Int(0));
        bytes.extend_from_slice(&[0u8; 100]);
        assert_eq!(decode_value_prefix(&bytes).unwrap(), Value::Int(0));
    }

    #[test]
    fn strict_decoding_rejects_trailing_bytes() {
        let mut bytes = encode_value(&Value::Bool(true));
        bytes.push(0);
        assert!(matches!(
            decode_value(&bytes),
            Err(CodecError::TrailingBytes { trailing: 1 })
        ));
    }

    #[test]
    fn truncated_input_fails() {
        let bytes = encode_value(&Value::text("longer text"));
        assert!(decode_value(&bytes[..4]).is_err());
    }

    #[test]
    fn unknown_tag_fails() {
        assert!(matches!(
            decode_value(&[0x7F]),
            Err(CodecError::UnknownTag { tag: 0x7F, .. })
        ));
    }

    #[test]
    fn bad_utf8_fails() {
        // text of length 2 with invalid UTF-8 payload
        let bytes = vec![0x01, 2, 0, 0, 0, 0xFF, 0xFE];
        assert!(matches!(
            decode_value(&bytes),
            Err(CodecError::InvalidUtf8 { .. })
        ));
    }

    #[test]
    fn declared_length_beyond_input_fails() {
        // text claiming 100 bytes with only 2 present
        let bytes = vec![0x01, 100, 0, 0, 0, b'a', b'b'];
        assert!(matches!(
            decode_value(&bytes),
            Err(CodecError::LengthOverrun { .. })
        ));
    }

    #[test]
    fn empty_input_fails() {
        assert!(matches!(
            decode_value(&[]),
            Err(CodecError::UnexpectedEnd { offset: 0 })
        ));
    }
}
