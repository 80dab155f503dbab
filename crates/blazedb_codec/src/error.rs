//! Codec error types.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors produced while encoding or decoding values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    /// The input ended before the value was complete.
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEnd {
        /// Byte offset where more input was needed.
        offset: usize,
    },

    /// An unknown type tag was encountered.
    #[error("unknown value tag {tag:#04x} at offset {offset}")]
    UnknownTag {
        /// The unrecognized tag byte.
        tag: u8,
        /// Byte offset of the tag.
        offset: usize,
    },

    /// A text field was not valid UTF-8.
    #[error("invalid UTF-8 in text at offset {offset}")]
    InvalidUtf8 {
        /// Byte offset of the text payload.
        offset: usize,
    },

    /// Strict decoding found bytes after the root value.
    #[error("{trailing} trailing bytes after value")]
    TrailingBytes {
        /// Number of unconsumed bytes.
        trailing: usize,
    },

    /// A declared length exceeds the remaining input.
    #[error("declared length {declared} exceeds remaining input {remaining}")]
    LengthOverrun {
        /// Length claimed by the header.
        declared: usize,
        /// Bytes actually remaining.
        remaining: usize,
    },

    /// Value nesting exceeded the decoder's depth bound.
    #[error("value nesting exceeds {max} levels")]
    DepthExceeded {
        /// The depth bound.
        max: usize,
    },

    /// The root of a document payload was not a map.
    #[error("document root must be a map")]
    NotADocument,
}
