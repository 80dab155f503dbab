//! Journal record types and serialization.

use crate::error::{CoreError, CoreResult};
use std::fmt;

/// Identifier of one journalled transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Creates a transaction id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Type byte of a journal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum JournalRecordType {
    /// Transaction start marker.
    Begin = 1,
    /// Page write.
    Write = 2,
    /// Page delete (zeroing).
    Delete = 3,
    /// Transaction commit marker.
    Commit = 4,
    /// Transaction abort marker.
    Abort = 5,
}

impl JournalRecordType {
    /// Parses a type byte; `None` for unknown kinds (which replay skips).
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Begin),
            2 => Some(Self::Write),
            3 => Some(Self::Delete),
            4 => Some(Self::Commit),
            5 => Some(Self::Abort),
            _ => None,
        }
    }

    /// Returns the type byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// One journalled operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalRecord {
    /// Opens transaction `txid`.
    Begin {
        /// Transaction id.
        txid: TransactionId,
    },
    /// Buffered page write belonging to the open transaction.
    Write {
        /// Target page index.
        page_index: u64,
        /// Framed-page payload bytes.
        payload: Vec<u8>,
    },
    /// Buffered page delete belonging to the open transaction.
    Delete {
        /// Target page index.
        page_index: u64,
    },
    /// Commits transaction `txid`; everything since its `Begin` replays.
    Commit {
        /// Transaction id.
        txid: TransactionId,
    },
    /// Abandons transaction `txid`; nothing since its `Begin` replays.
    Abort {
        /// Transaction id.
        txid: TransactionId,
    },
}

impl JournalRecord {
    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> JournalRecordType {
        match self {
            Self::Begin { .. } => JournalRecordType::Begin,
            Self::Write { .. } => JournalRecordType::Write,
            Self::Delete { .. } => JournalRecordType::Delete,
            Self::Commit { .. } => JournalRecordType::Commit,
            Self::Abort { .. } => JournalRecordType::Abort,
        }
    }

    /// Serializes the record payload (without the envelope).
    #[must_use]
    pub fn encode_payload(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Self::Begin { txid } | Self::Commit { txid } | Self::Abort { txid } => {
                buf.extend_from_slice(&txid.as_u64().to_le_bytes());
            }
            Self::Write {
                page_index,
                payload,
            } => {
                buf.extend_from_slice(&page_index.to_le_bytes());
                buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
                buf.extend_from_slice(payload);
            }
            Self::Delete { page_index } => {
                buf.extend_from_slice(&page_index.to_le_bytes());
            }
        }
        buf
    }

    /// Deserializes a record from its type and payload.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::JournalCorrupt`] on truncated or
    /// over-long payloads.
    pub fn decode_payload(record_type: JournalRecordType, payload: &[u8]) -> CoreResult<Self> {
        let mut cursor = 0usize;

        let read_u64 = |cursor: &mut usize| -> CoreResult<u64> {
            let end = *cursor + 8;
            if end > payload.len() {
                return Err(CoreError::journal_corrupt("payload ends inside a u64"));
            }
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&payload[*cursor..end]);
            *cursor = end;
            Ok(u64::from_le_bytes(raw))
        };

        let read_u32 = |cursor: &mut usize| -> CoreResult<u32> {
            let end = *cursor + 4;
            if end > payload.len() {
                return Err(CoreError::journal_corrupt("payload ends inside a u32"));
            }
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&payload[*cursor..end]);
            *cursor = end;
            Ok(u32::from_le_bytes(raw))
        };

        let finish = |cursor: usize, record: Self| -> CoreResult<Self> {
            if cursor != payload.len() {
                return Err(CoreError::journal_corrupt(format!(
                    "trailing bytes in {:?} record",
                    record.record_type()
                )));
            }
            Ok(record)
        };

        match record_type {
            JournalRecordType::Begin => {
                let txid = TransactionId::new(read_u64(&mut cursor)?);
                finish(cursor, Self::Begin { txid })
            }
            JournalRecordType::Commit => {
                let txid = TransactionId::new(read_u64(&mut cursor)?);
                finish(cursor, Self::Commit { txid })
            }
            JournalRecordType::Abort => {
                let txid = TransactionId::new(read_u64(&mut cursor)?);
                finish(cursor, Self::Abort { txid })
            }
            JournalRecordType::Delete => {
                let page_index = read_u64(&mut cursor)?;
                finish(cursor, Self::Delete { page_index })
            }
            JournalRecordType::Write => {
                let page_index = read_u64(&mut cursor)?;
                let len = read_u32(&mut cursor)? as usize;
                let end = cursor + len;
                if end > payload.len() {
                    return Err(CoreError::journal_corrupt("payload ends inside write data"));
                }
                let data = payload[cursor..end].to_vec();
                finish(
                    end,
                    Self::Write {
                        page_index,
                        payload: data,
                    },
                )
            }
        }
    }
}

/// CRC32 (IEEE polynomial) over `data`.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(record: JournalRecord) {
        let payload = record.encode_payload();
        let decoded = JournalRecord::decode_payload(record.record_type(), &payload).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn marker_records_round_trip() {
        round_trip(JournalRecord::Begin {
            txid: TransactionId::new(42),
        });
        round_trip(JournalRecord::Commit {
            txid: TransactionId::new(7),
        });
        round_trip(JournalRecord::Abort {
            txid: TransactionId::new(u64::MAX),
        });
    }

    #[test]
    fn write_record_round_trips() {
        round_trip(JournalRecord::Write {
            page_index: 12,
            payload: vec![0xDE, 0xAD, 0xBE, 0xEF],
        });
        round_trip(JournalRecord::Write {
            page_index: 0,
            payload: Vec::new(),
        });
    }

    #[test]
    fn delete_record_round_trips() {
        round_trip(JournalRecord::Delete { page_index: 3 });
    }

    #[test]
    fn type_bytes_round_trip() {
        for t in [
            JournalRecordType::Begin,
            JournalRecordType::Write,
            JournalRecordType::Delete,
            JournalRecordType::Commit,
            JournalRecordType::Abort,
        ] {
            assert_eq!(JournalRecordType::from_byte(t.as_byte()), Some(t));
        }
        assert_eq!(JournalRecordType::from_byte(0), None);
        assert_eq!(JournalRecordType::from_byte(99), None);
    }

    #[test]
    fn truncated_payload_is_corrupt() {
        let record = JournalRecord::Write {
            page_index: 5,
            payload: vec![1, 2, 3],
        };
        let payload = record.encode_payload();
        assert!(JournalRecord::decode_payload(JournalRecordType::Write, &payload[..6]).is_err());
    }

    #[test]
    fn trailing_bytes_are_corrupt() {
        let mut payload = JournalRecord::Begin {
            txid: TransactionId::new(1),
        }
        .encode_payload();
        payload.push(0);
        assert!(JournalRecord::decode_payload(JournalRecordType::Begin, &payload).is_err());
    }

    #[test]
    fn crc32_known_vector() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_crc32(b""), 0);
    }
}
