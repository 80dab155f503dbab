//! Write-ahead transaction journal.
//!
//! The journal gives atomic multi-page writes: operations inside a
//! transaction are logged before they reach the page file, and recovery
//! replays exactly the transactions that reached their `Commit` marker.
//! The page file is authoritative, so a journal that cannot be parsed is
//! treated as empty rather than failing the open.

mod log;
mod record;
mod txn;

pub use log::Journal;
pub use record::{compute_crc32, JournalRecord, JournalRecordType, TransactionId};
pub use txn::{TransactionContext, TransactionState};

/// Magic bytes prefixing every journal record.
pub const JOURNAL_MAGIC: [u8; 4] = *b"BZJL";

/// Current journal record format version.
pub const JOURNAL_VERSION: u16 = 1;
