//! Journal log manager: append, scan, recover.

use crate::error::CoreResult;
use crate::journal::record::{compute_crc32, JournalRecord, JournalRecordType, TransactionId};
use crate::journal::{JOURNAL_MAGIC, JOURNAL_VERSION};
use crate::page::PageStore;
use blazedb_storage::{FileBackend, StorageBackend};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Envelope bytes before the payload:
/// magic (4) + version (2) + type (1) + length (4).
const ENVELOPE_SIZE: usize = 11;

/// CRC32 trailer size.
const CRC_SIZE: usize = 4;

/// Append-only journal over a storage backend.
///
/// Records are framed with magic, version, type, length, and a CRC32
/// trailer. Scanning is lenient: the first framing or checksum anomaly
/// ends the scan and the tail is discarded, because the page file is the
/// source of truth for records.
pub struct Journal {
    backend: Mutex<Box<dyn StorageBackend>>,
    sync_on_write: bool,
}

impl Journal {
    /// Creates a journal over an arbitrary backend.
    #[must_use]
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_write: bool) -> Self {
        Self {
            backend: Mutex::new(backend),
            sync_on_write,
        }
    }

    /// Opens a file-backed journal.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or created.
    pub fn open(path: &Path, sync_on_write: bool) -> CoreResult<Self> {
        let backend = FileBackend::open_with_create_dirs(path)?;
        Ok(Self::new(Box::new(backend), sync_on_write))
    }

    /// Appends one record and returns its offset.
    ///
    /// # Errors
    ///
    /// Fails on I/O error.
    pub fn append(&self, record: &JournalRecord) -> CoreResult<u64> {
        let payload = record.encode_payload();

        let mut data = Vec::with_capacity(ENVELOPE_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&JOURNAL_MAGIC);
        data.extend_from_slice(&JOURNAL_VERSION.to_le_bytes());
        data.push(record.record_type().as_byte());
        data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        data.extend_from_slice(&payload);
        let crc = compute_crc32(&data);
        data.extend_from_slice(&crc.to_le_bytes());

        let mut backend = self.backend.lock();
        let offset = backend.append(&data)?;
        if self.sync_on_write {
            backend.sync()?;
        }
        Ok(offset)
    }

    /// Returns the journal size in bytes.
    ///
    /// # Errors
    ///
    /// Fails on I/O error.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Truncates the journal to nothing.
    ///
    /// # Errors
    ///
    /// Fails on I/O error.
    pub fn clear(&self) -> CoreResult<()> {
        let mut backend = self.backend.lock();
        backend.truncate(0)?;
        Ok(())
    }

    /// Scans all well-formed records from the start of the log.
    ///
    /// Unknown record kinds are skipped. Any framing anomaly (bad magic,
    /// truncated envelope, checksum mismatch, undecodable payload) stops
    /// the scan; the tail is treated as absent and a warning is logged.
    ///
    /// # Errors
    ///
    /// Fails only on I/O errors.
    pub fn read_all(&self) -> CoreResult<Vec<JournalRecord>> {
        let backend = self.backend.lock();
        let size = backend.size()?;
        let mut records = Vec::new();
        let mut offset = 0u64;

        while offset + (ENVELOPE_SIZE as u64) <= size {
            let envelope = backend.read_at(offset, ENVELOPE_SIZE)?;
            if envelope[0..4] != JOURNAL_MAGIC {
                warn!(offset, "journal magic mismatch, discarding tail");
                break;
            }
            let version = u16::from_le_bytes([envelope[4], envelope[5]]);
            if version != JOURNAL_VERSION {
                warn!(offset, version, "unsupported journal version, discarding tail");
                break;
            }
            let type_byte = envelope[6];
            let len = u32::from_le_bytes([envelope[7], envelope[8], envelope[9], envelope[10]])
                as u64;

            let record_size = ENVELOPE_SIZE as u64 + len + CRC_SIZE as u64;
            if offset + record_size > size {
                warn!(offset, "truncated journal record, discarding tail");
                break;
            }

            let framed = backend.read_at(offset, record_size as usize)?;
            let body_end = framed.len() - CRC_SIZE;
            let stored_crc = u32::from_le_bytes([
                framed[body_end],
                framed[body_end + 1],
                framed[body_end + 2],
                framed[body_end + 3],
            ]);
            if stored_crc != compute_crc32(&framed[..body_end]) {
                warn!(offset, "journal checksum mismatch, discarding tail");
                break;
            }

            offset += record_size;

            let Some(record_type) = JournalRecordType::from_byte(type_byte) else {
                // forward compatibility: skip kinds this build doesn't know
                continue;
            };
            match JournalRecord::decode_payload(record_type, &framed[ENVELOPE_SIZE..body_end]) {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!(offset, error = %err, "undecodable journal payload, discarding tail");
                    break;
                }
            }
        }

        Ok(records)
    }

    /// Replays committed transactions into `store`, then truncates.
    ///
    /// Only transactions whose `Begin` is followed by a matching `Commit`
    /// are applied; transactions still open at end-of-log and aborted
    /// transactions are discarded. Replay is idempotent: applying the
    /// same committed writes twice yields the same page-file state, and
    /// after truncation a second `recover` is a no-op.
    ///
    /// Returns the number of page operations applied.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors while applying to the store; scanning itself
    /// never raises.
    pub fn recover(&self, store: &PageStore) -> CoreResult<usize> {
        let records = self.read_all()?;
        if records.is_empty() {
            self.clear()?;
            return Ok(0);
        }

        let mut open: HashMap<TransactionId, Vec<JournalRecord>> = HashMap::new();
        let mut current: Option<TransactionId> = None;
        let mut applied = 0usize;

        for record in records {
            match record {
                JournalRecord::Begin { txid } => {
                    open.insert(txid, Vec::new());
                    current = Some(txid);
                }
                JournalRecord::Write { .. } | JournalRecord::Delete { .. } => {
                    if let Some(txid) = current {
                        if let Some(ops) = open.get_mut(&txid) {
                            ops.push(record);
                        }
                    }
                }
                JournalRecord::Commit { txid } => {
                    if let Some(ops) = open.remove(&txid) {
                        for op in ops {
                            match op {
                                JournalRecord::Write {
                                    page_index,
                                    payload,
                                } => {
                                    store.write(page_index, &payload)?;
                                    applied += 1;
                                }
                                JournalRecord::Delete { page_index } => {
                                    store.delete(page_index)?;
                                    applied += 1;
                                }
                                _ => {}
                            }
                        }
                    }
                    if current == Some(txid) {
                        current = None;
                    }
                }
                JournalRecord::Abort { txid } => {
                    open.remove(&txid);
                    if current == Some(txid) {
                        current = None;
                    }
                }
            }
        }

        if applied > 0 {
            info!(applied, "journal recovery applied committed operations");
        }
        self.clear()?;
        Ok(applied)
    }
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal")
            .field("sync_on_write", &self.sync_on_write)
            .finish_non_exhaustive()
    }
}
