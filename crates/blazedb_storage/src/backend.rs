//! Storage backend trait.

use crate::error::StorageResult;

/// A flat byte store underneath the page store and the journal.
///
/// Backends are **opaque**: they never interpret the bytes they hold.
/// The page store builds its fixed-size framing on top of `read_at` /
/// `write_at`, and the journal builds its append-only log on top of
/// `append` / `truncate`.
///
/// # Invariants
///
/// - `append` returns the offset the data landed at
/// - `read_at` returns exactly the bytes previously written there
/// - `write_at` past the current end zero-fills the gap
/// - after `sync` returns, all prior writes survive process death
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Fails with [`StorageError::ReadPastEnd`](crate::StorageError::ReadPastEnd)
    /// if any part of the range lies beyond the current size, or on I/O error.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Writes `data` at `offset`, extending the store if needed.
    ///
    /// When `offset` is beyond the current end, the gap is filled with
    /// zero bytes before the write.
    ///
    /// # Errors
    ///
    /// Fails on I/O error.
    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()>;

    /// Appends `data` at the end of the store and returns its offset.
    ///
    /// # Errors
    ///
    /// Fails on I/O error.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Returns the current size in bytes.
    ///
    /// This is also the offset the next `append` will write at.
    ///
    /// # Errors
    ///
    /// Fails if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Pushes buffered writes down to the operating system.
    ///
    /// # Errors
    ///
    /// Fails on I/O error.
    fn flush(&mut self) -> StorageResult<()>;

    /// Syncs data and metadata to durable storage.
    ///
    /// Stronger than `flush`: after this returns, file contents and size
    /// are both on disk.
    ///
    /// # Errors
    ///
    /// Fails on I/O error.
    fn sync(&mut self) -> StorageResult<()>;

    /// Discards everything after `new_size`.
    ///
    /// Used by the journal after commit and during recovery.
    ///
    /// # Errors
    ///
    /// Fails with [`StorageError::TruncateBeyondEnd`](crate::StorageError::TruncateBeyondEnd)
    /// if `new_size` exceeds the current size, or on I/O error.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;
}
