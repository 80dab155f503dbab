//! In-process transaction context.

use crate::error::{CoreError, CoreResult};
use crate::journal::log::Journal;
use crate::journal::record::{JournalRecord, TransactionId};
use crate::page::PageStore;

/// Lifecycle state of a transaction context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Accepting operations.
    Open,
    /// Finalized by commit.
    Committed,
    /// Finalized by rollback.
    RolledBack,
}

impl TransactionState {
    fn name(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Committed => "committed",
            Self::RolledBack => "rolled back",
        }
    }
}

/// One buffered page operation.
#[derive(Debug, Clone)]
enum BufferedOp {
    Write { page_index: u64, payload: Vec<u8> },
    Delete { page_index: u64 },
}

/// A journalled multi-page transaction.
///
/// Writes and deletes are appended to the journal immediately and
/// buffered in memory; the page file is untouched until commit. Reads
/// see the buffer first and fall back to the store. Every operation
/// checks the state: a finalized context rejects everything with
/// [`CoreError::AlreadyFinalized`].
///
/// Commit order matters for crash safety: the `Commit` marker is made
/// durable first, then the buffer is flushed into the store, then the
/// journal is truncated. A crash between marker and flush is repaired by
/// [`Journal::recover`]. Rollback leaves the page file untouched; its
/// journalled writes lack a `Commit` and are never replayed.
#[derive(Debug)]
pub struct TransactionContext<'a> {
    id: TransactionId,
    journal: &'a Journal,
    store: &'a PageStore,
    ops: Vec<BufferedOp>,
    state: TransactionState,
}

impl<'a> TransactionContext<'a> {
    /// Opens a transaction, appending its `Begin` marker.
    ///
    /// # Errors
    ///
    /// Fails on journal I/O error.
    pub fn begin(
        journal: &'a Journal,
        store: &'a PageStore,
        id: TransactionId,
    ) -> CoreResult<Self> {
        journal.append(&JournalRecord::Begin { txid: id })?;
        Ok(Self {
            id,
            journal,
            store,
            ops: Vec::new(),
            state: TransactionState::Open,
        })
    }

    /// Returns the transaction id.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TransactionState {
        self.state
    }

    /// Returns the number of buffered operations.
    #[must_use]
    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// Buffers a page write and journals it.
    ///
    /// # Errors
    ///
    /// Fails if the context is finalized or on journal I/O error.
    pub fn write(&mut self, page_index: u64, payload: Vec<u8>) -> CoreResult<()> {
        self.ensure_open()?;
        self.journal.append(&JournalRecord::Write {
            page_index,
            payload: payload.clone(),
        })?;
        self.ops.push(BufferedOp::Write {
            page_index,
            payload,
        });
        Ok(())
    }

    /// Buffers a page delete and journals it.
    ///
    /// # Errors
    ///
    /// Fails if the context is finalized or on journal I/O error.
    pub fn delete(&mut self, page_index: u64) -> CoreResult<()> {
        self.ensure_open()?;
        self.journal
            .append(&JournalRecord::Delete { page_index })?;
        self.ops.push(BufferedOp::Delete { page_index });
        Ok(())
    }

    /// Reads a page through the buffer.
    ///
    /// The latest buffered write or delete for the page wins; otherwise
    /// the store is consulted.
    ///
    /// # Errors
    ///
    /// Fails if the context is finalized or on store errors.
    pub fn read(&self, page_index: u64) -> CoreResult<Option<Vec<u8>>> {
        self.ensure_open()?;
        for op in self.ops.iter().rev() {
            match op {
                BufferedOp::Write {
                    page_index: idx,
                    payload,
                } if *idx == page_index => return Ok(Some(payload.clone())),
                BufferedOp::Delete { page_index: idx } if *idx == page_index => {
                    return Ok(None);
                }
                _ => {}
            }
        }
        self.store.read(page_index)
    }

    /// Commits: durable `Commit` marker, buffer flush in insertion
    /// order, journal truncation.
    ///
    /// # Errors
    ///
    /// Fails if the context is finalized or on I/O errors. A failure
    /// after the marker is repaired by recovery on next open.
    pub fn commit(&mut self) -> CoreResult<()> {
        self.ensure_open()?;
        self.journal
            .append(&JournalRecord::Commit { txid: self.id })?;

        for op in &self.ops {
            match op {
                BufferedOp::Write {
                    page_index,
                    payload,
                } => self.store.write(*page_index, payload)?,
                BufferedOp::Delete { page_index } => self.store.delete(*page_index)?,
            }
        }

        self.journal.clear()?;
        self.state = TransactionState::Committed;
        Ok(())
    }

    /// Rolls back: `Abort` marker, buffer discarded, store untouched.
    ///
    /// # Errors
    ///
    /// Fails if the context is finalized or on journal I/O error.
    pub fn rollback(&mut self) -> CoreResult<()> {
        self.ensure_open()?;
        self.journal
            .append(&JournalRecord::Abort { txid: self.id })?;
        self.journal.clear()?;
        self.ops.clear();
        self.state = TransactionState::RolledBack;
        Ok(())
    }

    fn ensure_open(&self) -> CoreResult<()> {
        match self.state {
            TransactionState::Open => Ok(()),
            state => Err(CoreError::AlreadyFinalized {
                state: state.name(),
            }),
        }
    }
}
