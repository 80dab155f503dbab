//! Error types for the BlazeDB engine.

use blazedb_codec::DocumentId;
use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors produced by the BlazeDB engine.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] blazedb_storage::StorageError),

    /// Document codec error.
    #[error("codec error: {0}")]
    Codec(#[from] blazedb_codec::CodecError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A document id has no record.
    #[error("document not found: {id}")]
    NotFound {
        /// The id that was looked up.
        id: DocumentId,
    },

    /// An insert supplied an id that is already mapped.
    #[error("document already exists: {id}")]
    AlreadyExists {
        /// The colliding id.
        id: DocumentId,
    },

    /// A payload exceeds the page capacity.
    #[error("payload of {size} bytes exceeds page capacity of {max} bytes")]
    TooLarge {
        /// Payload size in bytes.
        size: usize,
        /// Maximum payload a page can hold.
        max: usize,
    },

    /// A page header is present but does not match magic + version.
    #[error("invalid page header at page {page_index}")]
    InvalidHeader {
        /// Index of the offending page.
        page_index: u64,
    },

    /// The page file is bound to a different key than this opener's.
    #[error("page file is bound to a different key")]
    KeyMismatch,

    /// The password failed the derivation policy.
    #[error("password too weak: at least {min} characters required")]
    PasswordTooWeak {
        /// Minimum accepted length.
        min: usize,
    },

    /// The layout file could not be parsed.
    ///
    /// Handled locally: the file is deleted and the layout rebuilt from
    /// the page file, which is the source of truth for records.
    #[error("layout corrupt: {message}")]
    LayoutCorrupt {
        /// Description of the problem.
        message: String,
    },

    /// The journal could not be parsed.
    ///
    /// Handled locally: the journal is treated as empty and the store
    /// remains usable.
    #[error("journal corrupt: {message}")]
    JournalCorrupt {
        /// Description of the problem.
        message: String,
    },

    /// `beginTransaction` while a file-level transaction is already open.
    #[error("a transaction is already in progress")]
    TransactionInProgress,

    /// Commit or rollback without an open file-level transaction.
    #[error("no transaction in progress")]
    NoTransaction,

    /// An operation on a committed or rolled-back transaction context.
    #[error("transaction already finalized ({state})")]
    AlreadyFinalized {
        /// The state the transaction was found in.
        state: &'static str,
    },

    /// Strict integrity checking found errors.
    #[error("integrity check failed with {errors} error(s)")]
    IntegrityFailure {
        /// Number of error-severity issues.
        errors: usize,
    },

    /// Another live opener holds the database lock.
    #[error("database locked: another opener holds exclusive access")]
    DatabaseLocked,

    /// No database is mounted under the given name.
    #[error("no database mounted as {name:?}")]
    MountNotFound {
        /// The requested mount name.
        name: String,
    },

    /// A migration could not be registered or applied.
    #[error("migration failed: {message}")]
    MigrationFailed {
        /// Description of the failure.
        message: String,
    },

    /// Payload encryption or decryption failed.
    #[error("crypto failure: {message}")]
    Crypto {
        /// Description of the failure.
        message: String,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },
}

impl CoreError {
    /// Creates a not-found error.
    pub fn not_found(id: DocumentId) -> Self {
        Self::NotFound { id }
    }

    /// Creates an already-exists error.
    pub fn already_exists(id: DocumentId) -> Self {
        Self::AlreadyExists { id }
    }

    /// Creates a layout-corrupt error.
    pub fn layout_corrupt(message: impl Into<String>) -> Self {
        Self::LayoutCorrupt {
            message: message.into(),
        }
    }

    /// Creates a journal-corrupt error.
    pub fn journal_corrupt(message: impl Into<String>) -> Self {
        Self::JournalCorrupt {
            message: message.into(),
        }
    }

    /// Creates a migration-failed error.
    pub fn migration_failed(message: impl Into<String>) -> Self {
        Self::MigrationFailed {
            message: message.into(),
        }
    }

    /// Creates a crypto error.
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Creates an invalid-operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }
}
