//! On-disk file naming for one database.
//!
//! A database opened at `<dir>/<name>` owns a family of sibling files:
//!
//! ```text
//! <name>                          page file (framed fixed-size pages)
//! <name>.layout.json              storage layout
//! <name>.indexes.json             secondary-index materialization sidecar
//! <name>.journal                  write-ahead journal
//! <name>.keytag                   keyed MAC binding the file to its key
//! <name>.lock                     advisory lock for the live opener
//! <name>_backup                   safe-write snapshot of the page file
//! <name>.layout.json_backup       safe-write snapshot of the layout
//! <name>.txn_in_progress          client-transaction snapshot (page file)
//! <name>.layout.json.txn_in_progress   client-transaction snapshot (layout)
//! <name>.txn_log.json             client-transaction side log
//! ```

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Derives all sibling file paths from the page-file path.
#[derive(Debug, Clone)]
pub struct DatabasePaths {
    page_file: PathBuf,
}

impl DatabasePaths {
    /// Creates the path family rooted at `page_file`.
    #[must_use]
    pub fn new(page_file: impl Into<PathBuf>) -> Self {
        Self {
            page_file: page_file.into(),
        }
    }

    /// Returns the page file path.
    #[must_use]
    pub fn page_file(&self) -> &Path {
        &self.page_file
    }

    /// Returns the layout file path.
    #[must_use]
    pub fn layout_file(&self) -> PathBuf {
        self.with_suffix(".layout.json")
    }

    /// Returns the indexes sidecar path.
    #[must_use]
    pub fn indexes_file(&self) -> PathBuf {
        self.with_suffix(".indexes.json")
    }

    /// Returns the journal path.
    #[must_use]
    pub fn journal_file(&self) -> PathBuf {
        self.with_suffix(".journal")
    }

    /// Returns the key-tag sidecar path.
    #[must_use]
    pub fn keytag_file(&self) -> PathBuf {
        self.with_suffix(".keytag")
    }

    /// Returns the lock file path.
    #[must_use]
    pub fn lock_file(&self) -> PathBuf {
        self.with_suffix(".lock")
    }

    /// Returns the safe-write backup path of the page file.
    #[must_use]
    pub fn page_backup(&self) -> PathBuf {
        self.with_suffix("_backup")
    }

    /// Returns the safe-write backup path of the layout file.
    #[must_use]
    pub fn layout_backup(&self) -> PathBuf {
        append_suffix(&self.layout_file(), "_backup")
    }

    /// Returns the client-transaction snapshot path of the page file.
    #[must_use]
    pub fn page_txn_snapshot(&self) -> PathBuf {
        self.with_suffix(".txn_in_progress")
    }

    /// Returns the client-transaction snapshot path of the layout file.
    #[must_use]
    pub fn layout_txn_snapshot(&self) -> PathBuf {
        append_suffix(&self.layout_file(), ".txn_in_progress")
    }

    /// Returns the client-transaction side log path.
    #[must_use]
    pub fn txn_log_file(&self) -> PathBuf {
        self.with_suffix(".txn_log.json")
    }

    fn with_suffix(&self, suffix: &str) -> PathBuf {
        append_suffix(&self.page_file, suffix)
    }
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.file_name().unwrap_or_default());
    name.push(suffix);
    path.with_file_name(name)
}
