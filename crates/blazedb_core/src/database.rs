//! Database client.
//!
//! Stitches the engine together: key derivation and the key-tag binding,
//! journal recovery, the collection behind a reader-writer lock, the
//! safe-write harness around every mutation, file-level transactions,
//! migrations, and integrity checking.

use crate::collection::query::Query;
use crate::collection::Collection;
use crate::config::Config;
use crate::crypto::{self, keytag, DerivedKey, KeyState, PayloadCipher};
use crate::error::{CoreError, CoreResult};
use crate::integrity::{self, ValidationReport};
use crate::journal::Journal;
use crate::migration::{MigrationRunReport, MigrationRunner};
use crate::page::{PageStats, PageStore};
use crate::paths::DatabasePaths;
use crate::safe_write::{self, SafeWriteHarness};
use crate::stats::{OpCounters, OpSnapshot};
use blazedb_codec::{Document, DocumentId, Value};
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use tracing::warn;

/// One record of the file-level transaction side log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "op")]
enum TxnLogEntry {
    Insert { id: DocumentId },
    Update { id: DocumentId },
    Delete { id: DocumentId },
    SoftDelete { id: DocumentId },
    Purge { count: usize },
    CreateIndex { name: String },
}

/// State of an open file-level transaction.
#[derive(Debug, Default)]
struct ClientTransaction {
    log: Vec<TxnLogEntry>,
}

/// An opened BlazeDB database: one collection in one page file.
///
/// All methods take `&self`; reads share the collection lock, mutations
/// take it exclusively and run inside the safe-write harness.
#[derive(Debug)]
pub struct Database {
    paths: DatabasePaths,
    project: String,
    collection: RwLock<Collection>,
    journal: Journal,
    harness: SafeWriteHarness,
    key: DerivedKey,
    key_state: KeyState,
    counters: OpCounters,
    txn: Mutex<Option<ClientTransaction>>,
    _lock_file: File,
}

impl Database {
    /// Opens (or creates) the database at `path`.
    ///
    /// The password is checked and the key derived before any file is
    /// touched, then: leftover crash artifacts are restored, the journal
    /// is replayed, the layout is loaded (or rebuilt), and indexes are
    /// brought up to date.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::PasswordTooWeak`] before any file exists,
    /// [`CoreError::DatabaseLocked`] when another opener is live, or on
    /// I/O errors.
    pub fn open(
        path: impl AsRef<Path>,
        password: &str,
        project: impl Into<String>,
    ) -> CoreResult<Self> {
        Self::open_with_config(path, password, project, Config::default())
    }

    /// Opens with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open).
    pub fn open_with_config(
        path: impl AsRef<Path>,
        password: &str,
        project: impl Into<String>,
        config: Config,
    ) -> CoreResult<Self> {
        let key = crypto::derive_key(password)?;
        Self::open_with_key(path, key, project, config)
    }

    /// Opens with an already-derived key.
    ///
    /// Used by the mount manager to reopen without retaining passwords.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open), minus the password policy.
    pub fn open_with_key(
        path: impl AsRef<Path>,
        key: DerivedKey,
        project: impl Into<String>,
        config: Config,
    ) -> CoreResult<Self> {
        let paths = DatabasePaths::new(path.as_ref());

        if !config.create_if_missing && !paths.page_file().exists() {
            return Err(CoreError::invalid_operation(format!(
                "database does not exist: {}",
                paths.page_file().display()
            )));
        }
        if let Some(parent) = paths.page_file().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(paths.lock_file())?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DatabaseLocked);
        }

        // a crash may have left either kind of snapshot behind; the
        // client-transaction snapshot wins because it is the coarser one
        restore_txn_artifacts(&paths);
        safe_write::restore_leftover_backups(&paths);

        let store = PageStore::open_with_page_size(paths.page_file(), config.page_size)?;
        let journal = Journal::open(&paths.journal_file(), config.sync_journal)?;
        journal.recover(&store)?;

        let key_state = keytag::check_or_create(&paths.keytag_file(), &key)?;
        if key_state == KeyState::Mismatch {
            warn!(path = %paths.page_file().display(), "key tag mismatch, operations will fail");
        }

        let cipher = config
            .encrypt_payloads
            .then(|| PayloadCipher::new(&key));
        let project = project.into();
        let collection = Collection::open(store, paths.clone(), project.clone(), cipher)?;

        Ok(Self {
            paths,
            project,
            collection: RwLock::new(collection),
            journal,
            harness: SafeWriteHarness::new(),
            key,
            key_state,
            counters: OpCounters::new(),
            txn: Mutex::new(None),
            _lock_file: lock_file,
        })
    }

    /// Returns the project tag.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Returns the path family of this database.
    #[must_use]
    pub fn paths(&self) -> &DatabasePaths {
        &self.paths
    }

    /// Returns the journal.
    #[must_use]
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Returns a copy of the derived key, for reopen-by-key flows.
    #[must_use]
    pub fn derived_key(&self) -> DerivedKey {
        self.key.clone()
    }

    // === CRUD ===

    /// Inserts a document and returns its id.
    ///
    /// # Errors
    ///
    /// Fails on key mismatch, id collisions, or I/O errors.
    pub fn insert(&self, doc: Document) -> CoreResult<DocumentId> {
        self.ensure_key()?;
        let id = {
            let mut collection = self.collection.write();
            self.harness
                .run(&self.paths, &mut collection, |c| c.insert(doc))?
        };
        self.counters.record_insert();
        self.txn_log(TxnLogEntry::Insert { id })?;
        Ok(id)
    }

    /// Fetches a document by id.
    ///
    /// # Errors
    ///
    /// Fails on key mismatch, malformed pages, or I/O errors.
    pub fn fetch(&self, id: DocumentId) -> CoreResult<Option<Document>> {
        self.ensure_key()?;
        let result = self.collection.read().fetch(id);
        self.counters.record_fetch();
        result
    }

    /// Returns all live documents.
    ///
    /// # Errors
    ///
    /// Fails on key mismatch, malformed pages, or I/O errors.
    pub fn fetch_all(&self) -> CoreResult<Vec<Document>> {
        self.ensure_key()?;
        let result = self.collection.read().fetch_all();
        self.counters.record_scan();
        result
    }

    /// Returns all live documents tagged with `project`.
    ///
    /// # Errors
    ///
    /// Fails on key mismatch, malformed pages, or I/O errors.
    pub fn fetch_all_by_project(&self, project: &str) -> CoreResult<Vec<Document>> {
        self.ensure_key()?;
        let result = self.collection.read().fetch_all_by_project(project);
        self.counters.record_scan();
        result
    }

    /// Single-field indexed lookup.
    ///
    /// # Errors
    ///
    /// Fails on key mismatch, malformed pages, or I/O errors.
    pub fn fetch_by_indexed_field(&self, field: &str, value: &Value) -> CoreResult<Vec<Document>> {
        self.ensure_key()?;
        let result = self.collection.read().fetch_by_indexed_field(field, value);
        self.counters.record_index_lookup();
        result
    }

    /// Compound indexed lookup.
    ///
    /// # Errors
    ///
    /// Fails on key mismatch, malformed pages, or I/O errors.
    pub fn fetch_by_indexed_fields(
        &self,
        fields: &[&str],
        values: &[Value],
    ) -> CoreResult<Vec<Document>> {
        self.ensure_key()?;
        let result = self
            .collection
            .read()
            .fetch_by_indexed_fields(fields, values);
        self.counters.record_index_lookup();
        result
    }

    /// Replaces the document at `id`.
    ///
    /// # Errors
    ///
    /// Fails on key mismatch, unknown ids, or I/O errors.
    pub fn update(&self, id: DocumentId, doc: Document) -> CoreResult<()> {
        self.ensure_key()?;
        {
            let mut collection = self.collection.write();
            self.harness
                .run(&self.paths, &mut collection, |c| c.update(id, doc))?;
        }
        self.counters.record_update();
        self.txn_log(TxnLogEntry::Update { id })?;
        Ok(())
    }

    /// Hard-deletes the document at `id`.
    ///
    /// # Errors
    ///
    /// Fails on key mismatch, unknown ids, or I/O errors.
    pub fn delete(&self, id: DocumentId) -> CoreResult<()> {
        self.ensure_key()?;
        {
            let mut collection = self.collection.write();
            self.harness
                .run(&self.paths, &mut collection, |c| c.delete(id))?;
        }
        self.counters.record_delete();
        self.txn_log(TxnLogEntry::Delete { id })?;
        Ok(())
    }

    /// Marks the document at `id` as soft-deleted.
    ///
    /// # Errors
    ///
    /// Fails on key mismatch, unknown ids, or I/O errors.
    pub fn soft_delete(&self, id: DocumentId) -> CoreResult<()> {
        self.ensure_key()?;
        {
            let mut collection = self.collection.write();
            self.harness
                .run(&self.paths, &mut collection, |c| c.soft_delete(id))?;
        }
        self.counters.record_update();
        self.txn_log(TxnLogEntry::SoftDelete { id })?;
        Ok(())
    }

    /// Hard-deletes every soft-deleted document.
    ///
    /// # Errors
    ///
    /// Fails on key mismatch or I/O errors.
    pub fn purge(&self) -> CoreResult<usize> {
        self.ensure_key()?;
        let count = {
            let mut collection = self.collection.write();
            self.harness
                .run(&self.paths, &mut collection, Collection::purge)?
        };
        self.counters.record_delete();
        self.txn_log(TxnLogEntry::Purge { count })?;
        Ok(count)
    }

    /// Applies a query by full scan.
    ///
    /// # Errors
    ///
    /// Fails on key mismatch, malformed pages, or I/O errors.
    pub fn run_query(&self, query: &Query) -> CoreResult<Vec<Document>> {
        self.ensure_key()?;
        let result = self.collection.read().run_query(query);
        self.counters.record_scan();
        result
    }

    /// Creates an index over `fields` (idempotent, with backfill).
    ///
    /// # Errors
    ///
    /// Fails on key mismatch or I/O errors.
    pub fn create_index(&self, fields: &[&str]) -> CoreResult<()> {
        self.ensure_key()?;
        {
            let mut collection = self.collection.write();
            self.harness
                .run(&self.paths, &mut collection, |c| c.create_index(fields))?;
        }
        self.txn_log(TxnLogEntry::CreateIndex {
            name: fields.join("+"),
        })?;
        Ok(())
    }

    /// Removes database and layout files and resets in-memory state.
    ///
    /// # Errors
    ///
    /// Fails on key mismatch or I/O errors.
    pub fn destroy(&self) -> CoreResult<()> {
        self.ensure_key()?;
        let mut collection = self.collection.write();
        collection.destroy()
    }

    // === file-level transactions ===

    /// Begins a file-level transaction: the live files are snapshotted
    /// to `txn_in_progress.*` and subsequent mutations are recorded in
    /// the side log.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::TransactionInProgress`] when one is
    /// already open, on key mismatch, or on I/O errors.
    pub fn begin_transaction(&self) -> CoreResult<()> {
        self.ensure_key()?;
        let mut txn = self.txn.lock();
        if txn.is_some() {
            return Err(CoreError::TransactionInProgress);
        }

        // hold the collection lock so the snapshot is a consistent pair
        let collection = self.collection.read();
        copy_if_exists(self.paths.page_file(), &self.paths.page_txn_snapshot())?;
        copy_if_exists(&self.paths.layout_file(), &self.paths.layout_txn_snapshot())?;
        drop(collection);

        fs::write(self.paths.txn_log_file(), b"[]")?;
        *txn = Some(ClientTransaction::default());
        Ok(())
    }

    /// Commits the file-level transaction: snapshots are discarded and
    /// the side log is cleared.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::NoTransaction`] when none is open.
    pub fn commit_transaction(&self) -> CoreResult<()> {
        self.ensure_key()?;
        let mut txn = self.txn.lock();
        if txn.take().is_none() {
            return Err(CoreError::NoTransaction);
        }
        self.clear_txn_files();
        Ok(())
    }

    /// Rolls the file-level transaction back: the snapshot pair is
    /// restored, the collection reloaded, and the side log cleared.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::NoTransaction`] when none is open, or on
    /// I/O errors while restoring.
    pub fn rollback_transaction(&self) -> CoreResult<()> {
        self.ensure_key()?;
        let mut txn = self.txn.lock();
        if txn.take().is_none() {
            return Err(CoreError::NoTransaction);
        }

        let mut collection = self.collection.write();
        restore_if_exists(&self.paths.page_txn_snapshot(), self.paths.page_file())?;
        restore_if_exists(&self.paths.layout_txn_snapshot(), &self.paths.layout_file())?;
        self.clear_txn_files();
        collection.reload_from_disk()
    }

    /// Returns whether a file-level transaction is open.
    #[must_use]
    pub fn transaction_in_progress(&self) -> bool {
        self.txn.lock().is_some()
    }

    // === maintenance ===

    /// Runs all pending migrations under safe-write protection.
    ///
    /// # Errors
    ///
    /// Fails on key mismatch, on the first failing migration (files
    /// restored), or on I/O errors.
    pub fn run_migrations(&self, runner: &MigrationRunner) -> CoreResult<MigrationRunReport> {
        self.ensure_key()?;
        let mut collection = self.collection.write();
        self.harness
            .run(&self.paths, &mut collection, |c| runner.run_pending(c))
    }

    /// Produces an integrity report.
    ///
    /// In strict mode any error-severity issue fails the call.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::IntegrityFailure`] in strict mode, on key
    /// mismatch, or on I/O errors.
    pub fn check_integrity(&self, strict: bool) -> CoreResult<ValidationReport> {
        self.ensure_key()?;
        let report = integrity::validate(&self.collection.read())?;
        if strict && report.error_count() > 0 {
            return Err(CoreError::IntegrityFailure {
                errors: report.error_count(),
            });
        }
        Ok(report)
    }

    /// Returns page index -> payload for every live page.
    ///
    /// # Errors
    ///
    /// Fails on key mismatch or I/O errors.
    pub fn raw_dump(&self) -> CoreResult<BTreeMap<u64, Vec<u8>>> {
        self.ensure_key()?;
        self.collection.read().raw_dump()
    }

    /// Returns page-file statistics.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    pub fn page_stats(&self) -> CoreResult<PageStats> {
        self.collection.read().page_stats()
    }

    /// Returns the operation counters.
    #[must_use]
    pub fn counters(&self) -> OpSnapshot {
        self.counters.snapshot()
    }

    /// Persists the layout and syncs the page file.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    pub fn flush(&self) -> CoreResult<()> {
        let collection = self.collection.read();
        collection.persist_layout()?;
        collection.store().sync()
    }

    /// Reloads layout state from disk after an external file change.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    pub fn reload(&self) -> CoreResult<()> {
        self.collection.write().reload_from_disk()
    }

    // === internals ===

    fn ensure_key(&self) -> CoreResult<()> {
        match self.key_state {
            KeyState::Verified => Ok(()),
            KeyState::Mismatch => Err(CoreError::KeyMismatch),
        }
    }

    /// Appends an entry to the side log when a transaction is open.
    fn txn_log(&self, entry: TxnLogEntry) -> CoreResult<()> {
        let mut txn = self.txn.lock();
        if let Some(txn) = txn.as_mut() {
            txn.log.push(entry);
            let data = serde_json::to_vec_pretty(&txn.log)
                .map_err(|err| CoreError::invalid_operation(err.to_string()))?;
            fs::write(self.paths.txn_log_file(), data)?;
        }
        Ok(())
    }

    fn clear_txn_files(&self) {
        for path in [
            self.paths.page_txn_snapshot(),
            self.paths.layout_txn_snapshot(),
            self.paths.txn_log_file(),
        ] {
            if let Err(err) = fs::remove_file(&path) {
                if err.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %err, "transaction cleanup failed");
                }
            }
        }
    }
}

/// Restores client-transaction snapshots a crash left behind.
fn restore_txn_artifacts(paths: &DatabasePaths) {
    let page_snapshot = paths.page_txn_snapshot();
    let layout_snapshot = paths.layout_txn_snapshot();
    if !page_snapshot.exists() && !layout_snapshot.exists() {
        // a stale side log without snapshots is just noise
        let _ = fs::remove_file(paths.txn_log_file());
        return;
    }

    warn!("interrupted client transaction found, restoring snapshot");
    if let Err(err) = restore_if_exists(&page_snapshot, paths.page_file()) {
        warn!(error = %err, "page snapshot restore failed");
    }
    if let Err(err) = restore_if_exists(&layout_snapshot, &paths.layout_file()) {
        warn!(error = %err, "layout snapshot restore failed");
    }
    let _ = fs::remove_file(paths.txn_log_file());
}

fn copy_if_exists(from: &Path, to: &Path) -> CoreResult<()> {
    match fs::copy(from, to) {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn restore_if_exists(snapshot: &Path, live: &Path) -> CoreResult<()> {
    if snapshot.exists() {
        fs::copy(snapshot, live)?;
        fs::remove_file(snapshot)?;
    }
    Ok(())
}
