//! File-level safe-write harness.
//!
//! Every mutating client call runs inside this harness: the page file
//! and the layout file are copied to sibling `*_backup.*` paths first,
//! the backups are deleted on success, and on failure both files are
//! restored, the collection is reloaded from disk, and the original
//! error is re-raised. Nested invocations short-circuit and just run
//! the body, so a client method calling another client method snapshots
//! once.

use crate::collection::Collection;
use crate::error::CoreResult;
use crate::paths::DatabasePaths;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::warn;

/// Snapshot/restore wrapper around mutating operations.
#[derive(Debug, Default)]
pub struct SafeWriteHarness {
    active: AtomicBool,
}

impl SafeWriteHarness {
    /// Creates an idle harness.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `body` under snapshot protection.
    ///
    /// The caller must already hold the collection's write lock; the
    /// harness itself only manages files.
    ///
    /// # Errors
    ///
    /// Re-raises whatever `body` failed with, after restoring the
    /// snapshots and reloading the collection.
    pub fn run<T>(
        &self,
        paths: &DatabasePaths,
        collection: &mut Collection,
        body: impl FnOnce(&mut Collection) -> CoreResult<T>,
    ) -> CoreResult<T> {
        if self.active.swap(true, Ordering::AcqRel) {
            // nested safe-write: the outer snapshot already protects us
            return body(collection);
        }

        let result = self.run_protected(paths, collection, body);
        self.active.store(false, Ordering::Release);
        result
    }

    fn run_protected<T>(
        &self,
        paths: &DatabasePaths,
        collection: &mut Collection,
        body: impl FnOnce(&mut Collection) -> CoreResult<T>,
    ) -> CoreResult<T> {
        snapshot(paths)?;

        match body(collection) {
            Ok(value) => {
                discard_snapshot(paths);
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, "mutation failed, restoring snapshot");
                restore_snapshot(paths);
                if let Err(reload_err) = collection.reload_from_disk() {
                    warn!(error = %reload_err, "reload after restore failed");
                }
                Err(err)
            }
        }
    }
}

/// Copies the live files to their backup paths, overwriting any prior
/// backup.
fn snapshot(paths: &DatabasePaths) -> CoreResult<()> {
    copy_if_exists(paths.page_file(), &paths.page_backup())?;
    copy_if_exists(&paths.layout_file(), &paths.layout_backup())?;
    Ok(())
}

/// Deletes the backups after a successful mutation.
fn discard_snapshot(paths: &DatabasePaths) {
    remove_quietly(&paths.page_backup());
    remove_quietly(&paths.layout_backup());
}

/// Copies the backups over the live files and deletes them.
fn restore_snapshot(paths: &DatabasePaths) {
    restore_one(&paths.page_backup(), paths.page_file());
    restore_one(&paths.layout_backup(), &paths.layout_file());
}

/// Restores any backups a crashed process left behind; called at open.
///
/// Returns whether anything was restored.
pub fn restore_leftover_backups(paths: &DatabasePaths) -> bool {
    let had_backups = paths.page_backup().exists() || paths.layout_backup().exists();
    if had_backups {
        warn!("leftover safe-write backups found, restoring");
        restore_snapshot(paths);
    }
    had_backups
}

fn copy_if_exists(from: &Path, to: &Path) -> CoreResult<()> {
    match fs::copy(from, to) {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn restore_one(backup: &Path, live: &Path) {
    if backup.exists() {
        if let Err(err) = fs::copy(backup, live) {
            warn!(backup = %backup.display(), error = %err, "backup restore failed");
            return;
        }
        remove_quietly(backup);
    }
}

fn remove_quietly(path: &Path) {
    if let Err(err) = fs::remove_file(path) {
        if err.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %err, "backup cleanup failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::page::PageStore;
    use blazedb_codec::Document;
    use tempfile::{tempdir, TempDir};

    fn open_fixture() -> (TempDir, DatabasePaths, Collection) {
        let dir = tempdir().unwrap();
        let paths = DatabasePaths::new(dir.path().join("db.bzdb"));
        let store = PageStore::open_with_page_size(paths.page_file(), 512).unwrap();
        let collection = Collection::open(store, paths.clone(), "proj", None).unwrap();
        (dir, paths, collection)
    }

    fn titled(title: &str) -> Document {
        let mut doc = Document::new();
        doc.set("title", title);
        doc
    }

    #[test]
    fn success_discards_backups() {
        let (_dir, paths, mut collection) = open_fixture();
        let harness = SafeWriteHarness::new();

        harness
            .run(&paths, &mut collection, |c| c.insert(titled("kept")))
            .unwrap();

        assert!(!paths.page_backup().exists());
        assert!(!paths.layout_backup().exists());
        assert_eq!(collection.len(), 1);
    }

    #[test]
    fn failure_restores_prior_state() {
        let (_dir, paths, mut collection) = open_fixture();
        let harness = SafeWriteHarness::new();
        let id = harness
            .run(&paths, &mut collection, |c| c.insert(titled("before")))
            .unwrap();

        let result: CoreResult<()> = harness.run(&paths, &mut collection, |c| {
            c.insert(titled("phantom"))?;
            Err(CoreError::invalid_operation("forced failure"))
        });
        assert!(result.is_err());

        // the phantom insert is gone, the original record intact
        assert_eq!(collection.len(), 1);
        let doc = collection.fetch(id).unwrap().unwrap();
        assert_eq!(doc.get("title").unwrap().as_text(), Some("before"));
        assert!(!paths.page_backup().exists());
    }

    #[test]
    fn nested_runs_snapshot_once() {
        let (_dir, paths, mut collection) = open_fixture();
        let harness = SafeWriteHarness::new();

        let result: CoreResult<()> = harness.run(&paths, &mut collection, |c| {
            c.insert(titled("outer"))?;
            // inner failure propagates; the outer harness restores
            harness.run(&paths, c, |c| {
                c.insert(titled("inner"))?;
                Err(CoreError::invalid_operation("inner failure"))
            })
        });
        assert!(result.is_err());
        assert_eq!(collection.len(), 0);
    }

    #[test]
    fn leftover_backups_restore_on_open() {
        let (_dir, paths, mut collection) = open_fixture();
        let id = collection.insert(titled("original")).unwrap();

        // simulate a crash mid-mutation: snapshot exists, live files mutated
        snapshot(&paths).unwrap();
        collection.update(id, titled("halfway")).unwrap();

        assert!(restore_leftover_backups(&paths));
        collection.reload_from_disk().unwrap();

        let doc = collection.fetch(id).unwrap().unwrap();
        assert_eq!(doc.get("title").unwrap().as_text(), Some("original"));
        assert!(!restore_leftover_backups(&paths));
    }

    #[test]
    fn corrupt_layout_after_restore_is_rebuilt() {
        let (_dir, paths, mut collection) = open_fixture();
        let id = collection.insert(titled("survivor")).unwrap();

        // the on-disk layout is already garbage when the mutation starts,
        // so the snapshot and the restore both carry garbage
        std::fs::write(paths.layout_file(), b"{broken").unwrap();

        let harness = SafeWriteHarness::new();
        let result: CoreResult<()> = harness.run(&paths, &mut collection, |_| {
            Err(CoreError::invalid_operation("trigger restore"))
        });
        assert!(result.is_err());

        // the reload deleted the corrupt layout and rebuilt from pages
        let doc = collection.fetch(id).unwrap().unwrap();
        assert_eq!(doc.get("title").unwrap().as_text(), Some("survivor"));
    }
}
