//! In-process database mount manager.
//!
//! A registry of opened databases keyed by name, with current-selection
//! semantics. The manager is an explicit value the application owns and
//! passes around; there is no process-global state. Nothing is shared
//! between mounted databases and switching is a pure pointer change.

use crate::config::Config;
use crate::crypto::DerivedKey;
use crate::database::Database;
use crate::error::{CoreError, CoreResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One mounted database and the facts needed to reopen it.
#[derive(Debug)]
struct Mount {
    db: Arc<Database>,
    path: PathBuf,
    meta_path: PathBuf,
    key: DerivedKey,
    config: Config,
}

/// Registry of opened databases with a current selection.
#[derive(Debug, Default)]
pub struct MountManager {
    mounts: BTreeMap<String, Mount>,
    current: Option<String>,
}

impl MountManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens the database at `path` and registers it as `name`, making
    /// it current. The mount name doubles as the project tag.
    ///
    /// # Errors
    ///
    /// Fails on open errors; an existing mount under `name` is replaced
    /// only after the new open succeeds.
    pub fn mount(
        &mut self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
        password: &str,
    ) -> CoreResult<()> {
        self.mount_with_config(name, path, password, Config::default())
    }

    /// [`mount`](Self::mount) with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Same as [`mount`](Self::mount).
    pub fn mount_with_config(
        &mut self,
        name: impl Into<String>,
        path: impl AsRef<Path>,
        password: &str,
        config: Config,
    ) -> CoreResult<()> {
        let name = name.into();
        let path = path.as_ref().to_path_buf();

        let db = Database::open_with_config(&path, password, name.clone(), config.clone())?;
        let meta_path = db.paths().layout_file();
        let key = db.derived_key();

        self.mounts.insert(
            name.clone(),
            Mount {
                db: Arc::new(db),
                path,
                meta_path,
                key,
                config,
            },
        );
        self.current = Some(name);
        Ok(())
    }

    /// Makes `name` the current database.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::MountNotFound`] for unknown names.
    pub fn use_database(&mut self, name: &str) -> CoreResult<()> {
        if !self.mounts.contains_key(name) {
            return Err(CoreError::MountNotFound {
                name: name.to_string(),
            });
        }
        self.current = Some(name.to_string());
        Ok(())
    }

    /// Alias of [`use_database`](Self::use_database).
    ///
    /// # Errors
    ///
    /// Same as [`use_database`](Self::use_database).
    pub fn switch_to(&mut self, name: &str) -> CoreResult<()> {
        self.use_database(name)
    }

    /// Returns the current database, if any.
    #[must_use]
    pub fn current(&self) -> Option<Arc<Database>> {
        let name = self.current.as_ref()?;
        self.mounts.get(name).map(|mount| Arc::clone(&mount.db))
    }

    /// Returns the current mount name, if any.
    #[must_use]
    pub fn current_name(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Returns the database mounted as `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Database>> {
        self.mounts.get(name).map(|mount| Arc::clone(&mount.db))
    }

    /// Returns `(path, metaPath)` remembered for `name`.
    #[must_use]
    pub fn mount_paths(&self, name: &str) -> Option<(PathBuf, PathBuf)> {
        self.mounts
            .get(name)
            .map(|mount| (mount.path.clone(), mount.meta_path.clone()))
    }

    /// Returns the mount names in order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.mounts.keys().cloned().collect()
    }

    /// Drops the mount under `name`. No on-disk effect.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::MountNotFound`] for unknown names.
    pub fn unmount(&mut self, name: &str) -> CoreResult<()> {
        if self.mounts.remove(name).is_none() {
            return Err(CoreError::MountNotFound {
                name: name.to_string(),
            });
        }
        if self.current.as_deref() == Some(name) {
            self.current = None;
        }
        Ok(())
    }

    /// Drops every mount. No on-disk effect.
    pub fn unmount_all(&mut self) {
        self.mounts.clear();
        self.current = None;
    }

    /// Reopens `name` from disk, for use after external file changes.
    ///
    /// The retained derived key is reused; no password is stored.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::MountNotFound`] for unknown names, or on
    /// reopen errors, in which case the mount is dropped (the old handle
    /// must be released to give up the advisory lock before reopening).
    pub fn reload(&mut self, name: &str) -> CoreResult<()> {
        let Some(old) = self.mounts.remove(name) else {
            return Err(CoreError::MountNotFound {
                name: name.to_string(),
            });
        };
        let path = old.path.clone();
        let key = old.key.clone();
        let config = old.config.clone();

        // the old handle holds the advisory lock; release it first
        drop(old);

        match Database::open_with_key(&path, key.clone(), name, config.clone()) {
            Ok(db) => {
                let meta_path = db.paths().layout_file();
                self.mounts.insert(
                    name.to_string(),
                    Mount {
                        db: Arc::new(db),
                        path,
                        meta_path,
                        key,
                        config,
                    },
                );
                Ok(())
            }
            Err(err) => {
                if self.current.as_deref() == Some(name) {
                    self.current = None;
                }
                Err(err)
            }
        }
    }

    /// Forwards a flush to every mounted database.
    ///
    /// # Errors
    ///
    /// Fails on the first flush error.
    pub fn flush_all(&self) -> CoreResult<()> {
        for mount in self.mounts.values() {
            mount.db.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blazedb_codec::Document;
    use tempfile::tempdir;

    const PASSWORD: &str = "manager test password";

    fn titled(title: &str) -> Document {
        let mut doc = Document::new();
        doc.set("title", title);
        doc
    }

    #[test]
    fn mount_sets_current() {
        let dir = tempdir().unwrap();
        let mut manager = MountManager::new();

        assert!(manager.current().is_none());
        manager
            .mount("alpha", dir.path().join("alpha.bzdb"), PASSWORD)
            .unwrap();

        assert_eq!(manager.current_name(), Some("alpha"));
        assert!(manager.current().is_some());
    }

    #[test]
    fn switching_is_a_pointer_change() {
        let dir = tempdir().unwrap();
        let mut manager = MountManager::new();
        manager
            .mount("alpha", dir.path().join("alpha.bzdb"), PASSWORD)
            .unwrap();
        manager
            .mount("beta", dir.path().join("beta.bzdb"), PASSWORD)
            .unwrap();

        assert_eq!(manager.current_name(), Some("beta"));
        manager.use_database("alpha").unwrap();
        assert_eq!(manager.current_name(), Some("alpha"));
        manager.switch_to("beta").unwrap();
        assert_eq!(manager.current_name(), Some("beta"));
    }

    #[test]
    fn mounts_are_isolated() {
        let dir = tempdir().unwrap();
        let mut manager = MountManager::new();
        manager
            .mount("alpha", dir.path().join("alpha.bzdb"), PASSWORD)
            .unwrap();
        manager
            .mount("beta", dir.path().join("beta.bzdb"), PASSWORD)
            .unwrap();

        manager
            .get("alpha")
            .unwrap()
            .insert(titled("only in alpha"))
            .unwrap();

        assert_eq!(manager.get("alpha").unwrap().fetch_all().unwrap().len(), 1);
        assert!(manager.get("beta").unwrap().fetch_all().unwrap().is_empty());
    }

    #[test]
    fn unknown_names_fail() {
        let mut manager = MountManager::new();
        assert!(matches!(
            manager.use_database("ghost"),
            Err(CoreError::MountNotFound { .. })
        ));
        assert!(matches!(
            manager.unmount("ghost"),
            Err(CoreError::MountNotFound { .. })
        ));
        assert!(matches!(
            manager.reload("ghost"),
            Err(CoreError::MountNotFound { .. })
        ));
    }

    #[test]
    fn unmount_clears_current_selection() {
        let dir = tempdir().unwrap();
        let mut manager = MountManager::new();
        manager
            .mount("alpha", dir.path().join("alpha.bzdb"), PASSWORD)
            .unwrap();

        manager.unmount("alpha").unwrap();
        assert!(manager.current().is_none());
        assert!(manager.names().is_empty());
    }

    #[test]
    fn unmount_all_drops_everything() {
        let dir = tempdir().unwrap();
        let mut manager = MountManager::new();
        manager
            .mount("alpha", dir.path().join("alpha.bzdb"), PASSWORD)
            .unwrap();
        manager
            .mount("beta", dir.path().join("beta.bzdb"), PASSWORD)
            .unwrap();

        manager.unmount_all();
        assert!(manager.names().is_empty());
        assert!(manager.current().is_none());
    }

    #[test]
    fn reload_reopens_from_disk() {
        let dir = tempdir().unwrap();
        let mut manager = MountManager::new();
        manager
            .mount("alpha", dir.path().join("alpha.bzdb"), PASSWORD)
            .unwrap();
        let id = manager
            .current()
            .unwrap()
            .insert(titled("survives reload"))
            .unwrap();

        manager.reload("alpha").unwrap();
        let doc = manager.get("alpha").unwrap().fetch(id).unwrap().unwrap();
        assert_eq!(doc.get("title").unwrap().as_text(), Some("survives reload"));
    }

    #[test]
    fn mount_paths_are_remembered() {
        let dir = tempdir().unwrap();
        let mut manager = MountManager::new();
        let db_path = dir.path().join("alpha.bzdb");
        manager.mount("alpha", &db_path, PASSWORD).unwrap();

        let (path, meta_path) = manager.mount_paths("alpha").unwrap();
        assert_eq!(path, db_path);
        assert!(meta_path.to_string_lossy().ends_with(".layout.json"));
    }

    #[test]
    fn flush_all_touches_every_mount() {
        let dir = tempdir().unwrap();
        let mut manager = MountManager::new();
        manager
            .mount("alpha", dir.path().join("alpha.bzdb"), PASSWORD)
            .unwrap();
        manager
            .mount("beta", dir.path().join("beta.bzdb"), PASSWORD)
            .unwrap();

        manager.get("alpha").unwrap().insert(titled("a")).unwrap();
        manager.flush_all().unwrap();
    }
}
