//! Persistent storage layout.
//!
//! The layout carries everything about a collection except the record
//! pages themselves: the id -> page map, the next free page slot, the
//! secondary-index catalog and materializations, and free-form metadata.
//! It persists as a UTF-8 self-describing JSON dictionary; unknown keys
//! are ignored on load.
//!
//! The page file is the source of truth for records, so a layout that
//! cannot be parsed is deleted and rebuilt rather than failing the open.

use crate::error::{CoreError, CoreResult};
use crate::index::{CompoundKey, IndexBuckets};
use crate::page::PageStore;
use blazedb_codec::{Document, DocumentId, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use tracing::warn;

/// Current layout format version.
///
/// Version 1 stored single-component index keys as bare value strings;
/// version 2 stores every key as a compound-component array.
pub const LAYOUT_VERSION: u32 = 2;

/// In-memory and on-disk layout of one collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Layout {
    /// Document id -> page index. Ids are unique; no page index repeats.
    pub index_map: BTreeMap<DocumentId, u64>,

    /// Smallest never-used page slot; strictly greater than every mapped
    /// page index.
    pub next_page_index: u64,

    /// Compound index name -> ordered field list.
    pub secondary_index_definitions: BTreeMap<String, Vec<String>>,

    /// Compound index name -> (encoded compound key -> ids).
    pub secondary_indexes: BTreeMap<String, IndexBuckets>,

    /// Free-form metadata; the migration subsystem keeps the schema
    /// version here.
    pub meta_data: BTreeMap<String, Value>,

    /// Optional field-name -> type-name hints.
    pub field_types: BTreeMap<String, String>,

    /// Layout format version.
    pub version: u32,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            index_map: BTreeMap::new(),
            next_page_index: 0,
            secondary_index_definitions: BTreeMap::new(),
            secondary_indexes: BTreeMap::new(),
            meta_data: BTreeMap::new(),
            field_types: BTreeMap::new(),
            version: LAYOUT_VERSION,
        }
    }
}

impl Layout {
    /// Creates an empty layout at the current version.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a layout from `path`.
    ///
    /// Missing file -> empty layout. Unparseable file -> logged, deleted,
    /// empty layout. Older version -> structurally migrated and bumped.
    ///
    /// # Errors
    ///
    /// Fails only on I/O errors other than "not found".
    pub fn load(path: &Path) -> CoreResult<Self> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::new());
            }
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(raw) => Ok(Self::from_raw(raw)),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "layout unparseable, starting empty");
                fs::remove_file(path)?;
                Ok(Self::new())
            }
        }
    }

    /// Builds a layout from parsed JSON, applying legacy migrations.
    fn from_raw(mut raw: serde_json::Value) -> Self {
        let version = raw
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(1) as u32;

        if version < LAYOUT_VERSION {
            migrate_v1(&mut raw);
        }

        match serde_json::from_value::<Layout>(raw) {
            Ok(mut layout) => {
                layout.version = LAYOUT_VERSION;
                layout
            }
            Err(err) => {
                warn!(error = %err, "layout shape invalid after migration, starting empty");
                Self::new()
            }
        }
    }

    /// Saves the layout atomically: temp file, sync, rename.
    ///
    /// # Errors
    ///
    /// Fails on I/O or serialization errors.
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        let data = serde_json::to_vec_pretty(self)
            .map_err(|err| CoreError::layout_corrupt(err.to_string()))?;
        write_atomic(path, &data)
    }

    /// Saves the full index materialization to the sidecar file.
    ///
    /// # Errors
    ///
    /// Fails on I/O or serialization errors.
    pub fn save_indexes(&self, path: &Path) -> CoreResult<()> {
        let data = serde_json::to_vec_pretty(&self.secondary_indexes)
            .map_err(|err| CoreError::layout_corrupt(err.to_string()))?;
        write_atomic(path, &data)
    }

    /// Loads the indexes sidecar, if present, replacing the in-layout
    /// materialization (the sidecar is the more recent redundant copy).
    ///
    /// An unparseable sidecar is logged and removed; the in-layout copy
    /// stands.
    ///
    /// # Errors
    ///
    /// Fails only on I/O errors other than "not found".
    pub fn load_indexes_sidecar(&mut self, path: &Path) -> CoreResult<()> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        };

        match serde_json::from_slice::<BTreeMap<String, IndexBuckets>>(&bytes) {
            Ok(materialization) => {
                self.secondary_indexes = materialization;
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "indexes sidecar unparseable, ignoring");
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    /// Reconstructs `index_map` and `next_page_index` by scanning the
    /// page store.
    ///
    /// Orphaned and undecodable pages are skipped. Secondary indexes are
    /// *not* touched here; the collection rebuilds them from the
    /// definitions.
    ///
    /// # Errors
    ///
    /// Fails on I/O error.
    pub fn rebuild_records_from_store(&mut self, store: &PageStore) -> CoreResult<()> {
        self.index_map.clear();
        let total = store.page_count()?;

        for index in 0..total {
            let payload = match store.read(index) {
                Ok(Some(payload)) => payload,
                Ok(None) => continue,
                Err(CoreError::InvalidHeader { .. }) => continue,
                Err(err) => return Err(err),
            };
            let mut padded = payload;
            padded.resize(store.max_payload(), 0);
            let Ok(doc) = Document::decode(&padded) else {
                continue;
            };
            if let Some(id) = doc.id() {
                self.index_map.insert(id, index);
            }
        }

        self.next_page_index = total;
        Ok(())
    }

    /// Returns the schema version kept in `meta_data`, defaulting to 0.
    #[must_use]
    pub fn schema_version(&self) -> u64 {
        self.meta_data
            .get("schemaVersion")
            .and_then(Value::as_int)
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(0)
    }

    /// Records the schema version in `meta_data`.
    #[allow(clippy::cast_possible_wrap)]
    pub fn set_schema_version(&mut self, version: u64) {
        self.meta_data
            .insert("schemaVersion".to_string(), Value::Int(version as i64));
    }
}

/// Lifts a version-1 layout in place:
/// - definitions stored as a bare field-name string become `[name]`
/// - index keys stored as bare value strings become one-component keys
fn migrate_v1(raw: &mut serde_json::Value) {
    if let Some(defs) = raw
        .get_mut("secondaryIndexDefinitions")
        .and_then(serde_json::Value::as_object_mut)
    {
        for value in defs.values_mut() {
            if let serde_json::Value::String(field) = value {
                *value = serde_json::Value::Array(vec![serde_json::Value::String(field.clone())]);
            }
        }
    }

    if let Some(indexes) = raw
        .get_mut("secondaryIndexes")
        .and_then(serde_json::Value::as_object_mut)
    {
        for buckets in indexes.values_mut() {
            let Some(map) = buckets.as_object_mut() else {
                continue;
            };
            let old = std::mem::take(map);
            for (key, ids) in old {
                let lifted = if serde_json::from_str::<serde_json::Value>(&key)
                    .map(|v| v.is_array())
                    .unwrap_or(false)
                {
                    key
                } else {
                    CompoundKey::from_legacy_single(&key).encode()
                };
                map.insert(lifted, ids);
            }
        }
    }
}

fn write_atomic(path: &Path, data: &[u8]) -> CoreResult<()> {
    let mut temp = path.to_path_buf();
    temp.set_extension("tmp");

    let mut file = File::create(&temp)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp, path)?;
    Ok(())
}

/// Returns whether any mapped id is missing an entry or any page index
/// repeats; used by tests and the integrity reporter.
#[must_use]
pub fn page_indexes_unique(layout: &Layout) -> bool {
    let mut seen = BTreeSet::new();
    layout.index_map.values().all(|idx| seen.insert(*idx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use blazedb_storage::InMemoryBackend;
    use tempfile::tempdir;

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempdir().unwrap();
        let layout = Layout::load(&dir.path().join("absent.layout.json")).unwrap();

        assert!(layout.index_map.is_empty());
        assert_eq!(layout.next_page_index, 0);
        assert_eq!(layout.version, LAYOUT_VERSION);
    }

    #[test]
    fn save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.layout.json");

        let mut layout = Layout::new();
        let id = DocumentId::mint();
        layout.index_map.insert(id, 3);
        layout.next_page_index = 4;
        layout
            .secondary_index_definitions
            .insert("status".to_string(), vec!["status".to_string()]);
        layout.set_schema_version(7);

        layout.save(&path).unwrap();
        let loaded = Layout::load(&path).unwrap();

        assert_eq!(loaded, layout);
        assert_eq!(loaded.schema_version(), 7);
    }

    #[test]
    fn garbage_file_is_deleted_and_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.layout.json");
        fs::write(&path, b"{not json at all").unwrap();

        let layout = Layout::load(&path).unwrap();
        assert!(layout.index_map.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn unknown_top_level_keys_are_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.layout.json");
        fs::write(
            &path,
            br#"{"version": 2, "nextPageIndex": 9, "futureFeature": {"a": 1}}"#,
        )
        .unwrap();

        let layout = Layout::load(&path).unwrap();
        assert_eq!(layout.next_page_index, 9);
    }

    #[test]
    fn v1_definitions_and_keys_are_lifted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("db.layout.json");
        let id = DocumentId::mint();
        fs::write(
            &path,
            format!(
                r#"{{
                    "version": 1,
                    "secondaryIndexDefinitions": {{"status": "status"}},
                    "secondaryIndexes": {{"status": {{"open": ["{id}"]}}}}
                }}"#
            ),
        )
        .unwrap();

        let layout = Layout::load(&path).unwrap();
        assert_eq!(layout.version, LAYOUT_VERSION);
        assert_eq!(
            layout.secondary_index_definitions.get("status"),
            Some(&vec!["status".to_string()])
        );

        let lifted_key = CompoundKey::from_values(&[Value::text("open")]).encode();
        let bucket = layout.secondary_indexes.get("status").unwrap();
        assert!(bucket.get(&lifted_key).unwrap().contains(&id));
    }

    #[test]
    fn sidecar_supersedes_in_layout_materialization() {
        let dir = tempdir().unwrap();
        let sidecar = dir.path().join("db.indexes.json");

        let mut layout = Layout::new();
        let stale_key = CompoundKey::from_values(&[Value::text("stale")]).encode();
        layout
            .secondary_indexes
            .entry("status".to_string())
            .or_default()
            .entry(stale_key)
            .or_default()
            .insert(DocumentId::mint());

        let mut fresher = Layout::new();
        let fresh_key = CompoundKey::from_values(&[Value::text("fresh")]).encode();
        let id = DocumentId::mint();
        fresher
            .secondary_indexes
            .entry("status".to_string())
            .or_default()
            .entry(fresh_key.clone())
            .or_default()
            .insert(id);
        fresher.save_indexes(&sidecar).unwrap();

        layout.load_indexes_sidecar(&sidecar).unwrap();
        let bucket = layout.secondary_indexes.get("status").unwrap();
        assert!(bucket.contains_key(&fresh_key));
        assert_eq!(bucket.len(), 1);
    }

    #[test]
    fn corrupt_sidecar_is_ignored_and_removed() {
        let dir = tempdir().unwrap();
        let sidecar = dir.path().join("db.indexes.json");
        fs::write(&sidecar, b"]]]").unwrap();

        let mut layout = Layout::new();
        layout.load_indexes_sidecar(&sidecar).unwrap();
        assert!(!sidecar.exists());
    }

    #[test]
    fn rebuild_recovers_ids_from_pages() {
        let store = PageStore::new(Box::new(InMemoryBackend::new()), 256);

        let mut first = Document::new();
        let first_id = DocumentId::mint();
        first.set_id(first_id);
        first.set("n", Value::Int(1));
        store.append(&first.encode()).unwrap();

        // a hole where a record was hard-deleted
        store.append(b"").unwrap();
        store.delete(1).unwrap();

        let mut second = Document::new();
        let second_id = DocumentId::mint();
        second.set_id(second_id);
        store.append(&second.encode()).unwrap();

        let mut layout = Layout::new();
        layout.rebuild_records_from_store(&store).unwrap();

        assert_eq!(layout.index_map.get(&first_id), Some(&0));
        assert_eq!(layout.index_map.get(&second_id), Some(&2));
        assert_eq!(layout.index_map.len(), 2);
        assert_eq!(layout.next_page_index, 3);
        assert!(page_indexes_unique(&layout));
    }

    #[test]
    fn schema_version_round_trips_through_meta() {
        let mut layout = Layout::new();
        assert_eq!(layout.schema_version(), 0);
        layout.set_schema_version(3);
        assert_eq!(layout.schema_version(), 3);
    }
}
