//! Document collection.
//!
//! The collection maps document identities to pages, keeps the secondary
//! indexes in step with every mutation, and persists its layout after
//! each write. One logical writer at a time; the client layer serializes
//! writers with a reader-writer lock and the page store's own lock
//! serializes file access underneath.

pub mod query;

use crate::crypto::PayloadCipher;
use crate::error::{CoreError, CoreResult};
use crate::index::{self, index_name, CompoundKey};
use crate::layout::Layout;
use crate::page::{PageStats, PageStore};
use crate::paths::DatabasePaths;
use crate::CRASH_BEFORE_UPDATE_ENV;
use blazedb_codec::{
    Document, DocumentId, Value, FIELD_CREATED_AT, FIELD_IS_DELETED, FIELD_PROJECT,
    FIELD_UPDATED_AT,
};
use query::Query;
use std::collections::BTreeMap;
use std::fs;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// Current Unix time in milliseconds.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// A set of documents bound to one page file and one layout file,
/// scoped to a project tag.
#[derive(Debug)]
pub struct Collection {
    store: PageStore,
    layout: Layout,
    paths: DatabasePaths,
    project: String,
    cipher: Option<PayloadCipher>,
}

impl Collection {
    /// Opens the collection over an already-opened page store.
    ///
    /// Loads the layout (rebuilding the record map from pages when the
    /// layout was missing or deleted as corrupt), applies the indexes
    /// sidecar, and rebuilds any index materialization that is empty
    /// while documents exist.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    pub fn open(
        store: PageStore,
        paths: DatabasePaths,
        project: impl Into<String>,
        cipher: Option<PayloadCipher>,
    ) -> CoreResult<Self> {
        let mut layout = Layout::load(&paths.layout_file())?;
        layout.load_indexes_sidecar(&paths.indexes_file())?;

        let mut collection = Self {
            store,
            layout,
            paths,
            project: project.into(),
            cipher,
        };

        let mut rebuilt = false;
        if collection.layout.index_map.is_empty() && collection.store.page_count()? > 0 {
            collection.rebuild_records()?;
            rebuilt = !collection.layout.index_map.is_empty();
            if rebuilt {
                info!(
                    records = collection.layout.index_map.len(),
                    "record map rebuilt from page scan"
                );
            }
        }
        rebuilt |= collection.rebuild_missing_indexes()?;
        if rebuilt {
            collection.persist_layout()?;
        }
        Ok(collection)
    }

    /// Returns the project tag.
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Returns the layout (read-only).
    #[must_use]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Returns the page store.
    #[must_use]
    pub fn store(&self) -> &PageStore {
        &self.store
    }

    /// Returns the number of mapped documents (soft-deleted included).
    #[must_use]
    pub fn len(&self) -> usize {
        self.layout.index_map.len()
    }

    /// Returns whether no documents are mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layout.index_map.is_empty()
    }

    // === index catalog ===

    /// Creates (or re-creates, idempotently) an index over `fields`.
    ///
    /// The definition is stored under `fields.join("+")`. When records
    /// already exist and the materialization is empty, every live
    /// document is scanned to backfill it.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    pub fn create_index(&mut self, fields: &[&str]) -> CoreResult<()> {
        let fields: Vec<String> = fields.iter().map(|f| (*f).to_string()).collect();
        let name = index_name(&fields);

        self.layout
            .secondary_index_definitions
            .insert(name.clone(), fields.clone());
        self.layout
            .secondary_indexes
            .entry(name.clone())
            .or_default();

        let needs_backfill = self
            .layout
            .secondary_indexes
            .get(&name)
            .is_some_and(BTreeMap::is_empty)
            && !self.layout.index_map.is_empty();
        if needs_backfill {
            self.backfill_index(&name, &fields)?;
        }

        self.persist_layout()
    }

    /// Returns the index catalog.
    #[must_use]
    pub fn index_definitions(&self) -> &BTreeMap<String, Vec<String>> {
        &self.layout.secondary_index_definitions
    }

    // === CRUD ===

    /// Inserts a document and returns its id.
    ///
    /// A caller-supplied `id` field (identifier or parseable text) is
    /// honored; otherwise a fresh id is minted. `createdAt` is stamped
    /// when missing and `project` always.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::AlreadyExists`] when a supplied id is
    /// already mapped, or on I/O errors.
    pub fn insert(&mut self, mut doc: Document) -> CoreResult<DocumentId> {
        let id = match doc.id() {
            Some(id) => {
                if self.layout.index_map.contains_key(&id) {
                    return Err(CoreError::already_exists(id));
                }
                id
            }
            None => DocumentId::mint(),
        };

        doc.set_id(id);
        if !doc.contains(FIELD_CREATED_AT) {
            doc.set(FIELD_CREATED_AT, Value::Timestamp(now_millis()));
        }
        doc.set(FIELD_PROJECT, self.project.clone());

        let payload = self.encode_payload(&doc)?;
        let page_index = self.store.append(&payload)?;

        self.layout.index_map.insert(id, page_index);
        self.layout.next_page_index = self.layout.next_page_index.max(page_index + 1);
        self.index_insert(&doc, id);
        self.persist_layout()?;
        Ok(id)
    }

    /// Fetches a document by id.
    ///
    /// Returns `None` for unknown ids and for ids whose page is
    /// header-only or all-zero.
    ///
    /// # Errors
    ///
    /// Fails on malformed pages or I/O errors.
    pub fn fetch(&self, id: DocumentId) -> CoreResult<Option<Document>> {
        let Some(&page_index) = self.layout.index_map.get(&id) else {
            return Ok(None);
        };
        self.read_document_at(page_index)
    }

    /// Returns all live documents, in no particular order.
    ///
    /// Soft-deleted documents are included until [`purge`](Self::purge).
    ///
    /// # Errors
    ///
    /// Fails on malformed pages or I/O errors.
    pub fn fetch_all(&self) -> CoreResult<Vec<Document>> {
        let mut docs = Vec::with_capacity(self.layout.index_map.len());
        for &page_index in self.layout.index_map.values() {
            if let Some(doc) = self.read_document_at(page_index)? {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    /// Returns all live documents whose `project` field equals `project`.
    ///
    /// # Errors
    ///
    /// Fails on malformed pages or I/O errors.
    pub fn fetch_all_by_project(&self, project: &str) -> CoreResult<Vec<Document>> {
        Ok(self
            .fetch_all()?
            .into_iter()
            .filter(|doc| doc.project() == Some(project))
            .collect())
    }

    /// Looks up documents through a single-field index.
    ///
    /// Returns an empty list when no index over exactly `[field]`
    /// exists, or when no key matches.
    ///
    /// # Errors
    ///
    /// Fails on malformed pages or I/O errors.
    pub fn fetch_by_indexed_field(&self, field: &str, value: &Value) -> CoreResult<Vec<Document>> {
        self.fetch_by_indexed_fields(&[field], std::slice::from_ref(value))
    }

    /// Looks up documents through a compound index keyed on exactly
    /// `fields`.
    ///
    /// Returns an empty list when the arity mismatches, the index is
    /// absent, or no key matches.
    ///
    /// # Errors
    ///
    /// Fails on malformed pages or I/O errors.
    pub fn fetch_by_indexed_fields(
        &self,
        fields: &[&str],
        values: &[Value],
    ) -> CoreResult<Vec<Document>> {
        if fields.len() != values.len() {
            return Ok(Vec::new());
        }
        let fields: Vec<String> = fields.iter().map(|f| (*f).to_string()).collect();
        let name = index_name(&fields);
        if self.layout.secondary_index_definitions.get(&name) != Some(&fields) {
            return Ok(Vec::new());
        }
        let Some(buckets) = self.layout.secondary_indexes.get(&name) else {
            return Ok(Vec::new());
        };

        let key = CompoundKey::from_values(values);
        let mut docs = Vec::new();
        for id in index::lookup(buckets, &key) {
            if let Some(doc) = self.fetch(id)? {
                docs.push(doc);
            }
        }
        Ok(docs)
    }

    /// Replaces the document at `id`.
    ///
    /// Old compound-key entries are removed before new ones are
    /// inserted; the page slot is overwritten in place; `updatedAt` is
    /// stamped and `id`/`createdAt` preserved.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::NotFound`] for unknown ids, or on I/O
    /// errors. Fails immediately when [`CRASH_BEFORE_UPDATE_ENV`] is set
    /// to `1`.
    pub fn update(&mut self, id: DocumentId, mut doc: Document) -> CoreResult<()> {
        if std::env::var(CRASH_BEFORE_UPDATE_ENV).as_deref() == Ok("1") {
            return Err(CoreError::invalid_operation(format!(
                "update aborted by {CRASH_BEFORE_UPDATE_ENV}"
            )));
        }

        let page_index = *self
            .layout
            .index_map
            .get(&id)
            .ok_or(CoreError::NotFound { id })?;

        let old = self.read_document_tolerant(page_index)?;
        if let Some(old_doc) = &old {
            self.index_remove(old_doc, id);
        }

        doc.set_id(id);
        if !doc.contains(FIELD_CREATED_AT) {
            match old.as_ref().and_then(|d| d.get(FIELD_CREATED_AT)) {
                Some(created) => doc.set(FIELD_CREATED_AT, created.clone()),
                None => doc.set(FIELD_CREATED_AT, Value::Timestamp(now_millis())),
            }
        }
        doc.set(FIELD_UPDATED_AT, Value::Timestamp(now_millis()));
        doc.set(FIELD_PROJECT, self.project.clone());

        let payload = self.encode_payload(&doc)?;
        self.store.write(page_index, &payload)?;

        self.index_insert(&doc, id);
        self.persist_layout()
    }

    /// Hard-deletes the document at `id`.
    ///
    /// The id leaves the layout and every index bucket; the page is
    /// zeroed (orphaned until slot reuse; slots are not reclaimed).
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::NotFound`] for unknown ids, or on I/O
    /// errors.
    pub fn delete(&mut self, id: DocumentId) -> CoreResult<()> {
        let page_index = *self
            .layout
            .index_map
            .get(&id)
            .ok_or(CoreError::NotFound { id })?;

        if let Some(old_doc) = self.read_document_tolerant(page_index)? {
            self.index_remove(&old_doc, id);
        }
        self.layout.index_map.remove(&id);
        self.store.delete(page_index)?;
        self.persist_layout()
    }

    /// Marks the document at `id` as soft-deleted.
    ///
    /// A soft-deleted document still counts in the layout and in
    /// fetches until [`purge`](Self::purge) runs.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::NotFound`] for unknown ids, or on I/O
    /// errors.
    pub fn soft_delete(&mut self, id: DocumentId) -> CoreResult<()> {
        let mut doc = self.fetch(id)?.ok_or(CoreError::NotFound { id })?;
        doc.set(FIELD_IS_DELETED, true);
        self.update(id, doc)
    }

    /// Hard-deletes every soft-deleted document. Returns how many went.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    pub fn purge(&mut self) -> CoreResult<usize> {
        let doomed: Vec<DocumentId> = self
            .fetch_all()?
            .into_iter()
            .filter(Document::is_deleted)
            .filter_map(|doc| doc.id())
            .collect();

        for id in &doomed {
            self.delete(*id)?;
        }
        Ok(doomed.len())
    }

    /// Applies a query to all documents by full scan.
    ///
    /// # Errors
    ///
    /// Fails on malformed pages or I/O errors.
    pub fn run_query(&self, query: &Query) -> CoreResult<Vec<Document>> {
        Ok(query.apply(self.fetch_all()?))
    }

    /// Removes the database and layout files and resets in-memory state.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    pub fn destroy(&mut self) -> CoreResult<()> {
        self.store.clear()?;
        for path in [
            self.paths.layout_file(),
            self.paths.indexes_file(),
        ] {
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        self.layout = Layout::new();
        Ok(())
    }

    /// Returns page index -> payload bytes for every live page.
    ///
    /// Orphaned pages are skipped.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    pub fn raw_dump(&self) -> CoreResult<BTreeMap<u64, Vec<u8>>> {
        let mut pages = BTreeMap::new();
        for page_index in 0..self.store.page_count()? {
            match self.store.read(page_index) {
                Ok(Some(payload)) => {
                    pages.insert(page_index, payload);
                }
                Ok(None) => {}
                Err(CoreError::InvalidHeader { .. }) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(pages)
    }

    /// Returns page-file statistics.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    pub fn page_stats(&self) -> CoreResult<PageStats> {
        self.store.stats()
    }

    /// Reloads layout state from disk after an external file change
    /// (safe-write restore, client-transaction rollback).
    ///
    /// A layout that fails to load is rebuilt from the page store.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    pub fn reload_from_disk(&mut self) -> CoreResult<()> {
        self.layout = Layout::load(&self.paths.layout_file())?;
        self.layout.load_indexes_sidecar(&self.paths.indexes_file())?;

        if self.layout.index_map.is_empty() && self.store.page_count()? > 0 {
            self.rebuild_records()?;
        }
        self.rebuild_missing_indexes()?;
        Ok(())
    }

    /// Reconstructs the record map by scanning pages, decrypting when a
    /// cipher is configured. Orphaned and undecodable pages are skipped;
    /// secondary indexes are rebuilt separately from the definitions.
    fn rebuild_records(&mut self) -> CoreResult<()> {
        self.layout.index_map.clear();
        let total = self.store.page_count()?;

        for page_index in 0..total {
            if let Some(doc) = self.read_document_tolerant(page_index)? {
                if let Some(id) = doc.id() {
                    self.layout.index_map.insert(id, page_index);
                }
            }
        }

        self.layout.next_page_index = total;
        Ok(())
    }

    /// Records the schema version in the layout metadata and persists.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    pub fn set_schema_version(&mut self, version: u64) -> CoreResult<()> {
        self.layout.set_schema_version(version);
        self.persist_layout()
    }

    /// Persists the layout and the indexes sidecar.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    pub fn persist_layout(&self) -> CoreResult<()> {
        self.layout.save(&self.paths.layout_file())?;
        self.layout.save_indexes(&self.paths.indexes_file())
    }

    /// Direct layout access for tests that need to inject inconsistencies.
    #[cfg(test)]
    pub(crate) fn layout_mut_for_tests(&mut self, mutate: impl FnOnce(&mut Layout)) {
        mutate(&mut self.layout);
    }

    /// Decodes a raw page payload through the configured cipher; used by
    /// the integrity reporter so encrypted stores validate correctly.
    pub(crate) fn decode_page_payload(&self, payload: Vec<u8>) -> CoreResult<Document> {
        self.decode_payload(payload)
    }

    // === internals ===

    fn encode_payload(&self, doc: &Document) -> CoreResult<Vec<u8>> {
        let bytes = doc.encode();
        match &self.cipher {
            Some(cipher) => cipher.seal(&bytes),
            None => Ok(bytes),
        }
    }

    fn decode_payload(&self, payload: Vec<u8>) -> CoreResult<Document> {
        // the store trims trailing zero runs; only zeros were removed,
        // so re-padding to page capacity restores the exact encoding
        let mut padded = payload;
        if padded.len() < self.store.max_payload() {
            padded.resize(self.store.max_payload(), 0);
        }
        match &self.cipher {
            Some(cipher) => {
                let plaintext = cipher.open(&padded)?;
                Ok(Document::decode(&plaintext)?)
            }
            None => Ok(Document::decode(&padded)?),
        }
    }

    fn read_document_at(&self, page_index: u64) -> CoreResult<Option<Document>> {
        match self.store.read(page_index)? {
            Some(payload) => Ok(Some(self.decode_payload(payload)?)),
            None => Ok(None),
        }
    }

    /// Like [`read_document_at`](Self::read_document_at) but treats
    /// malformed or undecodable pages as gone; used where a best-effort
    /// read must not fail the surrounding mutation.
    fn read_document_tolerant(&self, page_index: u64) -> CoreResult<Option<Document>> {
        match self.store.read(page_index) {
            Ok(Some(payload)) => Ok(self.decode_payload(payload).ok()),
            Ok(None) => Ok(None),
            Err(CoreError::InvalidHeader { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn index_insert(&mut self, doc: &Document, id: DocumentId) {
        let defs = self.layout.secondary_index_definitions.clone();
        for (name, fields) in defs {
            if !fields.iter().all(|field| doc.contains(field)) {
                continue;
            }
            let key = CompoundKey::from_document(doc, &fields);
            let buckets = self.layout.secondary_indexes.entry(name).or_default();
            index::add_entry(buckets, &key, id);
        }
    }

    fn index_remove(&mut self, doc: &Document, id: DocumentId) {
        let defs = self.layout.secondary_index_definitions.clone();
        for (name, fields) in defs {
            let key = CompoundKey::from_document(doc, &fields);
            if let Some(buckets) = self.layout.secondary_indexes.get_mut(&name) {
                index::remove_entry(buckets, &key, id);
            }
        }
    }

    fn backfill_index(&mut self, name: &str, fields: &[String]) -> CoreResult<()> {
        let entries: Vec<(DocumentId, u64)> = self
            .layout
            .index_map
            .iter()
            .map(|(id, idx)| (*id, *idx))
            .collect();

        for (id, page_index) in entries {
            let Some(doc) = self.read_document_tolerant(page_index)? else {
                continue;
            };
            if !fields.iter().all(|field| doc.contains(field)) {
                continue;
            }
            let key = CompoundKey::from_document(&doc, fields);
            let buckets = self
                .layout
                .secondary_indexes
                .entry(name.to_string())
                .or_default();
            index::add_entry(buckets, &key, id);
        }
        Ok(())
    }

    /// Backfills every defined index whose materialization is empty
    /// while documents exist. Returns whether anything changed.
    fn rebuild_missing_indexes(&mut self) -> CoreResult<bool> {
        if self.layout.index_map.is_empty() {
            return Ok(false);
        }
        let defs = self.layout.secondary_index_definitions.clone();
        let mut changed = false;
        for (name, fields) in defs {
            let empty = self
                .layout
                .secondary_indexes
                .get(&name)
                .map_or(true, BTreeMap::is_empty);
            if empty {
                self.backfill_index(&name, &fields)?;
                changed = true;
            }
        }
        Ok(changed)
    }
}
