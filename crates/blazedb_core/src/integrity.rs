//! Integrity reporting.
//!
//! The reporter walks the layout against the page file and emits a
//! [`ValidationReport`] of warnings and errors. Warnings are conditions
//! the engine tolerates (an id mapped to a zeroed page, a trailing
//! partial page); errors are genuine inconsistencies (id mismatch,
//! dangling index entries). Only errors fail strict mode.

use crate::collection::Collection;
use crate::error::CoreError;
use crate::index::CompoundKey;
use blazedb_codec::Document;
use std::fmt;

/// How bad an issue is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Tolerated; reported for operators.
    Warning,
    /// An inconsistency; fails strict mode.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One finding.
#[derive(Debug, Clone)]
pub struct Issue {
    /// Finding severity.
    pub severity: Severity,
    /// Human-readable description.
    pub message: String,
}

/// The reporter's output: zero or more issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// All findings, in discovery order.
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    /// Returns whether nothing was found.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Returns the number of error-severity findings.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| issue.severity == Severity::Error)
            .count()
    }

    /// Returns the number of warning-severity findings.
    #[must_use]
    pub fn warning_count(&self) -> usize {
        self.issues.len() - self.error_count()
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.issues.push(Issue {
            severity: Severity::Warning,
            message: message.into(),
        });
    }

    fn error(&mut self, message: impl Into<String>) {
        self.issues.push(Issue {
            severity: Severity::Error,
            message: message.into(),
        });
    }
}

/// Validates `collection` and returns the report.
///
/// # Errors
///
/// Fails only on I/O errors; inconsistencies become report entries.
pub fn validate(collection: &Collection) -> Result<ValidationReport, CoreError> {
    let mut report = ValidationReport::default();
    let layout = collection.layout();
    let store = collection.store();

    // no page slot may be mapped twice
    if !crate::layout::page_indexes_unique(layout) {
        report.error("two document ids map to the same page index".to_string());
    }

    // id -> page agreement
    let mut live_docs: Vec<Document> = Vec::new();
    for (id, &page_index) in &layout.index_map {
        match store.read(page_index) {
            Ok(Some(payload)) => {
                match collection.decode_page_payload(payload) {
                    Ok(doc) => {
                        if doc.id() != Some(*id) {
                            report.error(format!(
                                "page {page_index} holds a document whose id does not match {id}"
                            ));
                        } else {
                            live_docs.push(doc);
                        }
                    }
                    Err(err) => report.error(format!(
                        "page {page_index} mapped by {id} does not decode: {err}"
                    )),
                }
            }
            Ok(None) => {
                report.warn(format!("{id} maps to empty page {page_index}"));
            }
            Err(CoreError::InvalidHeader { .. }) => {
                report.error(format!("{id} maps to page {page_index} with a malformed header"));
            }
            Err(err) => return Err(err),
        }
    }

    // next free slot bound
    if let Some(&max_page) = layout.index_map.values().max() {
        if layout.next_page_index <= max_page {
            report.error(format!(
                "nextPageIndex {} is not beyond the highest mapped page {max_page}",
                layout.next_page_index
            ));
        }
    }

    // index entries both ways
    for (name, buckets) in &layout.secondary_indexes {
        for (key, ids) in buckets {
            for id in ids {
                if !layout.index_map.contains_key(id) {
                    report.error(format!(
                        "index {name:?} key {key} holds dangling id {id}"
                    ));
                }
            }
        }
    }
    for (name, fields) in &layout.secondary_index_definitions {
        let buckets = layout.secondary_indexes.get(name);
        for doc in &live_docs {
            if !fields.iter().all(|field| doc.contains(field)) {
                continue;
            }
            let Some(id) = doc.id() else { continue };
            let key = CompoundKey::from_document(doc, fields).encode();
            let present = buckets
                .and_then(|b| b.get(&key))
                .is_some_and(|ids| ids.contains(&id));
            if !present {
                report.error(format!("index {name:?} is missing {id} under key {key}"));
            }
        }
    }

    // file shape
    let stats = store.stats()?;
    if stats.file_bytes % store.page_size() as u64 != 0 {
        report.warn(format!(
            "page file has a {}-byte trailing remainder",
            stats.file_bytes % store.page_size() as u64
        ));
    }
    if stats.orphaned_pages > 0 {
        report.warn(format!(
            "{} orphaned page(s) awaiting slot reuse",
            stats.orphaned_pages
        ));
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageStore;
    use crate::paths::DatabasePaths;
    use blazedb_codec::Value;
    use tempfile::{tempdir, TempDir};

    fn open_collection() -> (TempDir, Collection) {
        let dir = tempdir().unwrap();
        let paths = DatabasePaths::new(dir.path().join("db.bzdb"));
        let store = PageStore::open_with_page_size(paths.page_file(), 512).unwrap();
        let collection = Collection::open(store, paths, "proj", None).unwrap();
        (dir, collection)
    }

    fn titled(title: &str) -> Document {
        let mut doc = Document::new();
        doc.set("title", title);
        doc.set("status", "open");
        doc
    }

    #[test]
    fn healthy_collection_is_clean() {
        let (_dir, mut collection) = open_collection();
        collection.create_index(&["status"]).unwrap();
        collection.insert(titled("fine")).unwrap();

        let report = validate(&collection).unwrap();
        assert!(report.is_clean(), "unexpected issues: {:?}", report.issues);
    }

    #[test]
    fn hard_delete_leaves_only_a_warning() {
        let (_dir, mut collection) = open_collection();
        let keep = collection.insert(titled("keep")).unwrap();
        let drop = collection.insert(titled("drop")).unwrap();
        collection.delete(drop).unwrap();

        let report = validate(&collection).unwrap();
        assert_eq!(report.error_count(), 0);
        // the zeroed page is orphaned, hence a warning
        assert!(report.warning_count() >= 1);
        assert!(collection.fetch(keep).unwrap().is_some());
    }

    #[test]
    fn dangling_index_entry_is_an_error() {
        let (_dir, mut collection) = open_collection();
        collection.create_index(&["status"]).unwrap();
        let id = collection.insert(titled("indexed")).unwrap();

        // sabotage: remove the record but leave the bucket entry
        let key = CompoundKey::from_values(&[Value::text("open")]).encode();
        collection.layout_mut_for_tests(|layout| {
            layout.index_map.remove(&id);
            layout
                .secondary_indexes
                .get_mut("status")
                .unwrap()
                .get_mut(&key)
                .unwrap()
                .insert(id);
        });

        let report = validate(&collection).unwrap();
        assert!(report.error_count() >= 1);
        assert!(report
            .issues
            .iter()
            .any(|issue| issue.message.contains("dangling")));
    }

    #[test]
    fn missing_index_entry_is_an_error() {
        let (_dir, mut collection) = open_collection();
        collection.create_index(&["status"]).unwrap();
        let id = collection.insert(titled("indexed")).unwrap();

        let key = CompoundKey::from_values(&[Value::text("open")]).encode();
        collection.layout_mut_for_tests(|layout| {
            layout
                .secondary_indexes
                .get_mut("status")
                .unwrap()
                .remove(&key);
        });

        let report = validate(&collection).unwrap();
        assert!(report
            .issues
            .iter()
            .any(|issue| issue.message.contains(&format!("missing {id}"))));
    }

    #[test]
    fn bad_next_page_index_is_an_error() {
        let (_dir, mut collection) = open_collection();
        collection.insert(titled("first")).unwrap();

        collection.layout_mut_for_tests(|layout| {
            layout.next_page_index = 0;
        });

        let report = validate(&collection).unwrap();
        assert!(report
            .issues
            .iter()
            .any(|issue| issue.message.contains("nextPageIndex")));
    }
}
