//! End-to-end scenarios against real files.

use blazedb_core::journal::{Journal, JournalRecord, TransactionId};
use blazedb_core::page::{PageStore, DEFAULT_PAGE_SIZE, PAGE_HEADER_SIZE};
use blazedb_core::{CoreError, Database, Document, Query, SortOrder, Value};
use std::fs;
use tempfile::tempdir;

const PASSWORD: &str = "integration password";

fn bug(fields: &[(&str, Value)]) -> Document {
    let mut doc = Document::new();
    for (name, value) in fields {
        doc.set(*name, value.clone());
    }
    doc
}

#[test]
fn insert_then_fetch_returns_the_document() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path().join("bugs.bzdb"), PASSWORD, "tracker").unwrap();

    let id = db
        .insert(bug(&[
            ("title", Value::text("Fix crash")),
            ("status", Value::text("open")),
            ("severity", Value::text("high")),
        ]))
        .unwrap();

    let doc = db.fetch(id).unwrap().unwrap();
    assert_eq!(doc.get("title").unwrap().as_text(), Some("Fix crash"));
    assert_eq!(doc.get("status").unwrap().as_text(), Some("open"));
    assert!(matches!(doc.get("createdAt"), Some(Value::Timestamp(_))));
}

#[test]
fn compound_index_lookup_over_a_hundred_documents() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path().join("board.bzdb"), PASSWORD, "board").unwrap();
    db.create_index(&["status", "priority"]).unwrap();

    let statuses = ["done", "inProgress", "notStarted"];
    let priorities = ["low", "medium", "high"];
    for i in 0..100 {
        db.insert(bug(&[
            ("title", Value::text(format!("task {i}"))),
            ("status", Value::text(statuses[i % 3])),
            ("priority", Value::text(priorities[i % 3])),
        ]))
        .unwrap();
    }
    db.insert(bug(&[
        ("status", Value::text("inProgress")),
        ("priority", Value::text("high")),
    ]))
    .unwrap();

    let hits = db
        .fetch_by_indexed_fields(
            &["status", "priority"],
            &[Value::text("inProgress"), Value::text("high")],
        )
        .unwrap();
    assert!(!hits.is_empty());
    for doc in hits {
        assert_eq!(doc.get("status").unwrap().as_text(), Some("inProgress"));
        assert_eq!(doc.get("priority").unwrap().as_text(), Some("high"));
    }
}

#[test]
fn index_follows_update_and_delete() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path().join("moves.bzdb"), PASSWORD, "board").unwrap();
    db.create_index(&["status", "priority"]).unwrap();

    let id = db
        .insert(bug(&[
            ("status", Value::text("inProgress")),
            ("priority", Value::Int(1)),
        ]))
        .unwrap();

    let probe = |status: &str| {
        db.fetch_by_indexed_fields(
            &["status", "priority"],
            &[Value::text(status), Value::Int(1)],
        )
        .unwrap()
    };

    assert!(probe("inProgress").iter().any(|d| d.id() == Some(id)));

    db.update(
        id,
        bug(&[
            ("status", Value::text("done")),
            ("priority", Value::Int(1)),
        ]),
    )
    .unwrap();
    assert!(probe("inProgress").is_empty());
    assert!(probe("done").iter().any(|d| d.id() == Some(id)));

    db.delete(id).unwrap();
    assert!(probe("done").is_empty());
}

#[test]
fn journal_recovery_replays_committed_pages() {
    let dir = tempdir().unwrap();
    let store_path = dir.path().join("pages.bzdb");
    let journal_path = dir.path().join("pages.bzdb.journal");

    // journal a committed transaction whose pages never reached the store
    {
        let journal = Journal::open(&journal_path, true).unwrap();
        let txid = TransactionId::new(1);
        journal.append(&JournalRecord::Begin { txid }).unwrap();
        journal
            .append(&JournalRecord::Write {
                page_index: 1,
                payload: b"payload one".to_vec(),
            })
            .unwrap();
        journal
            .append(&JournalRecord::Write {
                page_index: 2,
                payload: b"payload two".to_vec(),
            })
            .unwrap();
        journal.append(&JournalRecord::Commit { txid }).unwrap();
    }

    // reopen and recover
    let store = PageStore::open(&store_path).unwrap();
    let journal = Journal::open(&journal_path, true).unwrap();
    assert_eq!(journal.recover(&store).unwrap(), 2);
    assert_eq!(store.read(1).unwrap().unwrap(), b"payload one");
    assert_eq!(store.read(2).unwrap().unwrap(), b"payload two");

    // a second recovery yields the same page-file state
    assert_eq!(journal.recover(&store).unwrap(), 0);
    assert_eq!(store.read(1).unwrap().unwrap(), b"payload one");
    assert_eq!(store.read(2).unwrap().unwrap(), b"payload two");
}

#[test]
fn weak_password_fails_without_touching_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("never.bzdb");

    let result = Database::open(&path, "123", "tracker");
    assert!(matches!(result, Err(CoreError::PasswordTooWeak { .. })));
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn documents_survive_close_and_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("durable.bzdb");
    let id;
    {
        let db = Database::open(&path, PASSWORD, "tracker").unwrap();
        id = db
            .insert(bug(&[
                ("title", Value::text("durable")),
                ("count", Value::Int(42)),
                ("ratio", Value::Float(0.5)),
                ("flag", Value::Bool(true)),
            ]))
            .unwrap();
    }

    let db = Database::open(&path, PASSWORD, "tracker").unwrap();
    let doc = db.fetch(id).unwrap().unwrap();
    assert_eq!(doc.get("title").unwrap().as_text(), Some("durable"));
    assert_eq!(doc.get("count").unwrap().as_int(), Some(42));
    assert_eq!(doc.get("ratio").unwrap().as_float(), Some(0.5));
    assert_eq!(doc.get("flag").unwrap().as_bool(), Some(true));
}

#[test]
fn create_index_twice_changes_nothing() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path().join("idx.bzdb"), PASSWORD, "board").unwrap();

    db.create_index(&["status"]).unwrap();
    db.insert(bug(&[("status", Value::text("open"))])).unwrap();
    db.create_index(&["status"]).unwrap();

    let hits = db
        .fetch_by_indexed_field("status", &Value::text("open"))
        .unwrap();
    assert_eq!(hits.len(), 1);
}

#[test]
fn soft_delete_then_purge_makes_record_unfetchable() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path().join("purge.bzdb"), PASSWORD, "board").unwrap();

    let id = db.insert(bug(&[("title", Value::text("doomed"))])).unwrap();
    db.soft_delete(id).unwrap();

    // still fetchable (flagged) until purge
    assert!(db.fetch(id).unwrap().unwrap().is_deleted());

    assert_eq!(db.purge().unwrap(), 1);
    assert!(db.fetch(id).unwrap().is_none());
    assert!(db.fetch_all().unwrap().is_empty());
}

#[test]
fn page_payload_boundaries() {
    let dir = tempdir().unwrap();
    let store = PageStore::open(&dir.path().join("bounds.bzdb")).unwrap();
    let max = DEFAULT_PAGE_SIZE - PAGE_HEADER_SIZE;

    // empty payload round-trips as a well-formed empty page
    store.write(0, b"").unwrap();
    assert_eq!(store.read(0).unwrap(), None);
    assert_eq!(store.stats().unwrap().orphaned_pages, 0);

    // exactly pageSize - 5 bytes round-trips
    let payload = vec![0x5Au8; max];
    store.write(1, &payload).unwrap();
    assert_eq!(store.read(1).unwrap().unwrap(), payload);

    // one byte more fails without mutating the file
    let before = store.stats().unwrap().file_bytes;
    assert!(matches!(
        store.write(2, &vec![0x5Au8; max + 1]),
        Err(CoreError::TooLarge { .. })
    ));
    assert_eq!(store.stats().unwrap().file_bytes, before);
}

#[test]
fn file_size_counts_bootstrap_page() {
    let dir = tempdir().unwrap();
    let store = PageStore::open(&dir.path().join("sizes.bzdb")).unwrap();
    let max = DEFAULT_PAGE_SIZE - PAGE_HEADER_SIZE;

    let n = 4;
    for index in 1..=n {
        store.write(index, &vec![0xA1u8; max]).unwrap();
    }

    let stats = store.stats().unwrap();
    assert_eq!(stats.file_bytes, (n + 1) * DEFAULT_PAGE_SIZE as u64);
    assert_eq!(stats.total_pages, n + 1);
}

#[test]
fn partial_trailing_page_is_not_counted() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("trailing.bzdb");

    let store = PageStore::open(&path).unwrap();
    store.write(0, b"whole page").unwrap();
    drop(store);

    // tack a partial page onto the file
    let mut bytes = fs::read(&path).unwrap();
    bytes.extend_from_slice(&[0xEEu8; 100]);
    fs::write(&path, bytes).unwrap();

    let store = PageStore::open(&path).unwrap();
    let stats = store.stats().unwrap();
    assert_eq!(stats.total_pages, 1);
    assert_eq!(
        stats.file_bytes,
        DEFAULT_PAGE_SIZE as u64 + 100
    );
    assert_eq!(store.read(1).unwrap(), None);
}

#[test]
fn client_transaction_snapshots_disappear_after_finalize() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path().join("txn.bzdb"), PASSWORD, "board").unwrap();
    db.insert(bug(&[("title", Value::text("base"))])).unwrap();

    db.begin_transaction().unwrap();
    db.insert(bug(&[("title", Value::text("committed"))])).unwrap();
    db.commit_transaction().unwrap();
    assert!(!db.paths().page_txn_snapshot().exists());
    assert!(!db.paths().layout_txn_snapshot().exists());

    db.begin_transaction().unwrap();
    db.insert(bug(&[("title", Value::text("rolled back"))])).unwrap();
    db.rollback_transaction().unwrap();
    assert!(!db.paths().page_txn_snapshot().exists());
    assert!(!db.paths().layout_txn_snapshot().exists());

    let titles: Vec<String> = db
        .fetch_all()
        .unwrap()
        .iter()
        .map(|d| d.get("title").unwrap().as_text().unwrap().to_string())
        .collect();
    assert_eq!(titles.len(), 2);
    assert!(!titles.contains(&"rolled back".to_string()));
}

#[test]
fn key_mismatch_blocks_until_reopened_correctly() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bound.bzdb");
    let id;
    {
        let db = Database::open(&path, PASSWORD, "board").unwrap();
        id = db.insert(bug(&[("title", Value::text("bound"))])).unwrap();
    }

    {
        let db = Database::open(&path, "some other password", "board").unwrap();
        assert!(matches!(db.fetch(id), Err(CoreError::KeyMismatch)));
        assert!(matches!(
            db.insert(bug(&[("title", Value::text("no"))])),
            Err(CoreError::KeyMismatch)
        ));
        assert!(matches!(db.purge(), Err(CoreError::KeyMismatch)));
    }

    let db = Database::open(&path, PASSWORD, "board").unwrap();
    assert!(db.fetch(id).unwrap().is_some());
}

#[test]
fn queries_filter_sort_and_limit() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path().join("query.bzdb"), PASSWORD, "board").unwrap();

    for (title, severity) in [("a", 1), ("b", 4), ("c", 2), ("d", 5)] {
        db.insert(bug(&[
            ("title", Value::text(title)),
            ("severity", Value::Int(severity)),
        ]))
        .unwrap();
    }

    let results = db
        .run_query(
            &Query::new()
                .ge("severity", Value::Int(2))
                .order_by("severity", SortOrder::Descending)
                .limit(2),
        )
        .unwrap();

    let severities: Vec<i64> = results
        .iter()
        .map(|d| d.get("severity").unwrap().as_int().unwrap())
        .collect();
    assert_eq!(severities, vec![5, 4]);
}

#[test]
fn project_tag_scopes_fetches() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path().join("proj.bzdb"), PASSWORD, "alpha").unwrap();
    db.insert(bug(&[("title", Value::text("tagged"))])).unwrap();

    assert_eq!(db.fetch_all_by_project("alpha").unwrap().len(), 1);
    assert!(db.fetch_all_by_project("beta").unwrap().is_empty());
}

#[test]
fn mixed_value_forms_hit_the_same_index_bucket() {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path().join("coerce.bzdb"), PASSWORD, "board").unwrap();
    db.create_index(&["priority"]).unwrap();

    db.insert(bug(&[("priority", Value::Int(1))])).unwrap();
    db.insert(bug(&[("priority", Value::Float(1.0))])).unwrap();

    let as_int = db
        .fetch_by_indexed_field("priority", &Value::Int(1))
        .unwrap();
    let as_float = db
        .fetch_by_indexed_field("priority", &Value::Float(1.0))
        .unwrap();
    assert_eq!(as_int.len(), 2);
    assert_eq!(as_float.len(), 2);
}
