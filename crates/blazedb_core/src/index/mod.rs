//! Secondary-index keys and bucket maintenance.
//!
//! An index definition is an ordered list of field names, stored under the
//! name `fields.join("+")`. Its materialization maps encoded compound keys
//! to *sets* of document ids, so duplicate keys across documents are fine.

mod key;

pub use key::{index_name, CompoundKey, KeyComponent};

use blazedb_codec::DocumentId;
use std::collections::{BTreeMap, BTreeSet};

/// One index's buckets: encoded compound key -> ids.
pub type IndexBuckets = BTreeMap<String, BTreeSet<DocumentId>>;

/// Adds `id` under `key`, creating the bucket if needed.
pub fn add_entry(buckets: &mut IndexBuckets, key: &CompoundKey, id: DocumentId) {
    buckets.entry(key.encode()).or_default().insert(id);
}

/// Removes `id` from `key`'s bucket, pruning the bucket if it empties.
pub fn remove_entry(buckets: &mut IndexBuckets, key: &CompoundKey, id: DocumentId) {
    let encoded = key.encode();
    if let Some(ids) = buckets.get_mut(&encoded) {
        ids.remove(&id);
        if ids.is_empty() {
            buckets.remove(&encoded);
        }
    }
}

/// Returns the ids under `key`, or an empty set for unknown keys.
#[must_use]
pub fn lookup(buckets: &IndexBuckets, key: &CompoundKey) -> Vec<DocumentId> {
    buckets
        .get(&key.encode())
        .map(|ids| ids.iter().copied().collect())
        .unwrap_or_default()
}
