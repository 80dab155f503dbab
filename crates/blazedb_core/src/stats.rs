//! Operation counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic per-database operation counters.
///
/// Counters can be read while operations are in flight; all values are
/// monotonically increasing.
#[derive(Debug, Default)]
pub struct OpCounters {
    inserts: AtomicU64,
    fetches: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    scans: AtomicU64,
    index_lookups: AtomicU64,
}

impl OpCounters {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_scan(&self) {
        self.scans.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_index_lookup(&self) {
        self.index_lookups.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a plain snapshot of all counters.
    #[must_use]
    pub fn snapshot(&self) -> OpSnapshot {
        OpSnapshot {
            inserts: self.inserts.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            scans: self.scans.load(Ordering::Relaxed),
            index_lookups: self.index_lookups.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`OpCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpSnapshot {
    /// Total inserts.
    pub inserts: u64,
    /// Total fetches (by id or by index).
    pub fetches: u64,
    /// Total updates (soft deletes included).
    pub updates: u64,
    /// Total hard deletes (purges included).
    pub deletes: u64,
    /// Total full scans.
    pub scans: u64,
    /// Total index lookups.
    pub index_lookups: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let counters = OpCounters::new();
        assert_eq!(counters.snapshot(), OpSnapshot::default());
    }

    #[test]
    fn increments_show_in_snapshot() {
        let counters = OpCounters::new();
        counters.record_insert();
        counters.record_insert();
        counters.record_fetch();
        counters.record_scan();

        let snap = counters.snapshot();
        assert_eq!(snap.inserts, 2);
        assert_eq!(snap.fetches, 1);
        assert_eq!(snap.scans, 1);
        assert_eq!(snap.deletes, 0);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        use std::sync::Arc;
        use std::thread;

        let counters = Arc::new(OpCounters::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let counters = Arc::clone(&counters);
            handles.push(thread::spawn(move || {
                for _ in 0..500 {
                    counters.record_update();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(counters.snapshot().updates, 4000);
    }
}
