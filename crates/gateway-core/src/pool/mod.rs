//! Live validator pool.
//!
//! # State Model
//!
//! ```text
//!                register_or_update            refresh(): probe ok
//!   (unknown) ────────────────────► Live ◄──────────────────────┐
//!                                    │                          │
//!                                    │ refresh(): probe failed  │
//!                                    ▼                          │
//!                               Registered ─────────────────────┘
//! ```
//!
//! Durable records live in the [`RegistryStore`](crate::store::RegistryStore). The
//! [`LivePool`] is the in-memory subset that answered the most recent liveness probe (plus
//! anything registered since). It is published as an immutable snapshot: readers call
//! [`LivePool::snapshot`] and never block writers.

pub mod manager;

pub use manager::PoolManager;

use crate::types::BackendRecord;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};

/// Identity-keyed snapshot of reachable validators.
pub type PoolSnapshot = Arc<HashMap<String, BackendRecord>>;

/// Atomically swappable map of live validators.
///
/// Reads are lock-free. Writers (whole-map replace and single-key merge) serialize on a
/// short mutex so a merge is never lost to a concurrent merge.
pub struct LivePool {
    snapshot: ArcSwap<HashMap<String, BackendRecord>>,
    write_lock: Mutex<()>,
}

impl Default for LivePool {
    fn default() -> Self {
        Self::new()
    }
}

impl LivePool {
    #[must_use]
    pub fn new() -> Self {
        Self { snapshot: ArcSwap::from_pointee(HashMap::new()), write_lock: Mutex::new(()) }
    }

    #[must_use]
    pub fn snapshot(&self) -> PoolSnapshot {
        self.snapshot.load_full()
    }

    /// Replaces the whole pool, deduplicating by identity (last record wins).
    pub fn replace(&self, records: impl IntoIterator<Item = BackendRecord>) {
        let next: HashMap<_, _> = records.into_iter().map(|r| (r.identity.clone(), r)).collect();
        let _guard = self.write_lock.lock();
        self.snapshot.store(Arc::new(next));
    }

    /// Inserts or overwrites one record.
    pub fn merge(&self, record: BackendRecord) {
        self.merge_evicting(record, &[]);
    }

    /// Inserts or overwrites one record and removes `evicted` in the same swap.
    pub fn merge_evicting(&self, record: BackendRecord, evicted: &[String]) {
        let _guard = self.write_lock.lock();
        let mut next = HashMap::clone(&self.snapshot.load());
        for identity in evicted {
            next.remove(identity);
        }
        next.insert(record.identity.clone(), record);
        self.snapshot.store(Arc::new(next));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn contains(&self, identity: &str) -> bool {
        self.snapshot.load().contains_key(identity)
    }
}
