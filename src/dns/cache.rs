use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::{RecordSet, RecordType};

type CacheKey = (String, RecordType);

/// Inserts between two full sweeps of expired entries.
const SWEEP_INTERVAL: u64 = 256;

#[derive(Debug)]
pub(crate) struct CacheEntry {
    pub records: RecordSet,
    pub fetched_at: Instant,
}

/// Freshness-bounded answer cache. An insert replaces the whole entry for its
/// key. Expired entries are dropped when looked up, and every
/// `SWEEP_INTERVAL` inserts the whole map is swept.
#[derive(Debug)]
pub(crate) struct DnsCache {
    ttl: Duration,
    entries: DashMap<CacheKey, CacheEntry>,
    inserts: AtomicU64,
}

impl DnsCache {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
            inserts: AtomicU64::new(0),
        }
    }

    pub(crate) fn get(&self, name: &str, record_type: RecordType) -> Option<RecordSet> {
        self.get_at(name, record_type, Instant::now())
    }

    pub(crate) fn get_at(
        &self,
        name: &str,
        record_type: RecordType,
        now: Instant,
    ) -> Option<RecordSet> {
        let key = (name.to_string(), record_type);
        {
            let entry = self.entries.get(&key)?;
            if self.is_fresh(&entry, now) {
                return Some(entry.records.clone());
            }
        }
        // The read guard is released above; re-check under the shard lock so
        // a concurrent refresh is not thrown away.
        self.entries
            .remove_if(&key, |_, entry| !self.is_fresh(entry, now));
        None
    }

    pub(crate) fn insert(&self, name: &str, records: RecordSet) {
        self.insert_at(name, records, Instant::now());
    }

    pub(crate) fn insert_at(&self, name: &str, records: RecordSet, fetched_at: Instant) {
        let key = (name.to_string(), records.record_type());
        self.entries.insert(
            key,
            CacheEntry {
                records,
                fetched_at,
            },
        );
        if (self.inserts.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_INTERVAL == 0 {
            self.purge_expired_at(fetched_at);
        }
    }

    /// Drops every entry that is stale at `now`. Returns how many were removed.
    pub(crate) fn purge_expired_at(&self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| self.is_fresh(entry, now));
        before.saturating_sub(self.entries.len())
    }

    pub(crate) fn clear(&self) {
        self.entries.clear();
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn is_fresh(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.fetched_at) < self.ttl
    }
}
