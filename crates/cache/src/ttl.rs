use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use crate::clock::{nanos, Clock};

/// Minimum time between two bulk sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expire_at: u64,
}

/// Snapshot of hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// Bounded-lifetime cache of decoded strings.
///
/// Every entry lives for `ttl` after its last [`set`](TtlCache::set). Reads
/// drop an expired entry on the spot; writes trigger a full sweep at most
/// once per `sweep_interval`, which keeps keys that are written once and
/// never read again from piling up.
///
/// All methods take `&self`; the map sits behind a `RwLock` so concurrent
/// readers only contend with writers.
#[derive(Debug)]
pub struct TtlCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: u64,
    sweep_interval: u64,
    last_sweep: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl TtlCache {
    pub fn new(ttl: Duration, sweep_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: nanos(ttl),
            sweep_interval: nanos(sweep_interval),
            last_sweep: AtomicU64::new(now),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            clock,
        }
    }

    /// Returns the cached value if present and not yet expired.
    ///
    /// An expired entry is removed before reporting the miss. With a zero
    /// TTL every entry is already stale here.
    pub fn get(&self, key: &str) -> Option<String> {
        let now = self.clock.now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(e) if now < e.expire_at => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(e.value.clone());
                }
                Some(_) => {}
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        // Expired: re-check under the write lock, a concurrent set may have refreshed it.
        let mut entries = self.entries.write();
        if let Some(e) = entries.get(key) {
            if now < e.expire_at {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(e.value.clone());
            }
            entries.remove(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Stores `value` under `key` until `now + ttl`, replacing any previous
    /// entry, then sweeps if the sweep interval has elapsed.
    pub fn set(&self, key: impl Into<String>, value: String) {
        let now = self.clock.now();
        let entry = CacheEntry {
            value,
            expire_at: now.saturating_add(self.ttl),
        };
        self.entries.write().insert(key.into(), entry);
        self.maybe_sweep(now);
    }

    fn maybe_sweep(&self, now: u64) {
        let last = self.last_sweep.load(Ordering::Acquire);
        if now.saturating_sub(last) < self.sweep_interval {
            return;
        }
        // Only the thread that wins the swap sweeps.
        if self
            .last_sweep
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.sweep_at(now);
        }
    }

    /// Removes every expired entry now, regardless of the sweep interval.
    ///
    /// Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        self.last_sweep.store(now, Ordering::Release);
        self.sweep_at(now)
    }

    fn sweep_at(&self, now: u64) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, e| now < e.expire_at);
        let removed = before - entries.len();
        trace!(removed, remaining = entries.len(), "ttl cache swept");
        removed
    }

    /// Removes everything unconditionally.
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    /// `true` if an entry for `key` is stored, expired or not.
    ///
    /// Does not count as a hit or a miss and never evicts.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Number of stored entries, including expired ones not yet removed.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_nanos(self.ttl)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
