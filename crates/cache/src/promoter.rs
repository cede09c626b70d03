use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use crate::clock::{nanos, Clock};

/// Accesses after which a key counts as hot.
pub const DEFAULT_HOT_THRESHOLD: u32 = 3;

/// Per-key access record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessStat {
    pub access_count: u32,
    /// Clock reading at the most recent access.
    pub last_access: u64,
}

/// Access-frequency tracker that decides which keys may enter the cache.
///
/// Every successful resolution is recorded; once a key's count reaches the
/// threshold it is hot and stays hot until its stat is dropped. Counts
/// saturate at `u32::MAX`.
///
/// Without an idle window stats live until [`clear`](AdaptivePromoter::clear).
/// With one (see [`with_idle_expiry`](AdaptivePromoter::with_idle_expiry)),
/// stats untouched for the whole window are swept, at most once per sweep
/// interval, piggybacking on [`record_access`](AdaptivePromoter::record_access).
#[derive(Debug)]
pub struct AdaptivePromoter {
    threshold: u32,
    stats: Mutex<HashMap<String, AccessStat>>,
    idle: Option<IdleExpiry>,
    last_sweep: AtomicU64,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Copy)]
struct IdleExpiry {
    window: u64,
    sweep_interval: u64,
}

impl AdaptivePromoter {
    pub fn new(threshold: u32, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            threshold,
            stats: Mutex::new(HashMap::new()),
            idle: None,
            last_sweep: AtomicU64::new(now),
            clock,
        }
    }

    /// Drops stats of keys not accessed for `window`, sweeping at most once
    /// per `sweep_interval`.
    pub fn with_idle_expiry(mut self, window: Duration, sweep_interval: Duration) -> Self {
        self.idle = Some(IdleExpiry {
            window: nanos(window),
            sweep_interval: nanos(sweep_interval),
        });
        self
    }

    /// Records one access to `key` and returns whether it is now hot.
    pub fn record_access(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.maybe_sweep(now);
        let mut stats = self.stats.lock();
        let count = match stats.get_mut(key) {
            Some(stat) => {
                stat.access_count = stat.access_count.saturating_add(1);
                stat.last_access = now;
                stat.access_count
            }
            None => {
                stats.insert(
                    key.to_owned(),
                    AccessStat {
                        access_count: 1,
                        last_access: now,
                    },
                );
                1
            }
        };
        count >= self.threshold
    }

    /// `true` if `key` has been accessed at least `threshold` times.
    pub fn is_hot(&self, key: &str) -> bool {
        self.access_count(key) >= self.threshold
    }

    pub fn access_count(&self, key: &str) -> u32 {
        self.stats.lock().get(key).map_or(0, |s| s.access_count)
    }

    pub fn last_access(&self, key: &str) -> Option<u64> {
        self.stats.lock().get(key).map(|s| s.last_access)
    }

    /// Number of keys with at least one recorded access.
    pub fn tracked(&self) -> usize {
        self.stats.lock().len()
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn clear(&self) {
        self.stats.lock().clear();
    }

    /// Drops every idle stat now, regardless of the sweep interval.
    ///
    /// Returns the number of stats removed; always 0 without an idle window.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        self.last_sweep.store(now, Ordering::Release);
        self.sweep_at(now)
    }

    fn maybe_sweep(&self, now: u64) {
        let Some(idle) = self.idle else {
            return;
        };
        let last = self.last_sweep.load(Ordering::Acquire);
        if now.saturating_sub(last) < idle.sweep_interval {
            return;
        }
        if self
            .last_sweep
            .compare_exchange(last, now, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            self.sweep_at(now);
        }
    }

    fn sweep_at(&self, now: u64) -> usize {
        let Some(idle) = self.idle else {
            return 0;
        };
        let mut stats = self.stats.lock();
        let before = stats.len();
        stats.retain(|_, s| now.saturating_sub(s.last_access) < idle.window);
        let removed = before - stats.len();
        trace!(removed, remaining = stats.len(), "access stats swept");
        removed
    }
}
