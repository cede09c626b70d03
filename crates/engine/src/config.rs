use cache::{Clock, MonotonicClock, DEFAULT_HOT_THRESHOLD, DEFAULT_SWEEP_INTERVAL};
use container::KeyInterner;
use std::sync::Arc;
use std::time::Duration;

use crate::store::ReadStrategy;

/// Configuration for an [`Engine`](crate::Engine)
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How concurrent lookups share the value buffer (default: worker-local)
    pub read_strategy: ReadStrategy,

    /// Lifetime of a cached value (default: 5 min)
    pub cache_ttl: Duration,

    /// Minimum time between two bulk cache sweeps (default: 60s)
    pub sweep_interval: Duration,

    /// Only cache keys that have proven hot (default: false, cache everything)
    pub adaptive_promotion: bool,

    /// Accesses before a key counts as hot (default: 3)
    pub hot_threshold: u32,

    /// Decode buffers kept for reuse (default: 16)
    pub max_pooled_buffers: usize,

    /// Shared key pool for header parsing (default: none)
    pub interner: Option<Arc<KeyInterner>>,

    /// Time source for cache expiry and access stats
    pub clock: Arc<dyn Clock>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            read_strategy: ReadStrategy::default(),
            cache_ttl: Duration::from_secs(300),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            adaptive_promotion: false,
            hot_threshold: DEFAULT_HOT_THRESHOLD,
            max_pooled_buffers: 16,
            interner: None,
            clock: Arc::new(MonotonicClock::new()),
        }
    }
}

impl EngineConfig {
    /// Set the read strategy
    pub fn read_strategy(mut self, strategy: ReadStrategy) -> Self {
        self.read_strategy = strategy;
        self
    }

    /// Set the cache time-to-live
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the sweep interval
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Enable or disable adaptive promotion
    pub fn adaptive_promotion(mut self, enabled: bool) -> Self {
        self.adaptive_promotion = enabled;
        self
    }

    /// Set the hot-key threshold
    pub fn hot_threshold(mut self, threshold: u32) -> Self {
        self.hot_threshold = threshold;
        self
    }

    /// Set how many decode buffers the pool retains
    pub fn max_pooled_buffers(mut self, max: usize) -> Self {
        self.max_pooled_buffers = max;
        self
    }

    /// Route header keys through a shared interner
    pub fn interner(mut self, interner: Arc<KeyInterner>) -> Self {
        self.interner = Some(interner);
        self
    }

    /// Replace the time source
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
