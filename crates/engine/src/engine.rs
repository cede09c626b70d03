//! Engine facade tying together the container codec, offset index, value
//! store and caches.

use cache::{AdaptivePromoter, CacheStats, TtlCache};
use container::{compression, OffsetIndex};
use parking_lot::RwLock;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::decode::BufferPool;
use crate::error::{EngineError, Result};
use crate::store::{self, ValueReader};

/// Lifecycle position of an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Unloaded,
    Loaded,
    Disposed,
}

#[derive(Debug)]
enum State {
    Unloaded,
    Loaded(Arc<Loaded>),
    Disposed,
}

/// Everything built by one load. Replaced as a unit on reload.
#[derive(Debug)]
struct Loaded {
    index: OffsetIndex,
    values: Box<dyn ValueReader>,
    cache: TtlCache,
    promoter: Option<AdaptivePromoter>,
}

impl Loaded {
    fn lookup(&self, key: &str) -> Result<Option<String>> {
        if let Some(value) = self.cache.get(key) {
            if let Some(p) = &self.promoter {
                p.record_access(key);
            }
            return Ok(Some(value));
        }

        let Some(offset) = self.index.get(key) else {
            return Ok(None);
        };
        let value = self.values.read_at(offset)?;

        let admit = match &self.promoter {
            Some(p) => p.record_access(key),
            None => true,
        };
        if admit {
            self.cache.set(key, value.clone());
        }
        Ok(Some(value))
    }

    /// A lookup whose value is discarded; `true` if the key exists.
    fn warm(&self, key: &str) -> Result<bool> {
        Ok(self.lookup(key)?.is_some())
    }

    fn release(&self) {
        self.values.release();
        self.cache.clear();
        if let Some(p) = &self.promoter {
            p.clear();
        }
    }
}

/// Read-only, embedded string store.
///
/// # Lifecycle
///
/// `Unloaded → Loaded → Disposed`. Loading again while loaded replaces the
/// previous contents wholesale: a new index, a new value store, an empty
/// cache. Once disposed, every operation fails with
/// [`EngineError::Disposed`].
///
/// # Read Path
///
/// 1. TTL cache (hit ⇒ return).
/// 2. Offset index (absent ⇒ not found).
/// 3. Value store: seek, read length prefix, decode UTF-8.
/// 4. Promotion bookkeeping; the value is cached if the key is hot, or
///    always when adaptive promotion is off.
///
/// All methods take `&self`; share an engine between threads with `Arc`.
/// An `Unloaded` engine behaves like an empty store.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    pool: Arc<BufferPool>,
    state: RwLock<State>,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let pool = Arc::new(BufferPool::new(config.max_pooled_buffers));
        Self {
            config,
            pool,
            state: RwLock::new(State::Unloaded),
        }
    }

    /// Creates an engine and loads the container at `path`.
    pub fn open<P: AsRef<Path>>(path: P, config: EngineConfig) -> Result<Self> {
        let engine = Self::new(config);
        engine.load_from_path(path)?;
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> EngineState {
        match &*self.state.read() {
            State::Unloaded => EngineState::Unloaded,
            State::Loaded(_) => EngineState::Loaded,
            State::Disposed => EngineState::Disposed,
        }
    }

    // -------------------- Load / dispose --------------------

    /// Loads a stored container (marker byte + payload, or legacy payload).
    ///
    /// The new container is decompressed, indexed and validated before any
    /// state changes, so a failed load leaves the previous contents in
    /// place. On success the previous value store, cache and access stats
    /// are dropped.
    ///
    /// # Errors
    ///
    /// - [`EngineError::EmptyBuffer`] for an empty slice.
    /// - [`EngineError::Disposed`] after [`dispose`](Engine::dispose).
    /// - [`EngineError::Container`] if decompression or header validation fails.
    pub fn load_from_bytes(&self, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Err(EngineError::EmptyBuffer);
        }
        if matches!(*self.state.read(), State::Disposed) {
            return Err(EngineError::Disposed);
        }

        let payload = compression::decompress(bytes)?;
        let index = OffsetIndex::parse(&payload, self.config.interner.as_deref())?;
        let region: Arc<[u8]> = Arc::from(payload);
        let payload_len = region.len();
        let values = store::open(region, self.config.read_strategy, Arc::clone(&self.pool));
        let loaded = Arc::new(self.build(index, values));

        let mut state = self.state.write();
        if matches!(*state, State::Disposed) {
            loaded.release();
            return Err(EngineError::Disposed);
        }
        let entries = loaded.index.len();
        let replaced = matches!(*state, State::Loaded(_));
        *state = State::Loaded(loaded);
        drop(state);

        info!(
            entries,
            stored = bytes.len(),
            payload = payload_len,
            strategy = ?self.config.read_strategy,
            replaced,
            "container loaded"
        );
        Ok(())
    }

    /// Reads the file at `path` and delegates to
    /// [`load_from_bytes`](Engine::load_from_bytes).
    ///
    /// # Errors
    ///
    /// [`EngineError::SourceNotFound`] if `path` does not exist, otherwise as
    /// for `load_from_bytes`.
    pub fn load_from_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(EngineError::SourceNotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), bytes = bytes.len(), "container read");
        self.load_from_bytes(&bytes)
    }

    fn build(&self, index: OffsetIndex, values: Box<dyn ValueReader>) -> Loaded {
        let clock = Arc::clone(&self.config.clock);
        let promoter = self
            .config
            .adaptive_promotion
            .then(|| {
                AdaptivePromoter::new(self.config.hot_threshold, Arc::clone(&clock))
                    .with_idle_expiry(self.config.cache_ttl, self.config.sweep_interval)
            });
        Loaded {
            index,
            values,
            cache: TtlCache::new(self.config.cache_ttl, self.config.sweep_interval, clock),
            promoter,
        }
    }

    /// Releases the value store and cache. Terminal; calling it again is a
    /// no-op.
    ///
    /// Callers must not dispose while lookups are still in flight on other
    /// threads; those may fail with [`EngineError::Disposed`].
    pub fn dispose(&self) {
        let mut state = self.state.write();
        if let State::Loaded(loaded) = &*state {
            loaded.release();
        }
        if !matches!(*state, State::Disposed) {
            debug!("engine disposed");
        }
        *state = State::Disposed;
    }

    fn snapshot(&self) -> Result<Option<Arc<Loaded>>> {
        match &*self.state.read() {
            State::Unloaded => Ok(None),
            State::Loaded(loaded) => Ok(Some(Arc::clone(loaded))),
            State::Disposed => Err(EngineError::Disposed),
        }
    }

    // -------------------- Lookups --------------------

    /// Looks up `key`, returning `Ok(None)` if it is absent or empty.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let Some(loaded) = self.snapshot()? else {
            return Ok(None);
        };
        if key.is_empty() {
            return Ok(None);
        }
        loaded.lookup(key)
    }

    /// Like [`get`](Engine::get) but never fails: any error reads as absent.
    pub fn try_get(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Ok(value) => value,
            Err(err) => {
                warn!(key, %err, "lookup failed");
                None
            }
        }
    }

    /// Indexer-style access: a missing key is an error.
    pub fn value_of(&self, key: &str) -> Result<String> {
        self.get(key)?
            .ok_or_else(|| EngineError::KeyNotFound(key.to_owned()))
    }

    pub fn contains(&self, key: &str) -> Result<bool> {
        Ok(self
            .snapshot()?
            .is_some_and(|loaded| loaded.index.contains(key)))
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.snapshot()?.map_or(0, |loaded| loaded.index.len()))
    }

    /// All keys, in container header order.
    pub fn all_keys(&self) -> Result<Vec<String>> {
        Ok(self.snapshot()?.map_or_else(Vec::new, |loaded| {
            loaded.index.keys().map(|k| k.to_string()).collect()
        }))
    }

    /// Lazy `(key, value)` iteration in header order.
    ///
    /// Values are decoded as the iterator advances and do not pass through
    /// the cache. Call `iter` again to restart.
    pub fn iter(&self) -> Result<Entries> {
        Ok(Entries {
            loaded: self.snapshot()?,
            next: 0,
        })
    }

    // -------------------- Cache control --------------------

    /// Empties the TTL cache and forgets access statistics.
    pub fn clear_cache(&self) -> Result<()> {
        if let Some(loaded) = self.snapshot()? {
            loaded.cache.clear();
            if let Some(p) = &loaded.promoter {
                p.clear();
            }
        }
        Ok(())
    }

    /// Looks up each key ahead of use so its value lands in the cache.
    /// Unknown keys are skipped. Returns the number of keys found.
    ///
    /// Each preheat is an ordinary lookup: with adaptive promotion on it
    /// counts as an access, and a key is only cached once it is hot.
    pub fn preheat<I, K>(&self, keys: I) -> Result<usize>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let Some(loaded) = self.snapshot()? else {
            return Ok(0);
        };
        let mut warmed = 0;
        for key in keys {
            if loaded.warm(key.as_ref())? {
                warmed += 1;
            }
        }
        debug!(warmed, "cache preheated");
        Ok(warmed)
    }

    /// Preheats every key in the container.
    pub fn preheat_all(&self) -> Result<usize> {
        let Some(loaded) = self.snapshot()? else {
            return Ok(0);
        };
        let mut warmed = 0;
        for (key, _) in loaded.index.iter() {
            if loaded.warm(key)? {
                warmed += 1;
            }
        }
        debug!(warmed, "cache preheated");
        Ok(warmed)
    }

    /// `true` if `key` currently has a cache entry (expired or not).
    pub fn is_cached(&self, key: &str) -> bool {
        matches!(self.snapshot(), Ok(Some(loaded)) if loaded.cache.contains(key))
    }

    /// Number of cache entries, including expired ones not yet removed.
    pub fn cached_len(&self) -> usize {
        match self.snapshot() {
            Ok(Some(loaded)) => loaded.cache.len(),
            _ => 0,
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        match self.snapshot() {
            Ok(Some(loaded)) => loaded.cache.stats(),
            _ => CacheStats::default(),
        }
    }

    /// Recorded accesses for `key`; always 0 without adaptive promotion.
    pub fn access_count(&self, key: &str) -> u32 {
        match self.snapshot() {
            Ok(Some(loaded)) => loaded
                .promoter
                .as_ref()
                .map_or(0, |p| p.access_count(key)),
            _ => 0,
        }
    }

    // -------------------- Mutation --------------------

    /// Always fails: the store is immutable.
    pub fn insert(&self, _key: &str, _value: &str) -> Result<()> {
        Err(EngineError::ReadOnly("insert"))
    }

    /// Always fails: the store is immutable.
    pub fn remove(&self, _key: &str) -> Result<()> {
        Err(EngineError::ReadOnly("remove"))
    }
}

/// Iterator returned by [`Engine::iter`].
#[derive(Debug)]
pub struct Entries {
    loaded: Option<Arc<Loaded>>,
    next: usize,
}

impl Iterator for Entries {
    type Item = Result<(String, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        let loaded = self.loaded.as_ref()?;
        let (key, offset) = loaded.index.entry(self.next)?;
        self.next += 1;
        Some(loaded.values.read_at(offset).map(|v| (key.to_string(), v)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self
            .loaded
            .as_ref()
            .map_or(0, |l| l.index.len().saturating_sub(self.next));
        (left, Some(left))
    }
}
