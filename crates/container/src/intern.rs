use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;

/// Shared pool of key strings.
///
/// Containers that share vocabulary (one table per language, say) carry
/// the same identifiers over and over. Parsing their headers through one
/// interner makes every copy of a key point at a single `Arc<str>`.
///
/// The interner is an ordinary value: hand the same `Arc<KeyInterner>` to
/// every index that should share it.
#[derive(Debug, Default)]
pub struct KeyInterner {
    keys: RwLock<HashSet<Arc<str>>>,
}

impl KeyInterner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the pooled `Arc<str>` for `key`, adding it on first sight.
    pub fn intern(&self, key: &str) -> Arc<str> {
        // Fast path: read lock
        if let Some(existing) = self.keys.read().get(key) {
            return Arc::clone(existing);
        }
        // Slow path: write lock with double-check
        let mut keys = self.keys.write();
        if let Some(existing) = keys.get(key) {
            return Arc::clone(existing);
        }
        let arc: Arc<str> = Arc::from(key);
        keys.insert(Arc::clone(&arc));
        arc
    }

    /// Number of distinct keys held.
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }

    /// Drops every pooled key. Indexes already built keep their own `Arc`s.
    pub fn clear(&self) {
        self.keys.write().clear();
    }
}
