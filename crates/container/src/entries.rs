use std::collections::HashMap;

/// Insertion-ordered key → value mapping where the first insert of a key wins.
///
/// This is the encoder's input. Iteration order is insertion order, which is
/// also the order header entries and value slots are written in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryMap {
    entries: Vec<(String, String)>,
    positions: HashMap<String, usize>,
}

impl EntryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `key` → `value` unless `key` is already present.
    ///
    /// Returns `false` (and drops `value`) for a duplicate key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if self.positions.contains_key(&key) {
            return false;
        }
        self.positions.insert(key.clone(), self.entries.len());
        self.entries.push((key, value.into()));
        true
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.positions
            .get(key)
            .map(|&i| self.entries[i].1.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.positions.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EntryMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = EntryMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}
