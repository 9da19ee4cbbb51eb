//! Access tracking for cache eviction.
//!
//! Stamps come from a monotonic counter rather than the wall clock, so two
//! accesses in quick succession are still strictly ordered.

use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug)]
pub struct LruTracker<K> {
    stamps: HashMap<K, u64>,
    clock: u64,
}

impl<K: Copy + Eq + Hash + Ord> LruTracker<K> {
    pub fn new() -> Self {
        LruTracker {
            stamps: HashMap::new(),
            clock: 0,
        }
    }

    /// Records an access and returns its stamp.
    pub fn touch(&mut self, key: K) -> u64 {
        self.clock += 1;
        self.stamps.insert(key, self.clock);
        self.clock
    }

    pub fn stamp(&self, key: K) -> Option<u64> {
        self.stamps.get(&key).copied()
    }

    /// Least recently touched key.
    pub fn oldest(&self) -> Option<K> {
        self.stamps
            .iter()
            .min_by_key(|&(_, &stamp)| stamp)
            .map(|(&key, _)| key)
    }

    /// Newest stamp among the keys matching `filter`, 0 if there are none.
    pub fn newest_where(&self, filter: impl Fn(&K) -> bool) -> u64 {
        self.stamps
            .iter()
            .filter(|(key, _)| filter(*key))
            .map(|(_, &stamp)| stamp)
            .max()
            .unwrap_or(0)
    }

    /// Keys matching `filter`, sorted.
    pub fn keys_where(&self, filter: impl Fn(&K) -> bool) -> Vec<K> {
        let mut keys: Vec<K> = self.stamps.keys().copied().filter(|key| filter(key)).collect();
        keys.sort();
        keys
    }

    pub fn remove(&mut self, key: K) {
        self.stamps.remove(&key);
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }

    pub fn clear(&mut self) {
        self.stamps.clear();
    }
}

impl<K: Copy + Eq + Hash + Ord> Default for LruTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}
