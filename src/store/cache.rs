//! Bounded insertion-ordered cache, one instance per record namespace.
//!
//! The cache is a read-through/write-through layer over durable storage:
//! a miss falls back to the backend and repopulates, and eviction only
//! ever touches memory. Overflow evicts the oldest entries by insertion
//! order, at most `cleanup_buffer` per sweep so a bulk repopulation
//! amortizes its evictions across calls.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

/// Insertion-ordered key→record map with a hard entry cap.
#[derive(Debug)]
pub struct BoundedCache<T> {
    name: &'static str,
    max_entries: usize,
    cleanup_buffer: usize,
    entries: HashMap<String, T>,
    // Insertion order; keys evicted or overwritten keep a stale slot
    // that is skipped when popped.
    order: VecDeque<String>,
}

impl<T: Clone> BoundedCache<T> {
    /// Create a cache for the given namespace name and limits.
    pub fn new(name: &'static str, max_entries: usize, cleanup_buffer: usize) -> Self {
        Self {
            name,
            max_entries: max_entries.max(1),
            cleanup_buffer: cleanup_buffer.max(1),
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    /// Current number of cached records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the cache holds no records.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when the key is cached.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Fetch a cached record.
    pub fn get(&self, key: &str) -> Option<T> {
        self.entries.get(key).cloned()
    }

    /// Insert or overwrite a record; an overwrite keeps the key's
    /// original insertion position. Evicts oldest entries when the cap
    /// is exceeded.
    pub fn insert(&mut self, key: impl Into<String>, value: T) {
        let key = key.into();
        if self.entries.insert(key.clone(), value).is_none() {
            self.order.push_back(key);
        }
        self.evict_overflow();
    }

    /// Drop one record from memory. Durable storage is unaffected.
    pub fn remove(&mut self, key: &str) -> Option<T> {
        self.entries.remove(key)
    }

    /// All cached records, in arbitrary order.
    pub fn values(&self) -> Vec<T> {
        self.entries.values().cloned().collect()
    }

    /// Drop everything from memory.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn evict_overflow(&mut self) {
        if self.entries.len() <= self.max_entries {
            return;
        }
        let excess = self.entries.len() - self.max_entries;
        let batch = excess.min(self.cleanup_buffer);
        let mut evicted = 0usize;
        while evicted < batch {
            let Some(key) = self.order.pop_front() else {
                break;
            };
            // Stale slots belong to keys already removed.
            if self.entries.remove(&key).is_some() {
                evicted += 1;
            }
        }
        if evicted > 0 {
            debug!(
                cache = self.name,
                evicted,
                remaining = self.entries.len(),
                "cache eviction sweep"
            );
        }
    }
}
