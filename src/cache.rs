// src/cache.rs
//! Bounded least-recently-used cache
//!
//! Used for lookups scoped to one build session, e.g. repositories opened
//! by location or parsed project metadata. Entries live in an arena of
//! nodes linked into a recency list; a `HashMap` indexes keys to arena
//! slots. `get` moves an entry to the front, `put` evicts from the back.
//!
//! The cache is a performance aid only: an evicted entry is recomputed by
//! the caller.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Mutex;

use tracing::trace;

/// Default capacity when none is configured
pub const DEFAULT_CAPACITY: usize = 64;

struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Single-threaded LRU cache
pub struct LruCache<K, V> {
    capacity: usize,
    nodes: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    index: HashMap<K, usize>,
    /// Most recently used
    head: Option<usize>,
    /// Least recently used
    tail: Option<usize>,
}

impl<K: Hash + Eq + Clone, V> LruCache<K, V> {
    /// Create a cache holding at most `capacity` entries (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            index: HashMap::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    fn node(&self, slot: usize) -> Option<&Node<K, V>> {
        self.nodes.get(slot).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, slot: usize) -> Option<&mut Node<K, V>> {
        self.nodes.get_mut(slot).and_then(Option::as_mut)
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = match self.node(slot) {
            Some(node) => (node.prev, node.next),
            None => return,
        };
        match prev {
            Some(p) => {
                if let Some(node) = self.node_mut(p) {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.node_mut(n) {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
        if let Some(node) = self.node_mut(slot) {
            node.prev = None;
            node.next = None;
        }
    }

    fn push_front(&mut self, slot: usize) {
        let old_head = self.head;
        if let Some(node) = self.node_mut(slot) {
            node.prev = None;
            node.next = old_head;
        }
        if let Some(h) = old_head
            && let Some(node) = self.node_mut(h)
        {
            node.prev = Some(slot);
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
    }

    /// Look up a value and mark it most recently used
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let slot = *self.index.get(key)?;
        if self.head != Some(slot) {
            self.unlink(slot);
            self.push_front(slot);
        }
        self.node(slot).map(|n| &n.value)
    }

    /// Look up a value without touching recency
    pub fn peek(&self, key: &K) -> Option<&V> {
        let slot = *self.index.get(key)?;
        self.node(slot).map(|n| &n.value)
    }

    /// Insert or replace a value
    ///
    /// Returns the evicted least recently used entry when the cache was
    /// full. Replacing an existing key never evicts.
    pub fn put(&mut self, key: K, value: V) -> Option<(K, V)> {
        if let Some(&slot) = self.index.get(&key) {
            if let Some(node) = self.node_mut(slot) {
                node.value = value;
            }
            if self.head != Some(slot) {
                self.unlink(slot);
                self.push_front(slot);
            }
            return None;
        }

        let evicted = if self.index.len() >= self.capacity {
            self.pop_lru()
        } else {
            None
        };

        let node = Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        self.index.insert(key, slot);
        self.push_front(slot);
        evicted
    }

    /// Remove and return the least recently used entry
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        let slot = self.tail?;
        self.unlink(slot);
        let node = self.nodes.get_mut(slot)?.take()?;
        self.index.remove(&node.key);
        self.free.push(slot);
        trace!("Evicted least recently used cache entry");
        Some((node.key, node.value))
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.index.remove(key)?;
        self.unlink(slot);
        let node = self.nodes.get_mut(slot)?.take()?;
        self.free.push(slot);
        Some(node.value)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    /// Keys from most to least recently used
    pub fn keys_by_recency(&self) -> Vec<&K> {
        let mut keys = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(slot) = cursor {
            let Some(node) = self.node(slot) else { break };
            keys.push(&node.key);
            cursor = node.next;
        }
        keys
    }
}

/// Thread-safe wrapper sharing one [`LruCache`] behind a mutex
pub struct SharedLruCache<K, V> {
    inner: Mutex<LruCache<K, V>>,
}

impl<K: Hash + Eq + Clone, V: Clone> SharedLruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Cached value for `key`, computing and inserting it on a miss
    pub fn get_or_insert_with<E>(&self, key: K, compute: impl FnOnce() -> Result<V, E>) -> Result<V, E> {
        if let Some(value) = self.lock().get(&key) {
            return Ok(value.clone());
        }
        let value = compute()?;
        self.lock().put(key, value.clone());
        Ok(value)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<K, V>> {
        // A panic while holding the lock leaves the cache structurally valid
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evicts_least_recently_used() {
        let mut cache = LruCache::new(2);
        assert!(cache.put("a", 1).is_none());
        assert!(cache.put("b", 2).is_none());
        assert_eq!(cache.put("c", 3), Some(("a", 1)));
        assert!(!cache.contains_key(&"a"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_get_refreshes_recency() {
        let mut cache = LruCache::new(2);
        cache.put("a", 1);
        cache.put("b", 2);
        assert_eq!(cache.get(&"a"), Some(&1));
        assert_eq!(cache.put("c", 3), Some(("b", 2)));
        assert_eq!(cache.keys_by_recency(), vec![&"c", &"a"]);
    }

    #[test]
    fn test_peek_does_not_refresh() {
        let mut cache = LruCache::new(2);
        cache.put("a", 1);
        cache.put("b", 2);
        assert_eq!(cache.peek(&"a"), Some(&1));
        assert_eq!(cache.put("c", 3), Some(("a", 1)));
    }

    #[test]
    fn test_replace_does_not_evict() {
        let mut cache = LruCache::new(2);
        cache.put("a", 1);
        cache.put("b", 2);
        assert!(cache.put("a", 10).is_none());
        assert_eq!(cache.peek(&"a"), Some(&10));
        assert_eq!(cache.keys_by_recency(), vec![&"a", &"b"]);
    }

    #[test]
    fn test_remove_and_reuse_slots() {
        let mut cache = LruCache::new(3);
        cache.put(1, "one");
        cache.put(2, "two");
        cache.put(3, "three");
        assert_eq!(cache.remove(&2), Some("two"));
        cache.put(4, "four");
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.keys_by_recency(), vec![&4, &3, &1]);
        assert_eq!(cache.pop_lru(), Some((1, "one")));
        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.pop_lru().is_none());
    }

    #[test]
    fn test_capacity_is_at_least_one() {
        let mut cache = LruCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.put("a", 1);
        assert_eq!(cache.put("b", 2), Some(("a", 1)));
    }

    #[test]
    fn test_shared_cache_computes_once() {
        let cache = SharedLruCache::new(4);
        let mut calls = 0;
        for _ in 0..3 {
            let value: Result<u32, ()> = cache.get_or_insert_with("k", || {
                calls += 1;
                Ok(42)
            });
            assert_eq!(value, Ok(42));
        }
        assert_eq!(calls, 1);
        assert_eq!(cache.len(), 1);
    }
}
