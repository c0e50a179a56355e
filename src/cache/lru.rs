//! Recency Tracker Module
//!
//! Access-order bookkeeping for the small bounded tables of the document
//! store (parsed documents, memoized queries).

use std::collections::VecDeque;

// == LRU Tracker ==
/// Tracks recency order for eviction of small tables.
///
/// Keys are stored in a VecDeque where:
/// - Front = Most recently used
/// - Back = Least recently used
///
/// Touch and remove are linear in the number of tracked keys, which is fine
/// for tables bounded to a few hundred slots.
#[derive(Debug, Clone)]
pub struct LruTracker<K> {
    order: VecDeque<K>,
}

impl<K: PartialEq + Clone> LruTracker<K> {
    // == Constructor ==
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    // == Touch ==
    /// Marks a key as most recently used, adding it if untracked.
    pub fn touch(&mut self, key: &K) {
        self.remove(key);
        self.order.push_front(key.clone());
    }

    // == Remove ==
    /// Stops tracking a key.
    pub fn remove(&mut self, key: &K) {
        self.order.retain(|k| k != key);
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    pub fn evict_oldest(&mut self) -> Option<K> {
        self.order.pop_back()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.order.clear();
    }
}

impl<K: PartialEq + Clone> Default for LruTracker<K> {
    fn default() -> Self {
        Self::new()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_new() {
        let lru: LruTracker<u64> = LruTracker::new();
        assert!(lru.is_empty());
        assert_eq!(lru.len(), 0);
    }

    #[test]
    fn test_lru_touch_existing_key() {
        let mut lru = LruTracker::new();

        lru.touch(&1u64);
        lru.touch(&2);
        lru.touch(&3);

        // Touch 1 again - should move to front
        lru.touch(&1);

        assert_eq!(lru.len(), 3);
        assert_eq!(lru.evict_oldest(), Some(2));
    }

    #[test]
    fn test_lru_evict_oldest() {
        let mut lru = LruTracker::new();

        lru.touch(&"a".to_string());
        lru.touch(&"b".to_string());

        assert_eq!(lru.evict_oldest(), Some("a".to_string()));
        assert_eq!(lru.evict_oldest(), Some("b".to_string()));
        assert_eq!(lru.evict_oldest(), None);
    }

    #[test]
    fn test_lru_remove() {
        let mut lru = LruTracker::new();

        lru.touch(&10u64);
        lru.touch(&20);
        lru.remove(&10);
        lru.remove(&99);

        assert_eq!(lru.len(), 1);
        assert_eq!(lru.evict_oldest(), Some(20));
    }

    #[test]
    fn test_lru_order_after_multiple_touches() {
        let mut lru = LruTracker::new();

        // touch(a): [a]; touch(b): [b, a]; touch(c): [c, b, a]
        lru.touch(&'a');
        lru.touch(&'b');
        lru.touch(&'c');
        // touch(a): [a, c, b]; touch(c): [c, a, b]; touch(b): [b, c, a]
        lru.touch(&'a');
        lru.touch(&'c');
        lru.touch(&'b');

        assert_eq!(lru.evict_oldest(), Some('a'));
        assert_eq!(lru.evict_oldest(), Some('c'));
        assert_eq!(lru.evict_oldest(), Some('b'));
    }

    #[test]
    fn test_lru_clear() {
        let mut lru = LruTracker::new();
        lru.touch(&1u8);
        lru.touch(&2u8);
        lru.clear();
        assert!(lru.is_empty());
    }
}
