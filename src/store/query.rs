//! Memoized query results.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::cache::LruTracker;
use crate::store::document::{DocumentKind, Record};
use crate::store::index::Filters;

// == Query Key ==
/// Hash of a query's shape: kind, document, document generation and filters.
///
/// Including the generation means a result computed before a document changed
/// can never be served after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryKey(u64);

impl QueryKey {
    pub fn new(
        kind: &str,
        document: DocumentKind,
        generation: u64,
        filters: Option<&Filters>,
    ) -> Self {
        let mut hasher = DefaultHasher::new();
        kind.hash(&mut hasher);
        document.hash(&mut hasher);
        generation.hash(&mut hasher);
        match filters.filter(|f| !f.is_empty()) {
            Some(filters) => {
                for (field, value) in filters {
                    field.hash(&mut hasher);
                    value.to_string().hash(&mut hasher);
                }
            }
            None => "*".hash(&mut hasher),
        }
        Self(hasher.finish())
    }
}

#[derive(Debug)]
struct QueryResult {
    document: DocumentKind,
    records: Arc<Vec<Record>>,
}

// == Query Cache ==
/// Bounded query-result table with least-recently-used eviction.
#[derive(Debug)]
pub struct QueryCache {
    capacity: usize,
    results: HashMap<QueryKey, QueryResult>,
    lru: LruTracker<QueryKey>,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            results: HashMap::new(),
            lru: LruTracker::new(),
        }
    }

    /// Returns a copy of a memoized result.
    pub fn get(&mut self, key: &QueryKey) -> Option<Vec<Record>> {
        let result = self.results.get(key)?;
        let records = result.records.as_ref().clone();
        self.lru.touch(key);
        Some(records)
    }

    /// Memoizes a result, evicting the least recently used one when full.
    pub fn put(&mut self, key: QueryKey, document: DocumentKind, records: Vec<Record>) {
        if self.capacity == 0 {
            return;
        }
        if !self.results.contains_key(&key) {
            while self.results.len() >= self.capacity {
                match self.lru.evict_oldest() {
                    Some(oldest) => {
                        self.results.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
        self.results.insert(
            key,
            QueryResult {
                document,
                records: Arc::new(records),
            },
        );
        self.lru.touch(&key);
    }

    /// Drops every result computed from `document`.
    pub fn purge_document(&mut self, document: DocumentKind) -> usize {
        let stale: Vec<QueryKey> = self
            .results
            .iter()
            .filter(|(_, result)| result.document == document)
            .map(|(key, _)| *key)
            .collect();
        for key in &stale {
            self.results.remove(key);
            self.lru.remove(key);
        }
        stale.len()
    }

    pub fn clear(&mut self) {
        self.results.clear();
        self.lru.clear();
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filters(field: &str, value: &str) -> Filters {
        Filters::from([(field.to_string(), json!(value))])
    }

    fn rows(n: i64) -> Vec<Record> {
        vec![json!({"id": n}).as_object().cloned().unwrap()]
    }

    #[test]
    fn test_key_depends_on_every_component() {
        let f = filters("status", "pending");
        let base = QueryKey::new("records", DocumentKind::Tasks, 1, Some(&f));

        assert_eq!(base, QueryKey::new("records", DocumentKind::Tasks, 1, Some(&f)));
        assert_ne!(base, QueryKey::new("records", DocumentKind::Tasks, 2, Some(&f)));
        assert_ne!(base, QueryKey::new("records", DocumentKind::Status, 1, Some(&f)));
        assert_ne!(base, QueryKey::new("records", DocumentKind::Tasks, 1, None));
        assert_ne!(
            base,
            QueryKey::new("records", DocumentKind::Tasks, 1, Some(&filters("status", "done")))
        );
    }

    #[test]
    fn test_empty_filters_match_no_filters() {
        let empty = Filters::new();
        assert_eq!(
            QueryKey::new("records", DocumentKind::Tasks, 1, Some(&empty)),
            QueryKey::new("records", DocumentKind::Tasks, 1, None)
        );
    }

    #[test]
    fn test_get_and_put() {
        let mut cache = QueryCache::new(4);
        let key = QueryKey::new("records", DocumentKind::Tasks, 1, None);

        assert!(cache.get(&key).is_none());
        cache.put(key, DocumentKind::Tasks, rows(1));
        assert_eq!(cache.get(&key), Some(rows(1)));
    }

    #[test]
    fn test_capacity_evicts_least_recently_used() {
        let mut cache = QueryCache::new(2);
        let k1 = QueryKey::new("records", DocumentKind::Tasks, 1, None);
        let k2 = QueryKey::new("records", DocumentKind::Tasks, 2, None);
        let k3 = QueryKey::new("records", DocumentKind::Tasks, 3, None);

        cache.put(k1, DocumentKind::Tasks, rows(1));
        cache.put(k2, DocumentKind::Tasks, rows(2));
        cache.get(&k1);
        cache.put(k3, DocumentKind::Tasks, rows(3));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&k1).is_some());
        assert!(cache.get(&k2).is_none());
        assert!(cache.get(&k3).is_some());
    }

    #[test]
    fn test_purge_document() {
        let mut cache = QueryCache::new(8);
        cache.put(QueryKey::new("records", DocumentKind::Tasks, 1, None), DocumentKind::Tasks, rows(1));
        cache.put(QueryKey::new("records", DocumentKind::Status, 1, None), DocumentKind::Status, rows(2));

        assert_eq!(cache.purge_document(DocumentKind::Tasks), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_zero_capacity_disables_memoization() {
        let mut cache = QueryCache::new(0);
        let key = QueryKey::new("records", DocumentKind::Tasks, 1, None);
        cache.put(key, DocumentKind::Tasks, rows(1));
        assert!(cache.is_empty());
    }
}
