//! LRU-bounded cache from query text to compiled query.
//!
//! Compiled queries are immutable, so a cached value can be reused freely
//! once obtained. The cache itself is not synchronized; callers that share
//! one across threads must serialize access.

use std::collections::HashMap;

use crate::json::Json;

#[derive(Debug, Clone)]
pub struct QueryCache {
    capacity: usize,
    cache: HashMap<String, Json>,
    /// Query texts from least to most recently used.
    use_order: Vec<String>,
}

impl QueryCache {
    pub fn new(capacity: usize) -> Self {
        QueryCache {
            capacity: capacity.max(1),
            cache: HashMap::with_capacity(capacity),
            use_order: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Look up a compiled query. A hit moves the query to the most-recent
    /// end of the use order.
    pub fn get(&mut self, query: &str) -> Option<&Json> {
        if !self.cache.contains_key(query) {
            return None;
        }
        if let Some(position) = self.use_order.iter().position(|q| q == query) {
            let touched = self.use_order.remove(position);
            self.use_order.push(touched);
        }
        self.cache.get(query)
    }

    /// Cache a compiled query. Re-adding an existing query is a no-op; on
    /// overflow the least-recently-used entry is dropped.
    pub fn add(&mut self, query: &str, compiled: Json) {
        if self.cache.contains_key(query) {
            return;
        }
        if self.cache.len() == self.capacity {
            let oldest = self.use_order.remove(0);
            self.cache.remove(&oldest);
        }
        self.cache.insert(query.to_owned(), compiled);
        self.use_order.push(query.to_owned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_get() {
        let mut cache = QueryCache::new(2);
        assert!(cache.is_empty());
        cache.add("a", Json::Int(1));
        assert_eq!(cache.get("a"), Some(&Json::Int(1)));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_re_adding_is_a_noop() {
        let mut cache = QueryCache::new(2);
        cache.add("a", Json::Int(1));
        cache.add("a", Json::Int(2));
        assert_eq!(cache.get("a"), Some(&Json::Int(1)));
    }

    #[test]
    fn test_eviction_drops_least_recently_used() {
        let mut cache = QueryCache::new(2);
        cache.add("a", Json::Int(1));
        cache.add("b", Json::Int(2));
        cache.add("c", Json::Int(3));
        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.get("b"), Some(&Json::Int(2)));
        assert_eq!(cache.get("c"), Some(&Json::Int(3)));
    }

    #[test]
    fn test_hit_refreshes_recency() {
        let mut cache = QueryCache::new(2);
        cache.add("a", Json::Int(1));
        cache.add("b", Json::Int(2));
        // touching "a" makes "b" the eviction candidate
        assert!(cache.get("a").is_some());
        cache.add("c", Json::Int(3));
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(&Json::Int(1)));
    }
}
