use dashmap::DashMap;

use crate::types::{SearchMode, SearchResponse};

/// `(normalized-query, mode, limit, type, project, layer-set)` (§4.2 Cache).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub query: String,
    pub mode: String,
    pub limit: usize,
    pub doc_type: Option<String>,
    pub project: Option<String>,
    pub layers: Option<Vec<String>>,
}

impl CacheKey {
    pub fn new(
        query: &str,
        mode: SearchMode,
        limit: usize,
        doc_type: Option<&str>,
        project: Option<&str>,
        layers: Option<&[relay_store::Layer]>,
    ) -> Self {
        let mut layer_strs: Option<Vec<String>> = layers.map(|ls| {
            let mut v: Vec<String> = ls.iter().map(|l| l.as_str().to_string()).collect();
            v.sort();
            v
        });
        if let Some(v) = &mut layer_strs {
            v.dedup();
        }
        Self {
            query: normalize(query),
            mode: format!("{mode:?}"),
            limit,
            doc_type: doc_type.map(str::to_string),
            project: project.map(str::to_string),
            layers: layer_strs,
        }
    }
}

fn normalize(query: &str) -> String {
    query.trim().to_lowercase()
}

struct Entry {
    response: SearchResponse,
    inserted_at: std::time::Instant,
}

/// Short-TTL cache for full search responses, invalidated wholesale on any
/// memory write (§4.2 Cache / §4.4 "write endpoints invalidate the cache").
pub struct RetrievalCache {
    entries: DashMap<CacheKey, Entry>,
    ttl: std::time::Duration,
}

impl RetrievalCache {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<SearchResponse> {
        let entry = self.entries.get(key)?;
        if entry.inserted_at.elapsed() < self.ttl {
            Some(entry.response.clone())
        } else {
            drop(entry);
            self.entries.remove(key);
            None
        }
    }

    pub fn put(&self, key: CacheKey, response: SearchResponse) {
        self.entries.insert(
            key,
            Entry {
                response,
                inserted_at: std::time::Instant::now(),
            },
        );
    }

    /// Invalidate the entire cache — called on every memory write.
    pub fn invalidate_all(&self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> SearchResponse {
        SearchResponse {
            results: Vec::new(),
            total_candidates: 0,
            warning: None,
        }
    }

    #[test]
    fn put_then_get_returns_cached_value() {
        let cache = RetrievalCache::new(std::time::Duration::from_secs(5));
        let key = CacheKey::new("Deploy  ", SearchMode::Hybrid, 10, None, None, None);
        cache.put(key.clone(), sample_response());
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn normalization_makes_keys_equal() {
        let a = CacheKey::new("Deploy", SearchMode::Hybrid, 10, None, None, None);
        let b = CacheKey::new(" deploy ", SearchMode::Hybrid, 10, None, None, None);
        assert_eq!(a, b);
    }

    #[test]
    fn invalidate_all_clears_cache() {
        let cache = RetrievalCache::new(std::time::Duration::from_secs(5));
        let key = CacheKey::new("deploy", SearchMode::Hybrid, 10, None, None, None);
        cache.put(key.clone(), sample_response());
        cache.invalidate_all();
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn expired_entry_is_not_returned() {
        let cache = RetrievalCache::new(std::time::Duration::from_millis(1));
        let key = CacheKey::new("deploy", SearchMode::Hybrid, 10, None, None, None);
        cache.put(key.clone(), sample_response());
        std::thread::sleep(std::time::Duration::from_millis(10));
        assert!(cache.get(&key).is_none());
    }
}
