//! Per-session memoization of token postings.

use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// `token -> postings` for one search session. Call [`PostingsCache::clear`]
/// when the session ends; entries go stale after a rebuild.
#[derive(Debug, Default)]
pub struct PostingsCache {
    entries: HashMap<String, BTreeSet<u64>>,
    hits: u64,
    misses: u64,
}

impl PostingsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, token: &str) -> Option<&BTreeSet<u64>> {
        match self.entries.get(token) {
            Some(ids) => {
                self.hits += 1;
                Some(ids)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, token: String, ids: BTreeSet<u64>) {
        self.entries.insert(token, ids);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_hits_and_misses_until_cleared() {
        let mut cache = PostingsCache::new();
        assert!(cache.get("bar").is_none());
        cache.insert("bar".to_string(), BTreeSet::from([2, 10]));
        assert_eq!(cache.get("bar"), Some(&BTreeSet::from([2, 10])));

        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 1,
                hits: 1,
                misses: 1
            }
        );

        cache.clear();
        assert_eq!(cache.stats(), CacheStats::default());
        assert!(cache.get("bar").is_none());
    }
}
