pub mod cache;

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::{
    config::MAX_SEARCH_RESULTS,
    errors::StagePolicy,
    storage::{
        keys::{token_prefix_range, RecordKey},
        sqlite::{RecordStore, TagRecord},
    },
    text::tokenize,
};

pub use cache::{CacheStats, PostingsCache};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    /// Tag name.
    pub label: String,
    /// File the tag is defined in.
    pub description: String,
}

/// One interactive search session over a built index.
///
/// Postings looked up during the session are memoized until
/// [`SearchSession::reset`]. Sessions must not be shared between concurrent
/// users.
pub struct SearchSession<'s> {
    store: &'s RecordStore,
    cache: PostingsCache,
    prefix_match: bool,
}

impl<'s> SearchSession<'s> {
    pub fn new(store: &'s RecordStore) -> Self {
        Self {
            store,
            cache: PostingsCache::new(),
            prefix_match: false,
        }
    }

    /// When set, a query token also matches every indexed token it prefixes.
    pub fn with_prefix_match(mut self, prefix_match: bool) -> Self {
        self.prefix_match = prefix_match;
        self
    }

    /// Returns up to [`MAX_SEARCH_RESULTS`] tags whose name contains every
    /// token of `text`, in ascending id order.
    pub fn search(&mut self, text: &str) -> Result<Vec<SearchHit>> {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let mut sets = Vec::with_capacity(tokens.len());
        for token in &tokens {
            let postings = self.postings(token);
            let Some(postings) = StagePolicy::QUERY_POSTINGS.apply("query-postings", postings)?
            else {
                return Ok(Vec::new());
            };
            if postings.is_empty() {
                tracing::debug!(token = %token, "No postings for token");
                return Ok(Vec::new());
            }
            sets.push(postings);
        }

        let ids = intersect(&sets, MAX_SEARCH_RESULTS);
        let mut hits = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(hit) = StagePolicy::QUERY_RESOLVE.apply("query-resolve", self.resolve(id))? {
                hits.push(hit);
            }
        }
        tracing::debug!(query = %text, hits = hits.len(), "Search complete");
        Ok(hits)
    }

    /// Drops memoized postings; call when the session ends.
    pub fn reset(&mut self) {
        let stats = self.cache_stats();
        tracing::debug!(
            entries = stats.entries,
            hits = stats.hits,
            misses = stats.misses,
            "Resetting search session"
        );
        self.cache.clear();
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn postings(&mut self, token: &str) -> Result<BTreeSet<u64>> {
        if let Some(ids) = self.cache.get(token) {
            return Ok(ids.clone());
        }

        let ids: BTreeSet<u64> = if self.prefix_match {
            let (low, high) = token_prefix_range(token);
            let mut ids = BTreeSet::new();
            self.store.scan_range(&low, &high, |key, raw| {
                let list: Vec<u64> = serde_json::from_str(raw)
                    .with_context(|| format!("Corrupt postings: {key}"))?;
                ids.extend(list);
                Ok(())
            })?;
            ids
        } else {
            self.store
                .get::<Vec<u64>>(&RecordKey::token(token))?
                .map(|list| list.into_iter().collect())
                .unwrap_or_default()
        };

        self.cache.insert(token.to_string(), ids.clone());
        Ok(ids)
    }

    fn resolve(&self, id: u64) -> Result<SearchHit> {
        let name: String = self
            .store
            .get(&RecordKey::Id(id))?
            .with_context(|| format!("Dangling id: {id}"))?;
        let record: TagRecord = self
            .store
            .get(&RecordKey::tag(name.as_str()))?
            .with_context(|| format!("Missing tag record for id {id}: {name}"))?;
        Ok(SearchHit {
            label: name,
            description: record.file,
        })
    }
}

/// Ids present in every set, ascending, at most `limit` of them.
///
/// Walks the smallest set; since all sets are ordered the result is the same
/// as walking the first.
pub fn intersect(sets: &[BTreeSet<u64>], limit: usize) -> Vec<u64> {
    let Some(smallest) = sets.iter().min_by_key(|s| s.len()) else {
        return Vec::new();
    };
    smallest
        .iter()
        .copied()
        .filter(|id| sets.iter().all(|s| s.contains(id)))
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::PutOp;

    fn seeded_store() -> RecordStore {
        let store = RecordStore::in_memory().unwrap();
        let mut ops = Vec::new();
        for (id, name) in [(2u64, "getValue"), (10, "setValue"), (3, "getName")] {
            ops.push(PutOp::new(RecordKey::Id(id), name).unwrap());
            ops.push(
                PutOp::new(
                    RecordKey::tag(name),
                    &TagRecord::function_definition(format!("{name}.c"), name),
                )
                .unwrap(),
            );
        }
        ops.push(PutOp::new(RecordKey::token("get"), &vec![2u64, 3]).unwrap());
        ops.push(PutOp::new(RecordKey::token("set"), &vec![10u64]).unwrap());
        ops.push(PutOp::new(RecordKey::token("value"), &vec![2u64, 10]).unwrap());
        ops.push(PutOp::new(RecordKey::token("name"), &vec![3u64]).unwrap());
        store.batch_put(&ops).unwrap();
        store
    }

    #[test]
    fn intersects_all_query_tokens() {
        let store = seeded_store();
        let mut session = SearchSession::new(&store);
        let hits = session.search("get_value").unwrap();
        assert_eq!(
            hits,
            vec![SearchHit {
                label: "getValue".to_string(),
                description: "getValue.c".to_string()
            }]
        );
    }

    #[test]
    fn ids_are_ordered_numerically() {
        let store = seeded_store();
        let mut session = SearchSession::new(&store);
        let labels: Vec<String> = session
            .search("value")
            .unwrap()
            .into_iter()
            .map(|h| h.label)
            .collect();
        assert_eq!(labels, vec!["getValue", "setValue"]);
    }

    #[test]
    fn empty_query_and_unknown_token_return_nothing() {
        let store = seeded_store();
        let mut session = SearchSession::new(&store);
        assert!(session.search("  __ ").unwrap().is_empty());
        assert_eq!(session.cache_stats().misses, 0);
        assert!(session.search("va").unwrap().is_empty());
        assert!(session.search("get missing").unwrap().is_empty());
    }

    #[test]
    fn prefix_match_unions_postings() {
        let store = seeded_store();
        let mut session = SearchSession::new(&store).with_prefix_match(true);
        let hits = session.search("va").unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn postings_are_memoized_until_reset() {
        let store = seeded_store();
        let mut session = SearchSession::new(&store);
        session.search("get").unwrap();
        session.search("get").unwrap();
        assert_eq!(session.cache_stats().hits, 1);
        assert_eq!(session.cache_stats().entries, 1);

        session.reset();
        assert_eq!(session.cache_stats().entries, 0);
    }

    #[test]
    fn dangling_id_is_skipped() {
        let store = seeded_store();
        store.put(&RecordKey::token("ghost"), &vec![2u64, 99]).unwrap();
        let mut session = SearchSession::new(&store);
        let hits = session.search("ghost").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].label, "getValue");
    }

    #[test]
    fn results_are_capped() {
        let store = RecordStore::in_memory().unwrap();
        let ids: Vec<u64> = (1..=40).collect();
        store.put(&RecordKey::token("x"), &ids).unwrap();
        for id in &ids {
            let name = format!("x{id}");
            store.put(&RecordKey::Id(*id), &name).unwrap();
            store
                .put(&RecordKey::tag(name.as_str()), &TagRecord::function_definition("a.c", "x"))
                .unwrap();
        }
        let mut session = SearchSession::new(&store);
        let hits = session.search("x").unwrap();
        assert_eq!(hits.len(), MAX_SEARCH_RESULTS);
        assert_eq!(hits[0].label, "x1");
    }

    #[test]
    fn intersect_stops_at_limit() {
        let a = BTreeSet::from([1, 2, 3, 4, 5]);
        let b = BTreeSet::from([2, 4, 5, 9]);
        assert_eq!(intersect(&[a.clone(), b.clone()], 10), vec![2, 4, 5]);
        assert_eq!(intersect(&[a, b], 2), vec![2, 4]);
        assert!(intersect(&[], 10).is_empty());
    }
}
