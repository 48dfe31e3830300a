use anyhow::Result;
use std::collections::{BTreeSet, HashMap};

use super::stats::IndexBuildStats;
use crate::errors::StagePolicy;
use crate::storage::keys::{Namespace, RecordKey};
use crate::storage::sqlite::{PutOp, RecordStore};
use crate::text::tokenize;

/// Assigns ids to every tag name and writes `id:` and `token:` records.
///
/// Names are ordered by character count; equal lengths keep the order the
/// `tag:` scan produced them in (key order). Ids are 1-based positions in
/// that order.
pub fn build_index(store: &RecordStore, batch_size: usize) -> Result<IndexBuildStats> {
    let batch_size = batch_size.max(1);

    store.clear_namespace(Namespace::Id)?;
    store.clear_namespace(Namespace::Token)?;

    let mut names = store.namespace_keys(Namespace::Tag)?;
    names.sort_by_key(|name| name.chars().count());

    let mut stats = IndexBuildStats {
        names: names.len() as u64,
        ..Default::default()
    };

    let mut postings: HashMap<String, BTreeSet<u64>> = HashMap::new();
    let mut id_ops = Vec::with_capacity(names.len());
    for (idx, name) in names.iter().enumerate() {
        let id = idx as u64 + 1;
        id_ops.push(PutOp::new(RecordKey::Id(id), name)?);
        for token in tokenize(name) {
            postings.entry(token).or_default().insert(id);
        }
    }
    write_batches(store, &id_ops, batch_size, "index-ids", &mut stats)?;
    drop(id_ops);

    stats.tokens = postings.len() as u64;
    let mut token_ops = Vec::with_capacity(postings.len());
    for (token, ids) in postings {
        let ids: Vec<u64> = ids.into_iter().collect();
        token_ops.push(PutOp::new(RecordKey::token(token), &ids)?);
    }
    write_batches(store, &token_ops, batch_size, "index-tokens", &mut stats)?;

    tracing::info!(
        names = stats.names,
        tokens = stats.tokens,
        failed_batches = stats.batches_failed,
        "Built search index"
    );
    Ok(stats)
}

fn write_batches(
    store: &RecordStore,
    ops: &[PutOp],
    batch_size: usize,
    stage: &str,
    stats: &mut IndexBuildStats,
) -> Result<()> {
    for chunk in ops.chunks(batch_size) {
        if StagePolicy::INDEX_BATCHES
            .apply(stage, store.batch_put(chunk))?
            .is_none()
        {
            stats.batches_failed += 1;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::sqlite::TagRecord;

    fn seed(store: &RecordStore, names: &[&str]) {
        for name in names {
            store
                .put(
                    &RecordKey::tag(*name),
                    &TagRecord::function_definition("a.c", name),
                )
                .unwrap();
        }
    }

    #[test]
    fn ids_follow_length_then_key_order() {
        let store = RecordStore::in_memory().unwrap();
        seed(&store, &["getValue", "foo", "x", "bar"]);

        let stats = build_index(&store, 2).unwrap();
        assert_eq!(stats.names, 4);
        assert_eq!(stats.batches_failed, 0);

        let name = |id| store.get::<String>(&RecordKey::Id(id)).unwrap().unwrap();
        assert_eq!(name(1), "x");
        assert_eq!(name(2), "bar");
        assert_eq!(name(3), "foo");
        assert_eq!(name(4), "getValue");
        assert!(store.get::<String>(&RecordKey::Id(5)).unwrap().is_none());
    }

    #[test]
    fn postings_are_sorted_and_deduplicated() {
        let store = RecordStore::in_memory().unwrap();
        seed(&store, &["get_get", "getValue", "value"]);
        build_index(&store, 100).unwrap();

        let get: Vec<u64> = store.get(&RecordKey::token("get")).unwrap().unwrap();
        let value: Vec<u64> = store.get(&RecordKey::token("value")).unwrap().unwrap();
        // value=1, get_get=2, getValue=3
        assert_eq!(get, vec![2, 3]);
        assert_eq!(value, vec![1, 3]);
    }

    #[test]
    fn rebuild_replaces_previous_index() {
        let store = RecordStore::in_memory().unwrap();
        seed(&store, &["alpha", "beta"]);
        build_index(&store, 100).unwrap();

        store.clear_namespace(Namespace::Tag).unwrap();
        seed(&store, &["gamma"]);
        build_index(&store, 100).unwrap();

        assert_eq!(store.count_namespace(Namespace::Id).unwrap(), 1);
        assert!(store
            .get::<Vec<u64>>(&RecordKey::token("alpha"))
            .unwrap()
            .is_none());
    }
}
