//! Command handlers shared by the binary and integration tests.

use anyhow::{bail, Result};
use serde_json::json;

use crate::navigate::{locate_definition, lookup_tag, CancellationFlag, Location};
use crate::retrieval::SearchSession;
use crate::storage::sqlite::TagRecord;

pub use state::AppState;

mod state;

/// A resolved definition.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Definition {
    pub name: String,
    pub file: String,
    pub location: Option<Location>,
}

/// Full rebuild; invalidates the caller graph's function cache afterwards.
pub async fn handle_rebuild(state: &AppState) -> Result<serde_json::Value> {
    let stats = state.indexer.index_all().await?;
    state.resolver.lock().await.clear_cache();
    Ok(serde_json::to_value(stats)?)
}

/// One-shot search in a fresh session.
pub fn handle_search(state: &AppState, query: &str) -> Result<serde_json::Value> {
    let mut session =
        SearchSession::new(&state.store).with_prefix_match(state.config.token_prefix_match);
    let hits = session.search(query)?;
    Ok(json!({
        "query": query,
        "count": hits.len(),
        "hits": hits,
    }))
}

/// Looks up `name` and relocates it in its file.
pub async fn handle_definition(
    state: &AppState,
    name: &str,
    cancel: &CancellationFlag,
) -> Result<Definition> {
    let Some(record) = lookup_tag(&state.store, name)? else {
        bail!("No tag named `{name}`");
    };
    let location = locate_definition(&state.config, name, &record, None, cancel).await?;
    if location.is_none() {
        tracing::warn!(name, file = %record.file, "Definition pattern not found in file");
    }
    let TagRecord { file, .. } = record;
    Ok(Definition {
        name: name.to_string(),
        file,
        location,
    })
}

pub async fn handle_refs(state: &AppState, symbol: &str) -> Result<serde_json::Value> {
    let refs = state
        .tool
        .references(symbol, &state.config.base_dir)
        .await?;
    Ok(json!({
        "symbol": symbol,
        "count": refs.len(),
        "references": refs,
    }))
}

/// Direct callers for `depth <= 1`, otherwise a nested caller tree.
pub async fn handle_callers(
    state: &AppState,
    symbol: &str,
    depth: usize,
) -> Result<serde_json::Value> {
    let cwd = state.config.base_dir.as_path();
    let mut resolver = state.resolver.lock().await;
    if depth <= 1 {
        let callers = resolver.build_graph(symbol, cwd).await?;
        return Ok(json!({
            "symbol": symbol,
            "callers": callers,
        }));
    }
    let tree = resolver.expand_tree(symbol, cwd, depth).await?;
    Ok(serde_json::to_value(tree)?)
}

/// Every reference site of `symbol`, grouped by the function it sits in.
pub async fn handle_call_sites(state: &AppState, symbol: &str) -> Result<serde_json::Value> {
    let cwd = state.config.base_dir.as_path();
    let groups = state
        .resolver
        .lock()
        .await
        .group_by_enclosing(symbol, cwd)
        .await?;
    Ok(json!({
        "symbol": symbol,
        "count": groups.len(),
        "groups": groups,
    }))
}
