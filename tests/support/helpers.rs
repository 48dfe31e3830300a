//! Procedural helpers for integration tests.

use anyhow::Result;
use gtags_index::indexer::pipeline::{build_index, ingest_definitions, IndexBuildStats, IngestStats};
use gtags_index::storage::sqlite::RecordStore;
use std::path::Path;

/// Ingests `lines` as definition output and builds the search index.
pub async fn ingest_and_build(
    store: &RecordStore,
    lines: &[&str],
    batch_size: usize,
) -> Result<(IngestStats, IndexBuildStats)> {
    let mut input = lines.join("\n");
    input.push('\n');
    let mut reader = std::io::Cursor::new(input.into_bytes());
    let ingest = ingest_definitions(store, &mut reader, batch_size).await?;
    let index = build_index(store, batch_size)?;
    Ok((ingest, index))
}

/// Writes `contents` to `base/rel`, creating parent dirs.
pub fn write_source(base: &Path, rel: &str, contents: &str) {
    let path = base.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}
