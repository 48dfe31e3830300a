pub mod build;
pub mod ingest;
pub mod scan;
pub mod stats;

use crate::{
    config::Config,
    storage::sqlite::RecordStore,
    tools::{global::clean_tag_files, XrefTool},
};
use anyhow::{Context, Result};
use std::{sync::Arc, time::Instant};

pub use self::build::build_index;
pub use self::ingest::ingest_definitions;
use self::scan::scan_source_files;
pub use self::stats::{IndexBuildStats, IngestStats, RebuildStats};

/// Full rebuild: tag files, then `tag:` records, then the search index.
#[derive(Clone)]
pub struct IndexPipeline {
    config: Arc<Config>,
    store: Arc<RecordStore>,
    tool: Arc<dyn XrefTool>,
}

impl IndexPipeline {
    pub fn new(config: Arc<Config>, store: Arc<RecordStore>, tool: Arc<dyn XrefTool>) -> Self {
        Self {
            config,
            store,
            tool,
        }
    }

    /// Replaces every record with a fresh index of `base_dir`.
    ///
    /// Tool failures abort the rebuild; bad lines and failed write batches
    /// are counted in the returned stats instead.
    pub async fn index_all(&self) -> Result<RebuildStats> {
        let started_at = Instant::now();
        let root = self.config.base_dir.as_path();

        self.tool.preflight().await?;

        tracing::info!(root = %root.display(), "Cleaning existing tag database");
        clean_tag_files(root).await?;
        self.store.reset().context("Failed to reset record store")?;

        let files = scan_source_files(&self.config, root)?;
        tracing::info!(files = files.len(), "Running gtags");
        self.tool.build_tag_files(root, &files).await?;

        tracing::info!("Creating tag database");
        let mut stream = self.tool.definitions(root).await?;
        let ingest =
            ingest_definitions(&self.store, stream.reader(), self.config.ingest_batch_size).await?;
        stream.finish(ingest.lines_read).await?;

        let index = build_index(&self.store, self.config.ingest_batch_size)?;

        let elapsed_ms = started_at.elapsed().as_millis() as u64;
        tracing::info!(
            files = files.len(),
            tags = ingest.tags_written,
            tokens = index.tokens,
            elapsed_ms,
            "Rebuild complete"
        );
        Ok(RebuildStats {
            files_discovered: files.len(),
            ingest,
            index,
            elapsed_ms,
        })
    }
}
