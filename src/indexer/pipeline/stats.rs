#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct IngestStats {
    pub lines_read: u64,
    pub tags_written: u64,
    pub lines_skipped: u64,
    pub batches_written: u64,
    pub batches_failed: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct IndexBuildStats {
    pub names: u64,
    pub tokens: u64,
    pub batches_failed: u64,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RebuildStats {
    pub files_discovered: usize,
    pub ingest: IngestStats,
    pub index: IndexBuildStats,
    pub elapsed_ms: u64,
}
