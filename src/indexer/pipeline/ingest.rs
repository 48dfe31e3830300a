use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::stats::IngestStats;
use crate::errors::StagePolicy;
use crate::storage::keys::RecordKey;
use crate::storage::sqlite::{PutOp, RecordStore, TagRecord};

/// A definition line split into its parts: `name line file source...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionLine<'a> {
    pub name: &'a str,
    pub file: &'a str,
    pub content: &'a str,
}

/// Parses one line of definition output.
///
/// The source content is sliced from the raw line after the file field so
/// its inner spacing survives.
pub fn parse_definition_line(line: &str) -> Result<DefinitionLine<'_>> {
    let mut fields = line.split_whitespace();
    let (Some(name), Some(line_no), Some(file)) = (fields.next(), fields.next(), fields.next())
    else {
        anyhow::bail!("expected at least 3 fields");
    };

    // Search past the line number so a symbol that contains the file name
    // does not shadow it.
    let after_line_no = line
        .find(name)
        .map(|i| i + name.len())
        .and_then(|from| line[from..].find(line_no).map(|i| from + i + line_no.len()))
        .unwrap_or(0);
    let start = line[after_line_no..]
        .find(file)
        .map(|i| after_line_no + i)
        .with_context(|| format!("file field `{file}` not found in line"))?;

    let content = line[start + file.len()..].trim();
    Ok(DefinitionLine {
        name,
        file,
        content,
    })
}

/// Streams definition lines from `reader` into `tag:` records.
///
/// Writes are flushed every `batch_size` records and once more at end of
/// stream. Malformed lines and failed batches are logged and skipped.
pub async fn ingest_definitions(
    store: &RecordStore,
    reader: &mut (dyn AsyncBufRead + Send + Unpin),
    batch_size: usize,
) -> Result<IngestStats> {
    let batch_size = batch_size.max(1);
    let mut stats = IngestStats::default();
    let mut batch: Vec<PutOp> = Vec::with_capacity(batch_size.min(4096));
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .await
            .context("Failed to read definition stream")?;
        if n == 0 {
            break;
        }
        stats.lines_read += 1;

        let raw = String::from_utf8_lossy(&buf);
        let line = raw.trim_end_matches(['\n', '\r']);
        if line.trim().is_empty() {
            continue;
        }

        let op = parse_definition_line(line)
            .and_then(|def| {
                let record = TagRecord::function_definition(def.file, def.content);
                PutOp::new(RecordKey::tag(def.name), &record)
            })
            .with_context(|| format!("Malformed definition line: {line}"));
        let Some(op) = StagePolicy::INGEST_LINES.apply("ingest-line", op)? else {
            stats.lines_skipped += 1;
            continue;
        };
        batch.push(op);

        if batch.len() >= batch_size {
            flush(store, &mut batch, &mut stats)?;
        }
    }
    flush(store, &mut batch, &mut stats)?;

    tracing::info!(
        lines = stats.lines_read,
        tags = stats.tags_written,
        skipped = stats.lines_skipped,
        failed_batches = stats.batches_failed,
        "Ingested definitions"
    );
    Ok(stats)
}

fn flush(store: &RecordStore, batch: &mut Vec<PutOp>, stats: &mut IngestStats) -> Result<()> {
    if batch.is_empty() {
        return Ok(());
    }
    let len = batch.len() as u64;
    match StagePolicy::INGEST_BATCHES.apply("ingest-batch", store.batch_put(batch))? {
        Some(()) => {
            stats.batches_written += 1;
            stats.tags_written += len;
        }
        None => stats.batches_failed += 1,
    }
    batch.clear();
    Ok(())
}
