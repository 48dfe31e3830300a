//! Turning a stored tag back into a concrete file position.

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    config::Config,
    storage::{
        keys::RecordKey,
        sqlite::{RecordStore, TagKind, TagRecord},
    },
};

/// Cooperative cancellation for long file scans.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// 1-based line, 0-based column counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Location {
    pub line: u32,
    pub column: u32,
}

/// Relocation pattern with its anchors removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinePattern {
    Whole(String),
    Prefix(String),
}

impl LinePattern {
    /// `^text$` matches a whole line, `^text` a line prefix. Anything else
    /// is unsupported.
    pub fn parse(pattern: &str) -> Option<Self> {
        let body = pattern.strip_prefix('^')?;
        Some(match body.strip_suffix('$') {
            Some(text) => LinePattern::Whole(text.trim().to_string()),
            None => LinePattern::Prefix(body.trim().to_string()),
        })
    }

    pub fn matches(&self, line: &str) -> bool {
        let line = line.trim();
        match self {
            LinePattern::Whole(text) => line == text,
            LinePattern::Prefix(text) => line.starts_with(text.as_str()),
        }
    }
}

pub fn lookup_tag(store: &RecordStore, name: &str) -> Result<Option<TagRecord>> {
    store.get(&RecordKey::tag(name))
}

/// Finds where `record` (the tag called `name`) is defined.
///
/// `hint` is the explicit `(line, column)` used by file markers. Returns
/// `None` when the pattern is not found, unsupported, or the scan was
/// cancelled.
pub async fn locate_definition(
    config: &Config,
    name: &str,
    record: &TagRecord,
    hint: Option<Location>,
    cancel: &CancellationFlag,
) -> Result<Option<Location>> {
    if record.kind == TagKind::FileMarker {
        return Ok(Some(hint.unwrap_or(Location { line: 1, column: 0 })));
    }

    let Some(pattern) = LinePattern::parse(&record.pattern) else {
        tracing::warn!(pattern = %record.pattern, "Unsupported relocation pattern");
        return Ok(None);
    };

    let path = config.normalize_path_to_base(std::path::Path::new(&record.file));
    let file = tokio::fs::File::open(&path)
        .await
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();

    let mut line_no: u32 = 0;
    loop {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if n == 0 {
            break;
        }
        line_no += 1;

        // Source files are not guaranteed to be UTF-8.
        let raw = String::from_utf8_lossy(&buf);
        let line = raw.trim_end_matches(['\n', '\r']);
        if pattern.matches(line) {
            let column = line
                .find(name)
                .map(|byte| line[..byte].chars().count() as u32)
                .unwrap_or(0);
            tracing::debug!(file = %record.file, line = line_no, column, "Located definition");
            return Ok(Some(Location {
                line: line_no,
                column,
            }));
        }
        if cancel.is_cancelled() {
            tracing::debug!(file = %record.file, "Pattern search cancelled");
            return Ok(None);
        }
    }
    Ok(None)
}
