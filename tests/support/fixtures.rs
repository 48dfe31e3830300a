//! rstest fixtures for integration tests
//!
//! Builds an [`AppState`] rooted in a fresh temp dir and wired to
//! [`FakeXref`], an in-memory stand-in for GNU Global.

use anyhow::Result;
use async_trait::async_trait;
use gtags_index::{
    config::Config,
    errors::ToolError,
    handlers::AppState,
    tools::{DefinitionStream, Reference, XrefTool},
};
use rstest::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

static FIXTURE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Creates a unique temporary directory for test isolation.
#[fixture]
pub fn tmp_dir() -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let c = FIXTURE_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("gtags-index-fixture-{nanos}-{c}"));
    std::fs::create_dir_all(&dir).unwrap();
    dunce::canonicalize(&dir).unwrap()
}

/// Scripted cross-reference tool.
#[derive(Default)]
pub struct FakeXref {
    pub definitions: Vec<String>,
    pub refs: HashMap<String, Vec<Reference>>,
    pub functions: HashMap<String, Vec<Reference>>,
    pub fail_preflight: bool,
    pub tagged_files: Mutex<Vec<String>>,
    pub function_calls: AtomicU64,
}

impl FakeXref {
    pub fn with_definitions(lines: &[&str]) -> Self {
        Self {
            definitions: lines.iter().map(|l| l.to_string()).collect(),
            ..Default::default()
        }
    }
}

#[async_trait]
impl XrefTool for FakeXref {
    async fn preflight(&self) -> Result<()> {
        if self.fail_preflight {
            return Err(ToolError::Preflight {
                program: "global".to_string(),
                detail: "not installed".to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn build_tag_files(&self, root: &Path, files: &[String]) -> Result<()> {
        std::fs::write(root.join("GTAGS"), b"")?;
        self.tagged_files.lock().unwrap().extend_from_slice(files);
        Ok(())
    }

    async fn definitions(&self, _root: &Path) -> Result<DefinitionStream> {
        let mut out = self.definitions.join("\n");
        out.push('\n');
        Ok(DefinitionStream::from_reader(std::io::Cursor::new(
            out.into_bytes(),
        )))
    }

    async fn references(&self, symbol: &str, _cwd: &Path) -> Result<Vec<Reference>> {
        Ok(self.refs.get(symbol).cloned().unwrap_or_default())
    }

    async fn functions_in_file(&self, file: &str, _cwd: &Path) -> Result<Vec<Reference>> {
        self.function_calls.fetch_add(1, Ordering::Relaxed);
        Ok(self.functions.get(file).cloned().unwrap_or_default())
    }
}

pub fn reference(symbol: &str, line: u32, file: &str) -> Reference {
    Reference {
        symbol: symbol.to_string(),
        line,
        file: file.to_string(),
        source_text: String::new(),
    }
}

/// Config rooted at `base_dir` with a small ingest batch.
pub fn test_config(base_dir: &Path) -> Config {
    Config {
        ingest_batch_size: 2,
        ..Config::for_base_dir(base_dir)
    }
}

pub fn app_state_with(base_dir: &Path, tool: FakeXref) -> (AppState, Arc<FakeXref>) {
    let tool = Arc::new(tool);
    let state = AppState::new(test_config(base_dir), tool.clone()).unwrap();
    (state, tool)
}

/// AppState over an empty project with a tool that knows nothing.
#[fixture]
pub fn app_state(tmp_dir: PathBuf) -> AppState {
    app_state_with(&tmp_dir, FakeXref::default()).0
}
