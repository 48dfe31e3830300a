//! Boundary to the external cross-reference tool (GNU Global).
//!
//! Everything the core needs from the tool goes through [`XrefTool`], so the
//! caller graph and the rebuild pipeline can run against an in-memory fake.

pub mod global;
pub mod parse;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use tokio::io::AsyncBufRead;
use tokio::task::JoinHandle;

use crate::errors::ToolError;

pub use global::GlobalCli;
pub use parse::parse_xref_output;

/// One `symbol line file source` row of tool output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub symbol: String,
    pub line: u32,
    pub file: String,
    pub source_text: String,
}

#[async_trait]
pub trait XrefTool: Send + Sync {
    /// Fails with [`ToolError::Preflight`] when either executable is unusable.
    async fn preflight(&self) -> Result<()>;

    /// Runs the tagging pass over `files` (paths relative to `root`), writing
    /// the tool's own index files into `root`.
    async fn build_tag_files(&self, root: &Path, files: &[String]) -> Result<()>;

    /// Lists every definition under `root` as a line stream.
    async fn definitions(&self, root: &Path) -> Result<DefinitionStream>;

    /// Every reference site of `symbol`.
    async fn references(&self, symbol: &str, cwd: &Path) -> Result<Vec<Reference>>;

    /// Every function defined in `file`.
    async fn functions_in_file(&self, file: &str, cwd: &Path) -> Result<Vec<Reference>>;
}

/// Line-oriented definition output, plus the process producing it (if any).
pub struct DefinitionStream {
    reader: Box<dyn AsyncBufRead + Send + Unpin>,
    child: Option<RunningTool>,
}

pub(crate) struct RunningTool {
    pub program: String,
    pub args: String,
    pub child: tokio::process::Child,
    pub stderr: JoinHandle<String>,
}

impl DefinitionStream {
    pub fn from_reader(reader: impl AsyncBufRead + Send + Unpin + 'static) -> Self {
        Self {
            reader: Box::new(reader),
            child: None,
        }
    }

    pub(crate) fn from_process(
        reader: impl AsyncBufRead + Send + Unpin + 'static,
        tool: RunningTool,
    ) -> Self {
        Self {
            reader: Box::new(reader),
            child: Some(tool),
        }
    }

    pub fn reader(&mut self) -> &mut (dyn AsyncBufRead + Send + Unpin) {
        self.reader.as_mut()
    }

    /// Waits for the producing process. A non-zero exit is only an error when
    /// the stream produced no lines.
    pub async fn finish(self, lines_read: u64) -> Result<()> {
        let Some(mut tool) = self.child else {
            return Ok(());
        };
        drop(self.reader);
        let status = tool.child.wait().await?;
        let stderr = tool.stderr.await.unwrap_or_default();
        if status.success() {
            return Ok(());
        }
        if lines_read == 0 {
            return Err(ToolError::Failed {
                program: tool.program,
                args: tool.args,
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            }
            .into());
        }
        tracing::warn!(
            program = %tool.program,
            status = %status,
            stderr = %stderr.trim(),
            "Definition listing exited non-zero after producing output"
        );
        Ok(())
    }
}
