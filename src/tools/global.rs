use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStderr, Command};
use tokio::task::JoinHandle;

use super::{parse_xref_output, DefinitionStream, Reference, RunningTool, XrefTool};
use crate::config::Config;
use crate::errors::ToolError;

/// Tag files written by `gtags` into the project root.
pub const TAG_FILES: &[&str] = &["GTAGS", "GRTAGS", "GPATH"];

/// [`XrefTool`] backed by the `gtags` and `global` executables.
#[derive(Debug, Clone)]
pub struct GlobalCli {
    global_cmd: String,
    gtags_cmd: String,
}

impl GlobalCli {
    pub fn new(global_cmd: impl Into<String>, gtags_cmd: impl Into<String>) -> Self {
        Self {
            global_cmd: global_cmd.into(),
            gtags_cmd: gtags_cmd.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.global_cmd, &config.gtags_cmd)
    }

    /// Runs `global` to completion and returns stdout.
    ///
    /// Non-zero exit with empty stdout fails with the tool's stderr; non-zero
    /// exit with output is accepted, since Global's exit codes are not a
    /// reliable success signal.
    async fn run_global(&self, args: &[&str], cwd: &Path) -> Result<String> {
        let output = Command::new(&self.global_cmd)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| ToolError::Spawn {
                program: self.global_cmd.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            if stdout.trim().is_empty() {
                return Err(ToolError::Failed {
                    program: self.global_cmd.clone(),
                    args: args.join(" "),
                    status: output.status.to_string(),
                    stderr,
                }
                .into());
            }
            tracing::debug!(
                args = %args.join(" "),
                status = %output.status,
                stderr = %stderr,
                "global exited non-zero with output; using output"
            );
        }
        Ok(stdout)
    }
}

#[async_trait]
impl XrefTool for GlobalCli {
    async fn preflight(&self) -> Result<()> {
        for program in [&self.global_cmd, &self.gtags_cmd] {
            check_version(program).await?;
        }
        Ok(())
    }

    async fn build_tag_files(&self, root: &Path, files: &[String]) -> Result<()> {
        let mut child = Command::new(&self.gtags_cmd)
            .args(["-f", "-"])
            .current_dir(root)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: self.gtags_cmd.clone(),
                source,
            })?;

        // gtags may warn while still reading its input.
        let stderr = drain_stderr(child.stderr.take());

        if let Some(mut stdin) = child.stdin.take() {
            let mut list = String::with_capacity(files.len() * 32);
            for f in files {
                list.push_str(f);
                list.push('\n');
            }
            stdin
                .write_all(list.as_bytes())
                .await
                .context("Failed to write file list to gtags")?;
            stdin
                .shutdown()
                .await
                .context("Failed to close gtags stdin")?;
        }

        let status = child.wait().await.context("Failed to wait for gtags")?;
        let stderr = stderr.await.unwrap_or_default();
        if !status.success() {
            return Err(ToolError::Failed {
                program: self.gtags_cmd.clone(),
                args: "-f -".to_string(),
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            }
            .into());
        }
        if !stderr.trim().is_empty() {
            tracing::debug!(warnings = stderr.lines().count(), "gtags reported warnings");
        }
        Ok(())
    }

    async fn definitions(&self, root: &Path) -> Result<DefinitionStream> {
        let args = ["-x", "."];
        let mut child = Command::new(&self.global_cmd)
            .args(args)
            .current_dir(root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                program: self.global_cmd.clone(),
                source,
            })?;

        let stdout = child
            .stdout
            .take()
            .context("global stdout was not captured")?;
        let stderr = drain_stderr(child.stderr.take());

        Ok(DefinitionStream::from_process(
            BufReader::new(stdout),
            RunningTool {
                program: self.global_cmd.clone(),
                args: args.join(" "),
                child,
                stderr,
            },
        ))
    }

    async fn references(&self, symbol: &str, cwd: &Path) -> Result<Vec<Reference>> {
        let out = self.run_global(&["-rx", symbol], cwd).await?;
        Ok(parse_xref_output(&out))
    }

    async fn functions_in_file(&self, file: &str, cwd: &Path) -> Result<Vec<Reference>> {
        let out = self.run_global(&["-xf", file], cwd).await?;
        Ok(parse_xref_output(&out))
    }
}

/// Collects a child's stderr on its own task so the child never blocks on a
/// full pipe.
fn drain_stderr(stderr: Option<ChildStderr>) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(mut stderr) = stderr {
            let _ = stderr.read_to_end(&mut buf).await;
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// `--version` must exit 0 or 1; anything else (or failing to start) means
/// the tool is unusable.
async fn check_version(program: &str) -> Result<()> {
    let output = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|err| ToolError::Preflight {
            program: program.to_string(),
            detail: err.to_string(),
        })?;
    match output.status.code() {
        Some(0) | Some(1) => {
            let stdout = String::from_utf8_lossy(&output.stdout);
            let version = stdout.lines().next().unwrap_or("").trim();
            tracing::debug!(program, version, "Tool available");
            Ok(())
        }
        _ => Err(ToolError::Preflight {
            program: program.to_string(),
            detail: format!("--version exited with {}", output.status),
        }
        .into()),
    }
}

/// Removes stale tag files left by a previous `gtags` run.
pub async fn clean_tag_files(root: &Path) -> Result<()> {
    for name in TAG_FILES {
        let path = root.join(name);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed stale tag file"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("Failed to remove tag file: {}", path.display()))
            }
        }
    }
    Ok(())
}
