//! Error types for the external tool boundary and the failure policy each
//! pipeline stage runs under.

use std::fmt::Display;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{program} {args}` exited with {status}: {stderr}")]
    Failed {
        program: String,
        args: String,
        status: String,
        stderr: String,
    },

    #[error("`{program}` is not usable; install GNU Global or set GLOBAL_CMD/GTAGS_CMD ({detail})")]
    Preflight { program: String, detail: String },
}

/// How a stage reacts to a failure of one unit of work (a line, a batch, a lookup).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePolicy {
    /// Log the failure and carry on with the next unit.
    SkipAndLog,
    /// Return the failure to the caller.
    FailFast,
}

impl StagePolicy {
    pub const INGEST_LINES: StagePolicy = StagePolicy::SkipAndLog;
    pub const INGEST_BATCHES: StagePolicy = StagePolicy::SkipAndLog;
    pub const INDEX_BATCHES: StagePolicy = StagePolicy::SkipAndLog;
    pub const QUERY_POSTINGS: StagePolicy = StagePolicy::FailFast;
    pub const QUERY_RESOLVE: StagePolicy = StagePolicy::SkipAndLog;
    pub const CALLER_GRAPH: StagePolicy = StagePolicy::FailFast;

    /// Applies the policy to `result`.
    ///
    /// `Ok(Some(v))` on success, `Ok(None)` when the failure was swallowed,
    /// `Err` when the policy is fail-fast.
    pub fn apply<T, E>(self, stage: &str, result: Result<T, E>) -> Result<Option<T>, E>
    where
        E: Display,
    {
        match result {
            Ok(v) => Ok(Some(v)),
            Err(err) => match self {
                StagePolicy::SkipAndLog => {
                    let detail = format!("{err:#}");
                    tracing::warn!(stage, error = %detail, "Skipping failed unit of work");
                    Ok(None)
                }
                StagePolicy::FailFast => Err(err),
            },
        }
    }
}
