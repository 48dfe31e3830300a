use serde::{Deserialize, Serialize};

/// How a tag's relocation pattern is interpreted when navigating to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagKind {
    /// The pattern is an anchored source line; navigation searches for it.
    #[serde(rename = "function-definition")]
    FunctionDefinition,
    /// The tag names a file; navigation uses an explicit line/column offset.
    #[serde(rename = "file-marker")]
    FileMarker,
}

/// Value stored under `tag:<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub file: String,
    pub pattern: String,
    pub kind: TagKind,
}

impl TagRecord {
    /// Record for a definition whose source line is `line_text`, anchored as
    /// `^<line_text>$`.
    pub fn function_definition(file: impl Into<String>, line_text: &str) -> Self {
        Self {
            file: file.into(),
            pattern: format!("^{}$", line_text),
            kind: TagKind::FunctionDefinition,
        }
    }
}

pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS records (
  key TEXT PRIMARY KEY NOT NULL,
  value TEXT NOT NULL
) WITHOUT ROWID;
"#;
