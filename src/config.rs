use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    env,
    path::{Path, PathBuf},
};

/// Extensions handed to `gtags` during discovery.
pub const SOURCE_EXTENSIONS: &[&str] = &["c", "cpp", "h", "hpp", "cc", "hh", "cxx", "hxx"];

/// Reference sites in these files are ignored by the caller graph.
pub const HEADER_EXTENSIONS: &[&str] = &["h", "hpp", "hh", "hxx"];

/// Upper bound on the candidates a single search returns.
pub const MAX_SEARCH_RESULTS: usize = 15;

pub const SETTINGS_FILE_NAME: &str = ".gtags-code.toml";

const DEFAULT_INGEST_BATCH_SIZE: usize = 50_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub base_dir: PathBuf,
    pub db_path: PathBuf,
    pub log_dir: PathBuf,
    pub global_cmd: String,
    pub gtags_cmd: String,
    pub ingest_batch_size: usize,
    pub token_prefix_match: bool,
}

/// Optional per-project settings, read from `<BASE_DIR>/.gtags-code.toml`.
/// Environment variables win over anything set here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsFile {
    pub global_cmd: Option<String>,
    pub gtags_cmd: Option<String>,
    pub ingest_batch_size: Option<usize>,
    pub token_prefix_match: Option<bool>,
}

impl SettingsFile {
    pub fn load(base_dir: &Path) -> Result<Self> {
        let path = base_dir.join(SETTINGS_FILE_NAME);
        if !path.is_file() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings: {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Invalid settings file: {}", path.display()))
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let base_dir = match optional_env("BASE_DIR") {
            Some(raw) => canonicalize_dir(Path::new(&raw))
                .with_context(|| format!("Invalid BASE_DIR: {raw}"))?,
            None => canonicalize_dir(Path::new(".")).context("Invalid working directory")?,
        };

        let settings = SettingsFile::load(&base_dir)?;

        let db_path = default_path(&base_dir, "DB_PATH", "./.cache/tagsdb.sqlite");
        let log_dir = default_path(&base_dir, "LOG_DIR", "./.cache");

        let global_cmd = optional_env("GLOBAL_CMD")
            .or(settings.global_cmd)
            .unwrap_or_else(|| "global".to_string());
        let gtags_cmd = optional_env("GTAGS_CMD")
            .or(settings.gtags_cmd)
            .unwrap_or_else(|| "gtags".to_string());

        let ingest_batch_size = optional_env("INGEST_BATCH_SIZE")
            .as_deref()
            .map(parse_usize)
            .transpose()?
            .or(settings.ingest_batch_size)
            .unwrap_or(DEFAULT_INGEST_BATCH_SIZE);
        if ingest_batch_size == 0 {
            return Err(anyhow!("INGEST_BATCH_SIZE must be at least 1"));
        }

        let token_prefix_match = optional_env("TOKEN_PREFIX_MATCH")
            .as_deref()
            .map(parse_bool)
            .transpose()?
            .or(settings.token_prefix_match)
            .unwrap_or(false);

        Ok(Self {
            base_dir,
            db_path,
            log_dir,
            global_cmd,
            gtags_cmd,
            ingest_batch_size,
            token_prefix_match,
        })
    }

    /// Config rooted at `base_dir` with every other value at its default.
    pub fn for_base_dir(base_dir: &Path) -> Self {
        Self {
            base_dir: base_dir.to_path_buf(),
            db_path: base_dir.join(".cache").join("tagsdb.sqlite"),
            log_dir: base_dir.join(".cache"),
            global_cmd: "global".to_string(),
            gtags_cmd: "gtags".to_string(),
            ingest_batch_size: DEFAULT_INGEST_BATCH_SIZE,
            token_prefix_match: false,
        }
    }

    pub fn normalize_path_to_base(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn path_relative_to_base(&self, path: &Path) -> Result<String> {
        let abs = self.normalize_path_to_base(path);
        let abs = dunce::canonicalize(&abs).unwrap_or(abs);

        let rel = abs
            .strip_prefix(&self.base_dir)
            .map_err(|_| anyhow!("Path is not under BASE_DIR: {}", abs.display()))?;

        Ok(rel.to_string_lossy().replace('\\', "/"))
    }
}

pub fn has_extension(path: &str, extensions: &[&str]) -> bool {
    Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.contains(&ext))
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|v| {
        let v = v.trim().to_string();
        if v.is_empty() {
            None
        } else {
            Some(v)
        }
    })
}

fn canonicalize_dir(path: &Path) -> Result<PathBuf> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        env::current_dir()
            .context("Failed to get current_dir")?
            .join(path)
    };
    let meta = std::fs::metadata(&path)
        .with_context(|| format!("Path does not exist: {}", path.display()))?;
    if !meta.is_dir() {
        return Err(anyhow!("Expected directory, got file: {}", path.display()));
    }
    dunce::canonicalize(&path).with_context(|| format!("Failed to canonicalize: {}", path.display()))
}

fn default_path(base_dir: &Path, key: &str, default_rel: &str) -> PathBuf {
    let raw = optional_env(key).unwrap_or_else(|| default_rel.to_string());
    let path = Path::new(&raw);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn parse_usize(value: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|err| anyhow!("Invalid integer '{value}': {err}"))
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "y" => Ok(true),
        "false" | "0" | "no" | "n" => Ok(false),
        other => Err(anyhow!("Invalid boolean '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for k in [
            "BASE_DIR",
            "DB_PATH",
            "LOG_DIR",
            "GLOBAL_CMD",
            "GTAGS_CMD",
            "INGEST_BATCH_SIZE",
            "TOKEN_PREFIX_MATCH",
        ] {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn defaults_resolve_under_base_dir() {
        let _g = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let base = tempfile::tempdir().unwrap();
        std::env::set_var("BASE_DIR", base.path());

        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.db_path, cfg.base_dir.join("./.cache/tagsdb.sqlite"));
        assert_eq!(cfg.log_dir, cfg.base_dir.join("./.cache"));
        assert_eq!(cfg.global_cmd, "global");
        assert_eq!(cfg.gtags_cmd, "gtags");
        assert_eq!(cfg.ingest_batch_size, DEFAULT_INGEST_BATCH_SIZE);
        assert!(!cfg.token_prefix_match);
    }

    #[test]
    fn base_dir_must_exist() {
        let _g = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        std::env::set_var("BASE_DIR", "/definitely/not/a/real/dir");
        let err = Config::from_env().unwrap_err().to_string();
        assert!(err.contains("BASE_DIR"));
        clear_env();
    }

    #[test]
    fn settings_file_fills_unset_env() {
        let _g = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let base = tempfile::tempdir().unwrap();
        std::fs::write(
            base.path().join(SETTINGS_FILE_NAME),
            "global_cmd = \"/opt/global/bin/global\"\ningest_batch_size = 10\n",
        )
        .unwrap();
        std::env::set_var("BASE_DIR", base.path());
        std::env::set_var("INGEST_BATCH_SIZE", "25");

        let cfg = Config::from_env().unwrap();
        assert_eq!(cfg.global_cmd, "/opt/global/bin/global");
        assert_eq!(cfg.ingest_batch_size, 25);
        clear_env();
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let _g = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();
        let base = tempfile::tempdir().unwrap();
        std::env::set_var("BASE_DIR", base.path());
        std::env::set_var("INGEST_BATCH_SIZE", "0");
        assert!(Config::from_env().is_err());
        clear_env();
    }

    #[test]
    fn bool_parsing_accepts_multiple_spellings() {
        assert!(parse_bool("yes").unwrap());
        assert!(parse_bool("1").unwrap());
        assert!(!parse_bool("N").unwrap());
        assert!(parse_bool("maybe").is_err());
    }

    #[test]
    fn header_and_source_extensions() {
        assert!(has_extension("src/a.hpp", HEADER_EXTENSIONS));
        assert!(!has_extension("src/a.cpp", HEADER_EXTENSIONS));
        assert!(has_extension("src/a.cxx", SOURCE_EXTENSIONS));
        assert!(!has_extension("src/a.rs", SOURCE_EXTENSIONS));
        assert!(!has_extension("Makefile", SOURCE_EXTENSIONS));
    }
}
