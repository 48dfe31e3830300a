use crate::config::{has_extension, Config, SOURCE_EXTENSIONS};
use anyhow::Result;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Collects every C/C++ source or header under `root`, returned as sorted
/// paths relative to `config.base_dir` with `/` separators.
pub fn scan_source_files(config: &Config, root: &Path) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for path in scan_files(root)? {
        match config.path_relative_to_base(&path) {
            Ok(rel) => out.push(rel),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Skipping file outside base dir")
            }
        }
    }
    out.sort();
    Ok(out)
}

pub fn scan_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!(dir = %dir.display(), error = %err, "Failed to read dir");
                continue;
            }
        };

        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    tracing::warn!(
                        dir = %dir.display(),
                        error = %err,
                        "Failed to read dir entry"
                    );
                    continue;
                }
            };
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(_) => continue,
            };

            if file_type.is_dir() {
                if should_skip_dir(&path) {
                    continue;
                }
                stack.push(path);
                continue;
            }

            if file_type.is_file() && should_index_file(&path) {
                out.push(path);
            }
        }
    }
    Ok(out)
}

pub fn should_skip_dir(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|s| s.to_str()) else {
        return false;
    };
    name == ".git" || name == ".cache"
}

pub fn should_index_file(path: &Path) -> bool {
    path.to_str()
        .is_some_and(|p| has_extension(p, SOURCE_EXTENSIONS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_c_family_files_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let root = dunce::canonicalize(dir.path()).unwrap();
        std::fs::create_dir_all(root.join("src/net")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        for f in [
            "main.c",
            "src/util.hpp",
            "src/net/sock.cc",
            "src/readme.md",
            ".git/objects.c",
        ] {
            std::fs::write(root.join(f), b"").unwrap();
        }

        let config = Config::for_base_dir(&root);
        let files = scan_source_files(&config, &root).unwrap();
        assert_eq!(files, vec!["main.c", "src/net/sock.cc", "src/util.hpp"]);
    }
}
