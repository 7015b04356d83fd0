//! Candidate file collection from configured glob patterns.

use crate::error::{Result, ValidateError};
use glob::glob;
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

const SKIPPED_DIRS: [&str; 2] = [".git", "node_modules"];

fn skipped(rel: &Path) -> bool {
    rel.components().any(|c| match c {
        Component::Normal(name) => SKIPPED_DIRS.iter().any(|d| name == OsStr::new(d)),
        _ => false,
    })
}

/// Expand `patterns` under `root` into regular files, as root-relative
/// paths with `/` separators, sorted and deduplicated. Anything under
/// `.git`, `node_modules` or one of `exclude_dirs` is left out.
pub fn collect_files(root: &Path, patterns: &[String], exclude_dirs: &[PathBuf]) -> Result<Vec<String>> {
    let mut out = BTreeSet::new();
    for pat in patterns {
        let abs_glob = root.join(pat);
        let pattern = abs_glob.to_string_lossy().to_string();
        let entries = glob(&pattern).map_err(|e| ValidateError::Pattern {
            pattern: pat.clone(),
            message: e.to_string(),
        })?;
        for path in entries.flatten() {
            if !path.is_file() || exclude_dirs.iter().any(|d| path.starts_with(d)) {
                continue;
            }
            let rel = path.strip_prefix(root).unwrap_or(path.as_path());
            if skipped(rel) {
                continue;
            }
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.insert(rel);
        }
    }
    Ok(out.into_iter().collect())
}
