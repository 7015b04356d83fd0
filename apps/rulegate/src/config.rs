//! Configuration discovery and effective settings resolution.
//!
//! Rulegate reads `rulegate.toml|yaml|yml` from the repository root (or
//! closest ancestor) and merges it with CLI flags to produce an `Effective`
//! config.
//! Defaults:
//! - `policy`: `.rulegate/policy.json`
//! - `output`: `human`
//! - `tools_dir`: `<home>/.rulegate/tools`
//! - `timeout_secs`: 120
//! - `parallelism`: 0 (rayon default)
//! - `patterns`: `["**/*"]`
//!
//! Overrides precedence: CLI > config file > defaults.

use crate::adapter::default_tools_dir;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

pub const CONFIG_FILES: [&str; 3] = ["rulegate.toml", "rulegate.yaml", "rulegate.yml"];
pub const DEFAULT_POLICY: &str = ".rulegate/policy.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Default, Deserialize, Clone)]
/// Run scope defaults under `[scope]`.
pub struct ScopeCfg {
    pub branch: Option<String>,
    pub role: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
/// Root configuration loaded from `rulegate.toml|yaml`.
pub struct RulegateConfig {
    pub policy: Option<String>,
    pub output: Option<String>,
    pub tools_dir: Option<String>,
    pub timeout_secs: Option<u64>,
    pub parallelism: Option<usize>,
    pub patterns: Option<Vec<String>>,
    #[serde(default)]
    pub scope: Option<ScopeCfg>,
}

#[derive(Debug, Clone)]
/// Fully-resolved configuration used by commands after applying precedence.
pub struct Effective {
    pub repo_root: PathBuf,
    pub policy: PathBuf,
    pub output: String,
    pub tools_dir: PathBuf,
    pub timeout: Duration,
    pub parallelism: usize,
    pub patterns: Vec<String>,
    pub branch: Option<String>,
    pub role: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Clone)]
/// Flags from the command line; `None`/empty means "not given".
pub struct CliOverrides<'a> {
    pub repo_root: Option<&'a str>,
    pub policy: Option<&'a str>,
    pub output: Option<&'a str>,
    pub timeout_secs: Option<u64>,
    pub branch: Option<&'a str>,
    pub role: Option<&'a str>,
    pub tags: &'a [String],
}

/// Walk upward from `start` to detect the repository root.
///
/// Stops when a `rulegate.toml|yaml|yml` or a `.git` directory is found.
pub fn detect_repo_root(start: &Path) -> PathBuf {
    let mut cur = start;
    loop {
        if CONFIG_FILES.iter().any(|name| cur.join(name).exists()) {
            return cur.to_path_buf();
        }
        if cur.join(".git").exists() {
            return cur.to_path_buf();
        }
        match cur.parent() {
            Some(p) => cur = p,
            None => return start.to_path_buf(),
        }
    }
}

/// Load `RulegateConfig` from `rulegate.toml` or `rulegate.yaml|yml` if
/// present. An unreadable or malformed file is logged and ignored.
pub fn load_config(root: &Path) -> Option<RulegateConfig> {
    let toml_path = root.join("rulegate.toml");
    if toml_path.exists() {
        let s = fs::read_to_string(&toml_path).ok()?;
        return match toml::from_str(&s) {
            Ok(cfg) => Some(cfg),
            Err(e) => {
                warn!(path = %toml_path.display(), error = %e, "ignoring invalid config");
                None
            }
        };
    }
    for yml in ["rulegate.yaml", "rulegate.yml"] {
        let p = root.join(yml);
        if p.exists() {
            let s = fs::read_to_string(&p).ok()?;
            return match serde_yaml::from_str(&s) {
                Ok(cfg) => Some(cfg),
                Err(e) => {
                    warn!(path = %p.display(), error = %e, "ignoring invalid config");
                    None
                }
            };
        }
    }
    None
}

/// Resolve `Effective` by merging CLI flags, discovered config, and defaults.
pub fn resolve_effective(cli: &CliOverrides) -> Effective {
    let start = PathBuf::from(cli.repo_root.unwrap_or("."));
    let repo_root = detect_repo_root(&start);
    let cfg = load_config(&repo_root).unwrap_or_default();
    let scope = cfg.scope.unwrap_or_default();

    let policy = cli
        .policy
        .map(|s| s.to_string())
        .or(cfg.policy)
        .unwrap_or_else(|| DEFAULT_POLICY.to_string());
    let policy = if Path::new(&policy).is_absolute() {
        PathBuf::from(policy)
    } else {
        repo_root.join(policy)
    };

    let output = cli
        .output
        .map(|s| s.to_string())
        .or(cfg.output)
        .unwrap_or_else(|| "human".to_string());

    let tools_dir = cfg
        .tools_dir
        .map(|d| {
            let p = PathBuf::from(d);
            if p.is_absolute() {
                p
            } else {
                repo_root.join(p)
            }
        })
        .unwrap_or_else(default_tools_dir);

    let timeout_secs = cli
        .timeout_secs
        .or(cfg.timeout_secs)
        .filter(|s| *s > 0)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);

    let patterns = cfg
        .patterns
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| vec!["**/*".to_string()]);

    let tags = if cli.tags.is_empty() {
        scope.tags
    } else {
        cli.tags.to_vec()
    };

    Effective {
        repo_root,
        policy,
        output,
        tools_dir,
        timeout: Duration::from_secs(timeout_secs),
        parallelism: cfg.parallelism.unwrap_or(0),
        patterns,
        branch: cli.branch.map(|s| s.to_string()).or(scope.branch),
        role: cli.role.map(|s| s.to_string()).or(scope.role),
        tags,
    }
}
