//! Adapters: one wrapper per external analysis tool.
//!
//! An adapter turns a rule into the tool's native configuration, runs the
//! tool on a file list and parses whatever it prints into `RawViolation`s.
//! Engines own the orchestration (see `engine::pipeline`); adapters stay
//! stateless apart from the tools directory they were built with, so one
//! instance can serve concurrent rule evaluations.

pub mod checkstyle;
pub mod eslint;
pub mod exec;
pub mod pmd;
pub mod prettier;
pub mod registry;
pub mod tsc;

pub use exec::{CancelToken, ExecContext, SubprocessExecutor};
pub use registry::AdapterRegistry;

use crate::error::Result;
use crate::models::rule::Rule;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct AdapterCapabilities {
    pub name: String,
    pub supported_languages: Vec<String>,
    pub supported_categories: Vec<String>,
    /// Version or version constraint of the wrapped tool.
    pub version: String,
}

impl AdapterCapabilities {
    pub fn new(name: &str, languages: &[&str], categories: &[&str], version: &str) -> Self {
        AdapterCapabilities {
            name: name.to_string(),
            supported_languages: languages.iter().map(|s| s.to_string()).collect(),
            supported_categories: categories.iter().map(|s| s.to_string()).collect(),
            version: version.to_string(),
        }
    }

    pub fn supports_language(&self, language: &str) -> bool {
        self.supported_languages
            .iter()
            .any(|l| l.eq_ignore_ascii_case(language))
    }

    pub fn supports_category(&self, category: &str) -> bool {
        self.supported_categories.iter().any(|c| c == category)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstallConfig {
    pub tools_dir: PathBuf,
    /// Empty means the adapter's default version.
    pub version: Option<String>,
    pub force: bool,
}

impl InstallConfig {
    /// Install target, falling back to the adapter's own tools directory.
    pub fn dir<'a>(&'a self, fallback: &'a Path) -> &'a Path {
        if self.tools_dir.as_os_str().is_empty() {
            fallback
        } else {
            &self.tools_dir
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Raw result of one tool invocation.
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl ToolOutput {
    /// Output for an invocation skipped because there was nothing to check.
    pub fn empty(stdout: &str) -> Self {
        ToolOutput {
            stdout: stdout.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// A violation as the tool reported it, before normalization.
pub struct RawViolation {
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub end_line: Option<u32>,
    pub end_column: Option<u32>,
    pub message: String,
    /// Tool severity word (`error|warning|info`).
    pub severity: String,
    /// Tool-native rule identifier (`max-len`, `TS2322`, `LineLength`...).
    pub rule_id: String,
}

/// Uniform contract over one external analysis tool.
pub trait Adapter: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> AdapterCapabilities;

    /// `Ok` when the tool can be invoked right now.
    fn check_availability(&self, ctx: &ExecContext) -> Result<()>;

    fn install(&self, ctx: &ExecContext, config: &InstallConfig) -> Result<()>;

    /// Tool-native configuration for `rule`.
    fn generate_config(&self, rule: &Rule) -> Result<Vec<u8>>;

    /// Run the tool. A nonzero exit the tool uses to report findings is not
    /// an error here; launch failures and tool crashes are.
    fn execute(&self, ctx: &ExecContext, config: &[u8], files: &[String]) -> Result<ToolOutput>;

    fn parse_output(&self, output: &ToolOutput) -> Result<Vec<RawViolation>>;
}

/// Default tools directory: `<home>/.rulegate/tools`.
pub fn default_tools_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".rulegate")
        .join("tools")
}
