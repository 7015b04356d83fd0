//! Validation engines, one per rule category.
//!
//! Each engine drives external tools through adapters (see `pipeline`).
//! Engines are built by factories held in an `EngineRegistry`, initialized
//! once with an `EngineConfig`, and then shared read-only across threads.

pub mod ast;
pub mod builtin;
pub mod length;
pub mod pattern;
pub mod pipeline;
pub mod registry;
pub mod style;
pub mod typechecker;

pub use builtin::builtin_registry;
pub use registry::{EngineFactory, EngineRegistry};

use crate::adapter::{default_tools_dir, AdapterRegistry, ExecContext};
use crate::error::Result;
use crate::models::rule::Rule;
use crate::models::ValidationResult;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct EngineConfig {
    pub work_dir: Option<PathBuf>,
    pub tools_dir: PathBuf,
    /// Ceiling for a single tool invocation.
    pub timeout: Duration,
    pub debug: bool,
    /// Shared adapter set. Engines build the default set when absent.
    pub adapters: Option<Arc<AdapterRegistry>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            work_dir: None,
            tools_dir: default_tools_dir(),
            timeout: crate::adapter::exec::DEFAULT_TIMEOUT,
            debug: false,
            adapters: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRequirement {
    pub name: String,
    pub version: String,
    pub optional: bool,
    pub install_command: String,
}

impl ToolRequirement {
    pub fn npm(name: &str, package: &str, version: &str, optional: bool) -> Self {
        ToolRequirement {
            name: name.to_string(),
            version: version.to_string(),
            optional,
            install_command: format!("npm install -g {}", package),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineCapabilities {
    pub name: String,
    pub supported_languages: Vec<String>,
    pub supported_categories: Vec<String>,
    pub supports_autofix: bool,
    pub requires_compilation: bool,
    pub external_tools: Vec<ToolRequirement>,
}

/// A category-specific validation backend.
pub trait Engine: Send + Sync {
    /// Called once, before the engine is shared.
    fn init(&mut self, config: &EngineConfig) -> Result<()>;

    /// Evaluate `rule` against `files`. Either a complete result or an error;
    /// never a partial violation list.
    fn validate(&self, ctx: &ExecContext, rule: &Rule, files: &[String])
        -> Result<ValidationResult>;

    fn capabilities(&self) -> EngineCapabilities;

    fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
