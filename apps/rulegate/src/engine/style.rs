//! Formatting rules: indentation, quotes, semicolons and friends.
//!
//! Validation goes through whichever adapter handles `style` for the
//! language (or the one the check pins with `tool`). Fixing always uses
//! Prettier in write mode.

use crate::adapter::prettier::{Mode, PrettierAdapter};
use crate::adapter::{Adapter, ExecContext, SubprocessExecutor};
use crate::engine::pipeline::AdapterPipeline;
use crate::engine::{strings, Engine, EngineCapabilities, EngineConfig, ToolRequirement};
use crate::error::{Result, ValidateError};
use crate::models::rule::{CheckSpec, Rule};
use crate::models::{Suggestion, ValidationResult};
use crate::selector::filter_files;
use tracing::info;

pub const NAME: &str = "style";

pub struct StyleEngine {
    pipeline: AdapterPipeline,
    fixer: Option<PrettierAdapter>,
}

/// Suggestion attached to style violations when the rule allows autofix.
pub fn autofix_hint(rule: &Rule) -> Option<Suggestion> {
    let remedy = rule.remedy.as_ref().filter(|r| r.autofix)?;
    let tool = remedy.tool.as_deref().unwrap_or("prettier");
    Some(Suggestion {
        desc: format!("Run {} --write to auto-fix style issues", tool),
        replacement: None,
        diff: None,
    })
}

impl StyleEngine {
    pub fn new() -> Self {
        StyleEngine {
            pipeline: AdapterPipeline::new(NAME, "style"),
            fixer: None,
        }
    }

    /// Rewrite the files `rule` selects in place. Returns the files handed
    /// to the formatter.
    pub fn autofix(&self, ctx: &ExecContext, rule: &Rule, files: &[String]) -> Result<Vec<String>> {
        let files = filter_files(files, rule.selector());
        if files.is_empty() {
            return Ok(Vec::new());
        }
        let fixer = self
            .fixer
            .as_ref()
            .ok_or_else(|| ValidateError::EngineNotInitialized(NAME.to_string()))?;
        fixer.check_availability(ctx)?;
        let config = fixer.generate_config(rule)?;
        fixer.run(ctx, &config, &files, Mode::Write)?;
        info!(rule = %rule.id, files = files.len(), "formatted");
        Ok(files.into_owned())
    }
}

impl Default for StyleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for StyleEngine {
    fn init(&mut self, config: &EngineConfig) -> Result<()> {
        self.pipeline.init(config);
        self.fixer = Some(PrettierAdapter::new(
            &config.tools_dir,
            SubprocessExecutor::with_timeout(config.timeout),
        ));
        Ok(())
    }

    fn validate(&self, ctx: &ExecContext, rule: &Rule, files: &[String]) -> Result<ValidationResult> {
        let pinned = match rule.spec() {
            Ok(CheckSpec::Style(style)) => style.tool.clone(),
            _ => None,
        };
        self.pipeline
            .run_with(ctx, rule, files, pinned.as_deref(), autofix_hint(rule))
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            name: NAME.to_string(),
            supported_languages: self
                .pipeline
                .supported_languages(&["javascript", "typescript", "jsx", "tsx"]),
            supported_categories: strings(&["style", "formatting"]),
            supports_autofix: true,
            requires_compilation: false,
            external_tools: vec![
                ToolRequirement::npm("eslint", "eslint", "^8.0.0", false),
                ToolRequirement::npm("prettier", "prettier", "^3.0.0", true),
            ],
        }
    }
}
