//! Structural rules expressed as AST queries.
//!
//! The query is compiled into a selector by the adapter's config step
//! (`query::AstQuery::generate_selector`); this engine only routes.

use crate::adapter::ExecContext;
use crate::engine::pipeline::AdapterPipeline;
use crate::engine::{strings, Engine, EngineCapabilities, EngineConfig};
use crate::error::{Result, ValidateError};
use crate::models::rule::{CheckSpec, Rule};
use crate::models::ValidationResult;

pub const NAME: &str = "ast";

pub struct AstEngine {
    pipeline: AdapterPipeline,
}

impl AstEngine {
    pub fn new() -> Self {
        AstEngine {
            pipeline: AdapterPipeline::new(NAME, "ast"),
        }
    }

    /// The selector string the backend receives for `rule`.
    pub fn selector(rule: &Rule) -> Result<String> {
        match rule.spec()? {
            CheckSpec::Ast(query) => Ok(query.generate_selector()),
            _ => Err(ValidateError::config(&rule.id, "not an AST rule")),
        }
    }
}

impl Default for AstEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for AstEngine {
    fn init(&mut self, config: &EngineConfig) -> Result<()> {
        self.pipeline.init(config);
        Ok(())
    }

    fn validate(&self, ctx: &ExecContext, rule: &Rule, files: &[String]) -> Result<ValidationResult> {
        self.pipeline.run(ctx, rule, files)
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            name: NAME.to_string(),
            supported_languages: self
                .pipeline
                .supported_languages(&["javascript", "typescript", "jsx", "tsx"]),
            supported_categories: strings(&["error_handling", "custom"]),
            supports_autofix: false,
            requires_compilation: false,
            external_tools: Vec::new(),
        }
    }
}
