//! Size ceilings: line, file, function and parameter-count limits.

use crate::adapter::ExecContext;
use crate::engine::pipeline::AdapterPipeline;
use crate::engine::{strings, Engine, EngineCapabilities, EngineConfig, ToolRequirement};
use crate::error::Result;
use crate::models::rule::Rule;
use crate::models::ValidationResult;

pub const NAME: &str = "length";

pub struct LengthEngine {
    pipeline: AdapterPipeline,
}

impl LengthEngine {
    pub fn new() -> Self {
        LengthEngine {
            pipeline: AdapterPipeline::new(NAME, "length"),
        }
    }
}

impl Default for LengthEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for LengthEngine {
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
            supported_categories: strings(&["formatting", "style"]),
            supports_autofix: false,
            requires_compilation: false,
            external_tools: vec![ToolRequirement::npm("eslint", "eslint", "^8.0.0", false)],
        }
    }
}
