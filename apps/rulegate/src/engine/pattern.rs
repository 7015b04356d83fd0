//! Identifier, content and import patterns.

use crate::adapter::ExecContext;
use crate::engine::pipeline::AdapterPipeline;
use crate::engine::{strings, Engine, EngineCapabilities, EngineConfig};
use crate::error::Result;
use crate::models::rule::Rule;
use crate::models::ValidationResult;

pub const NAME: &str = "pattern";

pub struct PatternEngine {
    pipeline: AdapterPipeline,
}

impl PatternEngine {
    pub fn new() -> Self {
        PatternEngine {
            pipeline: AdapterPipeline::new(NAME, "pattern"),
        }
    }
}

impl Default for PatternEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for PatternEngine {
    fn init(&mut self, config: &EngineConfig) -> Result<()> {
        self.pipeline.init(config);
        Ok(())
    }

    fn validate(&self, ctx: &ExecContext, rule: &Rule, files: &[String]) -> Result<ValidationResult> {
        self.pipeline.run(ctx, rule, files)
    }

    /// Languages come from whichever adapters handle patterns.
    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            name: NAME.to_string(),
            supported_languages: self
                .pipeline
                .supported_languages(&["javascript", "typescript", "jsx", "tsx"]),
            supported_categories: strings(&["naming", "security", "custom"]),
            supports_autofix: false,
            requires_compilation: false,
            external_tools: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AdapterRegistry, SubprocessExecutor};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_languages_aggregate_registered_adapters() {
        let tools = tempdir().unwrap();
        let adapters = AdapterRegistry::with_defaults(tools.path(), SubprocessExecutor::default());
        let mut engine = PatternEngine::new();
        engine
            .init(&EngineConfig {
                tools_dir: tools.path().to_path_buf(),
                adapters: Some(Arc::new(adapters)),
                ..Default::default()
            })
            .unwrap();
        let langs = engine.capabilities().supported_languages;
        assert!(langs.contains(&"java".to_string()));
        assert!(langs.contains(&"javascript".to_string()));
    }
}
