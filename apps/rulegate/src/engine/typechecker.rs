//! Type correctness through the TypeScript compiler.

use crate::adapter::ExecContext;
use crate::engine::pipeline::AdapterPipeline;
use crate::engine::{strings, Engine, EngineCapabilities, EngineConfig, ToolRequirement};
use crate::error::Result;
use crate::models::rule::Rule;
use crate::models::ValidationResult;

pub const NAME: &str = "typechecker";

pub struct TypeCheckerEngine {
    pipeline: AdapterPipeline,
}

impl TypeCheckerEngine {
    pub fn new() -> Self {
        TypeCheckerEngine {
            pipeline: AdapterPipeline::new(NAME, "typechecker"),
        }
    }
}

impl Default for TypeCheckerEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for TypeCheckerEngine {
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
            supported_languages: self.pipeline.supported_languages(&["typescript", "tsx"]),
            supported_categories: strings(&["type_safety", "correctness", "custom"]),
            supports_autofix: false,
            requires_compilation: true,
            external_tools: vec![ToolRequirement::npm("typescript", "typescript", "^5.0.0", false)],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidateError;
    use crate::models::rule::Rule;
    use serde_json::json;

    #[test]
    fn test_non_typescript_files_pass_trivially() {
        let rule: Rule = serde_json::from_value(json!({
            "id": "TC-1",
            "when": {"languages": ["typescript"]},
            "check": {"engine": "typechecker"}
        }))
        .unwrap();
        let engine = TypeCheckerEngine::new();
        let files = vec!["a.js".to_string(), "b.py".to_string()];
        assert!(engine.validate(&ExecContext::new(), &rule, &files).unwrap().passed);
        let err = engine
            .validate(&ExecContext::new(), &rule, &["a.ts".to_string()])
            .unwrap_err();
        assert!(matches!(err, ValidateError::EngineNotInitialized(_)));
    }
}
