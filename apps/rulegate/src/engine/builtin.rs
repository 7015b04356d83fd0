//! Startup composition of the built-in engines.

use crate::adapter::{AdapterRegistry, SubprocessExecutor};
use crate::engine::ast::AstEngine;
use crate::engine::length::LengthEngine;
use crate::engine::pattern::PatternEngine;
use crate::engine::style::StyleEngine;
use crate::engine::typechecker::TypeCheckerEngine;
use crate::engine::{ast, length, pattern, style, typechecker};
use crate::engine::{Engine, EngineConfig, EngineRegistry};
use crate::error::Result;
use std::sync::Arc;

/// Registry holding pattern, length, style, ast and typechecker. All
/// engines share one adapter set, built here unless `config` carries one.
pub fn builtin_registry(mut config: EngineConfig) -> Result<EngineRegistry> {
    if config.adapters.is_none() {
        config.adapters = Some(Arc::new(AdapterRegistry::with_defaults(
            &config.tools_dir,
            SubprocessExecutor::with_timeout(config.timeout),
        )));
    }
    let registry = EngineRegistry::new(config);
    registry.register(
        pattern::NAME,
        Box::new(|| Ok(Box::new(PatternEngine::new()) as Box<dyn Engine>)),
    )?;
    registry.register(
        length::NAME,
        Box::new(|| Ok(Box::new(LengthEngine::new()) as Box<dyn Engine>)),
    )?;
    registry.register(
        style::NAME,
        Box::new(|| Ok(Box::new(StyleEngine::new()) as Box<dyn Engine>)),
    )?;
    registry.register(
        ast::NAME,
        Box::new(|| Ok(Box::new(AstEngine::new()) as Box<dyn Engine>)),
    )?;
    registry.register(
        typechecker::NAME,
        Box::new(|| Ok(Box::new(TypeCheckerEngine::new()) as Box<dyn Engine>)),
    )?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_builtin_engines() {
        let tools = tempdir().unwrap();
        let reg = builtin_registry(EngineConfig {
            tools_dir: tools.path().to_path_buf(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            reg.list(),
            vec!["ast", "length", "pattern", "style", "typechecker"]
        );
        let caps = reg.get("style").unwrap().capabilities();
        assert!(caps.supports_autofix);
        // Style languages aggregate eslint, prettier and checkstyle.
        assert!(caps.supported_languages.contains(&"java".to_string()));
        assert!(caps.supported_languages.contains(&"css".to_string()));
        assert!(reg
            .get("ast")
            .unwrap()
            .capabilities()
            .supported_languages
            .contains(&"java".to_string()));
        assert!(reg.config().adapters.is_some());
    }
}
