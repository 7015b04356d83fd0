//! Adapter directory, built once at startup and shared read-only.

use crate::adapter::checkstyle::CheckstyleAdapter;
use crate::adapter::eslint::EslintAdapter;
use crate::adapter::exec::SubprocessExecutor;
use crate::adapter::pmd::PmdAdapter;
use crate::adapter::prettier::PrettierAdapter;
use crate::adapter::tsc::TscAdapter;
use crate::adapter::Adapter;
use crate::error::{Result, ValidateError};
use std::path::Path;
use std::sync::Arc;

#[derive(Default, Clone)]
/// Adapters in registration order. Lookup by (language, category) returns
/// the first match, so registration order is the tie-breaker.
pub struct AdapterRegistry {
    adapters: Vec<Arc<dyn Adapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in tool set: eslint, prettier, tsc, checkstyle, pmd.
    pub fn with_defaults(tools_dir: &Path, executor: SubprocessExecutor) -> Self {
        let defaults: [Arc<dyn Adapter>; 5] = [
            Arc::new(EslintAdapter::new(tools_dir, executor.clone())),
            Arc::new(PrettierAdapter::new(tools_dir, executor.clone())),
            Arc::new(TscAdapter::new(tools_dir, executor.clone())),
            Arc::new(CheckstyleAdapter::new(tools_dir, executor.clone())),
            Arc::new(PmdAdapter::new(tools_dir, executor)),
        ];
        AdapterRegistry {
            adapters: defaults.into(),
        }
    }

    pub fn register(&mut self, adapter: Arc<dyn Adapter>) -> Result<()> {
        if self.adapters.iter().any(|a| a.name() == adapter.name()) {
            return Err(ValidateError::AdapterAlreadyRegistered(
                adapter.name().to_string(),
            ));
        }
        self.adapters.push(adapter);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Adapter>> {
        self.adapters
            .iter()
            .find(|a| a.name() == name)
            .cloned()
            .ok_or_else(|| ValidateError::UnknownAdapter(name.to_string()))
    }

    pub fn find(&self, language: &str, category: &str) -> Result<Arc<dyn Adapter>> {
        self.adapters
            .iter()
            .find(|a| {
                let caps = a.capabilities();
                caps.supports_language(language) && caps.supports_category(category)
            })
            .cloned()
            .ok_or_else(|| ValidateError::AdapterNotFound {
                language: language.to_string(),
                category: category.to_string(),
            })
    }

    /// Languages covered by any adapter handling `category`, sorted and
    /// deduplicated.
    pub fn supported_languages(&self, category: &str) -> Vec<String> {
        let mut langs: Vec<String> = self
            .adapters
            .iter()
            .map(|a| a.capabilities())
            .filter(|c| c.supports_category(category))
            .flat_map(|c| c.supported_languages)
            .collect();
        langs.sort();
        langs.dedup();
        langs
    }

    pub fn names(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.name().to_string()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}
