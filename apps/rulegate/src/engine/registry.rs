//! Name -> engine factory, with lazily created, initialized and cached
//! instances. Built explicitly at startup; there is no process-wide registry.

use crate::engine::{Engine, EngineCapabilities, EngineConfig};
use crate::error::{Result, ValidateError};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Builds an uninitialized engine.
pub type EngineFactory = Box<dyn Fn() -> Result<Box<dyn Engine>> + Send + Sync>;

#[derive(Default)]
struct Inner {
    factories: HashMap<String, EngineFactory>,
    engines: HashMap<String, Arc<dyn Engine>>,
}

pub struct EngineRegistry {
    config: EngineConfig,
    inner: RwLock<Inner>,
}

impl EngineRegistry {
    pub fn new(config: EngineConfig) -> Self {
        EngineRegistry {
            config,
            inner: RwLock::new(Inner::default()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Add a factory. A second registration under the same name is
    /// rejected and the first factory stays.
    pub fn register(&self, name: &str, factory: EngineFactory) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.factories.contains_key(name) {
            return Err(ValidateError::EngineAlreadyRegistered(name.to_string()));
        }
        inner.factories.insert(name.to_string(), factory);
        Ok(())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.inner.read().factories.contains_key(name)
    }

    /// The initialized engine for `name`, creating it on first use. Exactly
    /// one instance is constructed per name even under concurrent callers;
    /// a failed construction is not cached, so the next call retries.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Engine>> {
        {
            let inner = self.inner.read();
            if let Some(engine) = inner.engines.get(name) {
                return Ok(Arc::clone(engine));
            }
            if !inner.factories.contains_key(name) {
                return Err(ValidateError::EngineNotRegistered(name.to_string()));
            }
        }

        let mut inner = self.inner.write();
        if let Some(engine) = inner.engines.get(name) {
            return Ok(Arc::clone(engine));
        }
        let factory = inner
            .factories
            .get(name)
            .ok_or_else(|| ValidateError::EngineNotRegistered(name.to_string()))?;
        let wrap = |e: ValidateError| ValidateError::EngineInit {
            engine: name.to_string(),
            source: Box::new(e),
        };
        let mut engine = factory().map_err(wrap)?;
        engine.init(&self.config).map_err(wrap)?;
        debug!(engine = name, "engine initialized");

        let engine: Arc<dyn Engine> = Arc::from(engine);
        inner.engines.insert(name.to_string(), Arc::clone(&engine));
        Ok(engine)
    }

    /// Registered engine names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().factories.keys().cloned().collect();
        names.sort();
        names
    }

    /// Capabilities of every registered engine, in name order. Engines that
    /// fail to initialize are skipped.
    pub fn capabilities(&self) -> Vec<EngineCapabilities> {
        self.list()
            .iter()
            .filter_map(|name| self.get(name).ok())
            .map(|e| e.capabilities())
            .collect()
    }

    /// Close every created engine and drop the cache. Returns the first
    /// close error after attempting all of them.
    pub fn close_all(&self) -> Result<()> {
        let engines: Vec<(String, Arc<dyn Engine>)> =
            self.inner.write().engines.drain().collect();
        let mut first = None;
        for (name, engine) in engines {
            if let Err(e) = engine.close() {
                debug!(engine = %name, error = %e, "close failed");
                first.get_or_insert(e);
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
