//! Per-rule evaluation shared by the adapter-backed engines.
//!
//! Filter -> (no files: trivial pass) -> detect language -> resolve adapter
//! -> ensure available (one install attempt) -> generate config -> execute
//! -> parse -> normalize. The first failing step ends the evaluation.

use crate::adapter::{
    Adapter, AdapterRegistry, ExecContext, InstallConfig, RawViolation, SubprocessExecutor,
};
use crate::engine::EngineConfig;
use crate::error::{Result, ValidateError};
use crate::models::rule::Rule;
use crate::models::{Severity, Suggestion, ValidationResult, Violation};
use crate::selector::{detect_language, filter_files};
use parking_lot::Mutex;
use serde_json::{Map, Value as Json};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Adapter-driven evaluation for one engine category.
pub struct AdapterPipeline {
    engine: &'static str,
    category: &'static str,
    adapters: Option<Arc<AdapterRegistry>>,
    install: InstallConfig,
    install_lock: Mutex<()>,
}

impl AdapterPipeline {
    pub fn new(engine: &'static str, category: &'static str) -> Self {
        AdapterPipeline {
            engine,
            category,
            adapters: None,
            install: InstallConfig::default(),
            install_lock: Mutex::new(()),
        }
    }

    pub fn init(&mut self, config: &EngineConfig) {
        let adapters = match &config.adapters {
            Some(shared) => Arc::clone(shared),
            None => Arc::new(AdapterRegistry::with_defaults(
                &config.tools_dir,
                SubprocessExecutor::with_timeout(config.timeout),
            )),
        };
        self.adapters = Some(adapters);
        self.install = InstallConfig {
            tools_dir: config.tools_dir.clone(),
            ..Default::default()
        };
    }

    pub fn is_initialized(&self) -> bool {
        self.adapters.is_some()
    }

    /// Languages any registered adapter handles for this category, or
    /// `fallback` before initialization.
    pub fn supported_languages(&self, fallback: &[&str]) -> Vec<String> {
        match &self.adapters {
            Some(reg) => reg.supported_languages(self.category),
            None => fallback.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn run(&self, ctx: &ExecContext, rule: &Rule, files: &[String]) -> Result<ValidationResult> {
        self.run_with(ctx, rule, files, None, None)
    }

    /// `pinned` names an adapter to use instead of lookup by language;
    /// `suggestion` is attached to every violation.
    pub fn run_with(
        &self,
        ctx: &ExecContext,
        rule: &Rule,
        files: &[String],
        pinned: Option<&str>,
        suggestion: Option<Suggestion>,
    ) -> Result<ValidationResult> {
        let started = Instant::now();
        let files = filter_files(files, rule.selector());
        if files.is_empty() {
            debug!(rule = %rule.id, engine = self.engine, "no matching files");
            return Ok(ValidationResult::trivially_passed(&rule.id, self.engine));
        }

        let adapters = self
            .adapters
            .as_ref()
            .ok_or_else(|| ValidateError::EngineNotInitialized(self.engine.to_string()))?;
        rule.spec()?;
        let engine = rule.check.engine();
        if engine != self.engine {
            return Err(ValidateError::config(
                &rule.id,
                format!("check targets engine '{}', not '{}'", engine, self.engine),
            ));
        }

        let language = detect_language(rule.selector(), &files);
        let adapter = match pinned {
            Some(name) => adapters.get(name)?,
            None => adapters.find(&language, self.category)?,
        };
        debug!(rule = %rule.id, %language, adapter = adapter.name(), files = files.len(), "resolved adapter");

        self.ensure_available(ctx, adapter.as_ref())?;
        let config = adapter.generate_config(rule)?;
        let output = adapter.execute(ctx, &config, &files)?;
        let raw = adapter.parse_output(&output)?;

        let violations = raw
            .into_iter()
            .map(|r| normalize(rule, adapter.name(), r, suggestion.clone()))
            .collect();
        Ok(ValidationResult::from_violations(
            &rule.id,
            self.engine,
            &language,
            violations,
            started.elapsed(),
        ))
    }

    /// Availability check with at most one install attempt. Concurrent
    /// evaluations wait for an in-flight install instead of starting another.
    fn ensure_available(&self, ctx: &ExecContext, adapter: &dyn Adapter) -> Result<()> {
        if adapter.check_availability(ctx).is_ok() {
            return Ok(());
        }
        let _guard = self.install_lock.lock();
        if adapter.check_availability(ctx).is_ok() {
            return Ok(());
        }
        info!(adapter = adapter.name(), "tool not available, installing");
        let wrap = |e: ValidateError| ValidateError::InstallFailed {
            adapter: adapter.name().to_string(),
            source: Box::new(e),
        };
        adapter.install(ctx, &self.install).map_err(wrap)?;
        adapter.check_availability(ctx).map_err(wrap)
    }
}

/// Canonical violation for a tool record: the rule's id and category, the
/// rule's custom message when set. Severity is the tool's level, or the
/// rule's when the tool gave none it recognizes. The tool's own rule and
/// level word stay in `context`.
pub fn normalize(
    rule: &Rule,
    tool: &str,
    raw: RawViolation,
    suggestion: Option<Suggestion>,
) -> Violation {
    let severity = Severity::from_tool(&raw.severity).unwrap_or(rule.severity);
    let mut context = Map::new();
    context.insert("tool".into(), Json::String(tool.to_string()));
    if !raw.rule_id.is_empty() {
        context.insert("toolRule".into(), Json::String(raw.rule_id));
    }
    if !raw.severity.is_empty() {
        context.insert("toolSeverity".into(), Json::String(raw.severity));
    }
    Violation {
        file: raw.file,
        line: raw.line,
        column: raw.column,
        end_line: raw.end_line,
        end_column: raw.end_column,
        message: rule
            .custom_message()
            .map(str::to_string)
            .unwrap_or(raw.message),
        severity,
        rule_id: rule.id.clone(),
        category: rule.category.clone(),
        suggestion,
        context,
    }
}
