//! Policy-level validation: scope gating, engine dispatch, parallel fan-out
//! and the aggregated report.

use crate::adapter::ExecContext;
use crate::engine::EngineRegistry;
use crate::models::policy::Policy;
use crate::models::rule::Rule;
use crate::models::{Severity, ValidationResult, Violation};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
/// Run-level context a rule's `when.branches|roles|tags` is matched against.
pub struct RunScope {
    pub branch: Option<String>,
    pub role: Option<String>,
    pub tags: Vec<String>,
}

fn is_wildcard(token: &str) -> bool {
    token == "*" || token.eq_ignore_ascii_case("any") || token.eq_ignore_ascii_case("all")
}

/// True when `allowed` is unconstrained, `current` is unknown, or one entry
/// names `current` (case-insensitive) or is a wildcard.
fn token_allowed(allowed: &[String], current: Option<&str>) -> bool {
    let Some(current) = current else {
        return true;
    };
    if allowed.is_empty() {
        return true;
    }
    allowed
        .iter()
        .map(|s| s.trim())
        .any(|tok| is_wildcard(tok) || tok.eq_ignore_ascii_case(current))
}

impl RunScope {
    /// `None` when `rule` runs in this scope, else the reason it is skipped.
    pub fn excludes(&self, rule: &Rule) -> Option<String> {
        let Some(sel) = rule.selector() else {
            return if self.tags.is_empty() {
                None
            } else {
                Some("rule has no tags".to_string())
            };
        };
        if !token_allowed(&sel.branches, self.branch.as_deref()) {
            return Some(format!(
                "branch '{}' not in {:?}",
                self.branch.as_deref().unwrap_or_default(),
                sel.branches
            ));
        }
        if !token_allowed(&sel.roles, self.role.as_deref()) {
            return Some(format!(
                "role '{}' not in {:?}",
                self.role.as_deref().unwrap_or_default(),
                sel.roles
            ));
        }
        if !self.tags.is_empty()
            && !sel
                .tags
                .iter()
                .any(|t| self.tags.iter().any(|want| want.eq_ignore_ascii_case(t)))
        {
            return Some(format!("no tag in {:?}", self.tags));
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Passed,
    Failed,
    Errored,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleOutcome {
    pub rule_id: String,
    pub engine: String,
    pub status: Status,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ValidationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RuleOutcome {
    fn skipped(rule: &Rule, reason: impl Into<String>) -> Self {
        RuleOutcome {
            rule_id: rule.id.clone(),
            engine: rule.check.engine(),
            status: Status::Skipped,
            result: None,
            error: None,
            cancelled: false,
            reason: Some(reason.into()),
        }
    }

    pub fn violations(&self) -> &[Violation] {
        self.result
            .as_ref()
            .map(|r| r.violations.as_slice())
            .unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    pub rules: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: usize,
    pub errors: usize,
    pub warnings: usize,
    pub infos: usize,
    pub files: usize,
}

#[derive(Debug, Clone, Serialize)]
/// Per-rule outcomes in policy order, plus totals.
pub struct Report {
    pub outcomes: Vec<RuleOutcome>,
    pub summary: Summary,
}

impl Report {
    pub fn new(outcomes: Vec<RuleOutcome>, files: usize) -> Self {
        let mut summary = Summary {
            rules: outcomes.len(),
            files,
            ..Default::default()
        };
        for o in &outcomes {
            match o.status {
                Status::Passed => summary.passed += 1,
                Status::Failed => summary.failed += 1,
                Status::Errored => summary.errored += 1,
                Status::Skipped => summary.skipped += 1,
            }
            for v in o.violations() {
                match v.severity {
                    Severity::Error => summary.errors += 1,
                    Severity::Warning => summary.warnings += 1,
                    Severity::Info => summary.infos += 1,
                }
            }
        }
        Report { outcomes, summary }
    }

    /// 0 when nothing errored and no error-severity violation exists.
    pub fn exit_code(&self) -> i32 {
        if self.summary.errored > 0 || self.summary.errors > 0 {
            1
        } else {
            0
        }
    }

    pub fn violations(&self) -> impl Iterator<Item = &Violation> {
        self.outcomes.iter().flat_map(|o| o.violations())
    }
}

/// Dispatches rules to engines from an injected registry.
pub struct Validator {
    engines: Arc<EngineRegistry>,
    pool: Option<rayon::ThreadPool>,
}

impl Validator {
    pub fn new(engines: Arc<EngineRegistry>) -> Self {
        Validator {
            engines,
            pool: None,
        }
    }

    /// Bound rule-level parallelism; 0 keeps rayon's global pool.
    pub fn with_parallelism(mut self, threads: usize) -> Self {
        if threads == 0 {
            return self;
        }
        match rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
            Ok(pool) => self.pool = Some(pool),
            Err(e) => warn!(error = %e, "falling back to the global thread pool"),
        }
        self
    }

    pub fn engines(&self) -> &EngineRegistry {
        &self.engines
    }

    /// Evaluate one rule. Errors become an `Errored` outcome so sibling
    /// rules are unaffected.
    pub fn validate_rule(&self, ctx: &ExecContext, rule: &Rule, files: &[String]) -> RuleOutcome {
        let engine_name = rule.check.engine();
        let evaluated = self
            .engines
            .get(&engine_name)
            .and_then(|engine| engine.validate(ctx, rule, files));
        match evaluated {
            Ok(result) => RuleOutcome {
                rule_id: rule.id.clone(),
                engine: engine_name,
                status: if result.passed {
                    Status::Passed
                } else {
                    Status::Failed
                },
                result: Some(result),
                error: None,
                cancelled: false,
                reason: None,
            },
            Err(e) => {
                debug!(rule = %rule.id, error = %e, "rule errored");
                RuleOutcome {
                    rule_id: rule.id.clone(),
                    engine: engine_name,
                    status: Status::Errored,
                    result: None,
                    cancelled: e.is_cancellation(),
                    error: Some(e.to_string()),
                    reason: None,
                }
            }
        }
    }

    /// Evaluate every rule of `policy` in parallel; outcomes keep policy order.
    pub fn validate_policy(
        &self,
        ctx: &ExecContext,
        policy: &Policy,
        files: &[String],
        scope: &RunScope,
    ) -> Report {
        let run = || -> Vec<RuleOutcome> {
            policy
                .rules
                .par_iter()
                .map(|rule| {
                    if !rule.enabled {
                        return RuleOutcome::skipped(rule, "disabled");
                    }
                    if let Some(reason) = scope.excludes(rule) {
                        return RuleOutcome::skipped(rule, reason);
                    }
                    self.validate_rule(ctx, rule, files)
                })
                .collect()
        };
        let outcomes = match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        };
        Report::new(outcomes, files.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Engine, EngineCapabilities, EngineConfig};
    use crate::error::{Result, ValidateError};
    use serde_json::json;
    use std::time::Duration;

    /// Reports one violation per file whose name contains the rule's
    /// `needle`, or fails when `needle` is "boom".
    struct Needle;

    impl Engine for Needle {
        fn init(&mut self, _config: &EngineConfig) -> Result<()> {
            Ok(())
        }

        fn validate(&self, _ctx: &ExecContext, rule: &Rule, files: &[String]) -> Result<ValidationResult> {
            let needle = rule.get_string("needle");
            if needle == "boom" {
                return Err(ValidateError::parse("needle", "garbled output"));
            }
            if needle == "slow" {
                return Err(ValidateError::TimedOut {
                    program: "needle".into(),
                    after: Duration::from_secs(1),
                });
            }
            let violations = files
                .iter()
                .filter(|f| f.contains(&needle))
                .map(|f| Violation {
                    file: f.clone(),
                    line: 1,
                    column: 1,
                    end_line: None,
                    end_column: None,
                    message: "found".into(),
                    severity: rule.severity,
                    rule_id: rule.id.clone(),
                    category: rule.category.clone(),
                    suggestion: None,
                    context: Default::default(),
                })
                .collect();
            Ok(ValidationResult::from_violations(&rule.id, "needle", "", violations, Duration::ZERO))
        }

        fn capabilities(&self) -> EngineCapabilities {
            EngineCapabilities {
                name: "needle".into(),
                supported_languages: vec![],
                supported_categories: vec![],
                supports_autofix: false,
                requires_compilation: false,
                external_tools: vec![],
            }
        }
    }

    fn validator() -> Validator {
        let reg = EngineRegistry::new(EngineConfig::default());
        reg.register("needle", Box::new(|| Ok(Box::new(Needle) as Box<dyn Engine>)))
            .unwrap();
        Validator::new(Arc::new(reg)).with_parallelism(4)
    }

    fn policy(rules: serde_json::Value) -> Policy {
        serde_json::from_value(json!({"version": "1", "rules": rules})).unwrap()
    }

    fn files() -> Vec<String> {
        ["src/a.js", "src/b.js", "lib/c.js"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_outcomes_keep_policy_order_and_summary() {
        let p = policy(json!([
            {"id": "R1", "check": {"engine": "needle", "needle": "src/"}},
            {"id": "R2", "severity": "warning", "check": {"engine": "needle", "needle": "lib/"}},
            {"id": "R3", "check": {"engine": "needle", "needle": "zzz"}},
            {"id": "R4", "check": {"engine": "needle", "needle": "boom"}},
            {"id": "R5", "check": {"engine": "missing"}},
            {"id": "R6", "enabled": false, "check": {"engine": "needle", "needle": "src/"}}
        ]));
        let report = validator().validate_policy(&ExecContext::new(), &p, &files(), &RunScope::default());
        let ids: Vec<&str> = report.outcomes.iter().map(|o| o.rule_id.as_str()).collect();
        assert_eq!(ids, vec!["R1", "R2", "R3", "R4", "R5", "R6"]);
        let statuses: Vec<Status> = report.outcomes.iter().map(|o| o.status).collect();
        assert_eq!(
            statuses,
            vec![
                Status::Failed,
                Status::Failed,
                Status::Passed,
                Status::Errored,
                Status::Errored,
                Status::Skipped
            ]
        );
        assert_eq!(
            report.summary,
            Summary {
                rules: 6,
                passed: 1,
                failed: 2,
                errored: 2,
                skipped: 1,
                errors: 2,
                warnings: 1,
                infos: 0,
                files: 3,
            }
        );
        assert!(report.outcomes[4].error.as_deref().unwrap().contains("not registered"));
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.violations().count(), 3);
    }

    #[test]
    fn test_warnings_only_exit_zero() {
        let p = policy(json!([
            {"id": "W", "severity": "warning", "check": {"engine": "needle", "needle": "src/"}}
        ]));
        let report = validator().validate_policy(&ExecContext::new(), &p, &files(), &RunScope::default());
        assert_eq!(report.summary.warnings, 2);
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_timeout_is_marked_cancelled() {
        let p = policy(json!([{"id": "T", "check": {"engine": "needle", "needle": "slow"}}]));
        let report = validator().validate_policy(&ExecContext::new(), &p, &files(), &RunScope::default());
        assert!(report.outcomes[0].cancelled);
        assert_eq!(report.outcomes[0].status, Status::Errored);
    }

    #[test]
    fn test_scope_gating() {
        let rule: Rule = serde_json::from_value(json!({
            "id": "S",
            "when": {"branches": ["main", "release"], "roles": ["*"], "tags": ["security"]},
            "check": {"engine": "needle", "needle": "x"}
        }))
        .unwrap();
        assert!(RunScope::default().excludes(&rule).is_none());
        let on_main = RunScope {
            branch: Some("MAIN".into()),
            role: Some("frontend".into()),
            tags: vec![],
        };
        assert!(on_main.excludes(&rule).is_none());
        let on_feature = RunScope {
            branch: Some("feature/x".into()),
            ..Default::default()
        };
        assert!(on_feature.excludes(&rule).unwrap().contains("branch"));
        let tagged = RunScope {
            tags: vec!["style".into()],
            ..Default::default()
        };
        assert!(tagged.excludes(&rule).unwrap().contains("tag"));
        let untagged: Rule =
            serde_json::from_value(json!({"id": "U", "check": {"engine": "needle"}})).unwrap();
        assert!(tagged.excludes(&untagged).is_some());
    }

    #[test]
    fn test_skipped_rules_are_not_evaluated() {
        let p = policy(json!([
            {"id": "B", "when": {"branches": ["release"]}, "check": {"engine": "needle", "needle": "boom"}}
        ]));
        let scope = RunScope {
            branch: Some("main".into()),
            ..Default::default()
        };
        let report = validator().validate_policy(&ExecContext::new(), &p, &files(), &scope);
        assert_eq!(report.outcomes[0].status, Status::Skipped);
        assert_eq!(report.exit_code(), 0);
    }
}
