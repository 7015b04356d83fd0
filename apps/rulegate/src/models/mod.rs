//! Shared data models: rules and selectors, policy documents, and the
//! violation/result records produced by engines.

pub mod policy;
pub mod rule;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value as Json};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Violation and rule severity.
pub enum Severity {
    #[default]
    Error,
    #[serde(alias = "warn")]
    Warning,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }

    /// Severity from a tool's level word. `None` for empty or unknown words.
    pub fn from_tool(level: &str) -> Option<Severity> {
        match level.trim().to_ascii_lowercase().as_str() {
            "error" | "fatal" => Some(Severity::Error),
            "warning" | "warn" => Some(Severity::Warning),
            "info" | "suggestion" | "message" => Some(Severity::Info),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Auto-fix hint attached to a violation.
pub struct Suggestion {
    pub desc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// A single rule breach. Lines and columns are 1-indexed; 0 means the
/// backend reported no position.
pub struct Violation {
    pub file: String,
    pub line: u32,
    pub column: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_column: Option<u32>,
    pub message: String,
    pub severity: Severity,
    pub rule_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<Suggestion>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Json>,
}

impl Violation {
    /// `file:line:col`, dropping positions the backend did not report.
    pub fn location(&self) -> String {
        match (self.line, self.column) {
            (0, _) => self.file.clone(),
            (l, 0) => format!("{}:{}", self.file, l),
            (l, c) => format!("{}:{}:{}", self.file, l, c),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} [{}]", self.location(), self.message, self.rule_id)
    }
}

fn serialize_duration<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format!("{:?}", d))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
/// Outcome of evaluating one rule against a file set.
pub struct ValidationResult {
    pub rule_id: String,
    pub passed: bool,
    pub violations: Vec<Violation>,
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,
    pub engine: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub language: String,
}

impl ValidationResult {
    /// Result for a rule whose selector left no files to check.
    pub fn trivially_passed(rule_id: &str, engine: &str) -> Self {
        ValidationResult {
            rule_id: rule_id.to_string(),
            passed: true,
            violations: Vec::new(),
            duration: Duration::ZERO,
            engine: engine.to_string(),
            language: String::new(),
        }
    }

    pub fn from_violations(
        rule_id: &str,
        engine: &str,
        language: &str,
        violations: Vec<Violation>,
        duration: Duration,
    ) -> Self {
        ValidationResult {
            rule_id: rule_id.to_string(),
            passed: violations.is_empty(),
            violations,
            duration,
            engine: engine.to_string(),
            language: language.to_string(),
        }
    }
}
