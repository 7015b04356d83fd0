//! PMD adapter for Java.
//!
//! A rule becomes a PMD 7 ruleset. A few AST shapes map onto PMD's
//! built-in rules (`System.out` calls, empty or generic catch blocks,
//! undocumented public methods); any other AST query is compiled into an
//! XPath rule over PMD's Java tree. Results come back with `-f json`:
//!
//! ```text
//! {"files": [{"filename": "src/A.java", "violations": [
//!   {"beginline": 3, "begincolumn": 5, "description": "...", "rule": "SystemPrintln", "priority": 3}
//! ]}]}
//! ```
//!
//! PMD exits with 4 when it reports violations and 5 when some files could
//! not be processed. The distribution is not downloaded automatically; it is
//! expected unpacked at `<tools_dir>/pmd-bin-<version>`.

use crate::adapter::exec::ConfigFile;
use crate::adapter::{
    Adapter, AdapterCapabilities, ExecContext, InstallConfig, RawViolation, SubprocessExecutor,
    ToolOutput,
};
use crate::error::{Result, ValidateError};
use crate::models::rule::{CheckSpec, PatternCheck, Rule};
use crate::models::Severity;
use crate::query::AstQuery;
use quick_xml::escape::escape;
use serde::Deserialize;
use serde_json::Value as Json;
use std::path::{Path, PathBuf};
use tracing::warn;

const NAME: &str = "pmd";
pub const DEFAULT_VERSION: &str = "7.0.0";
const RELEASES: &str = "https://github.com/pmd/pmd/releases/download";
const XPATH_RULE_CLASS: &str = "net.sourceforge.pmd.lang.rule.xpath.XPathRule";

const HEADER: &str = "<?xml version=\"1.0\"?>\n<ruleset name=\"rulegate\"\n    xmlns=\"http://pmd.sourceforge.net/ruleset/2.0.0\"\n    xmlns:xsi=\"http://www.w3.org/2001/XMLSchema-instance\"\n    xsi:schemaLocation=\"http://pmd.sourceforge.net/ruleset/2.0.0 https://pmd.sourceforge.io/ruleset_2_0_0.xsd\">\n  <description>Generated by rulegate</description>\n";

#[derive(Debug, Clone, PartialEq)]
pub enum PmdRule {
    /// A built-in rule, optionally with property overrides.
    Reference {
        reference: String,
        properties: Vec<(String, String)>,
    },
    Xpath {
        name: String,
        message: String,
        expression: String,
    },
}

impl PmdRule {
    fn reference(reference: &str) -> Self {
        PmdRule::Reference {
            reference: reference.to_string(),
            properties: Vec::new(),
        }
    }

    fn render(&self, priority: u8, out: &mut String) {
        match self {
            PmdRule::Reference {
                reference,
                properties,
            } => {
                out.push_str(&format!("  <rule ref=\"{}\">\n", escape(reference.as_str())));
                out.push_str(&format!("    <priority>{}</priority>\n", priority));
                if !properties.is_empty() {
                    out.push_str("    <properties>\n");
                    for (k, v) in properties {
                        out.push_str(&format!(
                            "      <property name=\"{}\" value=\"{}\"/>\n",
                            escape(k.as_str()),
                            escape(v.as_str())
                        ));
                    }
                    out.push_str("    </properties>\n");
                }
                out.push_str("  </rule>\n");
            }
            PmdRule::Xpath {
                name,
                message,
                expression,
            } => {
                out.push_str(&format!(
                    "  <rule name=\"{}\" language=\"java\" message=\"{}\" class=\"{}\">\n",
                    escape(name.as_str()),
                    escape(message.as_str()),
                    XPATH_RULE_CLASS
                ));
                out.push_str(&format!("    <priority>{}</priority>\n", priority));
                out.push_str("    <properties>\n      <property name=\"xpath\">\n");
                out.push_str(&format!("        <value>{}</value>\n", escape(expression.as_str())));
                out.push_str("      </property>\n    </properties>\n  </rule>\n");
            }
        }
    }
}

/// PMD priority for a rule severity (1 is the highest).
pub fn priority_for(severity: Severity) -> u8 {
    match severity {
        Severity::Error => 1,
        Severity::Warning => 3,
        Severity::Info => 5,
    }
}

fn severity_for(priority: u8) -> &'static str {
    match priority {
        1 | 2 => "error",
        5 => "info",
        _ => "warning",
    }
}

/// Render a complete ruleset document.
pub fn render_ruleset(rules: &[PmdRule], priority: u8) -> String {
    let mut out = String::from(HEADER);
    for r in rules {
        r.render(priority, &mut out);
    }
    out.push_str("</ruleset>\n");
    out
}

fn where_str<'a>(query: &'a AstQuery, key: &str) -> Option<&'a str> {
    query.where_.get(key).and_then(Json::as_str)
}

fn where_bool(query: &AstQuery, key: &str) -> Option<bool> {
    query.where_.get(key).and_then(Json::as_bool)
}

fn builtin_rules(query: &AstQuery) -> Vec<PmdRule> {
    let mut rules = Vec::new();
    match query.node.as_str() {
        "MethodCallExpr" => {
            if where_str(query, "scope") == Some("System.out") {
                rules.push(PmdRule::reference("category/java/bestpractices.xml/SystemPrintln"));
            }
        }
        "CatchClause" => {
            let empty_body = query
                .where_
                .get("body.statements.size")
                .and_then(Json::as_f64)
                == Some(0.0);
            if empty_body {
                rules.push(PmdRule::reference("category/java/errorprone.xml/EmptyCatchBlock"));
            }
            if where_str(query, "parameter.type.name") == Some("Exception") {
                rules.push(PmdRule::reference(
                    "category/java/design.xml/AvoidCatchingGenericException",
                ));
            }
        }
        "MethodDeclaration" => {
            if where_bool(query, "isPublic") == Some(true)
                && where_bool(query, "hasJavadoc") == Some(false)
            {
                let properties = [
                    ("methodWithOverrideCommentRequirement", "Ignored"),
                    ("accessorCommentRequirement", "Ignored"),
                    ("classCommentRequirement", "Ignored"),
                    ("fieldCommentRequirement", "Ignored"),
                    ("publicMethodCommentRequirement", "Required"),
                    ("protectedMethodCommentRequirement", "Ignored"),
                    ("enumCommentRequirement", "Ignored"),
                    ("violationSuppressRegex", ".*main\\(.*"),
                ];
                rules.push(PmdRule::Reference {
                    reference: "category/java/documentation.xml/CommentRequired".to_string(),
                    properties: properties
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                });
            }
        }
        _ => {}
    }
    rules
}

fn is_attribute_name(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn xpath_literal(value: &Json) -> Option<String> {
    match value {
        Json::Bool(b) => Some(format!("{}()", b)),
        Json::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && n.as_i64().is_none() => Some(format!("{}", f as i64)),
            _ => Some(n.to_string()),
        },
        Json::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
        Json::Object(m) => m.get("eq").and_then(xpath_literal),
        _ => None,
    }
}

/// XPath expression for `query`: the node, one predicate per scalar
/// `where` entry keyed by a plain attribute name, then the containment
/// lists with the same reading as the ESTree selector (`has` reports nodes
/// lacking the descendant, `notHas` nodes containing it).
pub fn xpath_for(query: &AstQuery) -> String {
    let mut expr = format!("//{}", query.node);
    for (key, value) in &query.where_ {
        if !is_attribute_name(key) {
            continue;
        }
        if let Some(lit) = xpath_literal(value) {
            expr.push_str(&format!("[@{} = {}]", key, lit));
        }
    }
    for h in &query.has {
        expr.push_str(&format!("[not(.//{})]", h));
    }
    for h in &query.not_has {
        expr.push_str(&format!("[.//{}]", h));
    }
    expr
}

fn rule_message(rule: &Rule, fallback: String) -> String {
    rule.custom_message()
        .map(str::to_string)
        .or_else(|| rule.desc.clone().filter(|d| !d.is_empty()))
        .unwrap_or(fallback)
}

fn pattern_rule(rule: &Rule, check: &PatternCheck) -> Result<Vec<PmdRule>> {
    if check.target.is_empty() {
        return Err(ValidateError::config(
            &rule.id,
            "pmd pattern rules need a 'target' node type",
        ));
    }
    let pattern = check.pattern.replace('\'', "''");
    Ok(vec![PmdRule::Xpath {
        name: rule.id.clone(),
        message: rule_message(rule, format!("{} name does not match {}", check.target, check.pattern)),
        expression: format!("//{}[@Name][not(matches(@Name, '{}'))]", check.target, pattern),
    }])
}

/// Rules listed directly in the payload: `rules` (built-in references)
/// and `xpath` (one custom expression).
fn payload_rules(rule: &Rule) -> Vec<PmdRule> {
    let mut rules: Vec<PmdRule> = rule
        .get_string_list("rules")
        .iter()
        .map(|r| PmdRule::reference(r))
        .collect();
    let xpath = rule.get_string("xpath");
    if !xpath.is_empty() {
        rules.push(PmdRule::Xpath {
            name: rule.id.clone(),
            message: rule_message(rule, format!("{} violated", rule.id)),
            expression: xpath,
        });
    }
    rules
}

pub fn rules_for(rule: &Rule) -> Result<Vec<PmdRule>> {
    let rules = match rule.spec()? {
        CheckSpec::Ast(query) => {
            let builtin = builtin_rules(query);
            if builtin.is_empty() {
                vec![PmdRule::Xpath {
                    name: rule.id.clone(),
                    message: rule_message(rule, format!("{} matched", query.node)),
                    expression: xpath_for(query),
                }]
            } else {
                builtin
            }
        }
        CheckSpec::Pattern(p) => pattern_rule(rule, p)?,
        CheckSpec::Custom(_) => payload_rules(rule),
        _ => {
            return Err(ValidateError::config(
                &rule.id,
                format!("pmd cannot run '{}' checks", rule.check.engine()),
            ))
        }
    };
    if rules.is_empty() {
        return Err(ValidateError::config(
            &rule.id,
            "no PMD rules: set 'rules' or 'xpath'",
        ));
    }
    Ok(rules)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    #[serde(default)]
    files: Vec<FileReport>,
    #[serde(default)]
    processing_errors: Vec<ProcessingError>,
}

#[derive(Debug, Deserialize)]
struct FileReport {
    filename: String,
    #[serde(default)]
    violations: Vec<Finding>,
}

#[derive(Debug, Deserialize)]
struct Finding {
    #[serde(default)]
    beginline: u32,
    #[serde(default)]
    begincolumn: u32,
    endline: Option<u32>,
    endcolumn: Option<u32>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    rule: String,
    #[serde(default)]
    priority: u8,
}

#[derive(Debug, Deserialize)]
struct ProcessingError {
    #[serde(default)]
    filename: String,
    #[serde(default)]
    message: String,
}

/// Parse `-f json` output into violations in report order.
pub fn parse_json_output(output: &ToolOutput) -> Result<Vec<RawViolation>> {
    let text = output.stdout.trim();
    if text.is_empty() {
        if output.exit_code == 0 {
            return Ok(Vec::new());
        }
        return Err(ValidateError::ToolFailed {
            tool: NAME.to_string(),
            code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        });
    }
    let Some(start) = text.find('{') else {
        return Err(ValidateError::parse(
            NAME,
            format!("no JSON report in output: {}", output.stderr.trim()),
        ));
    };
    let report: Report = serde_json::from_str(&text[start..])
        .map_err(|e| ValidateError::parse(NAME, e.to_string()))?;
    for e in &report.processing_errors {
        warn!(file = %e.filename, "pmd could not process file: {}", e.message);
    }
    Ok(report
        .files
        .into_iter()
        .flat_map(|f| {
            let file = f.filename;
            f.violations.into_iter().map(move |v| RawViolation {
                file: file.clone(),
                line: v.beginline,
                column: v.begincolumn,
                end_line: v.endline,
                end_column: v.endcolumn,
                message: v.description,
                severity: severity_for(v.priority).to_string(),
                rule_id: v.rule,
            })
        })
        .collect())
}

pub struct PmdAdapter {
    tools_dir: PathBuf,
    version: String,
    executor: SubprocessExecutor,
}

impl PmdAdapter {
    pub fn new(tools_dir: &Path, executor: SubprocessExecutor) -> Self {
        PmdAdapter {
            tools_dir: tools_dir.to_path_buf(),
            version: DEFAULT_VERSION.to_string(),
            executor,
        }
    }

    fn dist_dir(&self, tools_dir: &Path, version: &str) -> PathBuf {
        tools_dir.join(format!("pmd-bin-{}", version))
    }

    /// Launcher inside the unpacked distribution.
    pub fn bin_path(&self) -> PathBuf {
        let bin = if cfg!(windows) { "pmd.bat" } else { "pmd" };
        self.dist_dir(&self.tools_dir, &self.version)
            .join("bin")
            .join(bin)
    }

    fn program(&self) -> Option<PathBuf> {
        let local = self.bin_path();
        if local.exists() {
            return Some(local);
        }
        which::which(NAME).ok()
    }
}

impl Adapter for PmdAdapter {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::new(
            NAME,
            &["java"],
            &[
                "pattern",
                "complexity",
                "performance",
                "security",
                "error_handling",
                "ast",
            ],
            &self.version,
        )
    }

    fn check_availability(&self, _ctx: &ExecContext) -> Result<()> {
        match self.program() {
            Some(_) => Ok(()),
            None => Err(ValidateError::AdapterUnavailable {
                adapter: NAME.to_string(),
                reason: format!("not found (checked {} and PATH)", self.bin_path().display()),
            }),
        }
    }

    fn install(&self, _ctx: &ExecContext, config: &InstallConfig) -> Result<()> {
        let version = config.version.as_deref().unwrap_or(&self.version);
        let target = self.dist_dir(config.dir(&self.tools_dir), version);
        if target.exists() && !config.force {
            return Ok(());
        }
        Err(ValidateError::AdapterUnavailable {
            adapter: NAME.to_string(),
            reason: format!(
                "automatic download is not supported; unpack {}/pmd_releases%2F{}/pmd-dist-{}-bin.zip into {}",
                RELEASES,
                version,
                version,
                config.dir(&self.tools_dir).display()
            ),
        })
    }

    fn generate_config(&self, rule: &Rule) -> Result<Vec<u8>> {
        let rules = rules_for(rule)?;
        Ok(render_ruleset(&rules, priority_for(rule.severity)).into_bytes())
    }

    fn execute(&self, ctx: &ExecContext, config: &[u8], files: &[String]) -> Result<ToolOutput> {
        if files.is_empty() {
            return Ok(ToolOutput::default());
        }
        let program = self.program().ok_or_else(|| ValidateError::AdapterUnavailable {
            adapter: NAME.to_string(),
            reason: format!("not found at {}", self.bin_path().display()),
        })?;
        let cfg = ConfigFile::create(Some(&self.tools_dir.join(".tmp")), "pmd-ruleset-", ".xml", config)?;
        let args = vec![
            "check".to_string(),
            "-d".to_string(),
            files.join(","),
            "-R".to_string(),
            cfg.path_arg(),
            "-f".to_string(),
            "json".to_string(),
            "--no-cache".to_string(),
        ];
        let out = self
            .executor
            .execute(ctx, &program.to_string_lossy(), &args)?;
        if !matches!(out.exit_code, 0 | 4 | 5) {
            return Err(ValidateError::ToolFailed {
                tool: NAME.to_string(),
                code: out.exit_code,
                stderr: out.stderr.trim().to_string(),
            });
        }
        Ok(out)
    }

    fn parse_output(&self, output: &ToolOutput) -> Result<Vec<RawViolation>> {
        parse_json_output(output)
    }
}
