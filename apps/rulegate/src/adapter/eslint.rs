//! ESLint adapter for the JavaScript family.
//!
//! Rule mapping:
//! - pattern: `id-match` (identifier), `no-restricted-syntax` on literals
//!   (content), `no-restricted-imports` (import)
//! - length: `max-len`, `max-lines`, `max-lines-per-function`, `max-params`
//! - style: `indent`, `quotes`, `semi`, `comma-dangle`, `brace-style`
//! - ast: the compiled query as a `no-restricted-syntax` selector
//!
//! ESLint runs in legacy config mode (`--no-eslintrc`, flat config off) so
//! only the generated rules apply. Exit 1 means findings; exit 2 means
//! ESLint itself failed.

use crate::adapter::exec::{find_tool, local_bin, npm_install, ConfigFile};
use crate::adapter::{
    Adapter, AdapterCapabilities, ExecContext, InstallConfig, RawViolation, SubprocessExecutor,
    ToolOutput,
};
use crate::error::{Result, ValidateError};
use crate::models::rule::{CheckSpec, LengthCheck, PatternCheck, Rule, StyleCheck};
use crate::models::Severity;
use serde::Deserialize;
use serde_json::{json, Map, Value as Json};
use std::path::{Path, PathBuf};

const NAME: &str = "eslint";
const DEFAULT_VERSION: &str = "^8.0.0";

pub struct EslintAdapter {
    tools_dir: PathBuf,
    executor: SubprocessExecutor,
}

/// ESLint has no "info" level that still reports; everything below error
/// reports as a warning.
fn eslint_severity(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warning | Severity::Info => "warn",
    }
}

fn base_config() -> Map<String, Json> {
    let mut cfg = Map::new();
    cfg.insert(
        "env".into(),
        json!({"es2021": true, "node": true, "browser": true}),
    );
    cfg.insert(
        "parserOptions".into(),
        json!({"ecmaVersion": "latest", "sourceType": "module"}),
    );
    cfg
}

fn pattern_rules(rule: &Rule, check: &PatternCheck, rules: &mut Map<String, Json>) -> Result<()> {
    let sev = eslint_severity(rule.severity);
    match check.target.as_str() {
        "identifier" => {
            rules.insert(
                "id-match".into(),
                json!([sev, check.pattern, {
                    "properties": false,
                    "classFields": false,
                    "onlyDeclarations": true
                }]),
            );
        }
        "content" => {
            let message = rule
                .custom_message()
                .map(str::to_string)
                .unwrap_or_else(|| format!("Content matches forbidden pattern /{}/", check.pattern));
            rules.insert(
                "no-restricted-syntax".into(),
                json!([sev, {
                    "selector": format!("Literal[value=/{}/]", check.pattern),
                    "message": message
                }]),
            );
        }
        "import" => {
            rules.insert(
                "no-restricted-imports".into(),
                json!([sev, {"patterns": [check.pattern]}]),
            );
        }
        other => {
            return Err(ValidateError::config(
                &rule.id,
                format!("unsupported pattern target for eslint: '{}'", other),
            ))
        }
    }
    Ok(())
}

fn length_rules(rule: &Rule, check: &LengthCheck, rules: &mut Map<String, Json>) -> Result<()> {
    let sev = eslint_severity(rule.severity);
    if check.max <= 0 {
        return Err(ValidateError::config(
            &rule.id,
            "eslint length rules need a positive 'max'",
        ));
    }
    let max = check.max;
    let (name, value) = match check.scope.as_str() {
        "line" => ("max-len", json!([sev, {"code": max}])),
        "file" => (
            "max-lines",
            json!([sev, {"max": max, "skipBlankLines": true, "skipComments": true}]),
        ),
        "function" | "method" => (
            "max-lines-per-function",
            json!([sev, {"max": max, "skipBlankLines": true, "skipComments": true}]),
        ),
        "params" | "parameters" => ("max-params", json!([sev, max])),
        other => {
            return Err(ValidateError::config(
                &rule.id,
                format!("unsupported length scope: '{}'", other),
            ))
        }
    };
    rules.insert(name.into(), value);
    Ok(())
}

fn style_rules(rule: &Rule, check: &StyleCheck, rules: &mut Map<String, Json>) {
    let sev = eslint_severity(rule.severity);
    if check.indent > 0 {
        rules.insert("indent".into(), json!([sev, check.indent]));
    }
    if let Some(quote) = &check.quote {
        rules.insert("quotes".into(), json!([sev, quote]));
    }
    if let Some(semi) = check.semi {
        let mode = if semi { "always" } else { "never" };
        rules.insert("semi".into(), json!([sev, mode]));
    }
    if let Some(tc) = &check.trailing_comma {
        let mode = if tc == "none" { "never" } else { "always-multiline" };
        rules.insert("comma-dangle".into(), json!([sev, mode]));
    }
    if let Some(brace) = &check.brace_style {
        rules.insert("brace-style".into(), json!([sev, brace]));
    }
    if check.print_width > 0 {
        rules.insert("max-len".into(), json!([sev, {"code": check.print_width}]));
    }
}

/// ESLint configuration for `rule` as a JSON value.
pub fn build_config(rule: &Rule) -> Result<Json> {
    let mut cfg = base_config();
    let mut rules = Map::new();
    match rule.spec()? {
        CheckSpec::Pattern(p) => pattern_rules(rule, p, &mut rules)?,
        CheckSpec::Length(l) => length_rules(rule, l, &mut rules)?,
        CheckSpec::Style(s) => style_rules(rule, s, &mut rules),
        CheckSpec::Ast(query) => {
            let message = rule
                .custom_message()
                .map(str::to_string)
                .unwrap_or_else(|| format!("AST rule {} violation", rule.id));
            rules.insert(
                "no-restricted-syntax".into(),
                json!([eslint_severity(rule.severity), {
                    "selector": query.generate_selector(),
                    "message": message
                }]),
            );
        }
        CheckSpec::TypeCheck(_) | CheckSpec::Custom(_) => {
            return Err(ValidateError::config(
                &rule.id,
                format!("eslint cannot run '{}' checks", rule.check.engine()),
            ))
        }
    }
    cfg.insert("rules".into(), Json::Object(rules));
    Ok(Json::Object(cfg))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResult {
    file_path: String,
    #[serde(default)]
    messages: Vec<Message>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Message {
    #[serde(default)]
    rule_id: Option<String>,
    #[serde(default)]
    severity: u8,
    message: String,
    #[serde(default)]
    line: u32,
    #[serde(default)]
    column: u32,
    #[serde(default)]
    end_line: Option<u32>,
    #[serde(default)]
    end_column: Option<u32>,
}

fn severity_word(level: u8) -> &'static str {
    match level {
        2 => "error",
        1 => "warning",
        _ => "info",
    }
}

/// Parse `--format json` output.
pub fn parse_json_output(stdout: &str) -> Result<Vec<RawViolation>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() || trimmed == "[]" {
        return Ok(Vec::new());
    }
    let results: Vec<FileResult> =
        serde_json::from_str(trimmed).map_err(|e| ValidateError::parse(NAME, e.to_string()))?;
    Ok(results
        .into_iter()
        .flat_map(|fr| {
            let file = fr.file_path;
            fr.messages.into_iter().map(move |m| RawViolation {
                file: file.clone(),
                line: m.line,
                column: m.column,
                end_line: m.end_line,
                end_column: m.end_column,
                message: m.message,
                severity: severity_word(m.severity).to_string(),
                rule_id: m.rule_id.unwrap_or_default(),
            })
        })
        .collect())
}

impl EslintAdapter {
    pub fn new(tools_dir: &Path, executor: SubprocessExecutor) -> Self {
        EslintAdapter {
            tools_dir: tools_dir.to_path_buf(),
            executor,
        }
    }

    /// Program and leading args: local install, then `PATH`, then `npx`.
    fn command(&self) -> (String, Vec<String>) {
        match find_tool(&self.tools_dir, NAME) {
            Some(p) => (p.to_string_lossy().into_owned(), Vec::new()),
            None => ("npx".to_string(), vec!["eslint@8".to_string()]),
        }
    }
}

impl Adapter for EslintAdapter {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::new(
            NAME,
            &["javascript", "typescript", "jsx", "tsx"],
            &["pattern", "length", "style", "ast"],
            DEFAULT_VERSION,
        )
    }

    fn check_availability(&self, _ctx: &ExecContext) -> Result<()> {
        match find_tool(&self.tools_dir, NAME) {
            Some(_) => Ok(()),
            None => Err(ValidateError::AdapterUnavailable {
                adapter: NAME.to_string(),
                reason: format!(
                    "not found (checked {} and PATH)",
                    local_bin(&self.tools_dir, NAME).display()
                ),
            }),
        }
    }

    fn install(&self, ctx: &ExecContext, config: &InstallConfig) -> Result<()> {
        let version = config.version.as_deref().unwrap_or(DEFAULT_VERSION);
        npm_install(
            &self.executor,
            ctx,
            config.dir(&self.tools_dir),
            NAME,
            version,
        )
    }

    fn generate_config(&self, rule: &Rule) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&build_config(rule)?)?)
    }

    fn execute(&self, ctx: &ExecContext, config: &[u8], files: &[String]) -> Result<ToolOutput> {
        if files.is_empty() {
            return Ok(ToolOutput::empty("[]"));
        }
        let cfg = ConfigFile::create(Some(&self.tools_dir.join(".tmp")), "eslintrc-", ".json", config)?;
        let (program, mut args) = self.command();
        args.extend([
            "--config".to_string(),
            cfg.path_arg(),
            "--format".to_string(),
            "json".to_string(),
            "--no-eslintrc".to_string(),
        ]);
        args.extend(files.iter().cloned());

        let mut executor = self.executor.clone();
        executor
            .env
            .insert("ESLINT_USE_FLAT_CONFIG".into(), "false".into());
        let out = executor.execute(ctx, &program, &args)?;
        if out.exit_code != 0 && out.exit_code != 1 {
            return Err(ValidateError::ToolFailed {
                tool: NAME.to_string(),
                code: out.exit_code,
                stderr: out.stderr.trim().to_string(),
            });
        }
        Ok(out)
    }

    fn parse_output(&self, output: &ToolOutput) -> Result<Vec<RawViolation>> {
        parse_json_output(&output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn rule(v: Json) -> Rule {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_identifier_pattern_config() {
        let r = rule(json!({
            "id": "NAMING-1", "severity": "warning",
            "check": {"engine": "pattern", "target": "identifier", "pattern": "^[a-z]+$"}
        }));
        let cfg = build_config(&r).unwrap();
        assert_eq!(cfg["env"]["es2021"], true);
        assert_eq!(cfg["rules"]["id-match"][0], "warn");
        assert_eq!(cfg["rules"]["id-match"][1], "^[a-z]+$");
        assert_eq!(cfg["rules"]["id-match"][2]["onlyDeclarations"], true);
    }

    #[test]
    fn test_content_and_import_patterns() {
        let content = rule(json!({
            "id": "SEC-1", "message": "no secrets",
            "check": {"engine": "pattern", "target": "content", "pattern": "api_key"}
        }));
        let cfg = build_config(&content).unwrap();
        let entry = &cfg["rules"]["no-restricted-syntax"];
        assert_eq!(entry[0], "error");
        assert_eq!(entry[1]["selector"], "Literal[value=/api_key/]");
        assert_eq!(entry[1]["message"], "no secrets");

        let import = rule(json!({
            "id": "IMP-1",
            "check": {"engine": "pattern", "target": "import", "pattern": "lodash/*"}
        }));
        let cfg = build_config(&import).unwrap();
        assert_eq!(
            cfg["rules"]["no-restricted-imports"][1]["patterns"],
            json!(["lodash/*"])
        );
    }

    #[test]
    fn test_unsupported_pattern_target() {
        let r = rule(json!({
            "id": "P-9",
            "check": {"engine": "pattern", "target": "filename", "pattern": "x"}
        }));
        assert!(matches!(
            build_config(&r),
            Err(ValidateError::Config { .. })
        ));
    }

    #[test]
    fn test_length_scopes() {
        let cases = [
            ("line", "max-len"),
            ("file", "max-lines"),
            ("function", "max-lines-per-function"),
            ("params", "max-params"),
            ("parameters", "max-params"),
        ];
        for (scope, eslint_rule) in cases {
            let r = rule(json!({
                "id": "LEN", "check": {"engine": "length", "scope": scope, "max": 80.0}
            }));
            let cfg = build_config(&r).unwrap();
            assert!(cfg["rules"].get(eslint_rule).is_some(), "{scope}");
        }
        let r = rule(json!({"id": "LEN", "check": {"engine": "length", "scope": "line", "max": 100}}));
        assert_eq!(build_config(&r).unwrap()["rules"]["max-len"][1]["code"], 100);
        let r = rule(json!({"id": "LEN", "check": {"engine": "length", "scope": "class", "max": 3}}));
        assert!(build_config(&r).is_err());
        let r = rule(json!({"id": "LEN", "check": {"engine": "length", "scope": "line", "min": 3}}));
        assert!(build_config(&r).is_err());
    }

    #[test]
    fn test_style_rules() {
        let r = rule(json!({
            "id": "STY",
            "check": {"engine": "style", "indent": 2, "quote": "single", "semi": false,
                      "trailingComma": "none"}
        }));
        let rules = build_config(&r).unwrap()["rules"].clone();
        assert_eq!(rules["indent"], json!(["error", 2]));
        assert_eq!(rules["quotes"], json!(["error", "single"]));
        assert_eq!(rules["semi"], json!(["error", "never"]));
        assert_eq!(rules["comma-dangle"], json!(["error", "never"]));

        let bare = rule(json!({"id": "STY", "check": {"engine": "style"}}));
        assert_eq!(build_config(&bare).unwrap()["rules"], json!({}));
    }

    #[test]
    fn test_ast_rule_uses_compiled_selector() {
        let r = rule(json!({
            "id": "AST-1",
            "check": {"engine": "ast", "node": "FunctionDeclaration",
                      "where": {"async": true}, "has": ["TryStatement"]}
        }));
        let cfg = build_config(&r).unwrap();
        let entry = &cfg["rules"]["no-restricted-syntax"][1];
        assert_eq!(
            entry["selector"],
            "FunctionDeclaration[async=true]:not(:has(TryStatement))"
        );
        assert_eq!(entry["message"], "AST rule AST-1 violation");
    }

    #[test]
    fn test_typecheck_rule_is_rejected() {
        let r = rule(json!({"id": "TC", "check": {"engine": "typechecker"}}));
        assert!(build_config(&r).is_err());
    }

    #[test]
    fn test_parse_json_output() {
        let stdout = r#"[
          {"filePath": "/repo/src/a.js", "messages": [
            {"ruleId": "max-len", "severity": 2, "message": "This line has a length of 120.",
             "line": 3, "column": 1, "endLine": 3, "endColumn": 121},
            {"ruleId": null, "severity": 1, "message": "Parsing error", "line": 9, "column": 4}
          ]},
          {"filePath": "/repo/src/b.js", "messages": []}
        ]"#;
        let v = parse_json_output(stdout).unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].file, "/repo/src/a.js");
        assert_eq!(v[0].rule_id, "max-len");
        assert_eq!(v[0].severity, "error");
        assert_eq!(v[0].end_column, Some(121));
        assert_eq!(v[1].rule_id, "");
        assert_eq!(v[1].severity, "warning");
        assert!(parse_json_output("[]").unwrap().is_empty());
        assert!(parse_json_output("  ").unwrap().is_empty());
    }

    #[test]
    fn test_parse_garbage_is_parse_error() {
        let err = parse_json_output("Oops! Something went wrong!").unwrap_err();
        assert!(matches!(err, ValidateError::Parse { .. }));
    }

    #[test]
    fn test_execute_without_files_skips_tool() {
        let dir = tempdir().unwrap();
        let adapter = EslintAdapter::new(dir.path(), SubprocessExecutor::default());
        let out = adapter.execute(&ExecContext::new(), b"{}", &[]).unwrap();
        assert_eq!(out.stdout, "[]");
        assert!(adapter.parse_output(&out).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_execute_with_stub_binary() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let bin = local_bin(dir.path(), "eslint");
        std::fs::create_dir_all(bin.parent().unwrap()).unwrap();
        // Echo back one finding per file and exit 1 like ESLint does.
        std::fs::write(
            &bin,
            "#!/bin/sh\n\
             [ \"$ESLINT_USE_FLAT_CONFIG\" = false ] || exit 2\n\
             [ -f \"$2\" ] || exit 2\n\
             echo '[{\"filePath\":\"a.js\",\"messages\":[{\"ruleId\":\"semi\",\"severity\":2,\"message\":\"Missing semicolon.\",\"line\":1,\"column\":10}]}]'\n\
             exit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();

        let adapter = EslintAdapter::new(dir.path(), SubprocessExecutor::default());
        assert!(adapter.check_availability(&ExecContext::new()).is_ok());
        let out = adapter
            .execute(&ExecContext::new(), b"{}", &["a.js".to_string()])
            .unwrap();
        assert_eq!(out.exit_code, 1);
        let v = adapter.parse_output(&out).unwrap();
        assert_eq!(v[0].rule_id, "semi");
        assert_eq!(v[0].line, 1);
        // The temporary config is gone once execute returns.
        let leftovers = std::fs::read_dir(dir.path().join(".tmp")).unwrap().count();
        assert_eq!(leftovers, 0);
    }
}
