//! TypeScript compiler adapter for type-correctness rules.
//!
//! A throwaway `tsconfig` listing the files under check is written into the
//! working directory (so relative paths resolve) and `tsc --noEmit` runs
//! against it. Diagnostics come back one per line as
//! `file(line,col): error TSnnnn: message`.

use crate::adapter::exec::{find_tool, local_bin, npm_install, ConfigFile};
use crate::adapter::{
    Adapter, AdapterCapabilities, ExecContext, InstallConfig, RawViolation, SubprocessExecutor,
    ToolOutput,
};
use crate::error::{Result, ValidateError};
use crate::models::rule::{CheckSpec, Rule, TypeCheckOptions};
use regex::Regex;
use serde_json::{json, Map, Value as Json};
use std::path::{Path, PathBuf};

const NAME: &str = "tsc";
const PACKAGE: &str = "typescript";
const DEFAULT_VERSION: &str = "^5.0.0";
const DIAGNOSTIC: &str = r"^(.+?)\((\d+),(\d+)\):\s+(error|warning|suggestion)\s+TS(\d+):\s+(.+)$";

pub struct TscAdapter {
    tools_dir: PathBuf,
    executor: SubprocessExecutor,
}

/// Strict-by-default compiler options, overridden by the rule.
pub fn build_config(opts: &TypeCheckOptions) -> Json {
    let compiler = json!({
        "target": "ES2020",
        "module": "commonjs",
        "lib": ["ES2020"],
        "strict": opts.strict.unwrap_or(true),
        "noImplicitAny": opts.no_implicit_any.unwrap_or(true),
        "strictNullChecks": opts.strict_null_checks.unwrap_or(true),
        "strictFunctionTypes": true,
        "strictBindCallApply": true,
        "strictPropertyInitialization": true,
        "noImplicitThis": true,
        "alwaysStrict": true,
        "noUnusedLocals": false,
        "noUnusedParameters": false,
        "noImplicitReturns": true,
        "noFallthroughCasesInSwitch": true,
        "skipLibCheck": true,
        "esModuleInterop": true,
        "allowJs": opts.allow_js.unwrap_or(false),
        "checkJs": opts.check_js.unwrap_or(false)
    });
    let mut cfg = Map::new();
    cfg.insert("compilerOptions".into(), compiler);
    if !opts.include.is_empty() {
        cfg.insert("include".into(), json!(opts.include));
    }
    if !opts.exclude.is_empty() {
        cfg.insert("exclude".into(), json!(opts.exclude));
    }
    Json::Object(cfg)
}

fn with_files(config: &[u8], files: &[String]) -> Result<Vec<u8>> {
    let mut cfg: Json = serde_json::from_slice(config)?;
    let Some(obj) = cfg.as_object_mut() else {
        return Err(ValidateError::parse(NAME, "tsconfig must be a JSON object"));
    };
    obj.insert("files".into(), json!(files));
    Ok(serde_json::to_vec_pretty(&cfg)?)
}

/// Parse `--pretty false` diagnostics. A failing exit without a single
/// recognizable diagnostic is reported as a parse failure.
pub fn parse_diagnostics(output: &ToolOutput) -> Result<Vec<RawViolation>> {
    let re = Regex::new(DIAGNOSTIC).map_err(|e| ValidateError::parse(NAME, e.to_string()))?;
    let violations: Vec<RawViolation> = output
        .stdout
        .lines()
        .chain(output.stderr.lines())
        .filter_map(|line| re.captures(line.trim_end()))
        .map(|c| {
            let severity = match &c[4] {
                "suggestion" => "info",
                other => other,
            };
            RawViolation {
                file: c[1].to_string(),
                line: c[2].parse().unwrap_or(0),
                column: c[3].parse().unwrap_or(0),
                message: c[6].to_string(),
                severity: severity.to_string(),
                rule_id: format!("TS{}", &c[5]),
                ..Default::default()
            }
        })
        .collect();

    if violations.is_empty() && output.exit_code != 0 {
        let detail = output
            .stdout
            .lines()
            .chain(output.stderr.lines())
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("no output");
        return Err(ValidateError::parse(
            NAME,
            format!("exit code {} without diagnostics: {}", output.exit_code, detail),
        ));
    }
    Ok(violations)
}

impl TscAdapter {
    pub fn new(tools_dir: &Path, executor: SubprocessExecutor) -> Self {
        TscAdapter {
            tools_dir: tools_dir.to_path_buf(),
            executor,
        }
    }
}

impl Adapter for TscAdapter {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::new(NAME, &["typescript", "tsx"], &["typechecker"], DEFAULT_VERSION)
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
            PACKAGE,
            version,
        )
    }

    fn generate_config(&self, rule: &Rule) -> Result<Vec<u8>> {
        match rule.spec()? {
            CheckSpec::TypeCheck(opts) => Ok(serde_json::to_vec_pretty(&build_config(opts))?),
            _ => Err(ValidateError::config(
                &rule.id,
                format!("tsc cannot run '{}' checks", rule.check.engine()),
            )),
        }
    }

    fn execute(&self, ctx: &ExecContext, config: &[u8], files: &[String]) -> Result<ToolOutput> {
        if files.is_empty() {
            return Ok(ToolOutput::default());
        }
        let content = with_files(config, files)?;
        let dir = ctx
            .work_dir
            .clone()
            .or_else(|| self.executor.work_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        let cfg = ConfigFile::create(Some(&dir), ".rulegate-tsconfig-", ".json", &content)?;
        let program = find_tool(&self.tools_dir, NAME)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| NAME.to_string());
        let args = vec![
            "--project".to_string(),
            cfg.path_arg(),
            "--noEmit".to_string(),
            "--pretty".to_string(),
            "false".to_string(),
        ];
        self.executor.execute(ctx, &program, &args)
    }

    fn parse_output(&self, output: &ToolOutput) -> Result<Vec<RawViolation>> {
        parse_diagnostics(output)
    }
}
