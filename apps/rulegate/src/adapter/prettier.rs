//! Prettier adapter: formatting checks and fixes.
//!
//! `--check` reports unformatted files only, so every finding is a
//! file-level violation without a position. Exit 1 means some files need
//! formatting; exit 2 means Prettier failed (usually a syntax error).

use crate::adapter::exec::{find_tool, local_bin, npm_install, ConfigFile};
use crate::adapter::{
    Adapter, AdapterCapabilities, ExecContext, InstallConfig, RawViolation, SubprocessExecutor,
    ToolOutput,
};
use crate::error::{Result, ValidateError};
use crate::models::rule::{CheckSpec, Rule, StyleCheck};
use serde_json::{json, Map, Value as Json};
use std::path::{Path, PathBuf};

const NAME: &str = "prettier";
const DEFAULT_VERSION: &str = "^3.0.0";
const DEFAULT_PRINT_WIDTH: i64 = 100;

const FORMATTED_EXTENSIONS: &[&str] = &[
    "js", "mjs", "cjs", "jsx", "ts", "mts", "cts", "tsx", "json", "css", "scss", "less", "html",
    "vue", "md", "markdown", "yaml", "yml",
];

pub const FINDING_MESSAGE: &str = "Code style issues found. Run prettier --write to fix.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Check,
    Write,
}

impl Mode {
    fn flag(self) -> &'static str {
        match self {
            Mode::Check => "--check",
            Mode::Write => "--write",
        }
    }
}

pub struct PrettierAdapter {
    tools_dir: PathBuf,
    executor: SubprocessExecutor,
}

/// `.prettierrc` options for a style check. `max` is accepted as a
/// fallback for `printWidth` so a line-length payload can drive Prettier.
pub fn build_config(style: &StyleCheck, max: i64) -> Json {
    let mut cfg = Map::new();
    if style.indent > 0 {
        cfg.insert("tabWidth".into(), json!(style.indent));
        cfg.insert("useTabs".into(), json!(false));
    }
    if let Some(quote) = &style.quote {
        cfg.insert("singleQuote".into(), json!(quote == "single"));
    }
    if let Some(semi) = style.semi {
        cfg.insert("semi".into(), json!(semi));
    }
    let trailing = style.trailing_comma.as_deref().unwrap_or("es5");
    cfg.insert("trailingComma".into(), json!(trailing));
    let width = if style.print_width > 0 {
        style.print_width
    } else if max > 0 {
        max
    } else {
        DEFAULT_PRINT_WIDTH
    };
    cfg.insert("printWidth".into(), json!(width));
    Json::Object(cfg)
}

fn is_formatted_file(candidate: &str) -> bool {
    Path::new(candidate)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| FORMATTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Files listed by `prettier --check`, in the order printed.
pub fn parse_check_output(output: &ToolOutput) -> Vec<RawViolation> {
    if output.exit_code == 0 {
        return Vec::new();
    }
    let combined = format!("{}\n{}", output.stdout, output.stderr);
    combined
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with("Checking"))
        .map(|l| l.strip_prefix("[warn]").map(str::trim).unwrap_or(l))
        .filter(|l| !l.starts_with("Code style") && is_formatted_file(l))
        .map(|file| RawViolation {
            file: file.to_string(),
            message: FINDING_MESSAGE.to_string(),
            severity: "warning".to_string(),
            rule_id: NAME.to_string(),
            ..Default::default()
        })
        .collect()
}

impl PrettierAdapter {
    pub fn new(tools_dir: &Path, executor: SubprocessExecutor) -> Self {
        PrettierAdapter {
            tools_dir: tools_dir.to_path_buf(),
            executor,
        }
    }

    /// Run Prettier in the given mode; `Mode::Write` rewrites files in place.
    pub fn run(
        &self,
        ctx: &ExecContext,
        config: &[u8],
        files: &[String],
        mode: Mode,
    ) -> Result<ToolOutput> {
        if files.is_empty() {
            return Ok(ToolOutput::default());
        }
        let cfg = ConfigFile::create(
            Some(&self.tools_dir.join(".tmp")),
            "prettierrc-",
            ".json",
            config,
        )?;
        let program = find_tool(&self.tools_dir, NAME)
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| NAME.to_string());
        let mut args = vec![
            "--config".to_string(),
            cfg.path_arg(),
            mode.flag().to_string(),
        ];
        args.extend(files.iter().cloned());

        let out = self.executor.execute(ctx, &program, &args)?;
        if out.exit_code >= 2 || (mode == Mode::Write && out.exit_code != 0) {
            return Err(ValidateError::ToolFailed {
                tool: NAME.to_string(),
                code: out.exit_code,
                stderr: out.stderr.trim().to_string(),
            });
        }
        Ok(out)
    }
}

impl Adapter for PrettierAdapter {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::new(
            NAME,
            &[
                "javascript",
                "typescript",
                "jsx",
                "tsx",
                "json",
                "yaml",
                "css",
                "html",
                "markdown",
            ],
            &["style"],
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
        let cfg = match rule.spec()? {
            CheckSpec::Style(style) => build_config(style, rule.get_int("max")),
            CheckSpec::Length(len) if len.scope == "line" => {
                build_config(&StyleCheck::default(), len.max)
            }
            _ => {
                return Err(ValidateError::config(
                    &rule.id,
                    format!("prettier cannot run '{}' checks", rule.check.engine()),
                ))
            }
        };
        Ok(serde_json::to_vec_pretty(&cfg)?)
    }

    fn execute(&self, ctx: &ExecContext, config: &[u8], files: &[String]) -> Result<ToolOutput> {
        self.run(ctx, config, files, Mode::Check)
    }

    fn parse_output(&self, output: &ToolOutput) -> Result<Vec<RawViolation>> {
        Ok(parse_check_output(output))
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
    fn test_config_defaults() {
        let cfg = build_config(&StyleCheck::default(), 0);
        assert_eq!(cfg, json!({"trailingComma": "es5", "printWidth": 100}));
    }

    #[test]
    fn test_config_from_style_rule() {
        let r = rule(json!({
            "id": "FMT-1",
            "check": {"engine": "style", "indent": 4, "quote": "single", "semi": false,
                      "trailingComma": "all", "printWidth": 120}
        }));
        let adapter = PrettierAdapter::new(Path::new("/tmp"), SubprocessExecutor::default());
        let cfg: Json = serde_json::from_slice(&adapter.generate_config(&r).unwrap()).unwrap();
        assert_eq!(cfg["tabWidth"], 4);
        assert_eq!(cfg["useTabs"], false);
        assert_eq!(cfg["singleQuote"], true);
        assert_eq!(cfg["semi"], false);
        assert_eq!(cfg["trailingComma"], "all");
        assert_eq!(cfg["printWidth"], 120);
    }

    #[test]
    fn test_print_width_falls_back_to_max() {
        let r = rule(json!({"id": "F", "check": {"engine": "style", "max": 90}}));
        let adapter = PrettierAdapter::new(Path::new("/tmp"), SubprocessExecutor::default());
        let cfg: Json = serde_json::from_slice(&adapter.generate_config(&r).unwrap()).unwrap();
        assert_eq!(cfg["printWidth"], 90);
        assert!(cfg.get("semi").is_none());
    }

    #[test]
    fn test_rejects_non_style_rules() {
        let r = rule(json!({"id": "P", "check": {"engine": "pattern", "pattern": "x"}}));
        let adapter = PrettierAdapter::new(Path::new("/tmp"), SubprocessExecutor::default());
        assert!(adapter.generate_config(&r).is_err());
    }

    #[test]
    fn test_parse_check_output() {
        let out = ToolOutput {
            stdout: "Checking formatting...\n".into(),
            stderr: "[warn] src/a.js\n[warn] src/styles/main.css\n[warn] Code style issues found in 2 files. Run Prettier with --write to fix.\n".into(),
            exit_code: 1,
            ..Default::default()
        };
        let v = parse_check_output(&out);
        let files: Vec<&str> = v.iter().map(|x| x.file.as_str()).collect();
        assert_eq!(files, vec!["src/a.js", "src/styles/main.css"]);
        assert_eq!(v[0].line, 0);
        assert_eq!(v[0].rule_id, "prettier");
        assert_eq!(v[0].severity, "warning");
    }

    #[test]
    fn test_clean_exit_has_no_findings() {
        let out = ToolOutput {
            stdout: "Checking formatting...\nAll matched files use Prettier code style!\n".into(),
            ..Default::default()
        };
        assert!(parse_check_output(&out).is_empty());
    }

    #[test]
    fn test_run_without_files() {
        let dir = tempdir().unwrap();
        let adapter = PrettierAdapter::new(dir.path(), SubprocessExecutor::default());
        let out = adapter.run(&ExecContext::new(), b"{}", &[], Mode::Write).unwrap();
        assert_eq!(out.exit_code, 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_two_is_tool_failure() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let bin = local_bin(dir.path(), "prettier");
        std::fs::create_dir_all(bin.parent().unwrap()).unwrap();
        std::fs::write(&bin, "#!/bin/sh\necho '[error] a.js: SyntaxError' 1>&2\nexit 2\n").unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();

        let adapter = PrettierAdapter::new(dir.path(), SubprocessExecutor::default());
        let err = adapter
            .execute(&ExecContext::new(), b"{}", &["a.js".to_string()])
            .unwrap_err();
        match err {
            ValidateError::ToolFailed { code, stderr, .. } => {
                assert_eq!(code, 2);
                assert!(stderr.contains("SyntaxError"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
