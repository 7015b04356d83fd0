//! Checkstyle adapter for Java.
//!
//! Configuration is a `Checker` module tree. Every check sits under
//! `TreeWalker` except `LineLength`, which Checkstyle only accepts directly
//! under `Checker`. Results come back with `-f xml`:
//!
//! ```text
//! <checkstyle><file name="A.java">
//!   <error line="3" column="5" severity="warning" message="..." source="...TypeNameCheck"/>
//! </file></checkstyle>
//! ```
//!
//! The jar is not downloaded automatically; it is expected at
//! `<tools_dir>/checkstyle-<version>-all.jar`.

use crate::adapter::exec::ConfigFile;
use crate::adapter::{
    Adapter, AdapterCapabilities, ExecContext, InstallConfig, RawViolation, SubprocessExecutor,
    ToolOutput,
};
use crate::error::{Result, ValidateError};
use crate::models::rule::{CheckSpec, LengthCheck, PatternCheck, Rule, StyleCheck};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::{Path, PathBuf};

const NAME: &str = "checkstyle";
pub const DEFAULT_VERSION: &str = "10.12.0";
const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2/com/puppycrawl/tools/checkstyle";

const DOCTYPE: &str = "<?xml version=\"1.0\"?>\n<!DOCTYPE module PUBLIC\n    \"-//Checkstyle//DTD Checkstyle Configuration 1.3//EN\"\n    \"https://checkstyle.org/dtds/configuration_1_3.dtd\">\n";

#[derive(Debug, Clone, PartialEq)]
/// One `<module>` element with its `<property>` children.
pub struct Module {
    pub name: String,
    pub properties: Vec<(String, String)>,
}

impl Module {
    fn new(name: &str, properties: &[(&str, String)]) -> Self {
        Module {
            name: name.to_string(),
            properties: properties
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    fn render(&self, indent: &str, out: &mut String) {
        if self.properties.is_empty() {
            out.push_str(&format!("{}<module name=\"{}\"/>\n", indent, escape(&self.name)));
            return;
        }
        out.push_str(&format!("{}<module name=\"{}\">\n", indent, escape(&self.name)));
        for (k, v) in &self.properties {
            out.push_str(&format!(
                "{}  <property name=\"{}\" value=\"{}\"/>\n",
                indent,
                escape(k.as_str()),
                escape(v.as_str())
            ));
        }
        out.push_str(&format!("{}</module>\n", indent));
    }
}

fn pattern_modules(check: &PatternCheck) -> Vec<Module> {
    if check.target.is_empty() {
        return Vec::new();
    }
    // The target names a checkstyle module (TypeName, MethodName, ...).
    vec![Module::new(&check.target, &[("format", check.pattern.clone())])]
}

fn length_modules(check: &LengthCheck) -> Vec<Module> {
    if check.max <= 0 {
        return Vec::new();
    }
    let max = check.max.to_string();
    let name = match check.scope.as_str() {
        "line" => "LineLength",
        "method" | "function" => "MethodLength",
        "params" | "parameters" => "ParameterNumber",
        "file" => "FileLength",
        _ => return Vec::new(),
    };
    vec![Module::new(name, &[("max", max)])]
}

fn style_modules(check: &StyleCheck) -> Vec<Module> {
    let mut modules = Vec::new();
    if check.indent > 0 {
        let n = check.indent.to_string();
        modules.push(Module::new(
            "Indentation",
            &[
                ("basicOffset", n.clone()),
                ("braceAdjustment", "0".to_string()),
                ("caseIndent", n),
            ],
        ));
    }
    if check.brace_style.as_deref() == Some("same-line") {
        modules.push(Module::new("LeftCurly", &[("option", "eol".to_string())]));
    }
    if check.space_after_keyword {
        modules.push(Module::new(
            "WhitespaceAfter",
            &[(
                "tokens",
                "COMMA, SEMI, LITERAL_IF, LITERAL_ELSE, LITERAL_WHILE, LITERAL_DO, LITERAL_FOR"
                    .to_string(),
            )],
        ));
    }
    if check.space_around_operators {
        modules.push(Module::new(
            "WhitespaceAround",
            &[
                ("allowEmptyConstructors", "true".to_string()),
                ("allowEmptyMethods", "true".to_string()),
            ],
        ));
    }
    if check.print_width > 0 {
        modules.push(Module::new("LineLength", &[("max", check.print_width.to_string())]));
    }
    if check.blank_lines_between_methods {
        modules.push(Module::new(
            "EmptyLineSeparator",
            &[
                ("allowNoEmptyLineBetweenFields", "true".to_string()),
                ("tokens", "METHOD_DEF".to_string()),
            ],
        ));
    }
    if check.one_statement_per_line {
        modules.push(Module::new("OneStatementPerLine", &[]));
    }
    modules
}

/// Render a complete configuration document for `modules`.
pub fn render_config(modules: &[Module]) -> String {
    let (checker, walker): (Vec<&Module>, Vec<&Module>) =
        modules.iter().partition(|m| m.name == "LineLength");
    let mut out = String::from(DOCTYPE);
    out.push_str("<module name=\"Checker\">\n");
    if !walker.is_empty() {
        out.push_str("  <module name=\"TreeWalker\">\n");
        for m in walker {
            m.render("    ", &mut out);
        }
        out.push_str("  </module>\n");
    }
    for m in checker {
        m.render("  ", &mut out);
    }
    out.push_str("</module>\n");
    out
}

pub fn modules_for(rule: &Rule) -> Result<Vec<Module>> {
    match rule.spec()? {
        CheckSpec::Pattern(p) => Ok(pattern_modules(p)),
        CheckSpec::Length(l) => Ok(length_modules(l)),
        CheckSpec::Style(s) => Ok(style_modules(s)),
        _ => Err(ValidateError::config(
            &rule.id,
            format!("checkstyle cannot run '{}' checks", rule.check.engine()),
        )),
    }
}

fn map_severity(severity: &str) -> &'static str {
    match severity.to_ascii_lowercase().as_str() {
        "error" => "error",
        "info" => "info",
        _ => "warning",
    }
}

/// `com.puppycrawl...naming.TypeNameCheck` -> `TypeName`.
pub fn extract_rule_id(source: &str) -> String {
    if source.is_empty() {
        return "unknown".to_string();
    }
    let last = source.rsplit('.').next().unwrap_or(source);
    last.strip_suffix("Check").unwrap_or(last).to_string()
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Parse `-f xml` output into violations in document order.
pub fn parse_xml_output(output: &ToolOutput) -> Result<Vec<RawViolation>> {
    let xml = output.stdout.trim();
    if xml.is_empty() {
        if output.exit_code == 0 {
            return Ok(Vec::new());
        }
        return Err(ValidateError::ToolFailed {
            tool: NAME.to_string(),
            code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        });
    }
    // Checkstyle prints progress lines ahead of the report.
    let start = xml.find("<?xml").or_else(|| xml.find("<checkstyle"));
    let Some(start) = start else {
        return Err(ValidateError::parse(
            NAME,
            format!("no checkstyle report in output: {}", output.stderr.trim()),
        ));
    };

    let mut reader = Reader::from_str(&xml[start..]);
    reader.config_mut().trim_text(true);
    let mut current_file = String::new();
    let mut violations = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"file" => current_file = attr(&e, b"name").unwrap_or_default(),
                b"error" => violations.push(RawViolation {
                    file: current_file.clone(),
                    line: attr(&e, b"line").and_then(|v| v.parse().ok()).unwrap_or(0),
                    column: attr(&e, b"column").and_then(|v| v.parse().ok()).unwrap_or(0),
                    message: attr(&e, b"message").unwrap_or_default(),
                    severity: map_severity(&attr(&e, b"severity").unwrap_or_default()).to_string(),
                    rule_id: extract_rule_id(&attr(&e, b"source").unwrap_or_default()),
                    ..Default::default()
                }),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ValidateError::parse(NAME, e.to_string())),
            _ => {}
        }
    }
    Ok(violations)
}

pub struct CheckstyleAdapter {
    tools_dir: PathBuf,
    version: String,
    executor: SubprocessExecutor,
}

impl CheckstyleAdapter {
    pub fn new(tools_dir: &Path, executor: SubprocessExecutor) -> Self {
        CheckstyleAdapter {
            tools_dir: tools_dir.to_path_buf(),
            version: DEFAULT_VERSION.to_string(),
            executor,
        }
    }

    pub fn jar_path(&self) -> PathBuf {
        self.tools_dir
            .join(format!("checkstyle-{}-all.jar", self.version))
    }

    fn java(&self) -> Result<PathBuf> {
        which::which("java").map_err(|_| ValidateError::AdapterUnavailable {
            adapter: NAME.to_string(),
            reason: "java not found: please install a Java runtime".to_string(),
        })
    }
}

impl Adapter for CheckstyleAdapter {
    fn name(&self) -> &str {
        NAME
    }

    fn capabilities(&self) -> AdapterCapabilities {
        AdapterCapabilities::new(
            NAME,
            &["java"],
            &["pattern", "length", "style", "naming"],
            &self.version,
        )
    }

    fn check_availability(&self, _ctx: &ExecContext) -> Result<()> {
        self.java()?;
        let jar = self.jar_path();
        if !jar.exists() {
            return Err(ValidateError::AdapterUnavailable {
                adapter: NAME.to_string(),
                reason: format!("jar not found at {}", jar.display()),
            });
        }
        Ok(())
    }

    fn install(&self, _ctx: &ExecContext, config: &InstallConfig) -> Result<()> {
        let version = config.version.as_deref().unwrap_or(&self.version);
        let jar_name = format!("checkstyle-{}-all.jar", version);
        let target = config.dir(&self.tools_dir).join(&jar_name);
        if target.exists() && !config.force {
            return Ok(());
        }
        Err(ValidateError::AdapterUnavailable {
            adapter: NAME.to_string(),
            reason: format!(
                "automatic download is not supported; fetch {}/{}/{} to {}",
                MAVEN_CENTRAL,
                version,
                jar_name,
                target.display()
            ),
        })
    }

    fn generate_config(&self, rule: &Rule) -> Result<Vec<u8>> {
        Ok(render_config(&modules_for(rule)?).into_bytes())
    }

    fn execute(&self, ctx: &ExecContext, config: &[u8], files: &[String]) -> Result<ToolOutput> {
        if files.is_empty() {
            return Ok(ToolOutput::default());
        }
        let java = self.java()?;
        let cfg = ConfigFile::create(
            Some(&self.tools_dir.join(".tmp")),
            "checkstyle-",
            ".xml",
            config,
        )?;
        let mut args = vec![
            "-jar".to_string(),
            self.jar_path().to_string_lossy().into_owned(),
            "-c".to_string(),
            cfg.path_arg(),
            "-f".to_string(),
            "xml".to_string(),
        ];
        args.extend(files.iter().cloned());
        // Exit status counts error-severity findings; it is not a failure.
        self.executor
            .execute(ctx, &java.to_string_lossy(), &args)
    }

    fn parse_output(&self, output: &ToolOutput) -> Result<Vec<RawViolation>> {
        parse_xml_output(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn rule(v: serde_json::Value) -> Rule {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_pattern_module_under_tree_walker() {
        let r = rule(json!({
            "id": "JAVA-NAMING",
            "check": {"engine": "pattern", "target": "TypeName", "pattern": "^[A-Z][a-zA-Z0-9]*$"}
        }));
        let xml = render_config(&modules_for(&r).unwrap());
        assert!(xml.starts_with("<?xml version=\"1.0\"?>"));
        assert!(xml.contains("<module name=\"TreeWalker\">"));
        assert!(xml.contains("<module name=\"TypeName\">"));
        assert!(xml.contains("<property name=\"format\" value=\"^[A-Z][a-zA-Z0-9]*$\"/>"));
    }

    #[test]
    fn test_line_length_sits_under_checker() {
        let r = rule(json!({
            "id": "JAVA-LEN", "check": {"engine": "length", "scope": "line", "max": 120}
        }));
        let xml = render_config(&modules_for(&r).unwrap());
        assert!(!xml.contains("TreeWalker"));
        assert!(xml.contains("  <module name=\"LineLength\">\n    <property name=\"max\" value=\"120\"/>"));
    }

    #[test]
    fn test_length_scope_mapping() {
        for (scope, module) in [
            ("method", "MethodLength"),
            ("params", "ParameterNumber"),
            ("parameters", "ParameterNumber"),
        ] {
            let r = rule(json!({"id": "L", "check": {"engine": "length", "scope": scope, "max": 7}}));
            let mods = modules_for(&r).unwrap();
            assert_eq!(mods[0].name, module);
            assert_eq!(mods[0].properties[0], ("max".to_string(), "7".to_string()));
        }
    }

    #[test]
    fn test_style_modules() {
        let r = rule(json!({
            "id": "JAVA-STYLE",
            "check": {"engine": "style", "indent": 4, "braceStyle": "same-line",
                      "spaceAfterKeyword": true, "printWidth": 100,
                      "oneStatementPerLine": true}
        }));
        let names: Vec<String> = modules_for(&r).unwrap().into_iter().map(|m| m.name).collect();
        assert_eq!(
            names,
            vec!["Indentation", "LeftCurly", "WhitespaceAfter", "LineLength", "OneStatementPerLine"]
        );
        let xml = render_config(&modules_for(&r).unwrap());
        assert!(xml.contains("<module name=\"OneStatementPerLine\"/>"));
    }

    #[test]
    fn test_property_values_are_escaped() {
        let r = rule(json!({
            "id": "P", "check": {"engine": "pattern", "target": "MemberName", "pattern": "^m<\"&"}
        }));
        let xml = render_config(&modules_for(&r).unwrap());
        assert!(xml.contains("value=\"^m&lt;&quot;&amp;\""));
    }

    #[test]
    fn test_extract_rule_id() {
        assert_eq!(
            extract_rule_id("com.puppycrawl.tools.checkstyle.checks.naming.TypeNameCheck"),
            "TypeName"
        );
        assert_eq!(extract_rule_id("LineLength"), "LineLength");
        assert_eq!(extract_rule_id(""), "unknown");
    }

    #[test]
    fn test_parse_xml_output() {
        let out = ToolOutput {
            stdout: r#"Starting audit...
<?xml version="1.0" encoding="UTF-8"?>
<checkstyle version="10.12.0">
<file name="src/Main.java">
<error line="3" column="14" severity="error" message="Name &apos;foo_bar&apos; must match pattern." source="com.puppycrawl.tools.checkstyle.checks.naming.TypeNameCheck"/>
<error line="10" severity="warning" message="Line is longer than 100 characters." source="com.puppycrawl.tools.checkstyle.checks.sizes.LineLengthCheck"/>
</file>
<file name="src/Clean.java">
</file>
</checkstyle>
Audit done.
"#
            .into(),
            exit_code: 1,
            ..Default::default()
        };
        let v = parse_xml_output(&out).unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v[0].file, "src/Main.java");
        assert_eq!(v[0].message, "Name 'foo_bar' must match pattern.");
        assert_eq!(v[0].rule_id, "TypeName");
        assert_eq!((v[0].line, v[0].column), (3, 14));
        assert_eq!(v[1].column, 0);
        assert_eq!(v[1].severity, "warning");
    }

    #[test]
    fn test_parse_failures() {
        let crashed = ToolOutput {
            stderr: "Error: Unable to access jarfile".into(),
            exit_code: 1,
            ..Default::default()
        };
        assert!(matches!(
            parse_xml_output(&crashed),
            Err(ValidateError::ToolFailed { .. })
        ));
        let garbage = ToolOutput {
            stdout: "Exception in thread main".into(),
            exit_code: 254,
            ..Default::default()
        };
        assert!(matches!(
            parse_xml_output(&garbage),
            Err(ValidateError::Parse { .. })
        ));
        assert!(parse_xml_output(&ToolOutput::default()).unwrap().is_empty());
    }

    #[test]
    fn test_install_reports_expected_location() {
        let dir = tempdir().unwrap();
        let adapter = CheckstyleAdapter::new(dir.path(), SubprocessExecutor::default());
        let err = adapter
            .install(&ExecContext::new(), &InstallConfig::default())
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("checkstyle-10.12.0-all.jar"));
        assert!(msg.contains(&dir.path().display().to_string()));

        std::fs::write(adapter.jar_path(), b"").unwrap();
        assert!(adapter
            .install(&ExecContext::new(), &InstallConfig::default())
            .is_ok());
    }
}
