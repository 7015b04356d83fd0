//! Output rendering for validation reports and engine listings.
//!
//! Supports `human` (default) and `json` outputs. The JSON form serializes
//! the report as-is: per-rule outcomes plus a top-level summary.

use crate::engine::EngineCapabilities;
use crate::error::Result;
use crate::models::{Severity, Violation};
use crate::validator::{Report, Status};
use owo_colors::OwoColorize;
use serde_json::json;
use serde_json::Value as JsonVal;
use std::path::Path;

fn use_colors(output: &str) -> bool {
    output != "json" && std::env::var_os("NO_COLOR").is_none()
}

fn stderr_colors() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

pub fn error_prefix() -> String {
    if stderr_colors() {
        "error:".red().bold().to_string()
    } else {
        "error:".to_string()
    }
}

pub fn note_prefix() -> String {
    if stderr_colors() {
        "note:".cyan().bold().to_string()
    } else {
        "note:".to_string()
    }
}

pub fn info_prefix() -> String {
    if stderr_colors() {
        "info:".blue().bold().to_string()
    } else {
        "info:".to_string()
    }
}

/// Path shown to the user: relative to `root` when the tool reported an
/// absolute path under it.
pub fn display_path(file: &str, root: &Path) -> String {
    let p = Path::new(file);
    if !p.is_absolute() {
        return file.to_string();
    }
    match pathdiff::diff_paths(p, root) {
        Some(rel) if !rel.starts_with("..") => rel.to_string_lossy().to_string(),
        _ => file.to_string(),
    }
}

fn severity_tag(sev: Severity, color: bool) -> (String, String) {
    let (label, icon) = match sev {
        Severity::Error => ("⟦error⟧", "✖"),
        Severity::Warning => ("⟦warn⟧", "▲"),
        Severity::Info => ("⟦info⟧", "◆"),
    };
    if !color {
        return (label.to_string(), icon.to_string());
    }
    match sev {
        Severity::Error => (label.red().bold().to_string(), icon.red().to_string()),
        Severity::Warning => (label.yellow().bold().to_string(), icon.yellow().to_string()),
        Severity::Info => (label.blue().bold().to_string(), icon.blue().to_string()),
    }
}

fn violation_line(v: &Violation, root: &Path, color: bool) -> String {
    let (sev, icon) = severity_tag(v.severity, color);
    let mut loc = display_path(&v.file, root);
    if v.line > 0 {
        loc.push_str(&format!(":{}", v.line));
        if v.column > 0 {
            loc.push_str(&format!(":{}", v.column));
        }
    }
    let loc = if color { loc.bold().to_string() } else { loc };
    let mut line = format!("{} {} {} ❲{}❳ — {}", icon, sev, loc, v.rule_id, v.message);
    if let Some(s) = &v.suggestion {
        line.push_str(&format!("\n    hint: {}", s.desc));
    }
    line
}

/// Print a validation report in the requested format.
pub fn print_report(report: &Report, output: &str, root: &Path) -> Result<()> {
    if output == "json" {
        println!("{}", serde_json::to_string_pretty(&compose_report_json(report)?)?);
        return Ok(());
    }
    let color = use_colors(output);
    for o in &report.outcomes {
        for v in o.violations() {
            println!("{}", violation_line(v, root, color));
        }
        if o.status == Status::Errored {
            let msg = o.error.as_deref().unwrap_or("unknown error");
            let label = if o.cancelled { "⟦cancelled⟧" } else { "⟦rule error⟧" };
            if color {
                println!("{} {} ❲{}❳ — {}", "✖".red(), label.red().bold(), o.rule_id, msg);
            } else {
                println!("✖ {} ❲{}❳ — {}", label, o.rule_id, msg);
            }
        }
    }
    let s = &report.summary;
    let summary = format!(
        "— Summary — rules={} passed={} failed={} errored={} skipped={} errors={} warnings={} infos={} files={}",
        s.rules, s.passed, s.failed, s.errored, s.skipped, s.errors, s.warnings, s.infos, s.files
    );
    if color {
        println!("{}", summary.bold());
    } else {
        println!("{}", summary);
    }
    Ok(())
}

/// Print engine capabilities.
pub fn print_engines(caps: &[EngineCapabilities], output: &str) -> Result<()> {
    if output == "json" {
        println!("{}", serde_json::to_string_pretty(&compose_engines_json(caps)?)?);
        return Ok(());
    }
    let color = use_colors(output);
    for c in caps {
        let name = if color {
            c.name.green().bold().to_string()
        } else {
            c.name.clone()
        };
        let mut flags = Vec::new();
        if c.supports_autofix {
            flags.push("autofix");
        }
        if c.requires_compilation {
            flags.push("compiles");
        }
        println!(
            "{} languages=[{}] categories=[{}]{}",
            name,
            c.supported_languages.join(","),
            c.supported_categories.join(","),
            if flags.is_empty() {
                String::new()
            } else {
                format!(" ({})", flags.join(", "))
            }
        );
        for t in &c.external_tools {
            let opt = if t.optional { " optional" } else { "" };
            println!("    {}@{}{}: {}", t.name, t.version, opt, t.install_command);
        }
    }
    Ok(())
}

/// Compose report JSON object (pure) for testing/snapshot purposes.
pub fn compose_report_json(report: &Report) -> Result<JsonVal> {
    Ok(serde_json::to_value(report)?)
}

pub fn compose_engines_json(caps: &[EngineCapabilities]) -> Result<JsonVal> {
    Ok(json!({ "engines": serde_json::to_value(caps)? }))
}
