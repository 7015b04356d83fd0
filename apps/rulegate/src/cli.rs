//! CLI argument parsing via `clap`.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "rulegate",
    version,
    about = "Rulegate: policy validation through external linters",
    long_about = "Rulegate evaluates declarative policy rules against source files by driving per-language tools (eslint, prettier, tsc, checkstyle, pmd) and normalizing their findings.\n\nConfiguration precedence: CLI > rulegate.toml > defaults.",
    after_help = "Examples:\n  rulegate validate\n  rulegate validate --policy conv/policy.yaml --output json src/app.ts\n  rulegate engines\n  rulegate selector '{\"engine\":\"ast\",\"node\":\"CallExpression\",\"where\":{\"callee.name\":\"eval\"}}'",
    arg_required_else_help = true
)]
/// Top-level CLI options and subcommands.
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
/// Supported subcommands.
pub enum Commands {
    /// Show version
    #[command(about = "Show version", long_about = "Print the current rulegate version.")]
    Version,
    /// Validate files against a policy
    #[command(
        about = "Validate files against policy rules",
        long_about = "Evaluate every enabled, in-scope policy rule. Without FILES, the configured patterns are expanded under the repository root. Exit code: 0 clean, 1 violations or rule errors, 2 usage/configuration errors.",
        after_help = "Examples:\n  rulegate validate --branch main --role frontend\n  rulegate validate --tag security --output json"
    )]
    Validate {
        #[arg(long, help = "Repository root (default: current dir)")]
        repo_root: Option<String>,
        #[arg(long, help = "Path to the policy document (default: .rulegate/policy.json)")]
        policy: Option<String>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
        #[arg(long, help = "Per-tool timeout in seconds (default: 120)")]
        timeout: Option<u64>,
        #[arg(long, help = "Current branch for rule scoping")]
        branch: Option<String>,
        #[arg(long, help = "Current role for rule scoping")]
        role: Option<String>,
        #[arg(long = "tag", help = "Only run rules carrying this tag (repeatable)")]
        tags: Vec<String>,
        #[arg(help = "Files to validate (default: configured patterns)")]
        files: Vec<String>,
    },
    /// List engines and their capabilities
    #[command(
        about = "List engines",
        long_about = "List registered engines with languages aggregated from the available adapters."
    )]
    Engines {
        #[arg(long, help = "Repository root (default: current dir)")]
        repo_root: Option<String>,
        #[arg(long, help = "Output mode: human|json (default: human)")]
        output: Option<String>,
    },
    /// Compile an AST check to its selector
    #[command(
        about = "Print the selector for an AST check",
        long_about = "Compile an AST check payload (JSON) into the selector string handed to the backend."
    )]
    Selector {
        #[arg(help = "AST check payload, e.g. {\"engine\":\"ast\",\"node\":\"FunctionDeclaration\"}")]
        check: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_validate() {
        let cli = Cli::try_parse_from([
            "rulegate", "validate", "--tag", "security", "--tag", "style", "--timeout", "30",
            "a.ts", "b.ts",
        ])
        .unwrap();
        match cli.cmd {
            Commands::Validate {
                tags,
                timeout,
                files,
                ..
            } => {
                assert_eq!(tags, vec!["security", "style"]);
                assert_eq!(timeout, Some(30));
                assert_eq!(files, vec!["a.ts", "b.ts"]);
            }
            _ => panic!("expected validate"),
        }
    }

    #[test]
    fn test_parse_selector() {
        let cli = Cli::try_parse_from(["rulegate", "selector", "{\"node\":\"X\"}"]).unwrap();
        assert!(matches!(cli.cmd, Commands::Selector { check } if check == "{\"node\":\"X\"}"));
    }
}
