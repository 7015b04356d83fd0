//! Rulegate CLI binary entry point.
//! Resolves configuration, builds the engine registry and prints reports.

use clap::Parser;
use rulegate::adapter::ExecContext;
use rulegate::cli::{Cli, Commands};
use rulegate::config::{self, CliOverrides, Effective};
use rulegate::engine::{builtin_registry, EngineConfig, EngineRegistry};
use rulegate::error::Result;
use rulegate::files::collect_files;
use rulegate::models::policy::Policy;
use rulegate::models::rule::CheckPayload;
use rulegate::output::{self, error_prefix, info_prefix, note_prefix};
use rulegate::query::AstQuery;
use rulegate::validator::{RunScope, Validator};
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_env("RULEGATE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", error_prefix(), msg);
    process::exit(2);
}

fn engine_registry(eff: &Effective) -> Result<EngineRegistry> {
    builtin_registry(EngineConfig {
        work_dir: Some(eff.repo_root.clone()),
        tools_dir: eff.tools_dir.clone(),
        timeout: eff.timeout,
        debug: false,
        adapters: None,
    })
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    match cli.cmd {
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Validate {
            repo_root,
            policy,
            output,
            timeout,
            branch,
            role,
            tags,
            files,
        } => {
            let eff = config::resolve_effective(&CliOverrides {
                repo_root: repo_root.as_deref(),
                policy: policy.as_deref(),
                output: output.as_deref(),
                timeout_secs: timeout,
                branch: branch.as_deref(),
                role: role.as_deref(),
                tags: &tags,
            });
            if config::load_config(&eff.repo_root).is_none() && eff.output != "json" {
                eprintln!("{} No rulegate.toml found; using defaults.", note_prefix());
            }
            if !eff.policy.exists() {
                fail(format!(
                    "Policy file not found: {} (pass --policy or configure rulegate.toml)",
                    eff.policy.display()
                ));
            }
            let policy = Policy::load(&eff.policy).unwrap_or_else(|e| fail(e));

            let files = if files.is_empty() {
                if eff.output != "json" {
                    eprintln!(
                        "{} Using patterns: [{}]",
                        info_prefix(),
                        eff.patterns.join(", ")
                    );
                }
                collect_files(&eff.repo_root, &eff.patterns, &[eff.tools_dir.clone()])
                    .unwrap_or_else(|e| fail(e))
            } else {
                files
            };

            let engines = engine_registry(&eff).unwrap_or_else(|e| fail(e));
            let validator = Validator::new(Arc::new(engines)).with_parallelism(eff.parallelism);
            let scope = RunScope {
                branch: eff.branch.clone(),
                role: eff.role.clone(),
                tags: eff.tags.clone(),
            };
            let ctx = ExecContext::new().with_work_dir(&eff.repo_root);
            let report = validator.validate_policy(&ctx, &policy, &files, &scope);
            if let Err(e) = validator.engines().close_all() {
                eprintln!("{} {}", note_prefix(), e);
            }
            if let Err(e) = output::print_report(&report, &eff.output, &eff.repo_root) {
                fail(e);
            }
            process::exit(report.exit_code());
        }
        Commands::Engines { repo_root, output } => {
            let eff = config::resolve_effective(&CliOverrides {
                repo_root: repo_root.as_deref(),
                output: output.as_deref(),
                ..Default::default()
            });
            let engines = engine_registry(&eff).unwrap_or_else(|e| fail(e));
            if let Err(e) = output::print_engines(&engines.capabilities(), &eff.output) {
                fail(e);
            }
        }
        Commands::Selector { check } => {
            let payload: CheckPayload = serde_json::from_str(&check)
                .unwrap_or_else(|e| fail(format!("check payload is not a JSON object: {}", e)));
            match AstQuery::parse(&payload) {
                Ok(query) => println!("{}", query.generate_selector()),
                Err(msg) => fail(msg),
            }
        }
    }
}
