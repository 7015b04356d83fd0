//! Rulegate core library.
//!
//! Evaluates declarative policy rules against source files by driving
//! external analysis tools and normalizing what they report.
//!
//! High-level modules:
//! - `selector`: Language/include/exclude file filtering.
//! - `models`: Rules, typed check specs, policies, violations and results.
//! - `query`: AST query compiler producing backend selector strings.
//! - `adapter`: Uniform wrappers over eslint, prettier, tsc, checkstyle and pmd.
//! - `engine`: Category engines and the lazily-initialized engine registry.
//! - `validator`: Policy-level evaluation with scope gating and reporting.
//! - `config`: Discovery and effective configuration resolution.
//! - `files`: Candidate file expansion from glob patterns.
//! - `cli`: CLI argument parsing (binary uses this).
//! - `output`: Human/JSON printers.
pub mod adapter;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod files;
pub mod models;
pub mod output;
pub mod query;
pub mod selector;
pub mod validator;
