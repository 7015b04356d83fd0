//! Error type shared by the selector, engines, adapters and validator.
//!
//! Every failure is scoped to a single rule evaluation; the validator turns
//! an `Err` into an errored outcome for that rule and keeps going.

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidateError {
    /// The rule's check payload cannot drive its engine (missing `node`,
    /// unsupported target, no bounds for a length rule...).
    #[error("rule '{rule}': {message}")]
    Config { rule: String, message: String },

    #[error("engine '{0}' is not registered")]
    EngineNotRegistered(String),

    #[error("engine '{0}' is already registered")]
    EngineAlreadyRegistered(String),

    #[error("engine '{0}' is not initialized")]
    EngineNotInitialized(String),

    #[error("failed to create engine '{engine}': {source}")]
    EngineInit {
        engine: String,
        #[source]
        source: Box<ValidateError>,
    },

    #[error("no adapter found for language={language} category={category}")]
    AdapterNotFound { language: String, category: String },

    #[error("adapter '{0}' is not registered")]
    UnknownAdapter(String),

    #[error("adapter '{0}' is already registered")]
    AdapterAlreadyRegistered(String),

    #[error("{adapter} is not available: {reason}")]
    AdapterUnavailable { adapter: String, reason: String },

    #[error("{adapter} is not available and installation failed: {source}")]
    InstallFailed {
        adapter: String,
        #[source]
        source: Box<ValidateError>,
    },

    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed with exit code {code}: {stderr}")]
    ToolFailed {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("'{program}' was cancelled")]
    Cancelled { program: String },

    #[error("'{program}' timed out after {after:?}")]
    TimedOut { program: String, after: Duration },

    #[error("failed to parse {tool} output: {message}")]
    Parse { tool: String, message: String },

    #[error("policy error in {path}: {message}")]
    Policy { path: String, message: String },

    #[error("invalid file pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ValidateError {
    pub fn config(rule: &str, message: impl Into<String>) -> Self {
        ValidateError::Config {
            rule: rule.to_string(),
            message: message.into(),
        }
    }

    pub fn parse(tool: &str, message: impl Into<String>) -> Self {
        ValidateError::Parse {
            tool: tool.to_string(),
            message: message.into(),
        }
    }

    /// True for cancellation and deadline expiry, including when they
    /// happened while installing a missing tool.
    pub fn is_cancellation(&self) -> bool {
        match self {
            ValidateError::Cancelled { .. } | ValidateError::TimedOut { .. } => true,
            ValidateError::InstallFailed { source, .. } => source.is_cancellation(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ValidateError>;
