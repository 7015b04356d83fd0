//! Policy document: a versioned list of rules, stored as JSON or YAML.
//!
//! Check payloads are parsed into typed specs while the document loads. A
//! rule with a malformed payload still loads; its error is reported when
//! that rule is evaluated.

use crate::error::{Result, ValidateError};
use crate::models::rule::Rule;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl Policy {
    /// Load from disk; `.yaml`/`.yml` decode as YAML, anything else as JSON.
    pub fn load(path: &Path) -> Result<Policy> {
        let text = fs::read_to_string(path).map_err(|e| ValidateError::Policy {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let parsed = if is_yaml {
            Policy::from_yaml(&text)
        } else {
            Policy::from_json(&text)
        };
        parsed.map_err(|message| ValidateError::Policy {
            path: path.display().to_string(),
            message,
        })
    }

    pub fn from_json(text: &str) -> std::result::Result<Policy, String> {
        serde_json::from_str(text).map_err(|e| e.to_string())
    }

    pub fn from_yaml(text: &str) -> std::result::Result<Policy, String> {
        serde_yaml::from_str(text).map_err(|e| e.to_string())
    }

    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }
}
