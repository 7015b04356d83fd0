//! Rule schema as loaded from a policy document.
//!
//! Key components:
//! - `Selector` (`when`): language/include/exclude file filters plus
//!   branch/role/tag scoping.
//! - `CheckPayload`: the open, engine-specific `check` map, with tolerant
//!   typed accessors.
//! - `CheckSpec`: the payload parsed once at load into a typed variant
//!   selected by the `engine` key. A payload that fails to parse keeps its
//!   error, which is reported when (and only when) the rule is evaluated.

use crate::error::{Result, ValidateError};
use crate::models::Severity;
use crate::query::AstQuery;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as Json};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// Declarative file-membership filter. Lists are ANDed across fields and
/// ORed within a field; exclude rejects on any match.
pub struct Selector {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
/// Auto-fix configuration for a rule.
pub struct Remedy {
    #[serde(default)]
    pub autofix: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Json>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
/// Engine-specific `check` payload.
///
/// Accessors never fail: a missing key or a type mismatch yields the zero
/// value (`""`, `0`, `false`, empty list).
pub struct CheckPayload(pub Map<String, Json>);

impl CheckPayload {
    pub fn get(&self, key: &str) -> Option<&Json> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get_string(&self, key: &str) -> String {
        match self.0.get(key) {
            Some(Json::String(s)) => s.clone(),
            _ => String::new(),
        }
    }

    /// Integer value; decoded floats are truncated toward zero, not rounded.
    pub fn get_int(&self, key: &str) -> i64 {
        match self.0.get(key) {
            Some(Json::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                .unwrap_or(0),
            _ => 0,
        }
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get_opt_bool(key).unwrap_or(false)
    }

    /// Like `get_bool` but distinguishes "absent" from "false".
    pub fn get_opt_bool(&self, key: &str) -> Option<bool> {
        match self.0.get(key) {
            Some(Json::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    /// String entries of an array value; non-string items are skipped.
    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        match self.0.get(key) {
            Some(Json::Array(items)) => items
                .iter()
                .filter_map(|it| it.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn engine(&self) -> String {
        self.get_string("engine")
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Pattern rule: naming, forbidden content, restricted imports.
pub struct PatternCheck {
    /// `identifier|content|import` for JS tools; a checkstyle module name
    /// (e.g. `TypeName`) for Java.
    pub target: String,
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq)]
/// Length ceiling for lines, files, functions or parameter lists.
pub struct LengthCheck {
    pub scope: String,
    pub max: i64,
    pub min: i64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleCheck {
    pub indent: i64,
    pub quote: Option<String>,
    pub semi: Option<bool>,
    pub trailing_comma: Option<String>,
    pub print_width: i64,
    pub brace_style: Option<String>,
    pub space_after_keyword: bool,
    pub space_around_operators: bool,
    pub blank_lines_between_methods: bool,
    pub one_statement_per_line: bool,
    /// Adapter name pinned by the rule, bypassing lookup by language.
    pub tool: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Compiler switches for type-correctness rules.
pub struct TypeCheckOptions {
    pub strict: Option<bool>,
    pub no_implicit_any: Option<bool>,
    pub strict_null_checks: Option<bool>,
    pub allow_js: Option<bool>,
    pub check_js: Option<bool>,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
/// Typed view of a check payload, keyed by its `engine` discriminator.
pub enum CheckSpec {
    Pattern(PatternCheck),
    Length(LengthCheck),
    Style(StyleCheck),
    Ast(AstQuery),
    TypeCheck(TypeCheckOptions),
    /// An engine name outside the built-in set; the payload is left to
    /// whichever engine is registered under that name.
    Custom(String),
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

impl CheckSpec {
    pub fn parse(payload: &CheckPayload) -> std::result::Result<CheckSpec, String> {
        let engine = payload.engine();
        match engine.as_str() {
            "" => Err("check payload has no 'engine'".to_string()),
            "pattern" => {
                let pattern = payload.get_string("pattern");
                if pattern.is_empty() {
                    return Err("pattern is required for pattern engine".to_string());
                }
                Ok(CheckSpec::Pattern(PatternCheck {
                    target: payload.get_string("target"),
                    pattern,
                }))
            }
            "length" => {
                let max = payload.get_int("max");
                let min = payload.get_int("min");
                if max == 0 && min == 0 {
                    return Err("max or min is required for length engine".to_string());
                }
                Ok(CheckSpec::Length(LengthCheck {
                    scope: payload.get_string("scope"),
                    max,
                    min,
                }))
            }
            "style" => Ok(CheckSpec::Style(StyleCheck {
                indent: payload.get_int("indent"),
                quote: non_empty(payload.get_string("quote")),
                semi: payload.get_opt_bool("semi"),
                trailing_comma: non_empty(payload.get_string("trailingComma")),
                print_width: payload.get_int("printWidth"),
                brace_style: non_empty(payload.get_string("braceStyle")),
                space_after_keyword: payload.get_bool("spaceAfterKeyword"),
                space_around_operators: payload.get_bool("spaceAroundOperators"),
                blank_lines_between_methods: payload.get_bool("blankLinesBetweenMethods"),
                one_statement_per_line: payload.get_bool("oneStatementPerLine"),
                tool: non_empty(payload.get_string("tool")),
            })),
            "ast" => AstQuery::parse(payload).map(CheckSpec::Ast),
            "typechecker" => Ok(CheckSpec::TypeCheck(TypeCheckOptions {
                strict: payload.get_opt_bool("strict"),
                no_implicit_any: payload.get_opt_bool("noImplicitAny"),
                strict_null_checks: payload.get_opt_bool("strictNullChecks"),
                allow_js: payload.get_opt_bool("allowJs"),
                check_js: payload.get_opt_bool("checkJs"),
                include: payload.get_string_list("include"),
                exclude: payload.get_string_list("exclude"),
            })),
            other => Ok(CheckSpec::Custom(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
/// A check payload together with its typed parse, computed once.
pub struct Check {
    payload: CheckPayload,
    spec: std::result::Result<CheckSpec, String>,
}

impl Check {
    pub fn from_payload(payload: CheckPayload) -> Self {
        let spec = CheckSpec::parse(&payload);
        Check { payload, spec }
    }

    pub fn payload(&self) -> &CheckPayload {
        &self.payload
    }

    pub fn engine(&self) -> String {
        self.payload.engine()
    }

    /// Typed spec, or the load-time parse failure as a configuration error
    /// attributed to `rule_id`.
    pub fn spec(&self, rule_id: &str) -> Result<&CheckSpec> {
        self.spec
            .as_ref()
            .map_err(|msg| ValidateError::config(rule_id, msg.clone()))
    }
}

impl Default for Check {
    fn default() -> Self {
        Check::from_payload(CheckPayload::default())
    }
}

impl PartialEq for Check {
    fn eq(&self, other: &Self) -> bool {
        self.payload == other.payload
    }
}

impl Serialize for Check {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.payload.serialize(s)
    }
}

impl<'de> Deserialize<'de> for Check {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        CheckPayload::deserialize(d).map(Check::from_payload)
    }
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A validation rule. Immutable once loaded.
pub struct Rule {
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Selector>,
    #[serde(default)]
    pub check: Check,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remedy: Option<Remedy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Rule {
    pub fn selector(&self) -> Option<&Selector> {
        self.when.as_ref()
    }

    pub fn spec(&self) -> Result<&CheckSpec> {
        self.check.spec(&self.id)
    }

    /// Custom message, when the policy sets a non-empty one.
    pub fn custom_message(&self) -> Option<&str> {
        self.message.as_deref().filter(|m| !m.is_empty())
    }

    pub fn get_string(&self, key: &str) -> String {
        self.check.payload().get_string(key)
    }

    pub fn get_int(&self, key: &str) -> i64 {
        self.check.payload().get_int(key)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.check.payload().get_bool(key)
    }

    pub fn get_string_list(&self, key: &str) -> Vec<String> {
        self.check.payload().get_string_list(key)
    }
}
