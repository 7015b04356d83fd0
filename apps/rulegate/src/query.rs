//! Structural AST queries and their compilation into ESTree selector strings.
//!
//! A query names a node type, optional attribute equalities (`where`) and
//! containment lists. The compiled selector is handed to the backend
//! verbatim; node-type names are not checked against any grammar.
//!
//! Containment names read inverted: `has` compiles to `:not(:has(X))` and
//! `notHas` compiles to `:has(X)`.

use crate::models::rule::CheckPayload;
use serde::Serialize;
use serde_json::{Map, Number, Value as Json};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AstQuery {
    pub node: String,
    #[serde(rename = "where", skip_serializing_if = "Map::is_empty")]
    pub where_: Map<String, Json>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub has: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_has: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl AstQuery {
    /// Extract a query from an `ast` check payload.
    ///
    /// `node` must be a non-empty string. Other keys are optional and
    /// unknown keys are ignored.
    pub fn parse(payload: &CheckPayload) -> Result<AstQuery, String> {
        let node = payload.get_string("node");
        if node.is_empty() {
            return Err("AST rule requires 'node' field".to_string());
        }
        let where_ = match payload.get("where") {
            Some(Json::Object(m)) => m.clone(),
            _ => Map::new(),
        };
        let language = Some(payload.get_string("language")).filter(|l| !l.is_empty());
        Ok(AstQuery {
            node,
            where_,
            has: payload.get_string_list("has"),
            not_has: payload.get_string_list("notHas"),
            language,
        })
    }

    pub fn new(node: &str) -> Self {
        AstQuery {
            node: node.to_string(),
            ..Default::default()
        }
    }

    /// Compile to a selector: node type, then attribute fragments in `where`
    /// order, then one `:not(:has(X))` per `has` entry, then one `:has(X)`
    /// per `notHas` entry.
    pub fn generate_selector(&self) -> String {
        let mut out = self.node.clone();
        for (key, value) in &self.where_ {
            if let Some(fragment) = attribute_fragment(key, value) {
                out.push_str(&fragment);
            }
        }
        for node in &self.has {
            out.push_str(&format!(":not(:has({}))", node));
        }
        for node in &self.not_has {
            out.push_str(&format!(":has({})", node));
        }
        out
    }
}

/// `None` for shapes a selector cannot express (arrays, null, operator maps
/// without `eq`); those entries impose no constraint.
fn attribute_fragment(key: &str, value: &Json) -> Option<String> {
    match value {
        Json::Bool(b) => Some(format!("[{}={}]", key, b)),
        Json::String(s) => Some(format!("[{}=\"{}\"]", key, s)),
        Json::Number(n) => Some(format!("[{}={}]", key, render_number(n))),
        Json::Object(ops) => ops.get("eq").and_then(|eq| attribute_fragment(key, eq)),
        Json::Array(_) | Json::Null => None,
    }
}

/// Integral values print without a fractional part (`100.0` -> `100`).
fn render_number(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{}", f as i128),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(v: Json) -> CheckPayload {
        match v {
            Json::Object(m) => CheckPayload(m),
            _ => panic!("payload must be an object"),
        }
    }

    fn query(v: Json) -> AstQuery {
        AstQuery::parse(&payload(v)).unwrap()
    }

    #[test]
    fn test_bare_node() {
        assert_eq!(
            AstQuery::new("FunctionDeclaration").generate_selector(),
            "FunctionDeclaration"
        );
    }

    #[test]
    fn test_where_bool() {
        let q = query(json!({"node": "FunctionDeclaration", "where": {"async": true}}));
        assert_eq!(q.generate_selector(), "FunctionDeclaration[async=true]");
    }

    #[test]
    fn test_has_compiles_to_negated_containment() {
        let q = query(json!({
            "node": "FunctionDeclaration",
            "where": {"async": true},
            "has": ["TryStatement"]
        }));
        assert_eq!(
            q.generate_selector(),
            "FunctionDeclaration[async=true]:not(:has(TryStatement))"
        );
    }

    #[test]
    fn test_not_has_compiles_to_containment() {
        let q = query(json!({"node": "FunctionDeclaration", "notHas": ["ReturnStatement"]}));
        assert_eq!(q.generate_selector(), "FunctionDeclaration:has(ReturnStatement)");
    }

    #[test]
    fn test_fragment_order() {
        let q = query(json!({
            "node": "CallExpression",
            "notHas": ["AwaitExpression"],
            "has": ["CatchClause", "TryStatement"],
            "where": {"callee.name": "eval", "arguments.length": 1, "optional": false}
        }));
        assert_eq!(
            q.generate_selector(),
            "CallExpression[callee.name=\"eval\"][arguments.length=1][optional=false]\
             :not(:has(CatchClause)):not(:has(TryStatement)):has(AwaitExpression)"
        );
    }

    #[test]
    fn test_where_value_shapes() {
        let q = query(json!({
            "node": "Literal",
            "where": {
                "value": {"eq": 42.0},
                "raw": {"eq": {"eq": "x"}},
                "ratio": 0.5,
                "kind": {"ne": "var"},
                "list": [1, 2],
                "nothing": null
            }
        }));
        assert_eq!(
            q.generate_selector(),
            "Literal[value=42][raw=\"x\"][ratio=0.5]"
        );
    }

    #[test]
    fn test_missing_or_empty_node_is_rejected() {
        assert!(AstQuery::parse(&payload(json!({"engine": "ast"}))).is_err());
        assert!(AstQuery::parse(&payload(json!({"engine": "ast", "node": ""}))).is_err());
        assert!(AstQuery::parse(&payload(json!({"engine": "ast", "node": 7}))).is_err());
    }

    #[test]
    fn test_unknown_keys_and_names_pass_through() {
        let q = query(json!({
            "engine": "ast",
            "node": "NotARealNode",
            "severity": "whatever",
            "has": ["AlsoMadeUp", 3],
            "language": "typescript"
        }));
        assert_eq!(q.has, vec!["AlsoMadeUp"]);
        assert_eq!(q.language.as_deref(), Some("typescript"));
        assert_eq!(q.generate_selector(), "NotARealNode:not(:has(AlsoMadeUp))");
    }
}
