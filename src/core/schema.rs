//! core::schema
//!
//! Validation rule schema for the state tree.
//!
//! # Shape
//!
//! A schema document mirrors the state tree. Any object carrying a string
//! `"type"` member is a leaf rule for the path it sits at; every other object
//! is a namespace that is walked further.
//!
//! ```json
//! {
//!   "player": {
//!     "health":    { "type": "number", "min": 0, "max": "maxHealth" },
//!     "maxHealth": { "type": "number", "min": 1 },
//!     "name":      { "type": "string", "minLength": 1, "pattern": "^[A-Z]+$" }
//!   },
//!   "settings": {
//!     "difficulty": { "type": "string", "enum": ["easy", "normal", "hard"] }
//!   }
//! }
//! ```
//!
//! Patterns are compiled once when the schema is built. An invalid pattern or
//! bound is a [`SchemaError`], so a loaded schema never fails at validation
//! time.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::reference::Bound;

/// Errors from building a schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid bound '{0}': expected a number or a reference string")]
    InvalidBound(String),

    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("invalid rule at '{path}': {message}")]
    InvalidRule { path: String, message: String },

    #[error("failed to parse schema: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Value type a rule accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
    Null,
    Any,
}

impl RuleType {
    /// Whether `value` is of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            RuleType::String => value.is_string(),
            RuleType::Number => value.is_number(),
            RuleType::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            RuleType::Boolean => value.is_boolean(),
            RuleType::Array => value.is_array(),
            RuleType::Object => value.is_object(),
            RuleType::Null => value.is_null(),
            RuleType::Any => true,
        }
    }
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RuleType::String => "string",
            RuleType::Number => "number",
            RuleType::Integer => "integer",
            RuleType::Boolean => "boolean",
            RuleType::Array => "array",
            RuleType::Object => "object",
            RuleType::Null => "null",
            RuleType::Any => "any",
        };
        f.write_str(name)
    }
}

/// A leaf validation rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ValidationRule {
    /// Accepted type; `None` skips the type check.
    #[serde(rename = "type")]
    pub rule_type: Option<RuleType>,

    /// Allowed values, compared structurally.
    #[serde(rename = "enum")]
    pub allowed: Option<Vec<Value>>,

    /// Inclusive lower bound for numbers.
    pub min: Option<Bound>,

    /// Inclusive upper bound for numbers.
    pub max: Option<Bound>,

    pub min_length: Option<usize>,
    pub max_length: Option<usize>,

    /// Regular expression a string must match.
    pub pattern: Option<String>,

    pub min_items: Option<usize>,
    pub max_items: Option<usize>,

    /// Reject arrays containing structurally equal items.
    pub unique_items: bool,

    /// Keys an object must contain.
    pub required: Vec<String>,

    /// Rules for object members, validated recursively.
    pub properties: BTreeMap<String, ValidationRule>,

    /// Accept `null` regardless of the other checks.
    pub nullable: bool,
}

impl ValidationRule {
    /// A rule that only checks the type.
    pub fn of_type(rule_type: RuleType) -> Self {
        Self {
            rule_type: Some(rule_type),
            ..Self::default()
        }
    }

    fn patterns(&self) -> Vec<&str> {
        let mut found: Vec<&str> = self.pattern.iter().map(String::as_str).collect();
        for child in self.properties.values() {
            found.extend(child.patterns());
        }
        found
    }
}

/// Path-indexed collection of validation rules.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    rules: BTreeMap<String, ValidationRule>,
    patterns: HashMap<String, Regex>,
}

impl Schema {
    /// A schema with no rules. Every value is valid.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a schema from a nested schema document.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` if a node is not an object, a rule has unknown
    /// fields, or a pattern fails to compile.
    pub fn from_value(document: &Value) -> Result<Self, SchemaError> {
        let mut schema = Self::empty();
        schema.collect(document, "")?;
        Ok(schema)
    }

    /// Parse a JSON schema document.
    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        let document: Value = serde_json::from_str(text)?;
        Self::from_value(&document)
    }

    fn collect(&mut self, node: &Value, path: &str) -> Result<(), SchemaError> {
        let Value::Object(members) = node else {
            return Err(SchemaError::InvalidRule {
                path: path.to_string(),
                message: "schema nodes must be objects".to_string(),
            });
        };

        if members.get("type").is_some_and(Value::is_string) {
            let rule: ValidationRule =
                serde_json::from_value(node.clone()).map_err(|e| SchemaError::InvalidRule {
                    path: path.to_string(),
                    message: e.to_string(),
                })?;
            return self.insert(path, rule);
        }

        for (key, child) in members {
            let child_path = if path.is_empty() {
                key.clone()
            } else {
                format!("{path}.{key}")
            };
            self.collect(child, &child_path)?;
        }
        Ok(())
    }

    /// Register `rule` for `path`, replacing any previous rule.
    pub fn insert(&mut self, path: &str, rule: ValidationRule) -> Result<(), SchemaError> {
        for pattern in rule.patterns() {
            if self.patterns.contains_key(pattern) {
                continue;
            }
            let compiled = Regex::new(pattern).map_err(|e| SchemaError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;
            self.patterns.insert(pattern.to_string(), compiled);
        }
        self.rules.insert(path.to_string(), rule);
        Ok(())
    }

    /// Builder form of [`Schema::insert`].
    pub fn with_rule(mut self, path: &str, rule: ValidationRule) -> Result<Self, SchemaError> {
        self.insert(path, rule)?;
        Ok(self)
    }

    /// The rule registered for exactly `path`.
    pub fn rule_for(&self, path: &str) -> Option<&ValidationRule> {
        self.rules.get(path)
    }

    /// All ruled paths, in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub(crate) fn regex(&self, pattern: &str) -> Option<&Regex> {
        self.patterns.get(pattern)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_document_is_flattened() {
        let schema = Schema::from_value(&json!({
            "player": {
                "health": {"type": "number", "min": 0, "max": "maxHealth"},
                "name": {"type": "string"}
            },
            "settings": {"difficulty": {"type": "string", "enum": ["easy", "hard"]}}
        }))
        .unwrap();

        let paths: Vec<_> = schema.paths().collect();
        assert_eq!(paths, vec!["player.health", "player.name", "settings.difficulty"]);

        let health = schema.rule_for("player.health").unwrap();
        assert_eq!(health.rule_type, Some(RuleType::Number));
        assert_eq!(health.min, Some(Bound::Literal(0.0)));
        assert_eq!(health.max, Some(Bound::Relative("maxHealth".into())));
    }

    #[test]
    fn key_named_type_with_object_value_is_namespace() {
        let schema = Schema::from_value(&json!({
            "enemy": {"type": {"kind": {"type": "string"}}}
        }))
        .unwrap();
        assert!(schema.rule_for("enemy.type.kind").is_some());
    }

    #[test]
    fn camel_case_fields() {
        let schema = Schema::from_value(&json!({
            "tags": {"type": "array", "minItems": 1, "maxItems": 3, "uniqueItems": true},
            "name": {"type": "string", "minLength": 2, "maxLength": 8, "nullable": true}
        }))
        .unwrap();
        let tags = schema.rule_for("tags").unwrap();
        assert_eq!(tags.min_items, Some(1));
        assert_eq!(tags.max_items, Some(3));
        assert!(tags.unique_items);
        let name = schema.rule_for("name").unwrap();
        assert_eq!(name.min_length, Some(2));
        assert!(name.nullable);
    }

    #[test]
    fn unknown_rule_fields_rejected() {
        let err = Schema::from_value(&json!({"x": {"type": "number", "minimum": 3}}));
        assert!(matches!(err, Err(SchemaError::InvalidRule { .. })));
    }

    #[test]
    fn invalid_pattern_rejected() {
        let err = Schema::from_value(&json!({"x": {"type": "string", "pattern": "(["}}));
        assert!(matches!(err, Err(SchemaError::InvalidPattern { .. })));
    }

    #[test]
    fn nested_property_patterns_are_compiled() {
        let schema = Schema::from_value(&json!({
            "profile": {
                "type": "object",
                "properties": {"tag": {"type": "string", "pattern": "^[a-z]+$"}}
            }
        }))
        .unwrap();
        assert!(schema.regex("^[a-z]+$").is_some());
    }

    #[test]
    fn non_object_node_rejected() {
        let err = Schema::from_value(&json!({"x": 3}));
        assert!(matches!(err, Err(SchemaError::InvalidRule { .. })));
    }

    #[test]
    fn integer_type_accepts_whole_floats() {
        assert!(RuleType::Integer.accepts(&json!(3)));
        assert!(RuleType::Integer.accepts(&json!(3.0)));
        assert!(!RuleType::Integer.accepts(&json!(3.5)));
    }
}
