//! core::reference
//!
//! Symbolic references from schema bounds into the live state tree.
//!
//! # Forms
//!
//! A numeric bound in a validation rule is one of:
//! - a literal number (`100`)
//! - an absolute reference (`"$player.maxHealth"`), looked up from the root
//! - a sibling reference (`"maxHealth"`), looked up next to the validated path
//!
//! Sibling references resolve against the parent of the *validated path in the
//! current state*, not against the schema. Validating `"player.health"` with
//! `max: "maxHealth"` reads `state.player.maxHealth`.
//!
//! Resolution never fails loudly. An unresolvable reference is passed through
//! unchanged by [`resolve_reference`] and yields `None` from
//! [`Bound::resolve`], which callers treat as "no bound".

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::path::{get_value_by_path, parent_path};
use super::schema::SchemaError;

/// Prefix marking an absolute reference.
pub const ABSOLUTE_PREFIX: char = '$';

/// A numeric bound that may point into the state tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub enum Bound {
    /// A fixed number.
    Literal(f64),
    /// A path from the state root.
    Absolute(String),
    /// A key resolved next to the validated path.
    Relative(String),
}

impl Bound {
    /// Classify a raw bound string.
    pub fn parse(raw: &str) -> Self {
        match raw.strip_prefix(ABSOLUTE_PREFIX) {
            Some(path) => Bound::Absolute(path.to_string()),
            None => Bound::Relative(raw.to_string()),
        }
    }

    /// Resolve to a number for validation of `path` against `state`.
    ///
    /// Returns `None` when the reference is missing or not numeric.
    pub fn resolve(&self, path: &str, state: &Value) -> Option<f64> {
        match self {
            Bound::Literal(n) => Some(*n),
            Bound::Absolute(target) => get_value_by_path(state, target)?.as_f64(),
            Bound::Relative(name) => lookup_sibling(name, path, state)?.as_f64(),
        }
    }
}

impl TryFrom<Value> for Bound {
    type Error = SchemaError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Number(n) => n
                .as_f64()
                .map(Bound::Literal)
                .ok_or_else(|| SchemaError::InvalidBound(n.to_string())),
            Value::String(s) if !s.is_empty() => Ok(Bound::parse(&s)),
            other => Err(SchemaError::InvalidBound(other.to_string())),
        }
    }
}

impl From<Bound> for Value {
    fn from(bound: Bound) -> Self {
        match bound {
            Bound::Literal(n) => serde_json::Number::from_f64(n)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Bound::Absolute(path) => Value::String(format!("{ABSOLUTE_PREFIX}{path}")),
            Bound::Relative(name) => Value::String(name),
        }
    }
}

fn lookup_sibling<'a>(name: &str, path: &str, state: &'a Value) -> Option<&'a Value> {
    match parent_path(path) {
        Some(parent) => get_value_by_path(state, &format!("{parent}.{name}")),
        None => get_value_by_path(state, name),
    }
}

/// Resolve `value` as a reference relative to `path` in `state`.
///
/// Non-string values pass through unchanged. `$`-prefixed strings resolve from
/// the root; other strings resolve as a sibling of `path`. If nothing is found
/// the original string is returned.
pub fn resolve_reference(value: &Value, path: &str, state: &Value) -> Value {
    let Value::String(raw) = value else {
        return value.clone();
    };

    let found = match Bound::parse(raw) {
        Bound::Absolute(target) => get_value_by_path(state, &target),
        Bound::Relative(name) => lookup_sibling(&name, path, state),
        Bound::Literal(_) => None,
    };
    found.cloned().unwrap_or_else(|| value.clone())
}
