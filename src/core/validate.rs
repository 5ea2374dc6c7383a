//! core::validate
//!
//! Stateless validation of candidate writes against a [`Schema`].
//!
//! # Order of checks
//!
//! For a ruled path, checks run in this order and the first failure wins:
//!
//! 1. type (`nullable` accepts `null`, `any` accepts everything)
//! 2. enum membership
//! 3. numeric range, with bounds resolved against the current state
//! 4. string length and pattern
//! 5. array length and uniqueness
//! 6. required object keys, then per-property rules (messages are prefixed
//!    with the property path)
//!
//! Validation reports failures as messages and never panics or errors. The
//! store turns a message into a rejected write.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::path::{deep_equal, get_value_by_path, structural_key};
use super::schema::{Schema, ValidationRule};

/// A failed check for one path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub error: String,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.error)
    }
}

/// Validate `value` as a write to `path`.
///
/// Returns the first failing message, or `None` if the value is acceptable
/// or no rule exists for `path`.
///
/// # Example
///
/// ```
/// use arcade_state::core::schema::Schema;
/// use arcade_state::core::validate::validate_value;
/// use serde_json::json;
///
/// let schema = Schema::from_value(&json!({
///     "player": {"health": {"type": "number", "min": 0, "max": "maxHealth"}}
/// })).unwrap();
/// let state = json!({"player": {"health": 100, "maxHealth": 100}});
///
/// assert_eq!(validate_value(&schema, "player.health", &json!(50), &state), None);
/// let err = validate_value(&schema, "player.health", &json!(150), &state).unwrap();
/// assert!(err.contains("<= 100"));
/// ```
pub fn validate_value(schema: &Schema, path: &str, value: &Value, state: &Value) -> Option<String> {
    let rule = schema.rule_for(path)?;
    check_rule(schema, rule, path, value, state)
}

/// Validate several candidate writes against the same state.
///
/// Every entry is checked; failures are collected in input order.
pub fn validate_batch<'a, I>(schema: &Schema, writes: I, state: &Value) -> Vec<ValidationIssue>
where
    I: IntoIterator<Item = (&'a str, &'a Value)>,
{
    writes
        .into_iter()
        .filter_map(|(path, value)| {
            validate_value(schema, path, value, state).map(|error| ValidationIssue {
                path: path.to_string(),
                error,
            })
        })
        .collect()
}

/// Validate every ruled path that is present in `state`.
pub fn validate_state(schema: &Schema, state: &Value) -> Vec<ValidationIssue> {
    let present = schema
        .paths()
        .filter_map(|path| get_value_by_path(state, path).map(|value| (path, value)));
    validate_batch(schema, present, state)
}

fn check_rule(
    schema: &Schema,
    rule: &ValidationRule,
    path: &str,
    value: &Value,
    state: &Value,
) -> Option<String> {
    if value.is_null() && rule.nullable {
        return None;
    }

    if let Some(expected) = rule.rule_type {
        if !expected.accepts(value) {
            return Some(format!(
                "Expected type {}, got {}",
                expected,
                type_name(value)
            ));
        }
    }

    if let Some(allowed) = &rule.allowed {
        if !allowed.iter().any(|candidate| deep_equal(candidate, value)) {
            let listed: Vec<String> = allowed.iter().map(display_value).collect();
            return Some(format!("Value must be one of: {}", listed.join(", ")));
        }
    }

    match value {
        Value::Number(n) => check_range(rule, path, n.as_f64()?, state),
        Value::String(s) => check_string(schema, rule, s),
        Value::Array(items) => check_array(rule, items),
        Value::Object(_) => check_object(schema, rule, path, value, state),
        _ => None,
    }
}

fn check_range(rule: &ValidationRule, path: &str, n: f64, state: &Value) -> Option<String> {
    if let Some(min) = rule.min.as_ref().and_then(|b| b.resolve(path, state)) {
        if n < min {
            return Some(format!("Value must be >= {}", format_number(min)));
        }
    }
    if let Some(max) = rule.max.as_ref().and_then(|b| b.resolve(path, state)) {
        if n > max {
            return Some(format!("Value must be <= {}", format_number(max)));
        }
    }
    None
}

fn check_string(schema: &Schema, rule: &ValidationRule, s: &str) -> Option<String> {
    let length = s.chars().count();
    if let Some(min) = rule.min_length {
        if length < min {
            return Some(format!("String length must be >= {min}"));
        }
    }
    if let Some(max) = rule.max_length {
        if length > max {
            return Some(format!("String length must be <= {max}"));
        }
    }
    if let Some(pattern) = &rule.pattern {
        // Patterns are compiled when the schema is built; a rule inserted
        // without its pattern is treated as unconstrained.
        if schema.regex(pattern).is_some_and(|re| !re.is_match(s)) {
            return Some(format!("String does not match pattern: {pattern}"));
        }
    }
    None
}

fn check_array(rule: &ValidationRule, items: &[Value]) -> Option<String> {
    if let Some(min) = rule.min_items {
        if items.len() < min {
            return Some(format!("Array must contain at least {min} items"));
        }
    }
    if let Some(max) = rule.max_items {
        if items.len() > max {
            return Some(format!("Array must contain at most {max} items"));
        }
    }
    if rule.unique_items {
        let mut seen = HashSet::with_capacity(items.len());
        if !items.iter().all(|item| seen.insert(structural_key(item))) {
            return Some("Array items must be unique".to_string());
        }
    }
    None
}

fn check_object(
    schema: &Schema,
    rule: &ValidationRule,
    path: &str,
    value: &Value,
    state: &Value,
) -> Option<String> {
    let members = value.as_object()?;

    if let Some(missing) = rule.required.iter().find(|key| !members.contains_key(*key)) {
        return Some(format!("Missing required property: {missing}"));
    }

    rule.properties.iter().find_map(|(key, child_rule)| {
        let child = members.get(key)?;
        let child_path = format!("{path}.{key}");
        check_rule(schema, child_rule, &child_path, child, state)
            .map(|message| format!("{child_path}: {message}"))
    })
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::RuleType;
    use serde_json::json;

    fn schema(document: Value) -> Schema {
        Schema::from_value(&document).unwrap()
    }

    mod types {
        use super::*;

        #[test]
        fn no_rule_is_valid() {
            let s = Schema::empty();
            assert_eq!(validate_value(&s, "anything", &json!({"x": 1}), &json!({})), None);
        }

        #[test]
        fn type_mismatch() {
            let s = schema(json!({"score": {"type": "number"}}));
            let err = validate_value(&s, "score", &json!("ten"), &json!({})).unwrap();
            assert_eq!(err, "Expected type number, got string");
        }

        #[test]
        fn nullable_accepts_null() {
            let s = schema(json!({"target": {"type": "string", "nullable": true}}));
            assert_eq!(validate_value(&s, "target", &Value::Null, &json!({})), None);
            let strict = schema(json!({"target": {"type": "string"}}));
            assert!(validate_value(&strict, "target", &Value::Null, &json!({})).is_some());
        }

        #[test]
        fn any_accepts_everything() {
            let s = schema(json!({"blob": {"type": "any"}}));
            for v in [json!(1), json!("s"), json!([1]), json!({"k": 1}), json!(null)] {
                assert_eq!(validate_value(&s, "blob", &v, &json!({})), None);
            }
        }
    }

    mod enums {
        use super::*;

        #[test]
        fn membership() {
            let s = schema(json!({"settings": {"difficulty": {
                "type": "string", "enum": ["easy", "normal", "hard"]
            }}}));
            let state = json!({});
            assert_eq!(
                validate_value(&s, "settings.difficulty", &json!("normal"), &state),
                None
            );
            let err = validate_value(&s, "settings.difficulty", &json!("extreme"), &state).unwrap();
            assert!(err.contains("Value must be one of:"));
            assert_eq!(err, "Value must be one of: easy, normal, hard");
        }

        #[test]
        fn structural_membership() {
            let s = schema(json!({"spawn": {"type": "object", "enum": [{"x": 1, "y": 2}]}}));
            assert_eq!(
                validate_value(&s, "spawn", &json!({"y": 2, "x": 1.0}), &json!({})),
                None
            );
        }
    }

    mod ranges {
        use super::*;

        #[test]
        fn sibling_reference_max() {
            let s = schema(json!({"player": {"health": {
                "type": "number", "min": 0, "max": "maxHealth"
            }}}));
            let state = json!({"player": {"health": 100, "maxHealth": 100}});
            let err = validate_value(&s, "player.health", &json!(150), &state).unwrap();
            assert!(err.contains("<= 100"), "{err}");
            assert_eq!(validate_value(&s, "player.health", &json!(100), &state), None);
        }

        #[test]
        fn absolute_reference_min() {
            let s = schema(json!({"wave": {"type": "integer", "min": "$level.firstWave"}}));
            let state = json!({"level": {"firstWave": 3}});
            let err = validate_value(&s, "wave", &json!(2), &state).unwrap();
            assert_eq!(err, "Value must be >= 3");
        }

        #[test]
        fn unresolved_bound_is_skipped() {
            let s = schema(json!({"player": {"health": {"type": "number", "max": "maxHealth"}}}));
            assert_eq!(
                validate_value(&s, "player.health", &json!(1e9), &json!({"player": {}})),
                None
            );
        }

        #[test]
        fn fractional_bounds_are_printed_exactly() {
            let s = schema(json!({"speed": {"type": "number", "max": 1.5}}));
            let err = validate_value(&s, "speed", &json!(2), &json!({})).unwrap();
            assert_eq!(err, "Value must be <= 1.5");
        }
    }

    mod strings {
        use super::*;

        #[test]
        fn length_limits_count_chars() {
            let s = schema(json!({"name": {"type": "string", "minLength": 2, "maxLength": 3}}));
            assert!(validate_value(&s, "name", &json!("a"), &json!({})).is_some());
            assert_eq!(validate_value(&s, "name", &json!("äöü"), &json!({})), None);
            assert!(validate_value(&s, "name", &json!("abcd"), &json!({})).is_some());
        }

        #[test]
        fn pattern() {
            let s = schema(json!({"initials": {"type": "string", "pattern": "^[A-Z]{3}$"}}));
            assert_eq!(validate_value(&s, "initials", &json!("ACE"), &json!({})), None);
            let err = validate_value(&s, "initials", &json!("ace"), &json!({})).unwrap();
            assert!(err.starts_with("String does not match pattern"));
        }
    }

    mod arrays {
        use super::*;

        #[test]
        fn item_counts() {
            let s = schema(json!({"loadout": {"type": "array", "minItems": 1, "maxItems": 2}}));
            assert!(validate_value(&s, "loadout", &json!([]), &json!({})).is_some());
            assert_eq!(validate_value(&s, "loadout", &json!(["laser"]), &json!({})), None);
            assert!(validate_value(&s, "loadout", &json!([1, 2, 3]), &json!({})).is_some());
        }

        #[test]
        fn uniqueness_is_structural() {
            let s = schema(json!({"path": {"type": "array", "uniqueItems": true}}));
            let err = validate_value(
                &s,
                "path",
                &json!([{"x": 1, "y": 2}, {"y": 2, "x": 1}]),
                &json!({}),
            )
            .unwrap();
            assert_eq!(err, "Array items must be unique");
            assert_eq!(
                validate_value(&s, "path", &json!([{"x": 1}, {"x": 2}]), &json!({})),
                None
            );
        }
    }

    mod objects {
        use super::*;

        #[test]
        fn required_keys() {
            let s = schema(json!({"player": {"type": "object", "required": ["name", "lives"]}}));
            let err = validate_value(&s, "player", &json!({"name": "ace"}), &json!({})).unwrap();
            assert_eq!(err, "Missing required property: lives");
        }

        #[test]
        fn nested_properties_are_path_prefixed() {
            let s = schema(json!({"player": {
                "type": "object",
                "properties": {
                    "lives": {"type": "integer", "min": 0},
                    "maxLives": {"type": "integer"}
                }
            }}));
            let err = validate_value(&s, "player", &json!({"lives": -1}), &json!({})).unwrap();
            assert_eq!(err, "player.lives: Value must be >= 0");
        }

        #[test]
        fn nested_relative_bounds_resolve_in_state() {
            let mut s = Schema::empty();
            let mut rule = ValidationRule::of_type(RuleType::Object);
            let mut shield = ValidationRule::of_type(RuleType::Number);
            shield.max = Some(crate::core::reference::Bound::Relative("shieldCap".into()));
            rule.properties.insert("shield".into(), shield);
            s.insert("ship", rule).unwrap();

            let state = json!({"ship": {"shieldCap": 10}});
            let err = validate_value(&s, "ship", &json!({"shield": 11}), &state).unwrap();
            assert_eq!(err, "ship.shield: Value must be <= 10");
        }
    }

    mod batch {
        use super::*;

        #[test]
        fn collects_without_short_circuit() {
            let s = schema(json!({
                "a": {"type": "number"},
                "b": {"type": "string"},
                "c": {"type": "boolean"}
            }));
            let writes = [
                ("a".to_string(), json!("x")),
                ("b".to_string(), json!("fine")),
                ("c".to_string(), json!(1)),
            ];
            let issues = validate_batch(
                &s,
                writes.iter().map(|(p, v)| (p.as_str(), v)),
                &json!({}),
            );
            let paths: Vec<_> = issues.iter().map(|i| i.path.as_str()).collect();
            assert_eq!(paths, vec!["a", "c"]);
        }

        #[test]
        fn validate_state_only_checks_present_paths() {
            let s = schema(json!({
                "player": {"health": {"type": "number", "max": "maxHealth"}},
                "missing": {"type": "string"}
            }));
            let state = json!({"player": {"health": 120, "maxHealth": 100}});
            let issues = validate_state(&s, &state);
            assert_eq!(issues.len(), 1);
            assert_eq!(issues[0].to_string(), "player.health: Value must be <= 100");
        }
    }
}
