//! core::path
//!
//! Dot-path addressing over the state tree.
//!
//! # Overview
//!
//! A path such as `"player.position.x"` names a node in a nested
//! [`serde_json::Value`]. Object members are addressed by key and array
//! elements by decimal index (`"enemies.0.hp"`).
//!
//! All functions here are pure. [`set_value_by_path`] returns a new tree and
//! never mutates its input.
//!
//! Writing past the end of an array pads it with `null`, up to
//! [`MAX_INDEX_GAP`] slots. An index further out is a [`PathError`].
//!
//! # Paths
//!
//! - The empty path addresses the root.
//! - Empty segments (`"a..b"`) are legal for get/set and address the key `""`.
//!   They are rejected by [`is_subscribable`], which the subscription
//!   registry uses to refuse malformed paths.
//!
//! # Example
//!
//! ```
//! use arcade_state::core::path::{get_value_by_path, set_value_by_path};
//! use serde_json::json;
//!
//! let state = json!({"player": {"health": 100}});
//! let next = set_value_by_path(&state, "player.position.x", json!(12), false).unwrap();
//!
//! assert_eq!(get_value_by_path(&next, "player.position.x"), Some(&json!(12)));
//! assert_eq!(get_value_by_path(&state, "player.position"), None);
//! ```

use serde_json::{Map, Value};
use thiserror::Error;

/// Separator between path segments.
pub const SEPARATOR: char = '.';

/// Most `null` slots a single array write may pad.
pub const MAX_INDEX_GAP: usize = 1024;

/// Errors from writing at a path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("index {index} in '{path}' is too far past the end of an array of length {len}")]
    IndexOutOfRange {
        path: String,
        index: usize,
        len: usize,
    },
}

/// Split a path into its segments. The empty path has no segments.
pub fn split_path(path: &str) -> Vec<&str> {
    if path.is_empty() {
        Vec::new()
    } else {
        path.split(SEPARATOR).collect()
    }
}

/// Join segments into a path.
pub fn join_path<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(".")
}

/// The parent of `path`, or `None` for a top-level key or the root.
pub fn parent_path(path: &str) -> Option<&str> {
    path.rsplit_once(SEPARATOR).map(|(parent, _)| parent)
}

/// Strict ancestors of `path`, nearest first.
///
/// `"a.b.c"` yields `"a.b"` then `"a"`.
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(parent_path(path), |p| parent_path(*p))
}

/// Whether `path` may be used as a subscription key.
///
/// Subscriptions require at least one segment and no empty segments.
pub fn is_subscribable(path: &str) -> bool {
    !path.is_empty() && path.split(SEPARATOR).all(|segment| !segment.is_empty())
}

/// Look up the value at `path`.
///
/// Returns `None` if any segment is missing. `null` is terminal: it is
/// returned when addressed directly, and traversal through it yields `None`.
pub fn get_value_by_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    split_path(path)
        .into_iter()
        .try_fold(root, |node, segment| child(node, segment))
}

fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Return a copy of `root` with `value` stored at `path`.
///
/// Missing intermediate nodes are created as objects, and non-container
/// intermediates are replaced. With `merge`, an object `value` is shallow-merged
/// into an existing object at the target instead of replacing it.
///
/// # Errors
///
/// Returns `PathError::IndexOutOfRange` if an array index lies more than
/// [`MAX_INDEX_GAP`] slots past the end of the array. `root` is untouched.
pub fn set_value_by_path(
    root: &Value,
    path: &str,
    value: Value,
    merge: bool,
) -> Result<Value, PathError> {
    let mut next = root.clone();
    let slot = split_path(path)
        .into_iter()
        .try_fold(&mut next, |node, segment| child_mut(node, segment, path))?;

    *slot = if merge {
        merge_value(Some(&*slot), value)
    } else {
        value
    };
    Ok(next)
}

/// Shallow-merge `incoming` into `existing` when both are objects.
///
/// Any other combination yields `incoming` unchanged.
pub fn merge_value(existing: Option<&Value>, incoming: Value) -> Value {
    match (existing, incoming) {
        (Some(Value::Object(base)), Value::Object(patch)) => {
            let mut merged = base.clone();
            merged.extend(patch);
            Value::Object(merged)
        }
        (_, incoming) => incoming,
    }
}

fn child_mut<'a>(
    node: &'a mut Value,
    segment: &str,
    path: &str,
) -> Result<&'a mut Value, PathError> {
    let index = if node.is_array() {
        segment.parse::<usize>().ok()
    } else {
        None
    };
    if index.is_none() && !node.is_object() {
        *node = Value::Object(Map::new());
    }

    match (node, index) {
        (Value::Array(items), Some(i)) => {
            if i.saturating_sub(items.len()) > MAX_INDEX_GAP {
                return Err(PathError::IndexOutOfRange {
                    path: path.to_string(),
                    index: i,
                    len: items.len(),
                });
            }
            if i >= items.len() {
                items.resize(i + 1, Value::Null);
            }
            Ok(&mut items[i])
        }
        (Value::Object(map), _) => Ok(map.entry(segment.to_string()).or_insert(Value::Null)),
        _ => unreachable!("non-container nodes are replaced with objects above"),
    }
}

/// Structural equality.
///
/// Numbers compare by value across integer and float representations.
/// Arrays and objects never equal each other, even when their keys line up.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => x.as_f64() == y.as_f64(),
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| deep_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| deep_equal(x, y)))
        }
        (x, y) => x == y,
    }
}

/// [`deep_equal`] lifted over optional values; two missing values are equal.
pub fn option_deep_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => deep_equal(a, b),
        (None, None) => true,
        _ => false,
    }
}

/// A canonical string for `value` with object keys sorted.
///
/// Two values that are [`deep_equal`] produce the same key, which makes it
/// usable for duplicate detection.
pub fn structural_key(value: &Value) -> String {
    let mut out = String::new();
    write_key(value, &mut out);
    out
}

fn write_key(value: &Value, out: &mut String) {
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => out.push_str(&i.to_string()),
            None => out.push_str(&n.as_f64().map_or_else(|| n.to_string(), format_float)),
        },
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_key(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_key(&map[key], out);
            }
            out.push('}');
        }
        other => out.push_str(&other.to_string()),
    }
}

fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}
