//! Property-based tests for the state core.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated trees, paths, and operation sequences.

use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{json, Value};

use arcade_state::core::path::{
    deep_equal, get_value_by_path, set_value_by_path, split_path, structural_key, MAX_INDEX_GAP,
};
use arcade_state::core::schema::{RuleType, Schema, ValidationRule};
use arcade_state::core::reference::Bound;
use arcade_state::core::validate::validate_value;
use arcade_state::engine::{Callback, HistoryManager, SubscribeOptions, SubscriptionRegistry};

/// Strategy for leaf values.
fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(|n| json!(n)),
        "[a-z ]{0,12}".prop_map(Value::String),
    ]
}

/// Strategy for arbitrary nested trees.
fn tree() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..5)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Strategy for dot-paths with alphabetic segments.
fn path() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z]{1,6}", 1..5).prop_map(|segments| segments.join("."))
}

fn noop() -> Callback {
    Arc::new(|_: Option<&Value>, _: Option<&Value>, _: &str| {})
}

#[derive(Debug, Clone)]
enum HistoryOp {
    Write(i32),
    Undo,
    Redo,
}

fn history_op() -> impl Strategy<Value = HistoryOp> {
    prop_oneof![
        3 => any::<i32>().prop_map(HistoryOp::Write),
        1 => Just(HistoryOp::Undo),
        1 => Just(HistoryOp::Redo),
    ]
}

proptest! {
    /// Whatever is set at a path is what is read back.
    #[test]
    fn set_then_get_round_trips(base in tree(), p in path(), v in tree()) {
        let next = set_value_by_path(&base, &p, v.clone(), false).unwrap();
        prop_assert_eq!(get_value_by_path(&next, &p), Some(&v));
    }

    /// Setting never mutates the input tree.
    #[test]
    fn set_does_not_mutate_input(base in tree(), p in path(), v in leaf()) {
        let before = base.clone();
        let _ = set_value_by_path(&base, &p, v, false);
        prop_assert_eq!(base, before);
    }

    /// Sibling values outside the written path survive a write.
    #[test]
    fn set_preserves_unrelated_top_level_keys(p in path(), v in leaf()) {
        let base = json!({"zzz_untouched": {"keep": true}});
        let next = set_value_by_path(&base, &p, v, false).unwrap();
        prop_assert_eq!(get_value_by_path(&next, "zzz_untouched.keep"), Some(&json!(true)));
    }

    /// Any array index either writes or is rejected; it never panics.
    #[test]
    fn array_index_writes_are_total(len in 0usize..8, index in any::<usize>()) {
        let base = json!({"xs": vec![0; len]});
        let path = format!("xs.{index}");
        match set_value_by_path(&base, &path, json!(1), false) {
            Ok(next) => {
                prop_assert!(index <= len + MAX_INDEX_GAP);
                prop_assert_eq!(get_value_by_path(&next, &path), Some(&json!(1)));
            }
            Err(_) => prop_assert!(index > len + MAX_INDEX_GAP),
        }
    }

    /// Clones are equal and share a structural key.
    #[test]
    fn clones_are_structurally_equal(v in tree()) {
        let copy = v.clone();
        prop_assert!(deep_equal(&v, &copy));
        prop_assert_eq!(structural_key(&v), structural_key(&copy));
    }

    /// Splitting a generated path yields its segments.
    #[test]
    fn split_matches_segment_count(segments in prop::collection::vec("[a-z]{1,6}", 1..6)) {
        let joined = segments.join(".");
        prop_assert_eq!(split_path(&joined), segments.iter().map(String::as_str).collect::<Vec<_>>());
    }

    /// A literal numeric range accepts exactly the values inside it.
    #[test]
    fn literal_range_is_inclusive(lo in -1000i64..0, hi in 0i64..1000, n in -2000i64..2000) {
        let rule = ValidationRule {
            min: Some(Bound::Literal(lo as f64)),
            max: Some(Bound::Literal(hi as f64)),
            ..ValidationRule::of_type(RuleType::Number)
        };
        let schema = Schema::empty().with_rule("score", rule).unwrap();
        let verdict = validate_value(&schema, "score", &json!(n), &json!({}));
        prop_assert_eq!(verdict.is_none(), lo <= n && n <= hi);
    }

    /// History length stays within capacity and the cursor stays valid.
    #[test]
    fn history_cursor_stays_in_bounds(
        capacity in 1usize..6,
        ops in prop::collection::vec(history_op(), 0..40),
    ) {
        let mut history = HistoryManager::new(true, capacity);
        history.initialize(&json!(0));
        for op in ops {
            match op {
                HistoryOp::Write(n) => history.add_state(&json!(n)),
                HistoryOp::Undo => { history.undo().unwrap(); }
                HistoryOp::Redo => { history.redo().unwrap(); }
            }
            prop_assert!(history.len() <= capacity);
            let cursor = history.cursor().unwrap();
            prop_assert!(cursor < history.len());
        }
    }

    /// A write is always followed by an undo back to the previous snapshot.
    #[test]
    fn undo_returns_previous_write(a in any::<i32>(), b in any::<i32>()) {
        let mut history = HistoryManager::new(true, 10);
        history.add_state(&json!(a));
        history.add_state(&json!(b));
        prop_assert_eq!(history.undo().unwrap().unwrap().state, json!(a));
        prop_assert_eq!(history.redo().unwrap().unwrap().state, json!(b));
    }

    /// Arbitrary add/remove sequences keep the registry consistent.
    #[test]
    fn registry_integrity_under_churn(
        adds in prop::collection::vec(0usize..3, 1..30),
        removals in prop::collection::vec(any::<prop::sample::Index>(), 0..30),
    ) {
        let paths = ["player", "player.health", "enemies"];
        let mut registry = SubscriptionRegistry::new();
        let mut live = Vec::new();
        for choice in adds {
            let id = registry
                .add(paths[choice], noop(), SubscribeOptions::default())
                .unwrap();
            live.push(id);
        }

        let mut removed = HashSet::new();
        for index in removals {
            let id = live[index.index(live.len())];
            let first_time = removed.insert(id);
            prop_assert_eq!(registry.remove(id), first_time);
            prop_assert!(registry.check_integrity().is_empty());
        }
        prop_assert_eq!(registry.len(), live.len() - removed.len());
    }
}
