//! engine::subscriptions
//!
//! Path-keyed observer registry.
//!
//! # Layout
//!
//! Subscribers live in one list per path. A side index maps every
//! [`SubscriptionId`] to its `(path, slot)` position so that removal is O(1):
//! the target slot is swapped with the last element of its list (whose index
//! entry is updated) and the list is popped. A list that becomes empty is
//! removed entirely.
//!
//! # Delivery
//!
//! Triggering a path first collects [`Notification`]s and then delivers them,
//! so callbacks never run while the registry (or the store) is locked and may
//! freely call back into the store. For a change at `a.b.c`:
//!
//! 1. direct subscribers of `a.b.c` receive `(new, old, "a.b.c")`
//! 2. deep subscribers of `a.b`, then `a`, receive the ancestor's *current*
//!    value with no old value
//!
//! When the whole tree is replaced (undo, redo, reset) every subscribed path
//! whose value differs is reported with its old and new value. A `deep(false)`
//! subscriber is reported only if its own node changed: a different scalar, a
//! different type, an object with different keys, or an array with a
//! different length. Changes confined to descendants reach it no more than a
//! descendant `set` would.
//!
//! A panicking callback is caught and logged; the remaining callbacks still
//! run.
//!
//! # Invariants
//!
//! - For every indexed id, the slot it points at holds a subscriber with that id
//! - Every stored subscriber is indexed
//! - No path maps to an empty list
//!
//! [`SubscriptionRegistry::check_integrity`] verifies all three.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;

use crate::core::path::{ancestors, get_value_by_path, is_subscribable, option_deep_equal};
use crate::core::types::SubscriptionId;

/// Subscriber callback: `(new_value, old_value, path)`.
///
/// `None` means the value is absent (never set, or not supplied for deep
/// notifications).
pub type Callback = Arc<dyn Fn(Option<&Value>, Option<&Value>, &str) + Send + Sync>;

/// Errors from subscription operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("invalid subscription path '{0}'")]
    InvalidPath(String),
}

/// Options for a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Invoke the callback once with the current value when subscribing.
    pub immediate: bool,
    /// Also fire when any descendant path changes.
    pub deep: bool,
}

impl Default for SubscribeOptions {
    fn default() -> Self {
        Self {
            immediate: false,
            deep: true,
        }
    }
}

impl SubscribeOptions {
    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    pub fn deep(mut self, deep: bool) -> Self {
        self.deep = deep;
        self
    }
}

struct Subscriber {
    id: SubscriptionId,
    callback: Callback,
    options: SubscribeOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    path: String,
    index: usize,
}

/// A violated registry invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssue {
    /// The index points at a path with no list.
    MissingList { id: SubscriptionId, path: String },
    /// The index points past the end of the list.
    SlotOutOfRange {
        id: SubscriptionId,
        path: String,
        index: usize,
    },
    /// The slot holds a different subscription.
    IdMismatch {
        id: SubscriptionId,
        found: SubscriptionId,
    },
    /// A stored subscriber has no index entry.
    Unindexed { id: SubscriptionId, path: String },
    /// A path maps to an empty list.
    EmptyList { path: String },
}

impl std::fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityIssue::MissingList { id, path } => {
                write!(f, "{id} indexed under '{path}' which has no subscribers")
            }
            IntegrityIssue::SlotOutOfRange { id, path, index } => {
                write!(f, "{id} indexed at '{path}'[{index}] which is out of range")
            }
            IntegrityIssue::IdMismatch { id, found } => {
                write!(f, "{id} indexed at a slot holding {found}")
            }
            IntegrityIssue::Unindexed { id, path } => {
                write!(f, "{id} stored under '{path}' has no index entry")
            }
            IntegrityIssue::EmptyList { path } => write!(f, "'{path}' has an empty list"),
        }
    }
}

/// A pending callback invocation.
pub struct Notification {
    id: SubscriptionId,
    callback: Callback,
    path: String,
    new_value: Option<Value>,
    old_value: Option<Value>,
}

impl Notification {
    /// Invoke the callback. Returns `false` if it panicked.
    pub fn deliver(self) -> bool {
        let Notification {
            id,
            callback,
            path,
            new_value,
            old_value,
        } = self;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            callback(new_value.as_ref(), old_value.as_ref(), &path)
        }));
        if outcome.is_err() {
            tracing::error!(subscription = %id, path = %path, "subscriber callback panicked");
        }
        outcome.is_ok()
    }

    pub fn subscription_id(&self) -> SubscriptionId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Deliver every notification in order.
///
/// Returns the number of callbacks that panicked.
pub fn deliver_all(notifications: Vec<Notification>) -> usize {
    notifications
        .into_iter()
        .map(Notification::deliver)
        .filter(|ok| !ok)
        .count()
}

/// The observer registry.
#[derive(Default)]
pub struct SubscriptionRegistry {
    by_path: HashMap<String, Vec<Subscriber>>,
    index: HashMap<SubscriptionId, Slot>,
    next_id: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `path`.
    ///
    /// `immediate` is not handled here because the registry does not own the
    /// state; see [`SubscriptionRegistry::immediate_notification`].
    ///
    /// # Errors
    ///
    /// Returns `SubscriptionError::InvalidPath` for empty paths or paths with
    /// empty segments.
    pub fn add(
        &mut self,
        path: &str,
        callback: Callback,
        options: SubscribeOptions,
    ) -> Result<SubscriptionId, SubscriptionError> {
        if !is_subscribable(path) {
            return Err(SubscriptionError::InvalidPath(path.to_string()));
        }

        self.next_id += 1;
        let id = SubscriptionId::from_raw(self.next_id);

        let list = self.by_path.entry(path.to_string()).or_default();
        list.push(Subscriber {
            id,
            callback,
            options,
        });
        self.index.insert(
            id,
            Slot {
                path: path.to_string(),
                index: list.len() - 1,
            },
        );
        Ok(id)
    }

    /// Remove a subscription in O(1).
    ///
    /// Returns `false` if the id is unknown (already removed).
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let Some(slot) = self.index.remove(&id) else {
            return false;
        };
        let Some(list) = self.by_path.get_mut(&slot.path) else {
            return false;
        };
        if slot.index >= list.len() {
            return false;
        }

        list.swap_remove(slot.index);
        if let Some(moved) = list.get(slot.index) {
            if let Some(entry) = self.index.get_mut(&moved.id) {
                entry.index = slot.index;
            }
        }
        if list.is_empty() {
            self.by_path.remove(&slot.path);
        }
        true
    }

    /// The notification an `immediate` subscription receives on creation.
    pub fn immediate_notification(
        &self,
        id: SubscriptionId,
        state: &Value,
    ) -> Option<Notification> {
        let slot = self.index.get(&id)?;
        let subscriber = self.by_path.get(&slot.path)?.get(slot.index)?;
        Some(Notification {
            id,
            callback: Arc::clone(&subscriber.callback),
            path: slot.path.clone(),
            new_value: get_value_by_path(state, &slot.path).cloned(),
            old_value: None,
        })
    }

    /// Collect notifications for a change at `path`.
    ///
    /// `state` is the tree after the change; deep subscribers on ancestors
    /// receive their current value from it.
    pub fn collect(
        &self,
        path: &str,
        new_value: Option<&Value>,
        old_value: Option<&Value>,
        state: &Value,
    ) -> Vec<Notification> {
        let mut pending = Vec::new();

        if let Some(direct) = self.by_path.get(path) {
            pending.extend(direct.iter().map(|s| Notification {
                id: s.id,
                callback: Arc::clone(&s.callback),
                path: path.to_string(),
                new_value: new_value.cloned(),
                old_value: old_value.cloned(),
            }));
        }

        for ancestor in ancestors(path) {
            let Some(list) = self.by_path.get(ancestor) else {
                continue;
            };
            let current = get_value_by_path(state, ancestor);
            pending.extend(list.iter().filter(|s| s.options.deep).map(|s| Notification {
                id: s.id,
                callback: Arc::clone(&s.callback),
                path: ancestor.to_string(),
                new_value: current.cloned(),
                old_value: None,
            }));
        }

        pending
    }

    /// Collect notifications for every subscribed path whose value differs
    /// between `before` and `after`.
    ///
    /// Used when the whole tree is replaced (undo, redo, reset). Shallow
    /// subscribers only see changes to their own node.
    pub fn collect_changed(&self, before: &Value, after: &Value) -> Vec<Notification> {
        let mut paths: Vec<&String> = self.by_path.keys().collect();
        paths.sort();

        let mut pending = Vec::new();
        for path in paths {
            let old = get_value_by_path(before, path);
            let new = get_value_by_path(after, path);
            if option_deep_equal(old, new) {
                continue;
            }
            let node_changed = node_changed(old, new);
            pending.extend(
                self.by_path[path]
                    .iter()
                    .filter(|s| s.options.deep || node_changed)
                    .map(|s| Notification {
                        id: s.id,
                        callback: Arc::clone(&s.callback),
                        path: path.clone(),
                        new_value: new.cloned(),
                        old_value: old.cloned(),
                    }),
            );
        }
        pending
    }

    /// Collect and deliver notifications for a change at `path`.
    pub fn trigger(
        &self,
        path: &str,
        new_value: Option<&Value>,
        old_value: Option<&Value>,
        state: &Value,
    ) -> usize {
        deliver_all(self.collect(path, new_value, old_value, state))
    }

    /// Verify index and list consistency.
    pub fn check_integrity(&self) -> Vec<IntegrityIssue> {
        let mut issues = Vec::new();

        for (id, slot) in &self.index {
            match self.by_path.get(&slot.path) {
                None => issues.push(IntegrityIssue::MissingList {
                    id: *id,
                    path: slot.path.clone(),
                }),
                Some(list) => match list.get(slot.index) {
                    None => issues.push(IntegrityIssue::SlotOutOfRange {
                        id: *id,
                        path: slot.path.clone(),
                        index: slot.index,
                    }),
                    Some(found) if found.id != *id => issues.push(IntegrityIssue::IdMismatch {
                        id: *id,
                        found: found.id,
                    }),
                    Some(_) => {}
                },
            }
        }

        for (path, list) in &self.by_path {
            if list.is_empty() {
                issues.push(IntegrityIssue::EmptyList { path: path.clone() });
            }
            for subscriber in list {
                if !self.index.contains_key(&subscriber.id) {
                    issues.push(IntegrityIssue::Unindexed {
                        id: subscriber.id,
                        path: path.clone(),
                    });
                }
            }
        }

        issues
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of subscriptions on exactly `path`.
    pub fn subscriber_count(&self, path: &str) -> usize {
        self.by_path.get(path).map_or(0, Vec::len)
    }

    /// Drop every subscription.
    pub fn clear(&mut self) {
        self.by_path.clear();
        self.index.clear();
    }
}

/// Handle to a live subscription.
///
/// Dropping the handle does not unsubscribe; call
/// [`Subscription::unsubscribe`].
#[derive(Clone)]
pub struct Subscription {
    id: SubscriptionId,
    registry: Weak<Mutex<SubscriptionRegistry>>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriptionId, registry: &Arc<Mutex<SubscriptionRegistry>>) -> Self {
        Self {
            id,
            registry: Arc::downgrade(registry),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Remove the subscription. Returns `false` if it was already removed or
    /// the store is gone.
    pub fn unsubscribe(&self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.lock().remove(self.id))
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Whether the node itself differs, ignoring changes inside its children.
fn node_changed(old: Option<&Value>, new: Option<&Value>) -> bool {
    match (old, new) {
        (Some(Value::Object(a)), Some(Value::Object(b))) => {
            a.len() != b.len() || a.keys().any(|k| !b.contains_key(k))
        }
        (Some(Value::Array(a)), Some(Value::Array(b))) => a.len() != b.len(),
        (old, new) => !option_deep_equal(old, new),
    }
}
